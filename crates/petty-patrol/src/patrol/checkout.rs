use std::sync::Mutex;

use chrono::{DateTime, Utc};
use tracing::info;

use super::paywall::{CheckoutSession, PaymentError, PaymentGateway, PriceType};
use super::persistence::PatrolStore;
use super::session::{lock_session, PatrolSession};

const SESSION_UNAVAILABLE: &str = "patrol session unavailable";

/// Drives the payment backend for the paywall view. Failures become notices on the session.
pub struct CheckoutDriver<G> {
    gateway: G,
}

impl<G: PaymentGateway> CheckoutDriver<G> {
    pub fn new(gateway: G) -> Self {
        Self { gateway }
    }

    pub async fn start<S: PatrolStore>(
        &self,
        session: &Mutex<PatrolSession<S>>,
        price_type: PriceType,
    ) -> Result<CheckoutSession, PaymentError> {
        let (price_id, plate) = lock_session(session)
            .map(|guard| guard.checkout_request(price_type))
            .ok_or_else(|| PaymentError::Transport(SESSION_UNAVAILABLE.to_string()))?;

        match self.gateway.create_session(&price_id, plate.as_ref()).await {
            Ok(checkout) => {
                info!(price_id = %price_id, session_id = %checkout.session_id, "checkout started");
                Ok(checkout)
            }
            Err(err) => {
                if let Some(mut guard) = lock_session(session) {
                    guard.payment_failed(&err);
                }
                Err(err)
            }
        }
    }

    /// Verify a returning checkout and cache the resulting entitlement.
    pub async fn complete<S: PatrolStore>(
        &self,
        session: &Mutex<PatrolSession<S>>,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Result<PriceType, PaymentError> {
        let verification = self.gateway.verify(session_id).await;

        let mut guard = lock_session(session)
            .ok_or_else(|| PaymentError::Transport(SESSION_UNAVAILABLE.to_string()))?;
        match verification {
            Ok(verification) => guard.record_payment(session_id, &verification, now),
            Err(err) => {
                guard.payment_failed(&err);
                Err(err)
            }
        }
    }
}
