//! Payment-gated plate lookups.
//!
//! A verified checkout grants an entitlement keyed by price type. Yearly entitlements last 365
//! days from the grant and are purged once expired. A one-time entitlement covers exactly one
//! lookup (for the plate it was bought for, when one was given) and is consumed by it.

use std::collections::BTreeMap;
use std::future::Future;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::domain::PlateText;

const YEARLY_DAYS: i64 = 365;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PriceType {
    OneTime,
    Yearly,
}

/// Price identifiers handed to the payment backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceCatalog {
    pub one_time: String,
    pub yearly: String,
}

impl PriceCatalog {
    pub fn price_id(&self, price_type: PriceType) -> &str {
        match price_type {
            PriceType::OneTime => &self.one_time,
            PriceType::Yearly => &self.yearly,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub session_id: String,
    pub redirect_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentVerification {
    pub paid: bool,
    pub price_type: PriceType,
    #[serde(default, alias = "licensePlate")]
    pub plate_text: String,
}

/// Checkout creation and verification backend.
pub trait PaymentGateway: Send + Sync {
    fn create_session(
        &self,
        price_id: &str,
        plate: Option<&PlateText>,
    ) -> impl Future<Output = Result<CheckoutSession, PaymentError>> + Send;

    fn verify(
        &self,
        session_id: &str,
    ) -> impl Future<Output = Result<PaymentVerification, PaymentError>> + Send;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PaymentError {
    #[error("payment service unavailable: {0}")]
    Transport(String),
    #[error("checkout session {0} has not been paid")]
    NotPaid(String),
    #[error("a plate check requires an active purchase")]
    EntitlementRequired,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entitlement {
    pub price_type: PriceType,
    pub session_id: String,
    pub granted_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plate_text: Option<PlateText>,
}

impl Entitlement {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        match self.price_type {
            PriceType::Yearly => Some(self.granted_at + Duration::days(YEARLY_DAYS)),
            PriceType::OneTime => None,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().is_some_and(|expires| now >= expires)
    }

    fn covers(&self, plate: &PlateText) -> bool {
        match (&self.price_type, &self.plate_text) {
            (PriceType::OneTime, Some(bought_for)) => bought_for == plate,
            _ => true,
        }
    }
}

/// What a successful authorization drew on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupGrant {
    Subscription,
    SingleUse,
}

/// Locally cached entitlements, one per price type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntitlementLedger {
    entries: BTreeMap<PriceType, Entitlement>,
}

impl EntitlementLedger {
    pub fn get(&self, price_type: PriceType) -> Option<&Entitlement> {
        self.entries.get(&price_type)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn grant(
        &mut self,
        session_id: &str,
        verification: &PaymentVerification,
        now: DateTime<Utc>,
    ) -> Result<&Entitlement, PaymentError> {
        if !verification.paid {
            return Err(PaymentError::NotPaid(session_id.to_string()));
        }

        let plate = PlateText::normalize(&verification.plate_text);
        let entitlement = Entitlement {
            price_type: verification.price_type,
            session_id: session_id.to_string(),
            granted_at: now,
            plate_text: (!plate.as_str().is_empty()).then_some(plate),
        };
        info!(price_type = ?entitlement.price_type, "entitlement granted");
        self.entries.insert(verification.price_type, entitlement);
        Ok(&self.entries[&verification.price_type])
    }

    /// Drop expired yearly entitlements; returns whether anything was removed.
    pub fn purge_expired(&mut self, now: DateTime<Utc>) -> bool {
        let before = self.entries.len();
        self.entries.retain(|_, entitlement| !entitlement.is_expired(now));
        before != self.entries.len()
    }

    /// Authorize one plate lookup. Prefers an active subscription; otherwise consumes a one-time
    /// entitlement that covers the plate.
    pub fn authorize_lookup(
        &mut self,
        plate: &PlateText,
        now: DateTime<Utc>,
    ) -> Result<LookupGrant, PaymentError> {
        self.purge_expired(now);

        if self.entries.contains_key(&PriceType::Yearly) {
            return Ok(LookupGrant::Subscription);
        }

        match self.entries.get(&PriceType::OneTime) {
            Some(entitlement) if entitlement.covers(plate) => {
                self.entries.remove(&PriceType::OneTime);
                Ok(LookupGrant::SingleUse)
            }
            _ => Err(PaymentError::EntitlementRequired),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).single().expect("valid instant")
    }

    fn verification(price_type: PriceType, plate: &str) -> PaymentVerification {
        PaymentVerification {
            paid: true,
            price_type,
            plate_text: plate.to_string(),
        }
    }

    #[test]
    fn unpaid_sessions_grant_nothing() {
        let mut ledger = EntitlementLedger::default();
        let mut unpaid = verification(PriceType::Yearly, "");
        unpaid.paid = false;
        assert_eq!(
            ledger.grant("cs_1", &unpaid, now()),
            Err(PaymentError::NotPaid("cs_1".to_string()))
        );
        assert!(ledger.is_empty());
    }

    #[test]
    fn yearly_entitlement_expires_after_365_days() {
        let mut ledger = EntitlementLedger::default();
        ledger
            .grant("cs_y", &verification(PriceType::Yearly, ""), now())
            .expect("granted");
        let plate = PlateText::normalize("MIA305");

        let inside = now() + Duration::days(364);
        assert_eq!(ledger.authorize_lookup(&plate, inside), Ok(LookupGrant::Subscription));
        assert_eq!(ledger.authorize_lookup(&plate, inside), Ok(LookupGrant::Subscription));

        let after = now() + Duration::days(365);
        assert_eq!(
            ledger.authorize_lookup(&plate, after),
            Err(PaymentError::EntitlementRequired)
        );
        assert!(ledger.get(PriceType::Yearly).is_none());
    }

    #[test]
    fn one_time_entitlement_is_consumed_by_its_plate() {
        let mut ledger = EntitlementLedger::default();
        ledger
            .grant("cs_o", &verification(PriceType::OneTime, "mia 305"), now())
            .expect("granted");

        let other = PlateText::normalize("LUV2SP");
        assert_eq!(
            ledger.authorize_lookup(&other, now()),
            Err(PaymentError::EntitlementRequired)
        );

        let plate = PlateText::normalize("MIA305");
        assert_eq!(ledger.authorize_lookup(&plate, now()), Ok(LookupGrant::SingleUse));
        assert_eq!(
            ledger.authorize_lookup(&plate, now()),
            Err(PaymentError::EntitlementRequired)
        );
    }

    #[test]
    fn ledger_round_trips_through_json_keyed_by_price_type() {
        let mut ledger = EntitlementLedger::default();
        ledger
            .grant("cs_y", &verification(PriceType::Yearly, ""), now())
            .expect("granted");
        let json = serde_json::to_value(&ledger).expect("serializes");
        assert!(json.get("yearly").is_some());
        let restored: EntitlementLedger = serde_json::from_value(json).expect("deserializes");
        assert_eq!(restored, ledger);
    }
}
