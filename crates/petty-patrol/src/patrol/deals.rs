use serde::Serialize;
use tracing::info;

use super::domain::Deal;
use super::persistence::{PatrolStore, Persistence};
use super::state::PatrolState;
use super::views::{Reward, View};

/// Expected, user-facing results of a QR scan. None of these are errors.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DealClaimOutcome {
    NoMatch,
    AlreadyClaimed { deal: Deal },
    Claimed { deal: Deal },
}

impl DealClaimOutcome {
    pub fn next_view(&self) -> View {
        match self {
            Self::NoMatch => View::Home,
            Self::AlreadyClaimed { .. } => View::Deals,
            Self::Claimed { deal } => View::Celebration {
                reward: Reward::Deal {
                    partner_name: deal.partner_name.clone(),
                },
            },
        }
    }
}

impl PatrolState {
    /// At most once per deal: the claimed flag is checked before it is ever set.
    pub fn claim_deal<S: PatrolStore>(
        &mut self,
        persistence: &Persistence<S>,
        qr_value: &str,
    ) -> DealClaimOutcome {
        let Some(deal) = self.deals.iter_mut().find(|deal| deal.matches(qr_value)) else {
            return DealClaimOutcome::NoMatch;
        };

        if deal.claimed() {
            return DealClaimOutcome::AlreadyClaimed { deal: deal.clone() };
        }

        deal.mark_claimed();
        let claimed = deal.clone();
        persistence.save_deals(&self.deals);
        info!(deal_id = %claimed.id, partner = %claimed.partner_name, "deal claimed");
        DealClaimOutcome::Claimed { deal: claimed }
    }
}
