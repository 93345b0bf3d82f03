use std::collections::HashSet;

use serde::Serialize;

use super::catalog::{FIRST_CATCH_BADGE, LEGENDARY_BADGE, LEGENDARY_THRESHOLD};
use super::domain::{Badge, Report};

/// Result of running the unlock rules against one submitted report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BadgeEvaluation {
    pub badges: Vec<Badge>,
    pub newly_unlocked: Vec<String>,
}

impl BadgeEvaluation {
    pub fn changed(&self) -> bool {
        !self.newly_unlocked.is_empty()
    }
}

/// Pure unlock rules. Every qualifying badge unlocks on the same call and unlocked badges
/// never revert.
pub fn evaluate(current: &[Badge], report: &Report) -> BadgeEvaluation {
    let mut badges = current.to_vec();
    let mut newly_unlocked = Vec::new();

    for badge in badges.iter_mut().filter(|badge| !badge.unlocked()) {
        if qualifies(badge, report) {
            badge.unlock();
            newly_unlocked.push(badge.id.clone());
        }
    }

    BadgeEvaluation {
        badges,
        newly_unlocked,
    }
}

fn qualifies(badge: &Badge, report: &Report) -> bool {
    if badge.id == FIRST_CATCH_BADGE {
        return true;
    }
    if let Some(required) = &badge.required_behavior {
        return report.has_behavior(required);
    }
    badge.id == LEGENDARY_BADGE && distinct_behaviors(report) >= LEGENDARY_THRESHOLD
}

fn distinct_behaviors(report: &Report) -> usize {
    report.behaviors.iter().collect::<HashSet<_>>().len()
}
