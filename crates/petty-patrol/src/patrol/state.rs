use serde::Serialize;

use super::catalog::{seed_badges, seed_deals, POINTS_PER_REPORT};
use super::domain::{Badge, Deal, PlateText, Report, ReportId};
use super::paywall::EntitlementLedger;

/// The persisted collections owned by one device.
#[derive(Debug, Clone, PartialEq)]
pub struct PatrolState {
    pub reports: Vec<Report>,
    pub badges: Vec<Badge>,
    pub deals: Vec<Deal>,
    pub entitlements: EntitlementLedger,
}

impl Default for PatrolState {
    fn default() -> Self {
        Self {
            reports: Vec::new(),
            badges: seed_badges(),
            deals: seed_deals(),
            entitlements: EntitlementLedger::default(),
        }
    }
}

impl PatrolState {
    pub fn report(&self, id: &ReportId) -> Option<&Report> {
        self.reports.iter().find(|report| report.id == *id)
    }

    /// Reports already filed against a plate, newest first as stored.
    pub fn reports_for_plate(&self, plate: &PlateText) -> Vec<Report> {
        self.reports
            .iter()
            .filter(|report| report.plate_text == *plate)
            .cloned()
            .collect()
    }

    pub fn live_feed(&self) -> Vec<Report> {
        let mut feed = self.reports.clone();
        feed.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        feed
    }

    pub fn stats(&self) -> PatrolStats {
        let badges_unlocked = self.badges.iter().filter(|badge| badge.unlocked()).count();
        let badges_total = self.badges.len();
        let badge_progress = if badges_total == 0 {
            0.0
        } else {
            badges_unlocked as f32 / badges_total as f32 * 100.0
        };

        PatrolStats {
            reports: self.reports.len(),
            points: self.reports.len() as u32 * POINTS_PER_REPORT,
            badges_unlocked,
            badges_total,
            badge_progress,
            deals_claimed: self.deals.iter().filter(|deal| deal.claimed()).count(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatrolStats {
    pub reports: usize,
    pub points: u32,
    pub badges_unlocked: usize,
    pub badges_total: usize,
    pub badge_progress: f32,
    pub deals_claimed: usize,
}
