use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use super::badges;
use super::domain::{PlateText, Report, ReportDraft, ReportId, ValidationError};
use super::persistence::{PatrolStore, Persistence};
use super::state::PatrolState;
use super::views::{Reward, View};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmitOutcome {
    pub report: Report,
    pub newly_unlocked: Vec<String>,
    /// Reports that already named this plate, excluding the one just created.
    pub prior_reports: Vec<Report>,
    pub next_view: View,
}

impl SubmitOutcome {
    pub fn repeat_offender(&self) -> bool {
        !self.prior_reports.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReportError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("report {0} not found")]
    NotFound(ReportId),
    #[error("no report is open for editing")]
    NotEditing,
}

impl PatrolState {
    /// Validate, create, and persist a report, then run the badge rules against it.
    pub fn submit_report<S: PatrolStore>(
        &mut self,
        persistence: &Persistence<S>,
        draft: &ReportDraft,
        now: DateTime<Utc>,
    ) -> Result<SubmitOutcome, ValidationError> {
        draft.validate()?;
        let location = draft
            .location
            .clone()
            .ok_or(ValidationError::MissingLocation)?;

        let report = Report {
            id: self.next_report_id(now),
            plate_text: draft.plate.clone().unwrap_or_else(PlateText::unknown),
            behaviors: draft.behaviors.clone(),
            custom_note: draft.retained_note(),
            timestamp: now,
            location: location.address,
            coordinates: location.coordinates,
        };

        // Must run before the insert, or the report counts as its own prior offense.
        let prior_reports = self.reports_for_plate(&report.plate_text);

        self.reports.insert(0, report.clone());
        persistence.save_reports(&self.reports);

        let evaluation = badges::evaluate(&self.badges, &report);
        if evaluation.changed() {
            self.badges = evaluation.badges;
            persistence.save_badges(&self.badges);
        }

        info!(
            report_id = %report.id,
            behaviors = report.behaviors.len(),
            prior = prior_reports.len(),
            unlocked = evaluation.newly_unlocked.len(),
            "report submitted"
        );

        let next_view = if prior_reports.is_empty() {
            View::Celebration {
                reward: Reward::Report {
                    plate: report.plate_text.clone(),
                    behavior_count: report.behaviors.len(),
                },
            }
        } else {
            View::PreviousReports {
                plate: report.plate_text.clone(),
                reports: prior_reports.clone(),
            }
        };

        Ok(SubmitOutcome {
            report,
            newly_unlocked: evaluation.newly_unlocked,
            prior_reports,
            next_view,
        })
    }

    /// Replace the editable fields of a stored report. Id and timestamp never change and badges
    /// are not re-evaluated.
    pub fn edit_report<S: PatrolStore>(
        &mut self,
        persistence: &Persistence<S>,
        id: &ReportId,
        patch: &ReportDraft,
    ) -> Result<Report, ReportError> {
        patch.validate()?;
        let location = patch
            .location
            .clone()
            .ok_or(ValidationError::MissingLocation)?;

        let report = self
            .reports
            .iter_mut()
            .find(|report| report.id == *id)
            .ok_or_else(|| ReportError::NotFound(id.clone()))?;

        if let Some(plate) = &patch.plate {
            report.plate_text = plate.clone();
        }
        report.behaviors = patch.behaviors.clone();
        report.custom_note = patch.retained_note();
        report.location = location.address;
        report.coordinates = location.coordinates;

        let updated = report.clone();
        persistence.save_reports(&self.reports);
        info!(report_id = %id, "report edited");
        Ok(updated)
    }

    /// Remove exactly the targeted report. Badges and deals are untouched.
    pub fn delete_report<S: PatrolStore>(
        &mut self,
        persistence: &Persistence<S>,
        id: &ReportId,
    ) -> Option<Report> {
        let index = self.reports.iter().position(|report| report.id == *id)?;
        let removed = self.reports.remove(index);
        persistence.save_reports(&self.reports);
        info!(report_id = %id, "report deleted");
        Some(removed)
    }

    /// Millisecond creation stamp, bumped past any id already taken.
    fn next_report_id(&self, now: DateTime<Utc>) -> ReportId {
        let mut candidate = now.timestamp_millis();
        while self.reports.iter().any(|report| report.id.0 == candidate.to_string()) {
            candidate += 1;
        }
        ReportId(candidate.to_string())
    }
}
