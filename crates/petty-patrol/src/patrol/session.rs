//! One device's interactive session: persisted state plus the transient draft, current view,
//! capture cycle, and pending notices. Every user event is a method here.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use super::analytics::{props, AnalyticsSink};
use super::capture::{CaptureOutcome, CapturePhase, CaptureSource, CaptureTicket};
use super::deals::DealClaimOutcome;
use super::domain::{
    AnalysisKind, AnalysisResult, Badge, BehaviorId, Deal, PinnedLocation, PlateText, Report,
    ReportDraft, ReportId, ValidationError,
};
use super::lifecycle::{ReportError, SubmitOutcome};
use super::paywall::{LookupGrant, PaymentError, PaymentVerification, PriceCatalog, PriceType};
use super::persistence::{PatrolStore, Persistence};
use super::state::{PatrolState, PatrolStats};
use super::views::{NavTab, NavigationError, Navigator, RouteTable, View};

const INVALID_CAPTURE_NOTICE: &str = "Couldn't spot a plate or a deal code. Give it another shot.";
const NO_DEAL_NOTICE: &str = "That code doesn't match any partner deal.";
const ALREADY_CLAIMED_NOTICE: &str = "You've already claimed this deal.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    Info,
    Error,
    BadgeUnlocked,
}

/// Transient, dismissible message for the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    fn info(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Info,
            message: message.into(),
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Error,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub debug_tools: bool,
    pub prices: PriceCatalog,
}

/// Beta tester sign-up from the feedback view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BetaSignup {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq)]
struct EditSession {
    report_id: ReportId,
    return_to: View,
}

pub struct PatrolSession<S> {
    persistence: Persistence<S>,
    state: PatrolState,
    draft: ReportDraft,
    navigator: Navigator,
    capture: CapturePhase,
    generation: u64,
    active_capture: Option<CaptureTicket>,
    editing: Option<EditSession>,
    paywall_plate: Option<PlateText>,
    prices: PriceCatalog,
    notices: Vec<Notice>,
    analytics: Arc<dyn AnalyticsSink>,
}

impl<S: PatrolStore> PatrolSession<S> {
    /// Load persisted state and open on onboarding for a fresh device, home otherwise.
    pub fn new(
        persistence: Persistence<S>,
        options: SessionOptions,
        analytics: Arc<dyn AnalyticsSink>,
    ) -> Self {
        let state = persistence.load();
        let initial = if state.reports.is_empty() {
            View::Onboarding
        } else {
            View::Home
        };
        debug!(reports = state.reports.len(), view = initial.name(), "session opened");

        Self {
            persistence,
            state,
            draft: ReportDraft::default(),
            navigator: Navigator::new(initial, RouteTable::new(options.debug_tools)),
            capture: CapturePhase::Idle,
            generation: 0,
            active_capture: None,
            editing: None,
            paywall_plate: None,
            prices: options.prices,
            notices: Vec::new(),
            analytics,
        }
    }

    pub fn view(&self) -> &View {
        self.navigator.current()
    }

    pub fn draft(&self) -> &ReportDraft {
        &self.draft
    }

    pub fn capture_phase(&self) -> CapturePhase {
        self.capture
    }

    pub fn state(&self) -> &PatrolState {
        &self.state
    }

    pub fn reports(&self) -> &[Report] {
        &self.state.reports
    }

    pub fn badges(&self) -> &[Badge] {
        &self.state.badges
    }

    pub fn deals(&self) -> &[Deal] {
        &self.state.deals
    }

    pub fn stats(&self) -> PatrolStats {
        self.state.stats()
    }

    pub fn live_feed(&self) -> Vec<Report> {
        self.state.live_feed()
    }

    pub fn persistence(&self) -> &Persistence<S> {
        &self.persistence
    }

    pub fn drain_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    pub fn complete_onboarding(&mut self) {
        if matches!(self.view(), View::Onboarding) {
            self.analytics.track("onboarding_completed", props([]));
            self.navigate(View::Home);
        }
    }

    pub fn select_tab(&mut self, tab: NavTab) -> Result<(), NavigationError> {
        let target = self.navigator.routes().tab_target(self.view(), tab)?;
        self.abandon_capture();
        self.navigate(target);
        Ok(())
    }

    /// Jump straight to any view. Only available with debug tools enabled.
    pub fn debug_jump(&mut self, target: View) -> Result<(), NavigationError> {
        let target = self.navigator.routes().debug_target(target)?;
        self.navigate(target);
        Ok(())
    }

    /// Start a new capture cycle, superseding any capture still in flight.
    pub fn begin_capture(&mut self, source: CaptureSource) -> CaptureTicket {
        self.generation += 1;
        let ticket = CaptureTicket {
            generation: self.generation,
            source,
        };
        self.draft.clear();
        self.capture = CapturePhase::AwaitingMedia;
        self.active_capture = Some(ticket);
        self.analytics.track(
            "capture_started",
            props([("source", json!(source)), ("generation", json!(ticket.generation))]),
        );
        ticket
    }

    /// Returns false when the ticket is no longer the active capture.
    pub fn media_received(&mut self, ticket: CaptureTicket) -> bool {
        if !self.is_active(ticket) || self.capture != CapturePhase::AwaitingMedia {
            self.log_stale(ticket, "media");
            return false;
        }
        self.capture = CapturePhase::Analyzing;
        self.navigate(View::Analyzing);
        true
    }

    /// Pre-populate the draft location from an automatic fix. A location already pinned by the
    /// user is kept.
    pub fn location_resolved(&mut self, ticket: CaptureTicket, location: PinnedLocation) -> bool {
        if !self.is_active(ticket) {
            self.log_stale(ticket, "location");
            return false;
        }
        if self.draft.location.is_none() {
            self.draft.location = Some(location);
        }
        true
    }

    pub fn analysis_completed(
        &mut self,
        ticket: CaptureTicket,
        analysis: AnalysisResult,
    ) -> CaptureOutcome {
        if !self.is_active(ticket) || self.capture != CapturePhase::Analyzing {
            self.log_stale(ticket, "analysis");
            return CaptureOutcome::Stale;
        }
        self.capture = CapturePhase::Idle;
        self.active_capture = None;
        self.analytics.track(
            "capture_analyzed",
            props([
                ("kind", json!(analysis.kind)),
                ("confidence", json!(analysis.confidence)),
            ]),
        );

        match analysis.kind {
            AnalysisKind::Plate => {
                let Ok(plate) = PlateText::parse(&analysis.value) else {
                    return self.reject_capture();
                };
                self.draft.plate = Some(plate.clone());
                self.navigate(View::BehaviorPicker);
                CaptureOutcome::Plate { plate }
            }
            AnalysisKind::Qr => {
                self.reset_draft();
                let claim = self.claim_deal(&analysis.value);
                CaptureOutcome::Deal { claim }
            }
            AnalysisKind::Invalid => self.reject_capture(),
        }
    }

    /// Leave the capture flow. Any pending completion for the current cycle becomes stale.
    pub fn cancel_capture(&mut self) {
        self.abandon_capture();
        self.navigate(View::Home);
    }

    pub fn start_manual_entry(&mut self) {
        self.abandon_capture();
        self.navigate(View::ManualEntry);
    }

    /// Accept a typed plate and move on to the mandatory location pin.
    pub fn set_manual_plate(&mut self, raw: &str) -> Result<PlateText, ValidationError> {
        let plate = PlateText::parse(raw)?;
        self.draft.plate = Some(plate.clone());
        self.navigate(View::LocationPicker);
        Ok(plate)
    }

    pub fn open_location_picker(&mut self) {
        self.navigate(View::LocationPicker);
    }

    /// Overrides any automatic location.
    pub fn pin_location(&mut self, location: PinnedLocation) {
        debug!(address = %location.address, "location pinned");
        self.draft.location = Some(location);
    }

    /// Generation of the draft being assembled, taken before an async map-pin lookup.
    pub fn pin_ticket(&self) -> u64 {
        self.generation
    }

    /// Apply a resolved map pin unless the draft it was requested for has been replaced.
    pub fn location_pinned(&mut self, generation: u64, location: PinnedLocation) -> bool {
        if generation != self.generation {
            warn!(
                completion = "pin",
                ticket = generation,
                current = self.generation,
                "ignoring stale capture completion"
            );
            return false;
        }
        self.pin_location(location);
        true
    }

    pub fn confirm_location(&mut self) -> Result<(), ValidationError> {
        if self.draft.location.is_none() {
            return Err(ValidationError::MissingLocation);
        }
        self.navigate(View::BehaviorPicker);
        Ok(())
    }

    pub fn toggle_behavior(&mut self, behavior: impl Into<BehaviorId>) {
        self.draft.toggle_behavior(behavior.into());
    }

    pub fn set_custom_note(&mut self, note: impl Into<String>) {
        self.draft.custom_note = note.into();
    }

    pub fn submit_report(&mut self) -> Result<SubmitOutcome, ValidationError> {
        self.submit_report_at(Utc::now())
    }

    /// On rejection nothing changes and the draft stays for the user to fix.
    pub fn submit_report_at(
        &mut self,
        now: DateTime<Utc>,
    ) -> Result<SubmitOutcome, ValidationError> {
        let outcome = self
            .state
            .submit_report(&self.persistence, &self.draft, now)?;

        self.abandon_capture();
        for badge_id in &outcome.newly_unlocked {
            self.announce_badge(badge_id);
        }
        self.analytics.track(
            "report_submitted",
            props([
                ("plate", json!(outcome.report.plate_text)),
                ("behaviors", json!(outcome.report.behaviors)),
                ("repeat_offender", json!(outcome.repeat_offender())),
            ]),
        );
        self.navigate(outcome.next_view.clone());
        Ok(outcome)
    }

    /// Submit a complete draft in one step, replacing whatever was being assembled.
    pub fn submit_draft(
        &mut self,
        draft: ReportDraft,
        now: DateTime<Utc>,
    ) -> Result<SubmitOutcome, ValidationError> {
        draft.validate()?;
        self.draft = draft;
        self.submit_report_at(now)
    }

    pub fn cancel_report(&mut self) {
        self.abandon_capture();
        self.navigate(View::Home);
    }

    pub fn open_editor(&mut self, id: &ReportId) -> Result<ReportDraft, ReportError> {
        let report = self
            .state
            .report(id)
            .ok_or_else(|| ReportError::NotFound(id.clone()))?;
        let buffer = ReportDraft::from_report(report);
        let return_to = self.view().clone();
        self.editing = Some(EditSession {
            report_id: id.clone(),
            return_to,
        });
        self.navigate(View::Editor {
            report_id: id.clone(),
        });
        Ok(buffer)
    }

    pub fn editing(&self) -> Option<&ReportId> {
        self.editing.as_ref().map(|edit| &edit.report_id)
    }

    /// Save the open editor and return to where it was opened from.
    pub fn save_edit(&mut self, patch: &ReportDraft) -> Result<Report, ReportError> {
        let edit = self.editing.clone().ok_or(ReportError::NotEditing)?;
        let updated = self.edit_report(&edit.report_id, patch)?;
        self.close_editor();
        Ok(updated)
    }

    pub fn edit_report(
        &mut self,
        id: &ReportId,
        patch: &ReportDraft,
    ) -> Result<Report, ReportError> {
        let updated = self.state.edit_report(&self.persistence, id, patch)?;
        self.analytics
            .track("report_edited", props([("report_id", json!(id))]));
        Ok(updated)
    }

    pub fn cancel_edit(&mut self) {
        self.close_editor();
    }

    pub fn delete_report(&mut self, id: &ReportId) -> Option<Report> {
        let removed = self.state.delete_report(&self.persistence, id)?;
        self.analytics
            .track("report_deleted", props([("report_id", json!(id))]));
        if self.editing().is_some_and(|editing| editing == id) {
            self.close_editor();
        }
        Some(removed)
    }

    /// Claim a deal by QR value and move to the view the outcome calls for.
    pub fn claim_deal(&mut self, qr_value: &str) -> DealClaimOutcome {
        let outcome = self.state.claim_deal(&self.persistence, qr_value);
        match &outcome {
            DealClaimOutcome::NoMatch => self.notices.push(Notice::error(NO_DEAL_NOTICE)),
            DealClaimOutcome::AlreadyClaimed { .. } => {
                self.notices.push(Notice::error(ALREADY_CLAIMED_NOTICE))
            }
            DealClaimOutcome::Claimed { deal } => self.analytics.track(
                "deal_claimed",
                props([("deal_id", json!(deal.id)), ("partner", json!(deal.partner_name))]),
            ),
        }
        self.navigate(outcome.next_view());
        outcome
    }

    pub fn open_feedback(&mut self) {
        self.navigate(View::Feedback);
    }

    pub fn submit_feedback(&mut self, signup: BetaSignup) -> Result<(), ValidationError> {
        let name = signup.name.trim();
        let email = signup.email.trim();
        if name.is_empty() && email.is_empty() {
            return Err(ValidationError::MissingContact);
        }
        self.analytics.track(
            "beta_signup",
            props([("name", json!(name)), ("email", json!(email))]),
        );
        self.notices
            .push(Notice::info("Thanks for signing up to test Petty Patrol!"));
        self.navigate(View::Settings);
        Ok(())
    }

    pub fn close_feedback(&mut self) {
        self.navigate(View::Settings);
    }

    pub fn open_paywall(&mut self, plate: Option<PlateText>) {
        self.paywall_plate = plate;
        self.navigate(View::Paywall);
    }

    pub fn close_paywall(&mut self) {
        self.paywall_plate = None;
        self.navigate(View::Home);
    }

    /// Price id and plate to hand to the payment backend.
    pub fn checkout_request(&self, price_type: PriceType) -> (String, Option<PlateText>) {
        (
            self.prices.price_id(price_type).to_string(),
            self.paywall_plate.clone(),
        )
    }

    pub fn record_payment(
        &mut self,
        session_id: &str,
        verification: &PaymentVerification,
        now: DateTime<Utc>,
    ) -> Result<PriceType, PaymentError> {
        let result = self
            .state
            .entitlements
            .grant(session_id, verification, now)
            .map(|entitlement| entitlement.price_type);

        match result {
            Ok(price_type) => {
                self.persistence.save_entitlements(&self.state.entitlements);
                self.analytics.track(
                    "purchase_completed",
                    props([("price_type", json!(price_type))]),
                );
                self.paywall_plate = None;
                self.notices.push(Notice::info("Payment confirmed."));
                self.navigate(View::Home);
                Ok(price_type)
            }
            Err(err) => {
                self.payment_failed(&err);
                Err(err)
            }
        }
    }

    /// Surface a payment problem as a dismissible notice; the user stays on the paywall.
    pub fn payment_failed(&mut self, err: &PaymentError) {
        warn!(error = %err, "payment step failed");
        self.notices.push(Notice::error(format!(
            "{err}. You can try again or contact support."
        )));
    }

    /// Paid lookup of every report filed against a plate.
    pub fn check_plate(
        &mut self,
        plate: &PlateText,
        now: DateTime<Utc>,
    ) -> Result<Vec<Report>, PaymentError> {
        let before = self.state.entitlements.clone();
        let grant = self.state.entitlements.authorize_lookup(plate, now);
        if self.state.entitlements != before {
            self.persistence.save_entitlements(&self.state.entitlements);
        }

        match grant {
            Ok(grant) => {
                let reports = self.state.reports_for_plate(plate);
                info!(
                    plate = %plate,
                    matches = reports.len(),
                    single_use = grant == LookupGrant::SingleUse,
                    "plate checked"
                );
                self.analytics.track(
                    "plate_checked",
                    props([("plate", json!(plate)), ("matches", json!(reports.len()))]),
                );
                Ok(reports)
            }
            Err(err) => {
                self.open_paywall(Some(plate.clone()));
                Err(err)
            }
        }
    }

    fn reject_capture(&mut self) -> CaptureOutcome {
        self.reset_draft();
        self.notices.push(Notice::error(INVALID_CAPTURE_NOTICE));
        self.navigate(View::Home);
        CaptureOutcome::Rejected {
            notice: INVALID_CAPTURE_NOTICE.to_string(),
        }
    }

    fn announce_badge(&mut self, badge_id: &str) {
        let Some(badge) = self.state.badges.iter().find(|badge| badge.id == badge_id) else {
            return;
        };
        let message = format!("{} {} unlocked!", badge.icon, badge.name);
        info!(badge = badge_id, "badge unlocked");
        self.analytics
            .track("badge_unlocked", props([("badge_id", json!(badge_id))]));
        self.notices.push(Notice {
            kind: NoticeKind::BadgeUnlocked,
            message,
        });
    }

    fn close_editor(&mut self) {
        if let Some(edit) = self.editing.take() {
            self.navigate(edit.return_to);
        }
    }

    fn abandon_capture(&mut self) {
        self.active_capture = None;
        self.capture = CapturePhase::Idle;
        self.reset_draft();
    }

    /// Every fresh draft starts a new generation so pending lookups for the old one go stale.
    fn reset_draft(&mut self) {
        self.generation += 1;
        self.draft.clear();
    }

    fn is_active(&self, ticket: CaptureTicket) -> bool {
        self.active_capture == Some(ticket) && ticket.generation == self.generation
    }

    fn log_stale(&self, ticket: CaptureTicket, completion: &str) {
        warn!(
            completion,
            ticket = ticket.generation,
            current = self.generation,
            "ignoring stale capture completion"
        );
    }

    fn navigate(&mut self, next: View) {
        let to = next.name();
        let from = self.navigator.go(next).name();
        if from != to {
            self.analytics
                .track("view_changed", props([("from", json!(from)), ("to", json!(to))]));
        }
    }
}

/// Lock a shared session for an async completion. A poisoned lock drops the completion.
pub(crate) fn lock_session<S>(
    session: &Mutex<PatrolSession<S>>,
) -> Option<MutexGuard<'_, PatrolSession<S>>> {
    match session.lock() {
        Ok(guard) => Some(guard),
        Err(_) => {
            warn!("patrol session lock poisoned, dropping completion");
            None
        }
    }
}
