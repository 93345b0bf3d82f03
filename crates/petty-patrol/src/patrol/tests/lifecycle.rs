use super::common::*;
use crate::patrol::catalog::{FIRST_CATCH_BADGE, OTHER_BEHAVIOR};
use crate::patrol::domain::{BehaviorId, PlateText, ReportDraft, ReportId, ValidationError};
use crate::patrol::lifecycle::ReportError;
use crate::patrol::persistence::{CollectionKey, MemoryStore, Persistence};
use crate::patrol::state::PatrolState;
use crate::patrol::views::View;

fn fresh() -> (PatrolState, Persistence<MemoryStore>, MemoryStore) {
    let store = MemoryStore::default();
    let persistence = Persistence::new(store.clone());
    (persistence.load(), persistence, store)
}

fn first_catch(state: &PatrolState) -> bool {
    state
        .badges
        .iter()
        .find(|badge| badge.id == FIRST_CATCH_BADGE)
        .map(|badge| badge.unlocked())
        .unwrap_or(false)
}

#[test]
fn rejected_drafts_leave_everything_untouched() {
    let (mut state, persistence, store) = fresh();
    let before = state.clone();

    let mut no_behaviors = draft("MIA305", &[]);
    assert_eq!(
        state.submit_report(&persistence, &no_behaviors, at(9, 0)),
        Err(ValidationError::NoBehaviors)
    );

    no_behaviors.behaviors = vec![BehaviorId::from(OTHER_BEHAVIOR)];
    no_behaviors.custom_note = " \t ".to_string();
    assert_eq!(
        state.submit_report(&persistence, &no_behaviors, at(9, 0)),
        Err(ValidationError::MissingNote)
    );

    let mut unpinned = draft("MIA305", &["speed_demon"]);
    unpinned.location = None;
    assert_eq!(
        state.submit_report(&persistence, &unpinned, at(9, 0)),
        Err(ValidationError::MissingLocation)
    );

    assert_eq!(state, before);
    assert!(store.raw(CollectionKey::Reports).is_none());
    assert!(store.raw(CollectionKey::Badges).is_none());
}

#[test]
fn submitted_report_mirrors_draft_and_clock() {
    let (mut state, persistence, store) = fresh();
    let mut other = draft("luv-2sp", &[OTHER_BEHAVIOR]);
    other.custom_note = "  reversed down the off-ramp ".to_string();

    let outcome = state
        .submit_report(&persistence, &other, at(9, 30))
        .expect("valid draft");

    let report = &outcome.report;
    assert_eq!(report.plate_text.as_str(), "LUV2SP");
    assert_eq!(report.timestamp, at(9, 30));
    assert_eq!(report.id, ReportId(at(9, 30).timestamp_millis().to_string()));
    assert_eq!(report.location, ocean_drive().address);
    assert_eq!(report.coordinates, OCEAN_DRIVE);
    assert_eq!(report.custom_note.as_deref(), Some("reversed down the off-ramp"));
    assert_eq!(state.reports.first(), Some(report));
    assert!(store
        .raw(CollectionKey::Reports)
        .expect("reports persisted")
        .contains("LUV2SP"));
}

#[test]
fn missing_plate_is_recorded_as_unknown() {
    let (mut state, persistence, _) = fresh();
    let mut anonymous = draft("", &["turtle_mode"]);
    anonymous.plate = None;

    let outcome = state
        .submit_report(&persistence, &anonymous, at(10, 0))
        .expect("valid draft");
    assert_eq!(outcome.report.plate_text, PlateText::unknown());
}

#[test]
fn ids_stay_unique_within_the_same_millisecond() {
    let (mut state, persistence, _) = fresh();
    let first = state
        .submit_report(&persistence, &draft("AAA111", &["speed_demon"]), at(11, 0))
        .expect("first");
    let second = state
        .submit_report(&persistence, &draft("BBB222", &["speed_demon"]), at(11, 0))
        .expect("second");
    assert_ne!(first.report.id, second.report.id);
}

#[test]
fn repeat_offender_check_sees_earlier_reports_only() {
    let (mut state, persistence, _) = fresh();
    let a = state
        .submit_report(&persistence, &draft("MIA305", &["speed_demon"]), at(12, 0))
        .expect("report A");
    assert!(!a.repeat_offender());
    assert!(matches!(a.next_view, View::Celebration { .. }));

    let b = state
        .submit_report(&persistence, &draft("mia 305", &["road_rager"]), at(12, 5))
        .expect("report B");
    assert_eq!(b.prior_reports, vec![a.report.clone()]);
    assert!(!b.prior_reports.contains(&b.report));
    match b.next_view {
        View::PreviousReports { plate, reports } => {
            assert_eq!(plate.as_str(), "MIA305");
            assert_eq!(reports, vec![a.report]);
        }
        other => panic!("expected previous reports view, got {other:?}"),
    }
}

#[test]
fn first_catch_is_monotonic() {
    let (mut state, persistence, _) = fresh();
    assert!(!first_catch(&state));

    let first = state
        .submit_report(&persistence, &draft("AAA111", &["speed_demon"]), at(13, 0))
        .expect("first");
    assert!(first.newly_unlocked.contains(&FIRST_CATCH_BADGE.to_string()));
    assert!(first_catch(&state));

    let second = state
        .submit_report(&persistence, &draft("BBB222", &["speed_demon"]), at(13, 1))
        .expect("second");
    assert!(second.newly_unlocked.is_empty());
    assert!(first_catch(&state));
}

#[test]
fn edits_keep_identity_and_skip_badges() {
    let (mut state, persistence, _) = fresh();
    let original = state
        .submit_report(&persistence, &draft("MIA305", &["speed_demon"]), at(14, 0))
        .expect("submitted")
        .report;
    let badges_before = state.badges.clone();

    let patch = draft(
        "MIA306",
        &["lane_leaper", "unhinged_honker", "texting_zombie", "road_rager"],
    );
    let edited = state
        .edit_report(&persistence, &original.id, &patch)
        .expect("valid edit");

    assert_eq!(edited.id, original.id);
    assert_eq!(edited.timestamp, original.timestamp);
    assert_eq!(edited.plate_text.as_str(), "MIA306");
    assert_eq!(edited.behaviors.len(), 4);
    assert_eq!(state.badges, badges_before);
}

#[test]
fn invalid_edits_are_rejected() {
    let (mut state, persistence, _) = fresh();
    let original = state
        .submit_report(&persistence, &draft("MIA305", &["speed_demon"]), at(14, 0))
        .expect("submitted")
        .report;

    let empty = ReportDraft {
        behaviors: Vec::new(),
        ..draft("MIA305", &[])
    };
    assert_eq!(
        state.edit_report(&persistence, &original.id, &empty),
        Err(ReportError::Validation(ValidationError::NoBehaviors))
    );
    assert_eq!(state.reports, vec![original]);

    let missing = ReportId("404".to_string());
    assert_eq!(
        state.edit_report(&persistence, &missing, &draft("X1", &["speed_demon"])),
        Err(ReportError::NotFound(missing))
    );
}

#[test]
fn delete_removes_only_the_target() {
    let (mut state, persistence, _) = fresh();
    let keep = state
        .submit_report(&persistence, &draft("AAA111", &["speed_demon"]), at(15, 0))
        .expect("keep")
        .report;
    let drop = state
        .submit_report(&persistence, &draft("BBB222", &["turtle_mode"]), at(15, 1))
        .expect("drop")
        .report;
    let badges = state.badges.clone();

    assert_eq!(state.delete_report(&persistence, &drop.id), Some(drop.clone()));
    assert_eq!(state.reports, vec![keep]);
    assert_eq!(state.badges, badges);
    assert_eq!(state.delete_report(&persistence, &drop.id), None);
}

#[test]
fn storage_failures_never_block_submission() {
    let persistence = Persistence::new(FailingStore);
    let mut state = persistence.load();

    let outcome = state
        .submit_report(&persistence, &draft("MIA305", &["speed_demon"]), at(16, 0))
        .expect("in-memory transition succeeds");
    assert_eq!(state.reports.len(), 1);
    assert!(!outcome.newly_unlocked.is_empty());
}
