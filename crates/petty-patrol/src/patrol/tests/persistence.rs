use std::fs;

use super::common::*;
use crate::patrol::catalog::seed_badges;
use crate::patrol::paywall::{PaymentVerification, PriceType};
use crate::patrol::persistence::{
    CollectionKey, DeviceIdentity, JsonFileStore, MemoryStore, PatrolStore, Persistence,
};
use crate::patrol::state::PatrolState;

#[test]
fn empty_store_loads_seed_data() {
    let state = Persistence::new(MemoryStore::default()).load();
    assert_eq!(state, PatrolState::default());
    assert_eq!(state.badges.len(), 12);
    assert_eq!(state.deals.len(), 3);
    assert!(state.entitlements.is_empty());
}

#[test]
fn corrupt_collections_fall_back_independently() {
    let store = MemoryStore::default();
    let persistence = Persistence::new(store.clone());
    let mut state = persistence.load();
    state
        .submit_report(&persistence, &draft("MIA305", &["speed_demon"]), at(8, 0))
        .expect("submitted");

    store
        .write(CollectionKey::Badges, "{not json")
        .expect("memory write");

    let reloaded = persistence.load();
    assert_eq!(reloaded.reports, state.reports);
    assert_eq!(reloaded.badges, seed_badges());
}

#[test]
fn stored_badges_only_contribute_unlock_flags() {
    let store = MemoryStore::default();
    store
        .write(
            CollectionKey::Badges,
            r#"[{"id":"first_catch","name":"Renamed","description":"","icon":"x","unlocked":true},
                {"id":"retired_badge","name":"Gone","description":"","icon":"x","unlocked":true}]"#,
        )
        .expect("memory write");

    let state = Persistence::new(store).load();
    assert_eq!(state.badges.len(), 12);
    let first = &state.badges[0];
    assert_eq!(first.name, "First Catch");
    assert!(first.unlocked());
    assert!(state.badges.iter().all(|badge| badge.id != "retired_badge"));
}

#[test]
fn file_store_round_trips_every_collection() {
    let dir = tempfile::tempdir().expect("temp dir");
    let persistence = Persistence::new(JsonFileStore::open(dir.path()).expect("store opens"));
    let mut state = persistence.load();

    state
        .submit_report(&persistence, &draft("MIA305", &["speed_demon"]), at(8, 0))
        .expect("submitted");
    state.claim_deal(&persistence, "PARTNER_JOE");
    state
        .entitlements
        .grant(
            "cs_1",
            &PaymentVerification {
                paid: true,
                price_type: PriceType::Yearly,
                plate_text: String::new(),
            },
            at(8, 5),
        )
        .expect("granted");
    persistence.save_entitlements(&state.entitlements);

    let reopened = Persistence::new(JsonFileStore::open(dir.path()).expect("store reopens"));
    assert_eq!(reopened.load(), state);
}

#[test]
fn device_identity_is_created_once() {
    let dir = tempfile::tempdir().expect("temp dir");
    let first = DeviceIdentity::load_or_create(dir.path()).expect("identity created");
    let second = DeviceIdentity::load_or_create(dir.path()).expect("identity reused");
    assert_eq!(first, second);
    assert!(first.0.starts_with("device_"));

    let store = JsonFileStore::open(dir.path()).expect("store opens");
    assert_eq!(store.device(), &first);
    store
        .write(CollectionKey::Reports, "[]")
        .expect("file write");
    let written = dir
        .path()
        .join("devices")
        .join(&first.0)
        .join("reports.json");
    assert_eq!(fs::read_to_string(written).expect("payload on disk"), "[]");
}

#[test]
fn missing_file_reads_as_none() {
    let dir = tempfile::tempdir().expect("temp dir");
    let store = JsonFileStore::open(dir.path()).expect("store opens");
    assert!(store
        .read(CollectionKey::Entitlement)
        .expect("read succeeds")
        .is_none());
}
