//! Durable storage for the device's reports, badges, deals, and payment entitlements.
//!
//! Stores move opaque JSON payloads per collection; [`Persistence`] owns encoding, falls back to
//! seed data on missing or corrupt payloads, and swallows write failures after logging them so an
//! in-memory transition is never blocked by storage.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use super::catalog::{seed_badges, seed_deals};
use super::domain::{Badge, Deal, Report};
use super::paywall::EntitlementLedger;
use super::state::PatrolState;

const DEVICE_ID_FILE: &str = "device_id";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionKey {
    Reports,
    Badges,
    Deals,
    Entitlement,
}

impl CollectionKey {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Reports => "reports",
            Self::Badges => "badges",
            Self::Deals => "deals",
            Self::Entitlement => "entitlement",
        }
    }
}

/// Key-value backend holding one serialized payload per collection.
pub trait PatrolStore: Send + Sync {
    fn read(&self, key: CollectionKey) -> Result<Option<String>, StoreError>;
    fn write(&self, key: CollectionKey, payload: &str) -> Result<(), StoreError>;
}

impl<T: PatrolStore + ?Sized> PatrolStore for Arc<T> {
    fn read(&self, key: CollectionKey) -> Result<Option<String>, StoreError> {
        (**self).read(key)
    }

    fn write(&self, key: CollectionKey, payload: &str) -> Result<(), StoreError> {
        (**self).write(key, payload)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage io failure: {0}")]
    Io(#[from] io::Error),
    #[error("failed to encode {key}: {source}")]
    Encode {
        key: &'static str,
        source: serde_json::Error,
    },
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Volatile store used by tests and the demo command.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<CollectionKey, String>>>,
}

impl MemoryStore {
    pub fn raw(&self, key: CollectionKey) -> Option<String> {
        self.entries
            .lock()
            .ok()
            .and_then(|entries| entries.get(&key).cloned())
    }
}

impl PatrolStore for MemoryStore {
    fn read(&self, key: CollectionKey) -> Result<Option<String>, StoreError> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store poisoned".to_string()))?;
        Ok(entries.get(&key).cloned())
    }

    fn write(&self, key: CollectionKey, payload: &str) -> Result<(), StoreError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store poisoned".to_string()))?;
        entries.insert(key, payload.to_string());
        Ok(())
    }
}

/// Implicit single-device identity, created once and reused for every later run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity(pub String);

impl DeviceIdentity {
    pub fn load_or_create(data_dir: &Path) -> Result<Self, StoreError> {
        fs::create_dir_all(data_dir)?;
        let path = data_dir.join(DEVICE_ID_FILE);
        match fs::read_to_string(&path) {
            Ok(raw) if !raw.trim().is_empty() => return Ok(Self(raw.trim().to_string())),
            Ok(_) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }

        let identity = Self(format!("device_{}", uuid::Uuid::new_v4().simple()));
        write_atomically(&path, &identity.0)?;
        debug!(device_id = %identity.0, "created device identity");
        Ok(identity)
    }
}

/// One JSON document per collection under `<data_dir>/devices/<device_id>/`.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    root: PathBuf,
    device: DeviceIdentity,
}

impl JsonFileStore {
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let data_dir = data_dir.as_ref();
        let device = DeviceIdentity::load_or_create(data_dir)?;
        let root = data_dir.join("devices").join(&device.0);
        fs::create_dir_all(&root)?;
        Ok(Self { root, device })
    }

    pub fn device(&self) -> &DeviceIdentity {
        &self.device
    }

    fn path(&self, key: CollectionKey) -> PathBuf {
        self.root.join(format!("{}.json", key.as_str()))
    }
}

impl PatrolStore for JsonFileStore {
    fn read(&self, key: CollectionKey) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(self.path(key)) {
            Ok(payload) => Ok(Some(payload)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn write(&self, key: CollectionKey, payload: &str) -> Result<(), StoreError> {
        write_atomically(&self.path(key), payload)?;
        Ok(())
    }
}

fn write_atomically(destination: &Path, payload: &str) -> io::Result<()> {
    let temp = destination.with_extension("tmp");
    fs::write(&temp, payload)?;
    if let Err(initial) = fs::rename(&temp, destination) {
        let _ = fs::remove_file(destination);
        fs::rename(&temp, destination).map_err(|retry| {
            let _ = fs::remove_file(&temp);
            io::Error::new(
                retry.kind(),
                format!("atomic rename failed (initial: {initial}, retry: {retry})"),
            )
        })?;
    }
    Ok(())
}

/// Typed load/save over a [`PatrolStore`]. Last writer wins; every save rewrites the collection.
#[derive(Debug, Clone)]
pub struct Persistence<S> {
    store: S,
}

impl<S: PatrolStore> Persistence<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Never fails: anything unreadable is replaced by seed data.
    pub fn load(&self) -> PatrolState {
        let reports = self
            .read::<Vec<Report>>(CollectionKey::Reports)
            .unwrap_or_default();
        let badges = restore_badges(self.read(CollectionKey::Badges).unwrap_or_default());
        let deals = restore_deals(self.read(CollectionKey::Deals).unwrap_or_default());
        let entitlements = self
            .read::<EntitlementLedger>(CollectionKey::Entitlement)
            .unwrap_or_default();

        PatrolState {
            reports,
            badges,
            deals,
            entitlements,
        }
    }

    pub fn save_reports(&self, reports: &[Report]) {
        self.save(CollectionKey::Reports, reports);
    }

    pub fn save_badges(&self, badges: &[Badge]) {
        self.save(CollectionKey::Badges, badges);
    }

    pub fn save_deals(&self, deals: &[Deal]) {
        self.save(CollectionKey::Deals, deals);
    }

    pub fn save_entitlements(&self, ledger: &EntitlementLedger) {
        self.save(CollectionKey::Entitlement, ledger);
    }

    fn save<T: Serialize + ?Sized>(&self, key: CollectionKey, value: &T) {
        let result = serde_json::to_string(value)
            .map_err(|source| StoreError::Encode {
                key: key.as_str(),
                source,
            })
            .and_then(|payload| self.store.write(key, &payload));

        if let Err(err) = result {
            warn!(collection = key.as_str(), error = %err, "failed to persist collection");
        }
    }

    fn read<T: DeserializeOwned>(&self, key: CollectionKey) -> Option<T> {
        let payload = match self.store.read(key) {
            Ok(Some(payload)) => payload,
            Ok(None) => {
                debug!(collection = key.as_str(), "no stored payload, using defaults");
                return None;
            }
            Err(err) => {
                warn!(collection = key.as_str(), error = %err, "failed to read collection");
                return None;
            }
        };

        match serde_json::from_str(&payload) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(collection = key.as_str(), error = %err, "discarding corrupt collection");
                None
            }
        }
    }
}

/// Static definitions always come from the catalog; only unlock flags are taken from storage.
fn restore_badges(stored: Vec<Badge>) -> Vec<Badge> {
    let unlocked: HashSet<String> = stored
        .into_iter()
        .filter(Badge::unlocked)
        .map(|badge| badge.id)
        .collect();

    let mut badges = seed_badges();
    for badge in badges.iter_mut().filter(|badge| unlocked.contains(&badge.id)) {
        badge.unlock();
    }
    badges
}

fn restore_deals(stored: Vec<Deal>) -> Vec<Deal> {
    let claimed: HashSet<String> = stored
        .into_iter()
        .filter(Deal::claimed)
        .map(|deal| deal.id)
        .collect();

    let mut deals = seed_deals();
    for deal in deals.iter_mut().filter(|deal| claimed.contains(&deal.id)) {
        deal.mark_claimed();
    }
    deals
}
