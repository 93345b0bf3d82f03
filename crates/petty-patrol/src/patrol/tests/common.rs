use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::response::Response;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::patrol::analytics::{AnalyticsSink, EventProperties};
use crate::patrol::capture::{CapturedImage, Classifier, ClassifierError};
use crate::patrol::domain::{
    AnalysisKind, AnalysisResult, BehaviorId, Coordinates, PinnedLocation, PlateText, ReportDraft,
};
use crate::patrol::geo::{GeoError, GeocodeResponse, Geocoder, Geolocator};
use crate::patrol::paywall::{
    CheckoutSession, PaymentError, PaymentGateway, PaymentVerification, PriceCatalog, PriceType,
};
use crate::patrol::persistence::{CollectionKey, MemoryStore, PatrolStore, Persistence, StoreError};
use crate::patrol::session::{PatrolSession, SessionOptions};

pub(super) const OCEAN_DRIVE: Coordinates = Coordinates {
    lat: 25.7825,
    lng: -80.1340,
};

pub(super) fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 14, hour, minute, 0)
        .single()
        .expect("valid instant")
}

pub(super) fn ocean_drive() -> PinnedLocation {
    PinnedLocation::new("1001 Ocean Dr, Miami Beach", OCEAN_DRIVE)
}

pub(super) fn draft(plate: &str, behaviors: &[&str]) -> ReportDraft {
    ReportDraft {
        plate: Some(PlateText::normalize(plate)),
        behaviors: behaviors.iter().copied().map(BehaviorId::from).collect(),
        custom_note: String::new(),
        location: Some(ocean_drive()),
    }
}

pub(super) fn prices() -> PriceCatalog {
    PriceCatalog {
        one_time: "price_once".to_string(),
        yearly: "price_year".to_string(),
    }
}

pub(super) fn options(debug_tools: bool) -> SessionOptions {
    SessionOptions {
        debug_tools,
        prices: prices(),
    }
}

pub(super) fn session_with(
    store: MemoryStore,
    analytics: Arc<RecordingAnalytics>,
) -> PatrolSession<MemoryStore> {
    PatrolSession::new(Persistence::new(store), options(false), analytics)
}

pub(super) fn session() -> (
    PatrolSession<MemoryStore>,
    MemoryStore,
    Arc<RecordingAnalytics>,
) {
    let store = MemoryStore::default();
    let analytics = Arc::new(RecordingAnalytics::default());
    let session = session_with(store.clone(), analytics.clone());
    (session, store, analytics)
}

pub(super) fn png() -> CapturedImage {
    CapturedImage::new(vec![0x89, b'P', b'N', b'G'], "image/png")
}

pub(super) fn plate_result(value: &str) -> AnalysisResult {
    AnalysisResult::new(AnalysisKind::Plate, value, 0.93)
}

pub(super) fn qr_result(value: &str) -> AnalysisResult {
    AnalysisResult::new(AnalysisKind::Qr, value, 0.99)
}

#[derive(Default)]
pub(super) struct RecordingAnalytics {
    events: Mutex<Vec<(String, EventProperties)>>,
}

impl RecordingAnalytics {
    pub(super) fn names(&self) -> Vec<String> {
        self.events
            .lock()
            .expect("analytics mutex")
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub(super) fn last(&self, event: &str) -> Option<EventProperties> {
        self.events
            .lock()
            .expect("analytics mutex")
            .iter()
            .rev()
            .find(|(name, _)| name == event)
            .map(|(_, properties)| properties.clone())
    }
}

impl AnalyticsSink for RecordingAnalytics {
    fn track(&self, event: &str, properties: EventProperties) {
        self.events
            .lock()
            .expect("analytics mutex")
            .push((event.to_string(), properties));
    }
}

/// Store whose writes always fail; reads see nothing.
pub(super) struct FailingStore;

impl PatrolStore for FailingStore {
    fn read(&self, _key: CollectionKey) -> Result<Option<String>, StoreError> {
        Ok(None)
    }

    fn write(&self, _key: CollectionKey, _payload: &str) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("quota exceeded".to_string()))
    }
}

/// Classifier answering from a script, optionally after a delay.
pub(super) struct ScriptedClassifier {
    answers: Mutex<VecDeque<Result<AnalysisResult, ClassifierError>>>,
    delay: Duration,
}

impl ScriptedClassifier {
    pub(super) fn answering(result: AnalysisResult) -> Self {
        Self::delayed(result, Duration::ZERO)
    }

    pub(super) fn delayed(result: AnalysisResult, delay: Duration) -> Self {
        Self {
            answers: Mutex::new(VecDeque::from([Ok(result)])),
            delay,
        }
    }

    pub(super) fn failing(error: ClassifierError) -> Self {
        Self {
            answers: Mutex::new(VecDeque::from([Err(error)])),
            delay: Duration::ZERO,
        }
    }
}

impl Classifier for ScriptedClassifier {
    async fn classify(&self, _image: &CapturedImage) -> Result<AnalysisResult, ClassifierError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.answers
            .lock()
            .expect("classifier mutex")
            .pop_front()
            .unwrap_or_else(|| Ok(AnalysisResult::invalid()))
    }
}

pub(super) struct FixedLocator(pub(super) Result<Coordinates, GeoError>);

impl Geolocator for FixedLocator {
    async fn locate(&self) -> Result<Coordinates, GeoError> {
        self.0.clone()
    }
}

pub(super) struct FixedGeocoder(pub(super) Option<&'static str>);

impl Geocoder for FixedGeocoder {
    async fn reverse(&self, _coordinates: Coordinates) -> Result<GeocodeResponse, GeoError> {
        match self.0 {
            Some(address) => Ok(GeocodeResponse::ok(address)),
            None => Err(GeoError::GeocodingFailure("offline".to_string())),
        }
    }
}

/// Geocoder that answers only after `delay`.
pub(super) struct SlowGeocoder {
    pub(super) address: &'static str,
    pub(super) delay: Duration,
}

impl Geocoder for SlowGeocoder {
    async fn reverse(&self, _coordinates: Coordinates) -> Result<GeocodeResponse, GeoError> {
        tokio::time::sleep(self.delay).await;
        Ok(GeocodeResponse::ok(self.address))
    }
}

/// Payment backend that approves every session with a fixed price type.
pub(super) struct ApprovingGateway {
    pub(super) price_type: PriceType,
    pub(super) paid: bool,
}

impl PaymentGateway for ApprovingGateway {
    async fn create_session(
        &self,
        price_id: &str,
        plate: Option<&PlateText>,
    ) -> Result<CheckoutSession, PaymentError> {
        let plate = plate.map(PlateText::as_str).unwrap_or("any");
        Ok(CheckoutSession {
            session_id: format!("cs_{price_id}_{plate}"),
            redirect_url: "https://pay.example/checkout".to_string(),
        })
    }

    async fn verify(&self, session_id: &str) -> Result<PaymentVerification, PaymentError> {
        let plate = session_id.rsplit('_').next().unwrap_or_default();
        Ok(PaymentVerification {
            paid: self.paid,
            price_type: self.price_type,
            plate_text: if plate == "any" { String::new() } else { plate.to_string() },
        })
    }
}

pub(super) async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    serde_json::from_slice(&bytes).expect("json body")
}
