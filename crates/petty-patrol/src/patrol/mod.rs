//! Crowd-reported bad driving: reports, badges, partner deals, and the session state machine
//! that ties capture, classification, and navigation together.

pub mod analytics;
pub mod badges;
pub mod capture;
pub mod catalog;
pub mod checkout;
pub mod deals;
pub mod domain;
pub mod geo;
pub mod lifecycle;
pub mod paywall;
pub mod persistence;
pub mod router;
pub mod session;
pub mod state;
pub mod views;

#[cfg(test)]
mod tests;

pub use analytics::{AnalyticsSink, EventProperties, NoopAnalytics, TracingAnalytics};
pub use badges::BadgeEvaluation;
pub use capture::{
    classify_within, CaptureDriver, CaptureOutcome, CapturePhase, CaptureSource, CaptureTicket,
    CaptureTimeouts, CapturedImage, Classifier, ClassifierError, MAX_IMAGE_BYTES,
};
pub use catalog::{behavior, seed_badges, seed_deals, BEHAVIORS, OTHER_BEHAVIOR};
pub use checkout::CheckoutDriver;
pub use deals::DealClaimOutcome;
pub use domain::{
    AnalysisKind, AnalysisResult, Badge, Behavior, BehaviorId, Coordinates, Deal, PinnedLocation,
    PlateText, Report, ReportDraft, ReportId, ValidationError, UNKNOWN_PLATE,
};
pub use geo::{GeoError, GeocodeResponse, Geocoder, Geolocator};
pub use lifecycle::{ReportError, SubmitOutcome};
pub use paywall::{
    CheckoutSession, Entitlement, EntitlementLedger, LookupGrant, PaymentError, PaymentGateway,
    PaymentVerification, PriceCatalog, PriceType,
};
pub use persistence::{
    CollectionKey, DeviceIdentity, JsonFileStore, MemoryStore, PatrolStore, Persistence,
    StoreError,
};
pub use router::{patrol_router, SharedSession};
pub use session::{BetaSignup, Notice, NoticeKind, PatrolSession, SessionOptions};
pub use state::{PatrolState, PatrolStats};
pub use views::{NavTab, NavigationError, Navigator, Reward, RouteTable, View};
