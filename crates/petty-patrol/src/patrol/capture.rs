//! Capture and classification flow.
//!
//! The session owns the synchronous state machine (Idle, AwaitingMedia, Analyzing); this module
//! holds the external classifier seam and the [`CaptureDriver`] that runs the async calls between
//! session events. Every capture carries a generation ticket and completions for an outdated
//! ticket are dropped.

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;
use tracing::warn;

use super::deals::DealClaimOutcome;
use super::domain::{AnalysisResult, Coordinates, PinnedLocation, PlateText};
use super::geo::{locate_within, resolve_location, Geocoder, Geolocator};
use super::persistence::PatrolStore;
use super::session::{lock_session as lock, PatrolSession};

pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

const ACCEPTED_SUBTYPES: [&str; 4] = ["jpeg", "jpg", "png", "webp"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureSource {
    Camera,
    Gallery,
}

/// Proof of which capture cycle an async completion belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureTicket {
    pub(crate) generation: u64,
    pub(crate) source: CaptureSource,
}

impl CaptureTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn source(&self) -> CaptureSource {
        self.source
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CapturePhase {
    #[default]
    Idle,
    AwaitingMedia,
    Analyzing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl CapturedImage {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
        }
    }

    /// Size and type limits enforced before the classifier is called.
    pub fn validate(&self) -> Result<mime::Mime, ClassifierError> {
        if self.bytes.is_empty() {
            return Err(ClassifierError::EmptyImage);
        }
        if self.bytes.len() > MAX_IMAGE_BYTES {
            return Err(ClassifierError::ImageTooLarge {
                size: self.bytes.len(),
                max: MAX_IMAGE_BYTES,
            });
        }

        let parsed: mime::Mime = self
            .mime_type
            .parse()
            .map_err(|_| ClassifierError::UnsupportedMime(self.mime_type.clone()))?;
        let accepted = parsed.type_() == mime::IMAGE
            && ACCEPTED_SUBTYPES.contains(&parsed.subtype().as_str());
        if !accepted {
            return Err(ClassifierError::UnsupportedMime(self.mime_type.clone()));
        }
        Ok(parsed)
    }
}

/// Image classification backend: plate, QR code, or neither.
pub trait Classifier: Send + Sync {
    fn classify(
        &self,
        image: &CapturedImage,
    ) -> impl Future<Output = Result<AnalysisResult, ClassifierError>> + Send;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClassifierError {
    #[error("classifier did not answer within {}s", .0.as_secs())]
    Timeout(Duration),
    #[error("classifier request failed: {0}")]
    Transport(String),
    #[error("image is {size} bytes, limit is {max}")]
    ImageTooLarge { size: usize, max: usize },
    #[error("unsupported image type {0}")]
    UnsupportedMime(String),
    #[error("image is empty")]
    EmptyImage,
}

/// Bounded classification. Every failure degrades to an invalid result.
pub async fn classify_within<C: Classifier>(
    classifier: &C,
    image: &CapturedImage,
    limit: Duration,
) -> AnalysisResult {
    let result = match image.validate() {
        Ok(_) => match tokio::time::timeout(limit, classifier.classify(image)).await {
            Ok(result) => result,
            Err(_) => Err(ClassifierError::Timeout(limit)),
        },
        Err(err) => Err(err),
    };

    result.unwrap_or_else(|err| {
        warn!(error = %err, "classification failed, treating capture as invalid");
        AnalysisResult::invalid()
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "capture", rename_all = "snake_case")]
pub enum CaptureOutcome {
    Plate { plate: PlateText },
    Deal { claim: DealClaimOutcome },
    Rejected { notice: String },
    /// The capture was cancelled or superseded before this completion arrived.
    Stale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureTimeouts {
    pub classifier: Duration,
    pub geolocation: Duration,
}

impl Default for CaptureTimeouts {
    fn default() -> Self {
        Self {
            classifier: Duration::from_secs(30),
            geolocation: Duration::from_secs(5),
        }
    }
}

/// Runs the external calls of one capture cycle against a shared session.
///
/// The session lock is only taken between awaits, so a user can cancel while the classifier or
/// geolocation is still pending.
pub struct CaptureDriver<C, L, G> {
    classifier: C,
    locator: L,
    geocoder: G,
    timeouts: CaptureTimeouts,
}

impl<C, L, G> CaptureDriver<C, L, G>
where
    C: Classifier,
    L: Geolocator,
    G: Geocoder,
{
    pub fn new(classifier: C, locator: L, geocoder: G, timeouts: CaptureTimeouts) -> Self {
        Self {
            classifier,
            locator,
            geocoder,
            timeouts,
        }
    }

    pub async fn analyze<S: PatrolStore>(
        &self,
        session: &Mutex<PatrolSession<S>>,
        ticket: CaptureTicket,
        image: CapturedImage,
    ) -> CaptureOutcome {
        {
            let Some(mut guard) = lock(session) else {
                return CaptureOutcome::Stale;
            };
            if !guard.media_received(ticket) {
                return CaptureOutcome::Stale;
            }
        }

        let (location, analysis) = match ticket.source {
            CaptureSource::Camera => {
                tokio::join!(
                    self.auto_locate(),
                    classify_within(&self.classifier, &image, self.timeouts.classifier)
                )
            }
            CaptureSource::Gallery => (
                None,
                classify_within(&self.classifier, &image, self.timeouts.classifier).await,
            ),
        };

        let Some(mut guard) = lock(session) else {
            return CaptureOutcome::Stale;
        };
        if let Some(location) = location {
            guard.location_resolved(ticket, location);
        }
        guard.analysis_completed(ticket, analysis)
    }

    /// Resolve a map tap to an address and pin it on the draft that was open when the tap
    /// happened. Returns `None` when that draft was replaced while geocoding.
    pub async fn pin<S: PatrolStore>(
        &self,
        session: &Mutex<PatrolSession<S>>,
        coordinates: Coordinates,
    ) -> Option<PinnedLocation> {
        let generation = lock(session)?.pin_ticket();
        let location = resolve_location(&self.geocoder, coordinates).await;
        let applied = lock(session)?.location_pinned(generation, location.clone());
        applied.then_some(location)
    }

    async fn auto_locate(&self) -> Option<PinnedLocation> {
        match locate_within(&self.locator, self.timeouts.geolocation).await {
            Ok(coordinates) => Some(resolve_location(&self.geocoder, coordinates).await),
            Err(err) => {
                warn!(error = %err, "skipping automatic location");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_limits_are_checked_before_classification() {
        assert_eq!(
            CapturedImage::new(Vec::new(), "image/png").validate(),
            Err(ClassifierError::EmptyImage)
        );
        assert_eq!(
            CapturedImage::new(vec![0; MAX_IMAGE_BYTES + 1], "image/png").validate(),
            Err(ClassifierError::ImageTooLarge {
                size: MAX_IMAGE_BYTES + 1,
                max: MAX_IMAGE_BYTES
            })
        );
        assert!(matches!(
            CapturedImage::new(vec![1], "image/gif").validate(),
            Err(ClassifierError::UnsupportedMime(_))
        ));
        assert!(matches!(
            CapturedImage::new(vec![1], "not a mime").validate(),
            Err(ClassifierError::UnsupportedMime(_))
        ));
        for accepted in ["image/jpeg", "image/jpg", "image/png", "image/webp"] {
            assert!(CapturedImage::new(vec![1], accepted).validate().is_ok());
        }
    }
}
