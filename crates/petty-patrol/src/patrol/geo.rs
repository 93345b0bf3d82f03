use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::domain::{Coordinates, PinnedLocation};

const GEOCODE_OK: &str = "OK";

/// Best-effort device position fix.
pub trait Geolocator: Send + Sync {
    fn locate(&self) -> impl Future<Output = Result<Coordinates, GeoError>> + Send;
}

/// Coordinates to address resolution.
pub trait Geocoder: Send + Sync {
    fn reverse(
        &self,
        coordinates: Coordinates,
    ) -> impl Future<Output = Result<GeocodeResponse, GeoError>> + Send;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeocodeResponse {
    pub address: Option<String>,
    pub status: String,
}

impl GeocodeResponse {
    pub fn ok(address: impl Into<String>) -> Self {
        Self {
            address: Some(address.into()),
            status: GEOCODE_OK.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GeoError {
    #[error("geolocation unavailable: {0}")]
    GeolocationUnavailable(String),
    #[error("geocoding failed: {0}")]
    GeocodingFailure(String),
}

/// Geolocation bounded by `limit`; a slow fix counts as unavailable.
pub async fn locate_within<L: Geolocator>(
    locator: &L,
    limit: Duration,
) -> Result<Coordinates, GeoError> {
    match tokio::time::timeout(limit, locator.locate()).await {
        Ok(result) => result,
        Err(_) => Err(GeoError::GeolocationUnavailable(format!(
            "no fix within {}s",
            limit.as_secs()
        ))),
    }
}

/// Always produces a location: the resolved address, or the raw coordinates on any failure.
pub async fn resolve_location<G: Geocoder>(
    geocoder: &G,
    coordinates: Coordinates,
) -> PinnedLocation {
    match geocoder.reverse(coordinates).await {
        Ok(GeocodeResponse {
            address: Some(address),
            status,
        }) if status == GEOCODE_OK && !address.trim().is_empty() => {
            PinnedLocation::new(address.trim(), coordinates)
        }
        Ok(response) => {
            warn!(status = %response.status, "geocoder returned no address, using coordinates");
            PinnedLocation::unresolved(coordinates)
        }
        Err(err) => {
            warn!(error = %err, "geocoding failed, using coordinates");
            PinnedLocation::unresolved(coordinates)
        }
    }
}
