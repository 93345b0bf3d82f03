//! In-process stand-ins for the external collaborators, used by the demo command.

use metrics_exporter_prometheus::PrometheusHandle;
use petty_patrol::patrol::{
    AnalysisKind, AnalysisResult, CapturedImage, CheckoutSession, Classifier, ClassifierError,
    Coordinates, GeoError, GeocodeResponse, Geocoder, Geolocator, PaymentError, PaymentGateway,
    PaymentVerification, PlateText, PriceCatalog, PriceType,
};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

const STREETS: [&str; 6] = [
    "Ocean Dr",
    "Collins Ave",
    "Washington Ave",
    "Alton Rd",
    "Biscayne Blvd",
    "Calle Ocho",
];

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Reads a `PLATE:<text>` or `QR:<payload>` marker out of the image bytes.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct MarkerClassifier;

impl Classifier for MarkerClassifier {
    async fn classify(&self, image: &CapturedImage) -> Result<AnalysisResult, ClassifierError> {
        let text = String::from_utf8_lossy(&image.bytes);
        let result = if let Some(plate) = text.strip_prefix("PLATE:") {
            AnalysisResult::new(AnalysisKind::Plate, plate.trim(), 0.92)
        } else if let Some(payload) = text.strip_prefix("QR:") {
            AnalysisResult::new(AnalysisKind::Qr, payload.trim(), 0.99)
        } else {
            AnalysisResult::invalid()
        };
        Ok(result)
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct FixedLocator(pub(crate) Coordinates);

impl Geolocator for FixedLocator {
    async fn locate(&self) -> Result<Coordinates, GeoError> {
        Ok(self.0)
    }
}

/// Deterministic filler addresses bucketed from the coordinates. Not a real geocoder.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct GridGeocoder;

impl Geocoder for GridGeocoder {
    async fn reverse(&self, coordinates: Coordinates) -> Result<GeocodeResponse, GeoError> {
        let lat = (coordinates.lat * 1000.0).abs() as u64;
        let lng = (coordinates.lng * 1000.0).abs() as u64;
        let cell = lat ^ lng;
        let street = STREETS[(cell % STREETS.len() as u64) as usize];
        let number = 100 + cell % 1900;
        Ok(GeocodeResponse::ok(format!("{number} {street}, Miami")))
    }
}

/// Approves every checkout; the session id encodes price type and plate for verification.
#[derive(Debug, Clone)]
pub(crate) struct SandboxGateway {
    pub(crate) prices: PriceCatalog,
}

impl PaymentGateway for SandboxGateway {
    async fn create_session(
        &self,
        price_id: &str,
        plate: Option<&PlateText>,
    ) -> Result<CheckoutSession, PaymentError> {
        let session_id = format!(
            "sandbox:{price_id}:{}",
            plate.map(PlateText::as_str).unwrap_or_default()
        );
        Ok(CheckoutSession {
            redirect_url: format!("https://checkout.invalid/{session_id}"),
            session_id,
        })
    }

    async fn verify(&self, session_id: &str) -> Result<PaymentVerification, PaymentError> {
        let mut parts = session_id.splitn(3, ':');
        let (Some("sandbox"), Some(price_id), plate) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(PaymentError::Transport(format!(
                "unknown sandbox session {session_id}"
            )));
        };

        let price_type = if price_id == self.prices.yearly {
            PriceType::Yearly
        } else {
            PriceType::OneTime
        };
        Ok(PaymentVerification {
            paid: true,
            price_type,
            plate_text: plate.unwrap_or_default().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn grid_geocoder_is_deterministic() {
        let point = Coordinates::new(25.7826, -80.1341);
        let first = GridGeocoder.reverse(point).await.expect("address");
        let second = GridGeocoder.reverse(point).await.expect("address");
        assert_eq!(first, second);
        assert!(first.address.unwrap_or_default().ends_with(", Miami"));
    }

    #[tokio::test]
    async fn marker_classifier_reads_plates_and_codes() {
        let plate = MarkerClassifier
            .classify(&CapturedImage::new(b"PLATE:MIA305".to_vec(), "image/png"))
            .await
            .expect("classified");
        assert_eq!(plate.kind, AnalysisKind::Plate);
        assert_eq!(plate.value, "MIA305");

        let noise = MarkerClassifier
            .classify(&CapturedImage::new(vec![0xFF, 0xD8], "image/jpeg"))
            .await
            .expect("classified");
        assert_eq!(noise.kind, AnalysisKind::Invalid);
    }

    #[tokio::test]
    async fn sandbox_sessions_verify_with_their_plate() {
        let gateway = SandboxGateway {
            prices: PriceCatalog {
                one_time: "once".to_string(),
                yearly: "year".to_string(),
            },
        };
        let plate = PlateText::normalize("MIA305");
        let checkout = gateway
            .create_session("once", Some(&plate))
            .await
            .expect("session");
        let verification = gateway.verify(&checkout.session_id).await.expect("verified");
        assert_eq!(verification.price_type, PriceType::OneTime);
        assert_eq!(verification.plate_text, "MIA305");
        assert!(gateway.verify("cs_live_123").await.is_err());
    }
}
