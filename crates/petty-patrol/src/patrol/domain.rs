use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::catalog::OTHER_BEHAVIOR;

/// Sentinel plate recorded when a report reaches submission without a resolved plate.
pub const UNKNOWN_PLATE: &str = "UNKNOWN";

const MIN_PLATE_LEN: usize = 2;

/// Identifier wrapper for submitted reports, derived from the creation instant in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReportId(pub String);

impl fmt::Display for ReportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// License plate text, always uppercase ASCII alphanumerics without separators.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct PlateText(String);

impl PlateText {
    /// Strip everything but ASCII letters and digits, then uppercase.
    pub fn normalize(raw: &str) -> Self {
        let text = raw
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .map(|c| c.to_ascii_uppercase())
            .collect();
        Self(text)
    }

    /// Normalize and enforce the minimum plate length used by manual entry.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let plate = Self::normalize(raw);
        if !plate.is_valid() {
            return Err(ValidationError::PlateTooShort);
        }
        Ok(plate)
    }

    pub fn unknown() -> Self {
        Self(UNKNOWN_PLATE.to_string())
    }

    pub fn is_valid(&self) -> bool {
        self.0.len() >= MIN_PLATE_LEN
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for PlateText {
    fn from(value: String) -> Self {
        Self::normalize(&value)
    }
}

impl From<PlateText> for String {
    fn from(value: PlateText) -> Self {
        value.0
    }
}

impl fmt::Display for PlateText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BehaviorId(pub String);

impl BehaviorId {
    pub fn is_other(&self) -> bool {
        self.0 == OTHER_BEHAVIOR
    }
}

impl From<&str> for BehaviorId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Static catalog entry describing a taggable driving behavior.
#[derive(Debug, Clone, Serialize)]
pub struct Behavior {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Raw coordinate display used whenever an address cannot be resolved.
    pub fn display(&self) -> String {
        format!("{:.4}, {:.4}", self.lat, self.lng)
    }
}

/// Human-readable address paired with the pinned coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PinnedLocation {
    pub address: String,
    pub coordinates: Coordinates,
}

impl PinnedLocation {
    pub fn new(address: impl Into<String>, coordinates: Coordinates) -> Self {
        Self {
            address: address.into(),
            coordinates,
        }
    }

    pub fn unresolved(coordinates: Coordinates) -> Self {
        Self::new(coordinates.display(), coordinates)
    }
}

/// One persisted sighting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: ReportId,
    pub plate_text: PlateText,
    pub behaviors: Vec<BehaviorId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_note: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub location: String,
    pub coordinates: Coordinates,
}

impl Report {
    pub fn has_behavior(&self, behavior: &BehaviorId) -> bool {
        self.behaviors.contains(behavior)
    }

    pub fn pinned_location(&self) -> PinnedLocation {
        PinnedLocation::new(self.location.clone(), self.coordinates)
    }
}

/// Achievement definition plus its monotonic unlock flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Badge {
    pub id: String,
    pub name: String,
    pub description: String,
    pub icon: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_behavior: Option<BehaviorId>,
    #[serde(default)]
    unlocked: bool,
}

impl Badge {
    pub fn new(
        id: &str,
        name: &str,
        description: &str,
        icon: &str,
        required_behavior: Option<&str>,
    ) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            icon: icon.to_string(),
            required_behavior: required_behavior.map(BehaviorId::from),
            unlocked: false,
        }
    }

    pub fn unlocked(&self) -> bool {
        self.unlocked
    }

    /// Flip the badge to unlocked. There is no inverse.
    pub fn unlock(&mut self) {
        self.unlocked = true;
    }
}

/// Partner offer redeemable through a QR scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deal {
    pub id: String,
    pub partner_name: String,
    pub offer: String,
    pub description: String,
    pub qr_code_id: String,
    pub location: String,
    #[serde(default)]
    claimed: bool,
}

impl Deal {
    pub fn new(
        id: &str,
        partner_name: &str,
        offer: &str,
        description: &str,
        qr_code_id: &str,
        location: &str,
    ) -> Self {
        Self {
            id: id.to_string(),
            partner_name: partner_name.to_string(),
            offer: offer.to_string(),
            description: description.to_string(),
            qr_code_id: qr_code_id.to_string(),
            location: location.to_string(),
            claimed: false,
        }
    }

    pub fn claimed(&self) -> bool {
        self.claimed
    }

    pub(crate) fn mark_claimed(&mut self) {
        self.claimed = true;
    }

    /// Exact key match, or the key embedded anywhere in a decorated payload.
    pub fn matches(&self, qr_value: &str) -> bool {
        !self.qr_code_id.is_empty()
            && (qr_value == self.qr_code_id || qr_value.contains(&self.qr_code_id))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnalysisKind {
    #[serde(rename = "LICENSE_PLATE", alias = "PLATE")]
    Plate,
    #[serde(rename = "QR_CODE", alias = "QR")]
    Qr,
    Invalid,
}

/// Classifier verdict for one captured image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawAnalysis")]
pub struct AnalysisResult {
    #[serde(rename = "type")]
    pub kind: AnalysisKind,
    pub value: String,
    pub confidence: f32,
}

impl AnalysisResult {
    pub fn new(kind: AnalysisKind, value: impl Into<String>, confidence: f32) -> Self {
        let confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            kind,
            value: value.into(),
            confidence,
        }
    }

    pub fn invalid() -> Self {
        Self::new(AnalysisKind::Invalid, "", 0.0)
    }
}

/// Wire shape of a classifier response; decoding goes through [`AnalysisResult::new`].
#[derive(Deserialize)]
struct RawAnalysis {
    #[serde(rename = "type")]
    kind: AnalysisKind,
    #[serde(default)]
    value: String,
    #[serde(default)]
    confidence: f32,
}

impl From<RawAnalysis> for AnalysisResult {
    fn from(raw: RawAnalysis) -> Self {
        Self::new(raw.kind, raw.value, raw.confidence)
    }
}

/// Transient in-progress capture state: one slot, cleared at every terminal transition.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ReportDraft {
    pub plate: Option<PlateText>,
    pub behaviors: Vec<BehaviorId>,
    pub custom_note: String,
    pub location: Option<PinnedLocation>,
}

impl ReportDraft {
    pub fn toggle_behavior(&mut self, behavior: BehaviorId) {
        if let Some(index) = self.behaviors.iter().position(|id| *id == behavior) {
            self.behaviors.remove(index);
        } else {
            self.behaviors.push(behavior);
        }
    }

    pub fn other_selected(&self) -> bool {
        self.behaviors.iter().any(BehaviorId::is_other)
    }

    /// Checks run in a fixed order; the first failure wins.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.behaviors.is_empty() {
            return Err(ValidationError::NoBehaviors);
        }
        if self.behaviors.len() == 1 && self.other_selected() && self.custom_note.trim().is_empty()
        {
            return Err(ValidationError::MissingNote);
        }
        if self.location.is_none() {
            return Err(ValidationError::MissingLocation);
        }
        if self.plate.as_ref().is_some_and(|plate| !plate.is_valid()) {
            return Err(ValidationError::PlateTooShort);
        }
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.validate().is_ok()
    }

    /// Note retained on the report: only when "other" is tagged and something was written.
    pub fn retained_note(&self) -> Option<String> {
        let note = self.custom_note.trim();
        (self.other_selected() && !note.is_empty()).then(|| note.to_string())
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn from_report(report: &Report) -> Self {
        Self {
            plate: Some(report.plate_text.clone()),
            behaviors: report.behaviors.clone(),
            custom_note: report.custom_note.clone().unwrap_or_default(),
            location: Some(report.pinned_location()),
        }
    }
}

/// User-facing rejections raised before any state is mutated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("pick at least one behavior")]
    NoBehaviors,
    #[error("please describe what they did")]
    MissingNote,
    #[error("please tap the map to pin a location")]
    MissingLocation,
    #[error("please enter a valid plate number (letters and numbers only)")]
    PlateTooShort,
    #[error("please share a name or an email")]
    MissingContact,
}
