use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Ordinal cement-to-casing bond classification for a depth interval.
///
/// Labels outside the canonical set are kept verbatim in [`BondQuality::Other`]
/// so they can still be displayed; they rank below `Poor`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BondQuality {
    Excellent,
    Good,
    Moderate,
    Poor,
    FreePipe,
    Other(String),
}

impl BondQuality {
    /// Enumerated labels accepted by the response schema, best first.
    pub const LABELS: [&'static str; 5] = ["Excellent", "Good", "Moderate", "Poor", "Free Pipe"];

    pub fn label(&self) -> &str {
        match self {
            Self::Excellent => "Excellent",
            Self::Good => "Good",
            Self::Moderate => "Moderate",
            Self::Poor => "Poor",
            Self::FreePipe => "Free Pipe",
            Self::Other(label) => label,
        }
    }
}

impl From<String> for BondQuality {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Excellent" => Self::Excellent,
            "Good" => Self::Good,
            "Moderate" => Self::Moderate,
            "Poor" => Self::Poor,
            "Free Pipe" => Self::FreePipe,
            _ => Self::Other(value),
        }
    }
}

impl From<BondQuality> for String {
    fn from(value: BondQuality) -> Self {
        match value {
            BondQuality::Other(label) => label,
            known => known.label().to_string(),
        }
    }
}

impl fmt::Display for BondQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Unit the depth bounds of every zone are expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DepthUnit {
    Meters,
    Feet,
}

impl DepthUnit {
    pub const LABELS: [&'static str; 2] = ["Meters", "Feet"];

    pub fn label(self) -> &'static str {
        match self {
            Self::Meters => "Meters",
            Self::Feet => "Feet",
        }
    }
}

impl fmt::Display for DepthUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One interpreted depth interval with bilingual narrative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BondZone {
    pub depth_from: f64,
    pub depth_to: f64,
    pub quality: BondQuality,
    pub technical_description_en: String,
    pub technical_description_ar: String,
    pub diagnosis_en: String,
    pub diagnosis_ar: String,
}

impl BondZone {
    /// `"<from> - <to>"`, the depth cell used by every renderer.
    pub fn depth_range(&self) -> String {
        format!("{} - {}", self.depth_from, self.depth_to)
    }
}

/// One completed interpretation as returned by the inference service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub summary_en: String,
    pub summary_ar: String,
    pub zones: Vec<BondZone>,
    pub recommendations_en: Vec<String>,
    pub recommendations_ar: Vec<String>,
    pub log_type_detected: String,
    pub depth_unit: DepthUnit,
}

impl AnalysisResult {
    /// Check the invariants the response schema cannot express.
    pub fn validate(&self) -> Result<(), ResultValidationError> {
        for (index, zone) in self.zones.iter().enumerate() {
            if !zone.depth_from.is_finite() || !zone.depth_to.is_finite() {
                return Err(ResultValidationError::NonFiniteDepth { index });
            }
            if zone.depth_from > zone.depth_to {
                return Err(ResultValidationError::InvertedDepth {
                    index,
                    from: zone.depth_from,
                    to: zone.depth_to,
                });
            }
        }
        if self.recommendations_en.len() != self.recommendations_ar.len() {
            return Err(ResultValidationError::RecommendationMismatch {
                english: self.recommendations_en.len(),
                arabic: self.recommendations_ar.len(),
            });
        }
        Ok(())
    }
}

/// Invariant violations found in an otherwise well-formed result.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ResultValidationError {
    #[error("zone {index} has a non-finite depth bound")]
    NonFiniteDepth { index: usize },
    #[error("zone {index} depth range is inverted ({from} > {to})")]
    InvertedDepth { index: usize, from: f64, to: f64 },
    #[error("recommendation lists differ in length (english {english}, arabic {arabic})")]
    RecommendationMismatch { english: usize, arabic: usize },
}

/// Lifecycle of a single analysis session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Idle,
    Analyzing,
    Completed,
    Error,
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_camel_case_wire_shape() {
        let value = json!({
            "summaryEn": "ok",
            "summaryAr": "حسنا",
            "zones": [{
                "depthFrom": 100,
                "depthTo": 150.5,
                "quality": "Free Pipe",
                "technicalDescriptionEn": "high amplitude",
                "technicalDescriptionAr": "سعة عالية",
                "diagnosisEn": "CBL > 90 mV",
                "diagnosisAr": "أنبوب حر"
            }],
            "recommendationsEn": ["squeeze"],
            "recommendationsAr": ["حقن"],
            "logTypeDetected": "CBL/VDL",
            "depthUnit": "Feet"
        });
        let result: AnalysisResult = serde_json::from_value(value).unwrap();
        assert_eq!(result.zones[0].quality, BondQuality::FreePipe);
        assert_eq!(result.depth_unit, DepthUnit::Feet);
        assert_eq!(result.zones[0].depth_range(), "100 - 150.5");
    }

    #[test]
    fn missing_required_field_is_rejected() {
        let value = json!({
            "summaryEn": "ok",
            "zones": [],
            "recommendationsEn": [],
            "recommendationsAr": [],
            "logTypeDetected": "CBL",
            "depthUnit": "Meters"
        });
        assert!(serde_json::from_value::<AnalysisResult>(value).is_err());
    }

    #[test]
    fn unknown_quality_is_preserved() {
        let quality: BondQuality = serde_json::from_value(json!("Partial")).unwrap();
        assert_eq!(quality, BondQuality::Other("Partial".into()));
        assert_eq!(serde_json::to_value(&quality).unwrap(), json!("Partial"));
        assert_eq!(
            serde_json::to_value(BondQuality::FreePipe).unwrap(),
            json!("Free Pipe")
        );
    }

    #[test]
    fn validation_accepts_well_formed_result() {
        two_zone_result().validate().expect("fixture should be valid");
    }

    #[test]
    fn validation_rejects_inverted_zone() {
        let mut result = two_zone_result();
        result.zones[1] = zone(1400.0, 1300.0, BondQuality::Good);
        let err = result.validate().expect_err("inverted range must fail");
        assert!(matches!(
            err,
            ResultValidationError::InvertedDepth { index: 1, .. }
        ));
    }

    #[test]
    fn validation_rejects_mismatched_recommendations() {
        let mut result = two_zone_result();
        result.recommendations_ar.pop();
        assert_eq!(
            result.validate(),
            Err(ResultValidationError::RecommendationMismatch {
                english: 2,
                arabic: 1
            })
        );
    }

    #[test]
    fn equal_depth_bounds_are_allowed() {
        let mut result = two_zone_result();
        result.zones = vec![zone(500.0, 500.0, BondQuality::Moderate)];
        assert!(result.validate().is_ok());
    }
}
