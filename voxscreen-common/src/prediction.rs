//! Canonical prediction types consumed by every display surface

use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::features::FeatureVector;

/// Binary screening outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    /// Indicators present
    Positive,
    /// No significant indicators
    Negative,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Positive => "positive",
            Verdict::Negative => "negative",
        }
    }

    pub fn is_positive(&self) -> bool {
        matches!(self, Verdict::Positive)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Model confidence, or an explicit "unknown"
///
/// `0.0` is a legitimate confidence; absence is represented by `Unknown`,
/// never by zero or NaN. Serialized as a number or `null`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Probability {
    Known(f64),
    #[default]
    Unknown,
}

impl Probability {
    /// Accepts only finite values within [0, 1]
    pub fn from_value(value: f64) -> Self {
        if value.is_finite() && (0.0..=1.0).contains(&value) {
            Probability::Known(value)
        } else {
            Probability::Unknown
        }
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            Probability::Known(v) => Some(*v),
            Probability::Unknown => None,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, Probability::Known(_))
    }

    /// Rounded whole percentage, e.g. `"93%"`, or `"N/A"`
    pub fn percent_label(&self) -> String {
        match self {
            Probability::Known(v) => format!("{}%", (v * 100.0).round() as i64),
            Probability::Unknown => "N/A".to_string(),
        }
    }
}

impl Serialize for Probability {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Probability::Known(v) => serializer.serialize_f64(*v),
            Probability::Unknown => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for Probability {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<f64>::deserialize(deserializer)?;
        Ok(raw.map(Probability::from_value).unwrap_or_default())
    }
}

/// The single result shape produced by the normalizer
///
/// Built once per analysis request and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub verdict: Verdict,
    #[serde(default)]
    pub probability: Probability,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub features: FeatureVector,
}
