//! Result normalizer
//!
//! The inference service has answered in several dialects over time:
//!
//! | Concern     | Dialects seen                                                    |
//! |-------------|------------------------------------------------------------------|
//! | verdict     | `prediction: "positive"`, `prediction: 0/1`, `result: "Healthy"` |
//! | confidence  | `probability`, `confidence`                                      |
//! | features    | `features` (array or object), `features_used_for_prediction`, `features_processed` |
//!
//! [`Normalizer::normalize`] folds all of them into one [`PredictionResult`].
//! Verdict rules are tried in order and the first match wins; within a rule,
//! fields are tried in table order. A response with no recognizable verdict is
//! rejected rather than guessed.

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::features::FeatureVector;
use crate::prediction::{PredictionResult, Probability, Verdict};

/// Fields that may carry the verdict, in precedence order
pub const VERDICT_FIELDS: [&str; 3] = ["prediction", "result", "verdict"];

/// Fields that may carry the model confidence, in precedence order
pub const PROBABILITY_FIELDS: [&str; 2] = ["probability", "confidence"];

/// Fields that may carry the feature values, in precedence order
pub const FEATURE_FIELDS: [&str; 3] = ["features", "features_used_for_prediction", "features_processed"];

const MESSAGE_FIELD: &str = "message";

/// Built-in label synonyms
pub const POSITIVE_LABELS: [&str; 3] = ["Parkinson's Disease", "Parkinson's", "Parkinsons"];
pub const NEGATIVE_LABELS: [&str; 1] = ["Healthy"];

/// Normalization failures. Both are treated like transport failures upstream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    #[error("Malformed response: expected a JSON object")]
    NotAnObject,

    #[error("Malformed response: no recognizable verdict in fields {0:?}")]
    MissingVerdict(Vec<String>),
}

/// One verdict-matching rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VerdictRule {
    /// Exact "positive" / "negative"
    Canonical,
    /// 0/1, "0"/"1", false/true
    BooleanLike,
    /// Configured label synonyms such as "Healthy"
    Synonym,
}

const RULES: [VerdictRule; 3] = [
    VerdictRule::Canonical,
    VerdictRule::BooleanLike,
    VerdictRule::Synonym,
];

/// Response normalizer with configurable label synonyms
#[derive(Debug, Clone)]
pub struct Normalizer {
    positive_labels: Vec<String>,
    negative_labels: Vec<String>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self {
            positive_labels: POSITIVE_LABELS.iter().map(|s| s.to_string()).collect(),
            negative_labels: NEGATIVE_LABELS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Normalizer {
    /// Built-in synonyms plus extra labels (e.g. from configuration)
    pub fn with_extra_labels(positive: &[String], negative: &[String]) -> Self {
        let mut normalizer = Self::default();
        normalizer.positive_labels.extend(positive.iter().cloned());
        normalizer.negative_labels.extend(negative.iter().cloned());
        normalizer
    }

    /// Reshape a raw backend response into the canonical result
    pub fn normalize(&self, raw: &Value) -> Result<PredictionResult, NormalizeError> {
        let object = raw.as_object().ok_or(NormalizeError::NotAnObject)?;

        let verdict = self.verdict(object).ok_or_else(|| {
            NormalizeError::MissingVerdict(VERDICT_FIELDS.iter().map(|f| f.to_string()).collect())
        })?;

        Ok(PredictionResult {
            verdict,
            probability: probability(object),
            message: message(object),
            features: features(object),
        })
    }

    fn verdict(&self, object: &Map<String, Value>) -> Option<Verdict> {
        RULES.iter().find_map(|rule| {
            VERDICT_FIELDS
                .iter()
                .filter_map(|field| object.get(*field))
                .find_map(|value| self.apply(*rule, value))
        })
    }

    fn apply(&self, rule: VerdictRule, value: &Value) -> Option<Verdict> {
        match rule {
            VerdictRule::Canonical => match value.as_str()? {
                "positive" => Some(Verdict::Positive),
                "negative" => Some(Verdict::Negative),
                _ => None,
            },
            VerdictRule::BooleanLike => boolean_like(value).map(|flag| {
                if flag {
                    Verdict::Positive
                } else {
                    Verdict::Negative
                }
            }),
            VerdictRule::Synonym => {
                let label = value.as_str()?;
                if self.positive_labels.iter().any(|l| l == label) {
                    Some(Verdict::Positive)
                } else if self.negative_labels.iter().any(|l| l == label) {
                    Some(Verdict::Negative)
                } else {
                    None
                }
            }
        }
    }
}

/// Normalize with the built-in synonym table
pub fn normalize(raw: &Value) -> Result<PredictionResult, NormalizeError> {
    Normalizer::default().normalize(raw)
}

fn boolean_like(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(flag) => Some(*flag),
        Value::Number(n) => match n.as_f64()? {
            v if v == 1.0 => Some(true),
            v if v == 0.0 => Some(false),
            _ => None,
        },
        Value::String(s) => match s.as_str() {
            "1" => Some(true),
            "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn probability(object: &Map<String, Value>) -> Probability {
    for field in PROBABILITY_FIELDS {
        let Some(value) = object.get(field) else {
            continue;
        };
        match value.as_f64().map(Probability::from_value) {
            Some(p @ Probability::Known(_)) => return p,
            _ => debug!(field, value = %value, "Ignoring unusable probability value"),
        }
    }
    Probability::Unknown
}

fn message(object: &Map<String, Value>) -> Option<String> {
    object
        .get(MESSAGE_FIELD)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn features(object: &Map<String, Value>) -> FeatureVector {
    FEATURE_FIELDS
        .iter()
        .filter_map(|field| object.get(*field))
        .find_map(|value| match value {
            Value::Array(items) => Some(FeatureVector::from_json_array(items)),
            Value::Object(map) => Some(FeatureVector::from_object(map)),
            _ => None,
        })
        .unwrap_or_default()
}
