//! Acoustic feature schema
//!
//! The 22 voice measurements consumed by the inference service. Order is the
//! positional contract with the backend: index `i` of every outbound feature
//! array is `FEATURE_NAMES[i]`.
//!
//! A [`FeatureVector`] converts losslessly between the positional (array) and
//! keyed (object) representations. Missing or unusable values become `0.0`,
//! never `null`, so downstream rendering always has a number.

use serde::de::{self, Deserializer};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Number of features in the model input
pub const FEATURE_COUNT: usize = 22;

/// Feature names in backend positional order
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "MDVP:Fo(Hz)",
    "MDVP:Fhi(Hz)",
    "MDVP:Flo(Hz)",
    "MDVP:Jitter(%)",
    "MDVP:Jitter(Abs)",
    "MDVP:RAP",
    "MDVP:PPQ",
    "Jitter:DDP",
    "MDVP:Shimmer",
    "MDVP:Shimmer(dB)",
    "Shimmer:APQ3",
    "Shimmer:APQ5",
    "MDVP:APQ",
    "Shimmer:DDA",
    "NHR",
    "HNR",
    "RPDE",
    "DFA",
    "spread1",
    "spread2",
    "D2",
    "PPE",
];

/// Measurement family a feature belongs to (used for form tabs)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureGroup {
    Frequency,
    Jitter,
    Shimmer,
    Noise,
    Nonlinear,
}

impl FeatureGroup {
    pub const ALL: [FeatureGroup; 5] = [
        FeatureGroup::Frequency,
        FeatureGroup::Jitter,
        FeatureGroup::Shimmer,
        FeatureGroup::Noise,
        FeatureGroup::Nonlinear,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            FeatureGroup::Frequency => "Frequency",
            FeatureGroup::Jitter => "Jitter",
            FeatureGroup::Shimmer => "Shimmer",
            FeatureGroup::Noise => "Noise",
            FeatureGroup::Nonlinear => "Nonlinear",
        }
    }
}

/// Static metadata for one feature
#[derive(Debug, Clone, Copy)]
pub struct FeatureSpec {
    pub name: &'static str,
    pub description: &'static str,
    /// Upper slider bound. Not a validation limit.
    pub max_value: f64,
    pub group: FeatureGroup,
}

const fn spec(
    name: &'static str,
    description: &'static str,
    max_value: f64,
    group: FeatureGroup,
) -> FeatureSpec {
    FeatureSpec {
        name,
        description,
        max_value,
        group,
    }
}

/// Metadata for every feature, in `FEATURE_NAMES` order
pub const FEATURE_SPECS: [FeatureSpec; FEATURE_COUNT] = [
    spec("MDVP:Fo(Hz)", "Average vocal fundamental frequency", 260.0, FeatureGroup::Frequency),
    spec("MDVP:Fhi(Hz)", "Maximum vocal fundamental frequency", 600.0, FeatureGroup::Frequency),
    spec("MDVP:Flo(Hz)", "Minimum vocal fundamental frequency", 200.0, FeatureGroup::Frequency),
    spec("MDVP:Jitter(%)", "Percentage variation in fundamental frequency", 2.0, FeatureGroup::Jitter),
    spec("MDVP:Jitter(Abs)", "Absolute jitter in microseconds", 0.0001, FeatureGroup::Jitter),
    spec("MDVP:RAP", "Relative amplitude perturbation", 0.02, FeatureGroup::Jitter),
    spec("MDVP:PPQ", "Five-point period perturbation quotient", 0.02, FeatureGroup::Jitter),
    spec("Jitter:DDP", "Average absolute difference of differences between cycles", 0.03, FeatureGroup::Jitter),
    spec("MDVP:Shimmer", "Percentage variation in amplitude", 0.2, FeatureGroup::Shimmer),
    spec("MDVP:Shimmer(dB)", "Shimmer in decibels", 2.0, FeatureGroup::Shimmer),
    spec("Shimmer:APQ3", "Three-point amplitude perturbation quotient", 0.03, FeatureGroup::Shimmer),
    spec("Shimmer:APQ5", "Five-point amplitude perturbation quotient", 0.03, FeatureGroup::Shimmer),
    spec("MDVP:APQ", "Amplitude perturbation quotient", 0.05, FeatureGroup::Shimmer),
    spec("Shimmer:DDA", "Average absolute differences between consecutive differences", 0.1, FeatureGroup::Shimmer),
    spec("NHR", "Noise-to-harmonics ratio", 0.5, FeatureGroup::Noise),
    spec("HNR", "Harmonics-to-noise ratio", 30.0, FeatureGroup::Noise),
    spec("RPDE", "Recurrence period density entropy measure", 1.0, FeatureGroup::Nonlinear),
    spec("DFA", "Signal fractal scaling exponent", 1.0, FeatureGroup::Nonlinear),
    spec("spread1", "Nonlinear measure of fundamental frequency variation", 10.0, FeatureGroup::Nonlinear),
    spec("spread2", "Nonlinear measure of fundamental frequency variation", 10.0, FeatureGroup::Nonlinear),
    spec("D2", "Correlation dimension", 3.0, FeatureGroup::Nonlinear),
    spec("PPE", "Pitch period entropy", 1.0, FeatureGroup::Nonlinear),
];

/// Position of a feature in the backend order (exact, case-sensitive)
pub fn index_of(name: &str) -> Option<usize> {
    FEATURE_NAMES.iter().position(|candidate| *candidate == name)
}

/// Metadata for a named feature
pub fn spec_for(name: &str) -> Option<&'static FeatureSpec> {
    index_of(name).map(|i| &FEATURE_SPECS[i])
}

/// Features belonging to one group, in schema order
pub fn group_members(group: FeatureGroup) -> impl Iterator<Item = &'static FeatureSpec> {
    FEATURE_SPECS.iter().filter(move |s| s.group == group)
}

fn usable(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// A full set of 22 feature values
///
/// Stored positionally; serialized as an object keyed by feature name in
/// schema order. Deserializes from either an array or an object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector([f64; FEATURE_COUNT]);

impl Default for FeatureVector {
    fn default() -> Self {
        Self([0.0; FEATURE_COUNT])
    }
}

impl FeatureVector {
    pub fn from_array(values: [f64; FEATURE_COUNT]) -> Self {
        Self(values)
    }

    /// Strict positional constructor: the slice must hold exactly 22 values
    pub fn from_slice(values: &[f64]) -> Result<Self> {
        if values.len() != FEATURE_COUNT {
            return Err(Error::InvalidInput(format!(
                "expected {} features, got {}",
                FEATURE_COUNT,
                values.len()
            )));
        }
        let mut out = [0.0; FEATURE_COUNT];
        out.copy_from_slice(values);
        Ok(Self(out))
    }

    /// Positional zip against the schema order.
    ///
    /// Short input leaves trailing features at 0, extra values are ignored,
    /// non-finite values become 0.
    pub fn from_slice_lenient(values: &[f64]) -> Self {
        let mut out = [0.0; FEATURE_COUNT];
        for (slot, value) in out.iter_mut().zip(values) {
            *slot = usable(*value);
        }
        Self(out)
    }

    /// Positional zip of raw JSON values; non-numeric entries become 0
    pub fn from_json_array(values: &[Value]) -> Self {
        let numbers: Vec<f64> = values
            .iter()
            .take(FEATURE_COUNT)
            .map(|value| value.as_f64().unwrap_or(0.0))
            .collect();
        Self::from_slice_lenient(&numbers)
    }

    /// Copy the 22 known keys out of a JSON object.
    ///
    /// Unrecognized keys are ignored; absent or non-numeric keys become 0.
    pub fn from_object(map: &Map<String, Value>) -> Self {
        let mut out = [0.0; FEATURE_COUNT];
        for (slot, name) in out.iter_mut().zip(FEATURE_NAMES) {
            *slot = map
                .get(name)
                .and_then(Value::as_f64)
                .map(usable)
                .unwrap_or(0.0);
        }
        Self(out)
    }

    pub fn as_array(&self) -> &[f64; FEATURE_COUNT] {
        &self.0
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.0.to_vec()
    }

    pub fn to_object(&self) -> Map<String, Value> {
        self.iter()
            .map(|(name, value)| (name.to_string(), Value::from(value)))
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        index_of(name).map(|i| self.0[i])
    }

    pub fn set(&mut self, name: &str, value: f64) -> Result<()> {
        let i = index_of(name)
            .ok_or_else(|| Error::InvalidInput(format!("unknown feature: {}", name)))?;
        self.0[i] = usable(value);
        Ok(())
    }

    /// `(name, value)` pairs in schema order
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        FEATURE_NAMES.iter().copied().zip(self.0.iter().copied())
    }
}

impl Serialize for FeatureVector {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(FEATURE_COUNT))?;
        for (name, value) in self.iter() {
            map.serialize_entry(name, &value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for FeatureVector {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Array(items) => Ok(Self::from_json_array(&items)),
            Value::Object(map) => Ok(Self::from_object(&map)),
            other => Err(de::Error::custom(format!(
                "feature vector must be an array or object, got {}",
                other
            ))),
        }
    }
}

/// Named demonstration inputs for the manual form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    Healthy,
    Parkinsons,
}

const HEALTHY_VALUES: [f64; FEATURE_COUNT] = [
    120.0, 157.3, 114.2, 0.006, 0.00004, 0.003, 0.003, 0.009, 0.029, 0.282, 0.015, 0.018, 0.021,
    0.045, 0.014, 21.9, 0.499, 0.678, 0.217, 2.301, 1.743, 0.119,
];

const PARKINSONS_VALUES: [f64; FEATURE_COUNT] = [
    174.2, 223.6, 140.4, 0.0101, 0.00007, 0.00585, 0.00642, 0.01755, 0.0619, 0.626, 0.0338,
    0.0427, 0.0459, 0.1014, 0.0329, 19.085, 0.6216, 0.7385, 0.3919, 3.671, 2.497, 0.3145,
];

impl Preset {
    pub const ALL: [Preset; 2] = [Preset::Healthy, Preset::Parkinsons];

    pub fn name(&self) -> &'static str {
        match self {
            Preset::Healthy => "healthy",
            Preset::Parkinsons => "parkinsons",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Preset::Healthy => "Normal vocal parameters",
            Preset::Parkinsons => "Typical Parkinson's indicators",
        }
    }

    pub fn values(&self) -> FeatureVector {
        match self {
            Preset::Healthy => FeatureVector(HEALTHY_VALUES),
            Preset::Parkinsons => FeatureVector(PARKINSONS_VALUES),
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Preset {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "healthy" => Ok(Preset::Healthy),
            "parkinsons" => Ok(Preset::Parkinsons),
            other => Err(Error::InvalidInput(format!(
                "unknown preset '{}' (expected healthy or parkinsons)",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> [f64; FEATURE_COUNT] {
        let mut values = [0.0; FEATURE_COUNT];
        for (i, v) in values.iter_mut().enumerate() {
            *v = (i as f64) * 1.5 - 3.0;
        }
        values
    }

    #[test]
    fn test_schema_tables_agree() {
        for (name, spec) in FEATURE_NAMES.iter().zip(FEATURE_SPECS.iter()) {
            assert_eq!(*name, spec.name);
            assert!(spec.max_value > 0.0);
        }
        let grouped: usize = FeatureGroup::ALL
            .iter()
            .map(|g| group_members(*g).count())
            .sum();
        assert_eq!(grouped, FEATURE_COUNT);
    }

    #[test]
    fn test_index_lookup_is_exact() {
        assert_eq!(index_of("MDVP:Fo(Hz)"), Some(0));
        assert_eq!(index_of("PPE"), Some(21));
        assert_eq!(index_of("ppe"), None);
        assert_eq!(spec_for("HNR").unwrap().max_value, 30.0);
    }

    #[test]
    fn test_array_object_round_trip() {
        let values = sample();
        let vector = FeatureVector::from_array(values);
        let object = vector.to_object();
        assert_eq!(object.len(), FEATURE_COUNT);
        for (i, name) in FEATURE_NAMES.iter().enumerate() {
            assert_eq!(object[*name].as_f64(), Some(values[i]));
        }

        let back = FeatureVector::from_object(&object);
        assert_eq!(back.as_array(), &values);
    }

    #[test]
    fn test_short_array_defaults_to_zero() {
        let vector = FeatureVector::from_slice_lenient(&[1.0, 2.0, 3.0]);
        assert_eq!(vector.get("MDVP:Fo(Hz)"), Some(1.0));
        assert_eq!(vector.get("MDVP:Fhi(Hz)"), Some(2.0));
        assert_eq!(vector.get("MDVP:Flo(Hz)"), Some(3.0));
        assert!(vector.as_array()[3..].iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_long_array_truncates() {
        let values: Vec<f64> = (0..30).map(|i| i as f64).collect();
        let vector = FeatureVector::from_slice_lenient(&values);
        assert_eq!(vector.get("PPE"), Some(21.0));
    }

    #[test]
    fn test_json_array_zips_through_lenient_rules() {
        let mut items = vec![json!(1.5), json!("n/a"), json!(null), json!(4.0)];
        items.extend((0..30).map(|_| json!(9.0)));

        let vector = FeatureVector::from_json_array(&items);
        assert_eq!(&vector.as_array()[..4], &[1.5, 0.0, 0.0, 4.0]);
        assert_eq!(vector.get("PPE"), Some(9.0));
    }

    #[test]
    fn test_strict_slice_rejects_wrong_length() {
        assert!(FeatureVector::from_slice(&[0.0; 21]).is_err());
        assert!(FeatureVector::from_slice(&[0.0; 22]).is_ok());
    }

    #[test]
    fn test_object_ignores_unknown_and_non_numeric_keys() {
        let raw = json!({"HNR": 21.5, "NHR": "high", "bogus": 9.0});
        let vector = FeatureVector::from_object(raw.as_object().unwrap());
        assert_eq!(vector.get("HNR"), Some(21.5));
        assert_eq!(vector.get("NHR"), Some(0.0));
        assert_eq!(vector.get("PPE"), Some(0.0));
    }

    #[test]
    fn test_serializes_in_schema_order() {
        let json = serde_json::to_string(&FeatureVector::default()).unwrap();
        let first = json.find("MDVP:Fo(Hz)").unwrap();
        let last = json.find("PPE").unwrap();
        assert!(first < last);
    }

    #[test]
    fn test_deserializes_either_shape() {
        let from_array: FeatureVector = serde_json::from_value(json!([5.0, 6.0])).unwrap();
        assert_eq!(from_array.get("MDVP:Fhi(Hz)"), Some(6.0));

        let from_object: FeatureVector = serde_json::from_value(json!({"D2": 2.5})).unwrap();
        assert_eq!(from_object.get("D2"), Some(2.5));

        assert!(serde_json::from_value::<FeatureVector>(json!("nope")).is_err());
    }

    #[test]
    fn test_set_rejects_unknown_name() {
        let mut vector = FeatureVector::default();
        vector.set("RPDE", 0.5).unwrap();
        assert_eq!(vector.get("RPDE"), Some(0.5));
        assert!(vector.set("Loudness", 1.0).is_err());
    }

    #[test]
    fn test_presets_parse_and_differ() {
        assert_eq!("healthy".parse::<Preset>().unwrap(), Preset::Healthy);
        assert_eq!("parkinsons".parse::<Preset>().unwrap(), Preset::Parkinsons);
        assert!("Healthy".parse::<Preset>().is_err());

        let healthy = Preset::Healthy.values();
        let pd = Preset::Parkinsons.values();
        assert_eq!(healthy.get("HNR"), Some(21.9));
        assert_eq!(pd.get("RPDE"), Some(0.6216));
        assert_eq!(pd.get("DFA"), Some(0.7385));
        assert_ne!(healthy, pd);
    }
}
