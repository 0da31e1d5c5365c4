//! Manual feature entry

use tracing::debug;
use voxscreen_common::features::spec_for;
use voxscreen_common::{FeatureVector, Preset};

use crate::error::AnalysisError;
use crate::sequencing::{Analyzer, SubmitGate, SubmitOutcome};

/// The 22-slider form
///
/// Values start at 0. Slider bounds are a hint for the input widget; any
/// finite value may be submitted.
#[derive(Debug, Default)]
pub struct ManualEntryForm {
    values: FeatureVector,
    gate: SubmitGate,
}

impl ManualEntryForm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Form pre-filled from a positional list; exactly 22 values required
    pub fn from_values(values: &[f64]) -> Result<Self, AnalysisError> {
        let features = FeatureVector::from_slice(values)?;
        if let Some((name, _)) = features.iter().find(|(_, value)| !value.is_finite()) {
            return Err(AnalysisError::Validation(format!(
                "{} must be a finite number",
                name
            )));
        }

        Ok(Self {
            values: features,
            gate: SubmitGate::default(),
        })
    }

    pub fn set(&mut self, name: &str, value: f64) -> Result<(), AnalysisError> {
        if !value.is_finite() {
            return Err(AnalysisError::Validation(format!(
                "{} must be a finite number",
                name
            )));
        }
        self.values.set(name, value)?;
        Ok(())
    }

    pub fn value(&self, name: &str) -> Option<f64> {
        self.values.get(name)
    }

    pub fn values(&self) -> &FeatureVector {
        &self.values
    }

    /// `(min, max)` for the feature's slider
    pub fn slider_bounds(name: &str) -> Option<(f64, f64)> {
        spec_for(name).map(|spec| (0.0, spec.max_value))
    }

    pub fn load_preset(&mut self, preset: Preset) {
        debug!(preset = %preset, "Loading preset");
        self.values = preset.values();
    }

    pub fn reset(&mut self) {
        self.values = FeatureVector::default();
    }

    /// Values in backend order
    pub fn payload(&self) -> Vec<f64> {
        self.values.to_vec()
    }

    pub fn is_submitting(&self) -> bool {
        self.gate.is_busy()
    }

    pub async fn submit(&self, analyzer: &Analyzer) -> Result<SubmitOutcome, AnalysisError> {
        let payload = self.payload();
        analyzer
            .run(&self.gate, analyzer.transport().predict_from_features(&payload))
            .await
    }
}
