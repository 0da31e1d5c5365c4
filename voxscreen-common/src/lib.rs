//! # voxscreen Common Library
//!
//! Shared code for the voxscreen gateway and client including:
//! - Acoustic feature schema (names, ranges, presets)
//! - Canonical prediction types
//! - Result normalizer for the inference service's response dialects
//! - Audio upload rules
//! - Configuration loading

pub mod audio;
pub mod config;
pub mod error;
pub mod features;
pub mod normalizer;
pub mod prediction;

pub use error::{Error, Result};
pub use features::{FeatureVector, Preset, FEATURE_COUNT, FEATURE_NAMES};
pub use normalizer::{normalize, NormalizeError, Normalizer};
pub use prediction::{PredictionResult, Probability, Verdict};
