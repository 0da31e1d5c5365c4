//! HTTP API handlers for voxscreen-gateway

pub mod analysis;
pub mod health;

pub use analysis::{analysis_routes, analyze_audio, predict_from_features};
pub use health::health_routes;
