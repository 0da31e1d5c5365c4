//! GET /health
//!
//! Liveness of the gateway itself. The inference service is never called
//! from here; its state is inferred from the requests the gateway relayed,
//! so an idle gateway reports no upstream errors even if the service is down.

use axum::{extract::State, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always "ok" while the gateway answers
    pub status: &'static str,
    pub module: &'static str,
    pub version: &'static str,
    /// Base URL of the inference service
    pub upstream: String,
    pub uptime_seconds: u64,
    /// Successful answers passed through
    pub upstream_relayed: u64,
    /// Forwarded requests that failed, whatever the cause
    pub upstream_failures: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error_at: Option<DateTime<Utc>>,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime_seconds = Utc::now()
        .signed_duration_since(state.startup_time)
        .num_seconds()
        .max(0) as u64;
    let stats = state.upstream_stats.read().await.clone();

    Json(HealthResponse {
        status: "ok",
        module: "voxscreen-gateway",
        version: env!("CARGO_PKG_VERSION"),
        upstream: state.upstream.base_url().to_string(),
        uptime_seconds,
        upstream_relayed: stats.relayed,
        upstream_failures: stats.failed,
        last_error: stats.last_error,
        last_error_at: stats.last_error_at,
    })
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
