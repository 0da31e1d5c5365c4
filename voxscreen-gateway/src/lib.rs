//! voxscreen-gateway library - local proxy to the inference service
//!
//! Exposes the router and state for the binary and for integration tests.

pub mod api;
pub mod error;
pub mod upstream;

pub use crate::error::{ApiError, ApiResult};

use axum::extract::DefaultBodyLimit;
use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;
use voxscreen_common::audio::MAX_UPLOAD_BYTES;

use crate::upstream::InferenceClient;

/// Headroom for multipart framing around the largest accepted file
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Outcome counters for calls to the inference service
#[derive(Debug, Clone, Default)]
pub struct UpstreamStats {
    /// 2xx JSON answers passed through
    pub relayed: u64,
    /// Error statuses, unreachable service or unreadable bodies
    pub failed: u64,
    pub last_error: Option<String>,
    pub last_error_at: Option<DateTime<Utc>>,
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Client for the external inference service
    pub upstream: Arc<InferenceClient>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Reported by /health
    pub upstream_stats: Arc<RwLock<UpstreamStats>>,
}

impl AppState {
    pub fn new(upstream: InferenceClient) -> Self {
        Self {
            upstream: Arc::new(upstream),
            startup_time: Utc::now(),
            upstream_stats: Arc::new(RwLock::new(UpstreamStats::default())),
        }
    }

    pub async fn record_relayed(&self) {
        self.upstream_stats.write().await.relayed += 1;
    }

    /// Remember a failure for diagnostics
    pub async fn record_error(&self, error: &ApiError) {
        let mut stats = self.upstream_stats.write().await;
        stats.failed += 1;
        stats.last_error = Some(error.to_string());
        stats.last_error_at = Some(Utc::now());
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::analysis_routes())
        .merge(api::health_routes())
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + MULTIPART_OVERHEAD))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
