//! Inference service client
//!
//! Forwards requests to the external model service essentially as-is and
//! classifies what comes back:
//! - 2xx with a JSON body: relayed verbatim with the upstream status
//! - non-2xx with a JSON body: `ApiError::Upstream` carrying `message`/`error`
//! - any body that is not JSON, or a network failure: `ApiError::BadGateway`

use axum::http::StatusCode;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::ApiError;

const USER_AGENT: &str = concat!("voxscreen-gateway/", env!("CARGO_PKG_VERSION"));

/// Upstream path for audio analysis
pub const AUDIO_PATH: &str = "/analyze_audio";
/// Upstream path for feature-vector prediction
pub const FEATURES_PATH: &str = "/predict-features";

const AUDIO_FALLBACK: &str = "Audio analysis failed from backend.";
const FEATURES_FALLBACK: &str = "Prediction failed from backend.";

/// Successful upstream answer
#[derive(Debug, Clone)]
pub struct UpstreamReply {
    pub status: StatusCode,
    pub body: Value,
}

/// Audio file received from the caller, ready to forward
#[derive(Debug, Clone)]
pub struct AudioPart {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// HTTP client for the inference service
pub struct InferenceClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl InferenceClient {
    /// Create new client for the service at `base_url`
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Forward an audio file as multipart field `file`
    pub async fn analyze_audio(&self, audio: AudioPart) -> Result<UpstreamReply, ApiError> {
        let url = format!("{}{}", self.base_url, AUDIO_PATH);
        debug!(url = %url, file = %audio.file_name, bytes = audio.bytes.len(), "Forwarding audio");

        let part = reqwest::multipart::Part::bytes(audio.bytes)
            .file_name(audio.file_name)
            .mime_str(&audio.content_type)
            .map_err(|e| ApiError::BadRequest(format!("Invalid content type: {}", e)))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .http_client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(network_failure)?;

        relay(response, AUDIO_FALLBACK).await
    }

    /// Forward an ordered 22-value feature array as `{"features": [...]}`
    pub async fn predict_features(&self, features: &[f64]) -> Result<UpstreamReply, ApiError> {
        let url = format!("{}{}", self.base_url, FEATURES_PATH);
        debug!(url = %url, "Forwarding feature vector");

        let response = self
            .http_client
            .post(&url)
            .json(&json!({ "features": features }))
            .send()
            .await
            .map_err(network_failure)?;

        relay(response, FEATURES_FALLBACK).await
    }
}

fn network_failure(err: reqwest::Error) -> ApiError {
    warn!("Inference service request failed: {}", err);
    ApiError::BadGateway(format!("Inference service unreachable: {}", err))
}

async fn relay(response: reqwest::Response, fallback: &str) -> Result<UpstreamReply, ApiError> {
    // reqwest and axum use different `http` crate versions
    let status = StatusCode::from_u16(response.status().as_u16())
        .map_err(|e| ApiError::BadGateway(format!("Invalid upstream status: {}", e)))?;

    let bytes = response
        .bytes()
        .await
        .map_err(|e| ApiError::BadGateway(format!("Failed to read upstream body: {}", e)))?;

    let body: Value = serde_json::from_slice(&bytes).map_err(|e| {
        warn!(status = status.as_u16(), "Upstream body is not JSON: {}", e);
        ApiError::BadGateway("Inference service returned an unreadable response.".to_string())
    })?;

    if !status.is_success() {
        let message = error_text(&body).unwrap_or_else(|| fallback.to_string());
        warn!(status = status.as_u16(), message = %message, "Inference service error");
        return Err(ApiError::Upstream { status, message });
    }

    info!(status = status.as_u16(), "Inference service answered");
    Ok(UpstreamReply { status, body })
}

/// `message`, then `error`, as non-empty strings
fn error_text(body: &Value) -> Option<String> {
    ["message", "error"]
        .iter()
        .filter_map(|field| body.get(*field).and_then(Value::as_str))
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation_trims_slash() {
        let client = InferenceClient::new("http://localhost:5000/", Duration::from_secs(5)).unwrap();
        assert_eq!(client.base_url(), "http://localhost:5000");
    }

    #[test]
    fn test_error_text_precedence() {
        assert_eq!(
            error_text(&json!({"message": "model missing", "error": "E42"})),
            Some("model missing".to_string())
        );
        assert_eq!(
            error_text(&json!({"message": "", "error": "E42"})),
            Some("E42".to_string())
        );
        assert_eq!(error_text(&json!({"detail": "x"})), None);
    }
}
