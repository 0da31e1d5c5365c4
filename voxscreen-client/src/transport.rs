//! Transport to the voxscreen gateway
//!
//! The forms only know about [`PredictionTransport`]; [`GatewayClient`] is the
//! reqwest implementation used by the CLI, tests substitute their own.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};
use voxscreen_common::audio;

use crate::error::{TransportError, GENERIC_FAILURE};

const USER_AGENT: &str = concat!("voxscreen-client/", env!("CARGO_PKG_VERSION"));

/// Gateway path for audio analysis
pub const ANALYZE_AUDIO_PATH: &str = "/analyze-audio";
/// Gateway path for feature-vector prediction
pub const PREDICT_FEATURES_PATH: &str = "/predict-from-features";

/// An audio file accepted by the upload rules, held in memory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl AudioUpload {
    /// Validate name and size, then take ownership of the bytes
    pub fn new(file_name: &str, bytes: Vec<u8>) -> voxscreen_common::Result<Self> {
        let content_type = audio::validate_upload(file_name, bytes.len())?;
        Ok(Self {
            file_name: file_name.to_string(),
            content_type: content_type.to_string(),
            bytes,
        })
    }

    /// Read a file from disk
    ///
    /// Type and size are checked against metadata before reading, so an
    /// oversized file is never loaded.
    pub fn from_path(path: &Path) -> voxscreen_common::Result<Self> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                voxscreen_common::Error::InvalidInput(format!(
                    "Not a file path: {}",
                    path.display()
                ))
            })?
            .to_string();

        let len = std::fs::metadata(path)?.len();
        audio::validate_upload(&file_name, usize::try_from(len).unwrap_or(usize::MAX))?;

        let bytes = std::fs::read(path)?;
        Self::new(&file_name, bytes)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Something that can carry analysis requests to the inference service
///
/// Implementations return the raw JSON body of a successful response;
/// normalization happens in the caller.
#[async_trait]
pub trait PredictionTransport: Send + Sync {
    /// Submit a 22-value feature array in schema order
    async fn predict_from_features(&self, features: &[f64]) -> Result<Value, TransportError>;

    /// Submit an audio file
    async fn analyze_audio(&self, upload: &AudioUpload) -> Result<Value, TransportError>;
}

/// HTTP transport to a running voxscreen-gateway
pub struct GatewayClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl GatewayClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, TransportError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl PredictionTransport for GatewayClient {
    async fn predict_from_features(&self, features: &[f64]) -> Result<Value, TransportError> {
        let url = format!("{}{}", self.base_url, PREDICT_FEATURES_PATH);
        debug!(url = %url, count = features.len(), "Submitting feature vector");

        let response = self
            .http_client
            .post(&url)
            .json(&json!({ "features": features }))
            .send()
            .await
            .map_err(network_error)?;

        interpret(response).await
    }

    async fn analyze_audio(&self, upload: &AudioUpload) -> Result<Value, TransportError> {
        let url = format!("{}{}", self.base_url, ANALYZE_AUDIO_PATH);
        debug!(url = %url, file = %upload.file_name, bytes = upload.len(), "Submitting audio");

        let part = reqwest::multipart::Part::bytes(upload.bytes.clone())
            .file_name(upload.file_name.clone())
            .mime_str(&upload.content_type)
            .map_err(|e| TransportError::Network(format!("Invalid content type: {}", e)))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .http_client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(network_error)?;

        interpret(response).await
    }
}

fn network_error(err: reqwest::Error) -> TransportError {
    warn!("Gateway request failed: {}", err);
    TransportError::Network(err.to_string())
}

async fn interpret(response: reqwest::Response) -> Result<Value, TransportError> {
    let status = response.status();
    let bytes = response
        .bytes()
        .await
        .map_err(|e| TransportError::Network(format!("Failed to read response: {}", e)))?;

    if status.is_success() {
        return serde_json::from_slice(&bytes).map_err(|e| {
            warn!(status = status.as_u16(), "Response body is not JSON: {}", e);
            TransportError::Malformed(e.to_string())
        });
    }

    let message = serde_json::from_slice::<Value>(&bytes)
        .ok()
        .and_then(|body| rejection_text(&body))
        .unwrap_or_else(|| GENERIC_FAILURE.to_string());
    warn!(status = status.as_u16(), message = %message, "Analysis request rejected");

    Err(TransportError::Rejected {
        status: status.as_u16(),
        message,
    })
}

/// `error`, then `message`, as non-empty strings
fn rejection_text(body: &Value) -> Option<String> {
    ["error", "message"]
        .iter()
        .filter_map(|field| body.get(*field).and_then(Value::as_str))
        .map(str::trim)
        .find(|text| !text.is_empty())
        .map(str::to_string)
}
