//! Analysis proxy handlers
//!
//! POST /analyze-audio          multipart, single `file` field
//! POST /predict-from-features  JSON `{ "features": [f64; 22] }`
//!
//! Both relay the upstream JSON untouched on success. Reshaping into the
//! canonical result is the client's job.

use axum::{
    extract::{
        multipart::MultipartRejection, rejection::JsonRejection, Multipart, State,
    },
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde_json::Value;
use tracing::info;
use voxscreen_common::{audio, FEATURE_COUNT};

use crate::{
    error::{ApiError, ApiResult},
    upstream::{AudioPart, UpstreamReply},
    AppState,
};

const NO_FILE: &str = "No audio file provided.";
const INVALID_FEATURES: &str = "Invalid input: Expected an array of 22 features.";

/// POST /predict-from-features
pub async fn predict_from_features(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let Json(payload) = payload
        .map_err(|e| ApiError::BadRequest(format!("Invalid JSON body: {}", e.body_text())))?;
    let features = parse_features(&payload)?;

    info!("Forwarding {} features for prediction", features.len());
    let result = state.upstream.predict_features(&features).await;
    settle(&state, result).await
}

/// POST /analyze-audio
pub async fn analyze_audio(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let mut multipart = multipart.map_err(|_| ApiError::BadRequest(NO_FILE.to_string()))?;
    let audio = read_file_field(&mut multipart).await?;

    info!(file = %audio.file_name, bytes = audio.bytes.len(), "Forwarding audio for analysis");
    let result = state.upstream.analyze_audio(audio).await;
    settle(&state, result).await
}

/// Build analysis routes
pub fn analysis_routes() -> Router<AppState> {
    Router::new()
        .route("/analyze-audio", post(analyze_audio))
        .route("/predict-from-features", post(predict_from_features))
}

fn parse_features(payload: &Value) -> ApiResult<Vec<f64>> {
    let invalid = || ApiError::BadRequest(INVALID_FEATURES.to_string());

    let items = payload
        .get("features")
        .and_then(Value::as_array)
        .ok_or_else(invalid)?;
    if items.len() != FEATURE_COUNT {
        return Err(invalid());
    }
    items
        .iter()
        .map(|v| v.as_f64().filter(|f| f.is_finite()).ok_or_else(invalid))
        .collect()
}

async fn read_file_field(multipart: &mut Multipart) -> ApiResult<AudioPart> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Malformed multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        let declared = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read upload: {}", e)))?;

        let mime = audio::validate_upload(&file_name, bytes.len())?;
        let content_type = declared
            .filter(|ct| ct.starts_with("audio/"))
            .unwrap_or_else(|| mime.to_string());

        return Ok(AudioPart {
            file_name,
            content_type,
            bytes: bytes.to_vec(),
        });
    }

    Err(ApiError::BadRequest(NO_FILE.to_string()))
}

async fn settle(
    state: &AppState,
    result: ApiResult<UpstreamReply>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    match result {
        Ok(reply) => {
            state.record_relayed().await;
            Ok((reply.status, Json(reply.body)))
        }
        Err(err) => {
            state.record_error(&err).await;
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_features_accepts_22_numbers() {
        let payload = json!({ "features": vec![0.5; FEATURE_COUNT] });
        assert_eq!(parse_features(&payload).unwrap().len(), FEATURE_COUNT);
    }

    #[test]
    fn test_parse_features_rejects_bad_shapes() {
        assert!(parse_features(&json!({})).is_err());
        assert!(parse_features(&json!({ "features": [1.0, 2.0] })).is_err());
        assert!(parse_features(&json!({ "features": "all" })).is_err());

        let mut mixed = vec![json!(1.0); FEATURE_COUNT];
        mixed[4] = json!("x");
        assert!(parse_features(&json!({ "features": mixed })).is_err());
    }
}
