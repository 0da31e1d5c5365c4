//! Integration tests for voxscreen-client
//!
//! Most tests use in-process transports; the `http_` tests run the real
//! gateway in front of a fake inference service.

use async_trait::async_trait;
use axum::{extract::Multipart, http::StatusCode, routing::post, Json, Router};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use voxscreen_client::display::{PredictionSummary, POSITIVE_HEADLINE};
use voxscreen_client::recorder::BufferedCapture;
use voxscreen_client::session::MemoryStore;
use voxscreen_client::{
    AnalysisError, Analyzer, AppSession, AudioUpload, AudioUploadForm, GatewayClient,
    ManualEntryForm, PredictionTransport, SubmitOutcome, TransportError,
};
use voxscreen_common::{Normalizer, Preset, Probability, Verdict};
use voxscreen_gateway::upstream::InferenceClient;

/// Plays back scripted replies (the last one repeats) and remembers requests
struct FixedTransport {
    replies: Mutex<VecDeque<Result<Value, TransportError>>>,
    features_seen: Mutex<Vec<Vec<f64>>>,
    files_seen: Mutex<Vec<String>>,
}

impl FixedTransport {
    fn new(reply: Result<Value, TransportError>) -> Arc<Self> {
        Self::scripted(vec![reply])
    }

    fn scripted(replies: Vec<Result<Value, TransportError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            features_seen: Mutex::new(Vec::new()),
            files_seen: Mutex::new(Vec::new()),
        })
    }

    fn next_reply(&self) -> Result<Value, TransportError> {
        let mut replies = self.replies.lock().unwrap();
        if replies.len() > 1 {
            replies.pop_front().unwrap()
        } else {
            replies.front().cloned().unwrap()
        }
    }
}

#[async_trait]
impl PredictionTransport for FixedTransport {
    async fn predict_from_features(&self, features: &[f64]) -> Result<Value, TransportError> {
        self.features_seen.lock().unwrap().push(features.to_vec());
        self.next_reply()
    }

    async fn analyze_audio(&self, upload: &AudioUpload) -> Result<Value, TransportError> {
        self.files_seen.lock().unwrap().push(upload.file_name.clone());
        self.next_reply()
    }
}

/// Waits `features[0]` ms, then answers positive when `features[1] > 0.5`;
/// audio always takes 300 ms and comes back positive
struct DelayedTransport;

#[async_trait]
impl PredictionTransport for DelayedTransport {
    async fn predict_from_features(&self, features: &[f64]) -> Result<Value, TransportError> {
        tokio::time::sleep(Duration::from_millis(features[0] as u64)).await;
        let verdict = if features[1] > 0.5 { "positive" } else { "negative" };
        Ok(json!({ "prediction": verdict, "probability": features[1] }))
    }

    async fn analyze_audio(&self, _upload: &AudioUpload) -> Result<Value, TransportError> {
        tokio::time::sleep(Duration::from_millis(300)).await;
        Ok(json!({ "prediction": 1, "probability": 0.7 }))
    }
}

fn analyzer_with(transport: Arc<dyn PredictionTransport>) -> Analyzer {
    Analyzer::new(transport, Normalizer::default())
}

fn delayed_form(delay_ms: f64, score: f64) -> ManualEntryForm {
    let mut form = ManualEntryForm::new();
    form.set("MDVP:Fo(Hz)", delay_ms).unwrap();
    form.set("MDVP:Fhi(Hz)", score).unwrap();
    form
}

// =============================================================================
// Manual entry
// =============================================================================

#[tokio::test]
async fn test_parkinsons_preset_end_to_end() {
    let transport = FixedTransport::new(Ok(json!({
        "prediction": "positive",
        "probability": 0.93,
        "message": "Voice pattern consistent with Parkinson's indicators",
    })));
    let analyzer = analyzer_with(transport.clone());

    let mut form = ManualEntryForm::new();
    form.load_preset(Preset::Parkinsons);
    let outcome = form.submit(&analyzer).await.unwrap();

    assert!(outcome.is_shown());
    let result = outcome.result();
    assert_eq!(result.verdict, Verdict::Positive);
    assert_eq!(result.probability, Probability::Known(0.93));

    let summary = PredictionSummary::new(result);
    assert_eq!(summary.confidence, "93%");
    assert_eq!(summary.headline, POSITIVE_HEADLINE);

    let sent = transport.features_seen.lock().unwrap();
    assert_eq!(sent[0], Preset::Parkinsons.values().to_vec());
    assert_eq!(analyzer.board().current().unwrap().verdict, Verdict::Positive);
    assert!(!form.is_submitting());
}

#[tokio::test(start_paused = true)]
async fn test_slow_older_response_is_discarded() {
    let analyzer = analyzer_with(Arc::new(DelayedTransport));
    let slow_positive = delayed_form(200.0, 0.9);
    let fast_negative = delayed_form(10.0, 0.1);

    let (first, second) = tokio::join!(
        slow_positive.submit(&analyzer),
        fast_negative.submit(&analyzer)
    );

    assert!(matches!(first.unwrap(), SubmitOutcome::Superseded(_)));
    assert!(second.unwrap().is_shown());
    assert_eq!(analyzer.board().current().unwrap().verdict, Verdict::Negative);
}

#[tokio::test(start_paused = true)]
async fn test_newest_request_wins_even_when_slowest() {
    let analyzer = analyzer_with(Arc::new(DelayedTransport));
    let fast_positive = delayed_form(10.0, 0.9);
    let slow_negative = delayed_form(200.0, 0.1);

    let (first, second) = tokio::join!(
        fast_positive.submit(&analyzer),
        slow_negative.submit(&analyzer)
    );

    assert!(!first.unwrap().is_shown());
    assert!(second.unwrap().is_shown());
    assert_eq!(analyzer.board().current().unwrap().verdict, Verdict::Negative);
}

#[tokio::test(start_paused = true)]
async fn test_second_submit_on_busy_form_is_refused() {
    let analyzer = analyzer_with(Arc::new(DelayedTransport));
    let form = delayed_form(100.0, 0.9);

    let (first, second) = tokio::join!(form.submit(&analyzer), form.submit(&analyzer));

    assert!(first.unwrap().is_shown());
    assert!(matches!(second, Err(AnalysisError::Busy)));
    assert!(!form.is_submitting());
}

#[tokio::test]
async fn test_failure_keeps_previous_result() {
    let transport = FixedTransport::scripted(vec![
        Ok(json!({ "prediction": "negative", "probability": 0.2 })),
        Err(TransportError::Rejected {
            status: 503,
            message: "Model not loaded".to_string(),
        }),
    ]);
    let analyzer = analyzer_with(transport);
    let form = ManualEntryForm::new();

    form.submit(&analyzer).await.unwrap();
    let err = form.submit(&analyzer).await.unwrap_err();

    assert_eq!(err.user_message(), "Model not loaded");
    let shown = analyzer.board().current().unwrap();
    assert_eq!(shown.verdict, Verdict::Negative);
    assert_eq!(shown.probability, Probability::Known(0.2));
    assert!(!form.is_submitting());
}

#[tokio::test]
async fn test_unrecognized_response_is_malformed() {
    let transport = FixedTransport::new(Ok(json!({ "status": "done" })));
    let analyzer = analyzer_with(transport);

    let err = ManualEntryForm::new().submit(&analyzer).await.unwrap_err();
    assert!(matches!(err, AnalysisError::Malformed(_)));
    assert!(analyzer.board().current().is_none());
}

// =============================================================================
// Audio
// =============================================================================

#[tokio::test]
async fn test_audio_submit_requires_a_file() {
    let analyzer = analyzer_with(FixedTransport::new(Ok(json!({}))));
    let form = AudioUploadForm::new();

    let err = form.submit(&analyzer).await.unwrap_err();
    assert!(matches!(err, AnalysisError::Validation(_)));
}

#[tokio::test(start_paused = true)]
async fn test_recording_submitted_after_auto_stop() {
    let transport = FixedTransport::new(Ok(json!({
        "result": "Healthy",
        "confidence": 0.81,
        "features_used_for_prediction": [150.0, 180.0],
    })));
    let analyzer = analyzer_with(transport.clone());

    let device = BufferedCapture::new(8_000);
    let feeder = device.feeder();
    let mut form = AudioUploadForm::new();
    form.start_recording(Box::new(device), 10).unwrap();
    feeder.push(&[500; 16_000]);

    assert!(form.submit(&analyzer).await.is_err());

    form.recording().unwrap().wait_for_auto_stop().await;
    assert_eq!(form.recording().unwrap().elapsed_secs(), 10);
    form.finish_recording().unwrap();

    let outcome = form.submit(&analyzer).await.unwrap();
    assert_eq!(outcome.result().verdict, Verdict::Negative);
    assert_eq!(outcome.result().features.get("MDVP:Fhi(Hz)"), Some(180.0));
    assert_eq!(form.upload_progress(), 100);
    assert_eq!(*transport.files_seen.lock().unwrap(), vec!["recording.wav"]);
}

#[tokio::test(start_paused = true)]
async fn test_auto_stopped_recording_submits_without_finish() {
    let transport = FixedTransport::new(Ok(json!({ "prediction": 0, "probability": 0.1 })));
    let analyzer = analyzer_with(transport.clone());

    let device = BufferedCapture::new(8_000);
    let feeder = device.feeder();
    let mut form = AudioUploadForm::new();
    form.start_recording(Box::new(device), 10).unwrap();
    feeder.push(&[500; 16_000]);

    form.recording().unwrap().wait_for_auto_stop().await;
    // The device is already stopped; late samples are dropped
    feeder.push(&[500; 8_000 * 60]);

    let outcome = form.submit(&analyzer).await.unwrap();
    assert_eq!(outcome.result().verdict, Verdict::Negative);
    assert_eq!(*transport.files_seen.lock().unwrap(), vec!["recording.wav"]);

    let settled = form.settle_recording().unwrap().unwrap();
    let reader = hound::WavReader::new(std::io::Cursor::new(settled.bytes.clone())).unwrap();
    assert_eq!(reader.len(), 16_000);
    assert!(form.recording().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_settle_leaves_running_recording_alone() {
    let mut form = AudioUploadForm::new();
    form.start_recording(Box::new(BufferedCapture::new(8_000)), 10)
        .unwrap();

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(form.settle_recording().unwrap().is_none());
    assert!(form.recording().is_some());
}

#[tokio::test(start_paused = true)]
async fn test_busy_audio_submit_keeps_running_progress() {
    let analyzer = analyzer_with(Arc::new(DelayedTransport));
    let mut form = AudioUploadForm::new();
    form.drop_file("voice.wav", vec![1; 64]).unwrap();

    let (first, (before, second, after)) = tokio::join!(form.submit(&analyzer), async {
        tokio::time::sleep(Duration::from_millis(200)).await;
        let before = form.upload_progress();
        let second = form.submit(&analyzer).await;
        (before, second, form.upload_progress())
    });

    assert!(before > 0);
    assert!(matches!(second, Err(AnalysisError::Busy)));
    assert_eq!(after, before);
    assert!(first.unwrap().is_shown());
    assert_eq!(form.upload_progress(), 100);
}

// =============================================================================
// Session history
// =============================================================================

#[tokio::test]
async fn test_shown_result_saved_to_history() {
    let analyzer = analyzer_with(FixedTransport::new(Ok(json!({
        "prediction": 1,
        "probability": 0.7,
    }))));
    let mut session = AppSession::restore(Box::new(MemoryStore::new())).unwrap();
    session.login("patient@example.com", "password").unwrap();

    let outcome = ManualEntryForm::new().submit(&analyzer).await.unwrap();
    session.record_result(outcome.result()).unwrap();

    let history = &session.user().unwrap().test_history;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].result.verdict, Verdict::Positive);
    assert!(history[0].id.starts_with("test-"));
}

// =============================================================================
// Over HTTP through the gateway
// =============================================================================

async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn gateway_in_front_of(upstream: Router) -> GatewayClient {
    let upstream_url = serve(upstream).await;
    let inference = InferenceClient::new(&upstream_url, Duration::from_secs(5)).unwrap();
    let gateway_url = serve(voxscreen_gateway::build_router(
        voxscreen_gateway::AppState::new(inference),
    ))
    .await;
    GatewayClient::new(&gateway_url, Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn http_manual_prediction_round_trip() {
    let upstream = Router::new().route(
        "/predict-features",
        post(|Json(body): Json<Value>| async move {
            let count = body["features"].as_array().map(Vec::len).unwrap_or(0);
            Json(json!({
                "result": "Parkinson's Disease",
                "probability": 0.93,
                "message": format!("{} features received", count),
                "features_processed": body["features"],
            }))
        }),
    );
    let client = gateway_in_front_of(upstream).await;
    let analyzer = Analyzer::new(Arc::new(client), Normalizer::default());

    let mut form = ManualEntryForm::new();
    form.load_preset(Preset::Parkinsons);
    let outcome = form.submit(&analyzer).await.unwrap();

    let result = outcome.result();
    assert_eq!(result.verdict, Verdict::Positive);
    assert_eq!(result.probability.percent_label(), "93%");
    assert_eq!(result.message.as_deref(), Some("22 features received"));
    assert_eq!(result.features, Preset::Parkinsons.values());
}

#[tokio::test]
async fn http_audio_upload_round_trip() {
    let upstream = Router::new().route(
        "/analyze_audio",
        post(|mut multipart: Multipart| async move {
            let field = multipart.next_field().await.unwrap().unwrap();
            let name = field.file_name().unwrap_or_default().to_string();
            Json(json!({
                "prediction": "negative",
                "probability": 0.12,
                "message": name,
            }))
        }),
    );
    let client = gateway_in_front_of(upstream).await;
    let analyzer = Analyzer::new(Arc::new(client), Normalizer::default());

    let mut form = AudioUploadForm::new();
    form.drop_file("sample.wav", vec![0u8; 256]).unwrap();
    let outcome = form.submit(&analyzer).await.unwrap();

    assert_eq!(outcome.result().verdict, Verdict::Negative);
    assert_eq!(outcome.result().message.as_deref(), Some("sample.wav"));
}

#[tokio::test]
async fn http_upstream_error_text_reaches_user() {
    let upstream = Router::new().route(
        "/predict-features",
        post(|| async {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "message": "Model not loaded" })),
            )
        }),
    );
    let client = gateway_in_front_of(upstream).await;
    let analyzer = Analyzer::new(Arc::new(client), Normalizer::default());

    let err = ManualEntryForm::new().submit(&analyzer).await.unwrap_err();
    match &err {
        AnalysisError::Transport(TransportError::Rejected { status, .. }) => {
            assert_eq!(*status, 503)
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(err.user_message(), "Model not loaded");
}

#[tokio::test]
async fn http_gateway_down_is_network_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = GatewayClient::new(&format!("http://{}", addr), Duration::from_secs(2)).unwrap();
    let analyzer = Analyzer::new(Arc::new(client), Normalizer::default());

    let err = ManualEntryForm::new().submit(&analyzer).await.unwrap_err();
    assert!(matches!(err, AnalysisError::Transport(TransportError::Network(_))));
    assert_eq!(err.user_message(), "An error occurred during analysis");
}
