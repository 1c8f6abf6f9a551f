//! HTTP collaborator clients against a stub upstream served by axum

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::Router;
use callscore_api::models::{TranscriptJson, Utterance};
use callscore_api::services::{
    normalize, HttpScoringEngine, HttpTranscriber, ScoringEngine, ScoringError, Transcriber,
    TranscriptionError,
};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// What the stub saw on its last request
#[derive(Debug, Default, Clone)]
struct Captured {
    authorization: Option<String>,
    content_type: Option<String>,
    query: HashMap<String, String>,
    body: Vec<u8>,
}

#[derive(Clone)]
struct Stub {
    status: StatusCode,
    body: String,
    captured: Arc<Mutex<Option<Captured>>>,
}

async fn respond(
    State(stub): State<Stub>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    *stub.captured.lock().unwrap() = Some(Captured {
        authorization: header("authorization"),
        content_type: header("content-type"),
        query,
        body: body.to_vec(),
    });
    (stub.status, stub.body.clone())
}

/// Serve one canned response on `route`; returns the base URL
async fn start_stub(
    route: &str,
    status: u16,
    body: serde_json::Value,
) -> (String, Arc<Mutex<Option<Captured>>>) {
    let body = match body {
        serde_json::Value::String(raw) => raw,
        other => other.to_string(),
    };
    let captured = Arc::new(Mutex::new(None));
    let stub = Stub {
        status: StatusCode::from_u16(status).unwrap(),
        body,
        captured: captured.clone(),
    };
    let app = Router::new().route(route, post(respond)).with_state(stub);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), captured)
}

fn analysis_body() -> serde_json::Value {
    json!({
        "overallScore": 81,
        "value": {"score": 85, "summary": "Clear value framing"},
        "trust": {"score": 78},
        "fit": {"score": 80},
        "logistics": {"score": 82},
        "coachingRecommendations": [{
            "priority": "high",
            "category": "Trust",
            "issue": "Rushed close",
            "explanation": "Moved to price before rapport",
            "action": "Ask one more discovery question"
        }],
        "prospectDifficulty": {"executionResistance": 6, "notes": "Busy founder"},
        "outcome": {"result": "closed", "qualified": true}
    })
}

fn scoring_client(base_url: &str) -> HttpScoringEngine {
    HttpScoringEngine::new(
        Some(format!("{}/", base_url)),
        Some("test-key".to_string()),
        Some(Duration::from_secs(5)),
    )
    .unwrap()
}

#[tokio::test]
async fn test_scoring_success() {
    let (base_url, captured) = start_stub("/v1/analyze", 200, analysis_body()).await;

    let result = scoring_client(&base_url)
        .analyze("Speaker A: hi", &normalize("Speaker A: hi"))
        .await
        .unwrap();

    assert_eq!(result.overall_score, 81.0);
    assert_eq!(result.value.score, 85.0);
    assert_eq!(result.value.details["summary"], "Clear value framing");
    assert_eq!(result.coaching_recommendations.len(), 1);
    assert_eq!(result.execution_resistance(), Some(6.0));
    assert!(result.timestamped_feedback.is_empty());
    assert_eq!(result.outcome.unwrap().qualified, Some(true));

    let captured = captured.lock().unwrap().clone().unwrap();
    assert_eq!(captured.authorization.as_deref(), Some("Bearer test-key"));
    let sent: serde_json::Value = serde_json::from_slice(&captured.body).unwrap();
    assert_eq!(sent["transcript"], "Speaker A: hi");
    assert_eq!(sent["transcriptJson"]["utterances"][0]["text"], "hi");
}

#[tokio::test]
async fn test_scoring_payment_required_is_credit_exhaustion() {
    let (base_url, _) = start_stub("/v1/analyze", 402, json!("payment required")).await;

    let err = scoring_client(&base_url)
        .analyze("hi", &TranscriptJson::default())
        .await
        .unwrap_err();
    assert!(err.is_credit_exhausted());
}

#[tokio::test]
async fn test_scoring_billing_message_is_credit_exhaustion() {
    let (base_url, _) = start_stub(
        "/v1/analyze",
        400,
        json!({"error": {"message": "Your credit balance is too low to access the API"}}),
    )
    .await;

    let err = scoring_client(&base_url)
        .analyze("hi", &TranscriptJson::default())
        .await
        .unwrap_err();
    match err {
        ScoringError::CreditExhausted(message) => {
            assert_eq!(message, "Your credit balance is too low to access the API")
        }
        other => panic!("expected credit exhaustion, got {:?}", other),
    }
}

#[tokio::test]
async fn test_scoring_server_error_is_rejected() {
    let (base_url, _) = start_stub("/v1/analyze", 500, json!({"error": "model overloaded"})).await;

    let err = scoring_client(&base_url)
        .analyze("hi", &TranscriptJson::default())
        .await
        .unwrap_err();
    match err {
        ScoringError::Rejected { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "model overloaded");
        }
        other => panic!("expected rejection, got {:?}", other),
    }
}

#[tokio::test]
async fn test_scoring_malformed_body() {
    let (base_url, _) = start_stub("/v1/analyze", 200, json!("not json")).await;

    let err = scoring_client(&base_url)
        .analyze("hi", &TranscriptJson::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ScoringError::MalformedResponse(_)));
}

#[tokio::test]
async fn test_unconfigured_scoring_engine() {
    let client = HttpScoringEngine::new(None, None, None).unwrap();
    assert!(!client.is_configured());

    let err = client.analyze("hi", &TranscriptJson::default()).await.unwrap_err();
    assert!(matches!(err, ScoringError::NotConfigured));
}

#[tokio::test]
async fn test_transcription_success() {
    let (base_url, captured) = start_stub(
        "/v1/transcribe",
        200,
        json!({
            "transcript": "Speaker A: Hello",
            "transcriptJson": {"utterances": [
                {"speaker": "A", "start": 0, "end": 1500, "text": "Hello"}
            ]},
            "duration": 93.2
        }),
    )
    .await;

    let client = HttpTranscriber::new(Some(base_url), Some("stt-key".to_string()), None).unwrap();
    let transcription = client
        .transcribe(vec![1, 2, 3], "call.mp3", "audio/mpeg")
        .await
        .unwrap();

    assert_eq!(transcription.transcript, "Speaker A: Hello");
    assert_eq!(transcription.duration, Some(93.2));
    assert_eq!(
        transcription.transcript_json.utterances,
        vec![Utterance {
            speaker: "A".to_string(),
            start: 0,
            end: 1500,
            text: "Hello".to_string(),
        }]
    );

    let captured = captured.lock().unwrap().clone().unwrap();
    assert_eq!(captured.authorization.as_deref(), Some("Bearer stt-key"));
    assert_eq!(captured.content_type.as_deref(), Some("audio/mpeg"));
    assert_eq!(captured.query.get("fileName").map(String::as_str), Some("call.mp3"));
    assert_eq!(captured.body, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_transcription_failure() {
    let (base_url, _) = start_stub("/v1/transcribe", 503, json!({"message": "busy"})).await;

    let client = HttpTranscriber::new(Some(base_url), None, None).unwrap();
    let err = client
        .transcribe(vec![0; 8], "call.wav", "audio/wav")
        .await
        .unwrap_err();

    match err {
        TranscriptionError::Rejected { status, message } => {
            assert_eq!(status, 503);
            assert_eq!(message, "busy");
        }
        other => panic!("expected rejection, got {:?}", other),
    }
}
