//! Test Helper Utilities
//!
//! Shared fixtures for callscore-api integration tests: a temporary
//! database, fake collaborators and request builders.

#![allow(dead_code)]

pub mod fakes;

use axum::body::Body;
use axum::http::Request;
use callscore_api::models::{
    AnalysisResult, CallOutcome, CallRecord, CallStatus, CategoryScore, ProspectDifficulty,
    RoleplayMessage, RoleplayRole, RoleplaySession, RoleplayStatus,
};
use callscore_api::{AppState, Collaborators, ServiceSettings};
use callscore_common::config::SubscriptionMode;
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use uuid::Uuid;

pub use fakes::{CountingExtractor, FakeAdmission, FakeScoringEngine, FakeTranscriber};

pub const ORG_ID: &str = "org-1";
pub const USER_ID: &str = "user-1";

/// Create a temporary database with the full schema
///
/// Returns (TempDir, SqlitePool) - TempDir must be kept alive for duration of test
pub async fn create_test_db() -> (TempDir, SqlitePool) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("test_callscore.db");
    let pool = callscore_common::db::init_database(&db_path)
        .await
        .expect("Failed to initialize test database");
    (temp_dir, pool)
}

/// Application wired to fakes
pub struct TestApp {
    _temp_dir: TempDir,
    pub pool: SqlitePool,
    pub state: AppState,
    pub scoring: Arc<FakeScoringEngine>,
    pub transcriber: Arc<FakeTranscriber>,
    pub extractor: Arc<CountingExtractor>,
    pub admission: Arc<FakeAdmission>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_parts(
            FakeScoringEngine::succeeding(sample_analysis(None, None)),
            FakeAdmission::allowing(),
            ServiceSettings::default(),
        )
        .await
    }

    pub async fn with_parts(
        scoring: FakeScoringEngine,
        admission: FakeAdmission,
        settings: ServiceSettings,
    ) -> Self {
        let (temp_dir, pool) = create_test_db().await;

        let scoring = Arc::new(scoring);
        let transcriber = Arc::new(FakeTranscriber::succeeding(
            "Speaker A: Thanks for taking the call.\nSpeaker B: Happy to chat.",
        ));
        let extractor = Arc::new(CountingExtractor::default());
        let admission = Arc::new(admission);

        let collaborators = Collaborators {
            scoring: scoring.clone(),
            transcriber: transcriber.clone(),
            extractor: extractor.clone(),
            admission: admission.clone(),
        };
        let state = AppState::new(pool.clone(), collaborators, settings);

        Self {
            _temp_dir: temp_dir,
            pool,
            state,
            scoring,
            transcriber,
            extractor,
            admission,
        }
    }

    pub fn router(&self) -> axum::Router {
        callscore_api::build_router(self.state.clone())
    }
}

pub fn settings_with_max_audio(max_audio_bytes: usize) -> ServiceSettings {
    ServiceSettings {
        max_audio_bytes,
        ..ServiceSettings::default()
    }
}

pub fn bypassed_settings() -> ServiceSettings {
    ServiceSettings {
        subscription_mode: SubscriptionMode::Bypassed,
        ..ServiceSettings::default()
    }
}

/// Analysis result with fixed scores
pub fn sample_analysis(outcome: Option<CallOutcome>, execution_resistance: Option<f64>) -> AnalysisResult {
    let category = |score: f64| CategoryScore {
        score,
        details: serde_json::Map::new(),
    };

    AnalysisResult {
        overall_score: 72.0,
        value: category(80.0),
        trust: category(70.0),
        fit: category(65.0),
        logistics: category(75.0),
        skill_scores: BTreeMap::new(),
        coaching_recommendations: Vec::new(),
        timestamped_feedback: Vec::new(),
        prospect_difficulty: execution_resistance.map(|score| ProspectDifficulty {
            execution_resistance: Some(score),
            details: serde_json::Map::new(),
        }),
        outcome,
    }
}

/// Request with caller identity headers
pub fn authed(method: &str, uri: &str) -> axum::http::request::Builder {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("x-user-id", USER_ID)
        .header("x-organization-id", ORG_ID)
}

pub fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    authed(method, uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub const BOUNDARY: &str = "callscore-test-boundary";

/// One multipart part
pub struct Part<'a> {
    pub name: &'a str,
    pub file_name: Option<&'a str>,
    pub content_type: Option<&'a str>,
    pub data: Vec<u8>,
}

impl<'a> Part<'a> {
    pub fn file(file_name: &'a str, content_type: &'a str, data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: "file",
            file_name: Some(file_name),
            content_type: Some(content_type),
            data: data.into(),
        }
    }

    pub fn metadata(json: &str) -> Self {
        Self {
            name: "metadata",
            file_name: None,
            content_type: None,
            data: json.as_bytes().to_vec(),
        }
    }
}

pub fn multipart_request(uri: &str, parts: &[Part<'_>]) -> Request<Body> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part.file_name {
            Some(file_name) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                    part.name, file_name
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{}\"\r\n", part.name).as_bytes(),
            ),
        }
        if let Some(content_type) = part.content_type {
            body.extend_from_slice(format!("Content-Type: {}\r\n", content_type).as_bytes());
        }
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(&part.data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    authed("POST", uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
    use http_body_util::BodyExt;
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Poll until the call leaves `analyzing` (background analysis finished)
pub async fn wait_for_terminal_status(pool: &SqlitePool, call_id: Uuid) -> CallStatus {
    for _ in 0..200 {
        let status: String = sqlx::query_scalar("SELECT status FROM calls WHERE id = ?")
            .bind(call_id.to_string())
            .fetch_one(pool)
            .await
            .unwrap();
        let status: CallStatus = status.parse().unwrap();
        if status.is_terminal() {
            return status;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("call {} still analyzing", call_id);
}

/// Stored call for the default test organization
pub async fn stored_call(pool: &SqlitePool, call_id: Uuid) -> CallRecord {
    callscore_api::db::calls::load_call_for_organization(pool, call_id, ORG_ID)
        .await
        .unwrap()
        .unwrap_or_else(|| panic!("call {} not stored", call_id))
}

/// Roleplay session for the default caller, ended after the given messages
pub async fn seed_ended_session(
    pool: &SqlitePool,
    messages: &[(RoleplayRole, &str)],
) -> (RoleplaySession, Vec<RoleplayMessage>) {
    let mut session = RoleplaySession::new(ORG_ID, USER_ID);
    callscore_api::db::roleplay::insert_session(pool, &session).await.unwrap();

    let mut stored = Vec::new();
    for (role, content) in messages {
        let message = RoleplayMessage::new(session.id, *role, *content);
        assert!(callscore_api::db::roleplay::append_message(pool, &message).await.unwrap());
        stored.push(message);
    }

    assert!(callscore_api::db::roleplay::end_session(pool, session.id).await.unwrap());
    session.status = RoleplayStatus::Ended;
    (session, stored)
}

pub async fn count_rows(pool: &SqlitePool, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(pool)
        .await
        .unwrap()
}
