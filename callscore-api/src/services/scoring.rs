//! Scoring engine collaborator
//!
//! Turns a transcript into an [`AnalysisResult`]. The engine itself is a
//! remote service; this module defines the seam and an HTTP client for it.
//!
//! # API
//! - `POST {base_url}/v1/analyze` with `{"transcript", "transcriptJson"}`
//! - 2xx body: the analysis result
//! - 402 (or a billing message): credit exhausted

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use callscore_common::config::UpstreamConfig;

use crate::models::{AnalysisResult, TranscriptJson};

/// Shown to callers when the engine has no credit left
pub const CREDIT_REMEDIATION_MESSAGE: &str = "AI scoring is unavailable: the scoring account's credit balance is too low. Add credits in Plans & Billing, then score again.";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

static CREDIT_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)credit|balance|too low|payment|upgrade")
        .unwrap_or_else(|e| panic!("credit pattern: {}", e))
});

#[derive(Debug, Error)]
pub enum ScoringError {
    /// The engine's account cannot pay for the request
    #[error("Scoring credit exhausted: {0}")]
    CreditExhausted(String),

    #[error("Scoring engine not configured")]
    NotConfigured,

    /// Engine unreachable or timed out
    #[error("Scoring engine unavailable: {0}")]
    Unavailable(String),

    #[error("Scoring engine returned {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("Malformed scoring response: {0}")]
    MalformedResponse(String),
}

impl ScoringError {
    pub fn is_credit_exhausted(&self) -> bool {
        matches!(self, ScoringError::CreditExhausted(_))
    }
}

/// Classify an engine failure by status and message.
///
/// HTTP 402, or any message mentioning credit, balance, payment or an
/// upgrade, means the account is out of credit.
pub fn classify_failure(status: Option<u16>, message: &str) -> ScoringError {
    if status == Some(StatusCode::PAYMENT_REQUIRED.as_u16()) || CREDIT_PATTERN.is_match(message) {
        return ScoringError::CreditExhausted(message.to_string());
    }
    match status {
        Some(status) => ScoringError::Rejected {
            status,
            message: message.to_string(),
        },
        None => ScoringError::Unavailable(message.to_string()),
    }
}

/// Transcript in, scores out
#[async_trait]
pub trait ScoringEngine: Send + Sync {
    async fn analyze(
        &self,
        transcript: &str,
        transcript_json: &TranscriptJson,
    ) -> Result<AnalysisResult, ScoringError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeRequest<'a> {
    transcript: &'a str,
    transcript_json: &'a TranscriptJson,
}

/// HTTP scoring engine client
pub struct HttpScoringEngine {
    http_client: Client,
    base_url: Option<String>,
    api_key: Option<String>,
}

impl HttpScoringEngine {
    pub fn new(
        base_url: Option<String>,
        api_key: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, reqwest::Error> {
        let http_client = Client::builder()
            .timeout(timeout.unwrap_or(DEFAULT_TIMEOUT))
            .build()?;

        Ok(Self {
            http_client,
            base_url: base_url.map(|url| url.trim_end_matches('/').to_string()),
            api_key,
        })
    }

    /// Build from the `[scoring]` config section with an already-resolved key
    pub fn from_config(config: &UpstreamConfig, api_key: Option<String>) -> Result<Self, reqwest::Error> {
        Self::new(
            config.base_url.clone(),
            api_key,
            config.timeout_secs.map(Duration::from_secs),
        )
    }

    pub fn is_configured(&self) -> bool {
        self.base_url.is_some()
    }
}

#[async_trait]
impl ScoringEngine for HttpScoringEngine {
    async fn analyze(
        &self,
        transcript: &str,
        transcript_json: &TranscriptJson,
    ) -> Result<AnalysisResult, ScoringError> {
        let base_url = self.base_url.as_deref().ok_or(ScoringError::NotConfigured)?;
        let url = format!("{}/v1/analyze", base_url);

        debug!(
            utterances = transcript_json.len(),
            chars = transcript.len(),
            "Requesting analysis"
        );

        let mut request = self.http_client.post(&url).json(&AnalyzeRequest {
            transcript,
            transcript_json,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| classify_failure(None, &e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = upstream_error_message(&body);
            warn!(status = status.as_u16(), error = %message, "Scoring engine rejected request");
            return Err(classify_failure(Some(status.as_u16()), &message));
        }

        response
            .json::<AnalysisResult>()
            .await
            .map_err(|e| ScoringError::MalformedResponse(e.to_string()))
    }
}

/// Pull a human-readable message out of an upstream error body.
///
/// Accepts `{"error": {"message": ..}}`, `{"error": ".."}`, `{"message": ..}`
/// or falls back to the raw body.
pub(crate) fn upstream_error_message(body: &str) -> String {
    let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
    let message = parsed.as_ref().and_then(|value| {
        value
            .pointer("/error/message")
            .or_else(|| value.get("error"))
            .or_else(|| value.get("message"))
            .and_then(|m| m.as_str())
            .map(str::to_string)
    });

    match message {
        Some(message) => message,
        None if body.trim().is_empty() => "empty response body".to_string(),
        None => body.trim().to_string(),
    }
}
