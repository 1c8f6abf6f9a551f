//! Transcription collaborator (audio to text)
//!
//! # API
//! - `POST {base_url}/v1/transcribe?fileName=..` with the raw audio as body
//! - 2xx body: `{"transcript", "transcriptJson", "duration"}`

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use callscore_common::config::UpstreamConfig;

use super::scoring::upstream_error_message;
use crate::models::TranscriptJson;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Error)]
pub enum TranscriptionError {
    #[error("Transcription engine not configured")]
    NotConfigured,

    #[error("Transcription engine unavailable: {0}")]
    Unavailable(String),

    #[error("Transcription engine returned {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("Malformed transcription response: {0}")]
    MalformedResponse(String),
}

/// Transcription output
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transcription {
    pub transcript: String,
    #[serde(default)]
    pub transcript_json: TranscriptJson,
    /// Audio length in seconds
    #[serde(default)]
    pub duration: Option<f64>,
}

#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(
        &self,
        audio: Vec<u8>,
        file_name: &str,
        content_type: &str,
    ) -> Result<Transcription, TranscriptionError>;
}

/// HTTP transcription client
pub struct HttpTranscriber {
    http_client: Client,
    base_url: Option<String>,
    api_key: Option<String>,
}

impl HttpTranscriber {
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
impl Transcriber for HttpTranscriber {
    async fn transcribe(
        &self,
        audio: Vec<u8>,
        file_name: &str,
        content_type: &str,
    ) -> Result<Transcription, TranscriptionError> {
        let base_url = self
            .base_url
            .as_deref()
            .ok_or(TranscriptionError::NotConfigured)?;
        let url = format!("{}/v1/transcribe", base_url);

        debug!(file_name, bytes = audio.len(), "Requesting transcription");

        let mut request = self
            .http_client
            .post(&url)
            .query(&[("fileName", file_name)])
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(audio);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| TranscriptionError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = upstream_error_message(&body);
            warn!(status = status.as_u16(), error = %message, "Transcription engine rejected request");
            return Err(TranscriptionError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<Transcription>()
            .await
            .map_err(|e| TranscriptionError::MalformedResponse(e.to_string()))
    }
}
