//! Fake collaborators recording how they were called

use async_trait::async_trait;
use callscore_api::models::{AnalysisResult, TranscriptJson};
use callscore_api::services::{
    Action, AdmissionControl, AdmissionDecision, ExtractError, LocalTextExtractor, ScoringEngine,
    ScoringError, TextExtractor, Transcriber, Transcription, TranscriptionError, UsageMetric,
};
use callscore_common::config::SubscriptionMode;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Debug, Clone)]
pub enum ScoringBehavior {
    Succeed(AnalysisResult),
    CreditExhausted,
    Fail(String),
}

pub struct FakeScoringEngine {
    behavior: Mutex<ScoringBehavior>,
    calls: AtomicUsize,
    transcripts: Mutex<Vec<(String, TranscriptJson)>>,
}

impl FakeScoringEngine {
    pub fn new(behavior: ScoringBehavior) -> Self {
        Self {
            behavior: Mutex::new(behavior),
            calls: AtomicUsize::new(0),
            transcripts: Mutex::new(Vec::new()),
        }
    }

    pub fn succeeding(result: AnalysisResult) -> Self {
        Self::new(ScoringBehavior::Succeed(result))
    }

    pub fn out_of_credit() -> Self {
        Self::new(ScoringBehavior::CreditExhausted)
    }

    pub fn failing(message: &str) -> Self {
        Self::new(ScoringBehavior::Fail(message.to_string()))
    }

    pub fn set_behavior(&self, behavior: ScoringBehavior) {
        *self.behavior.lock().unwrap() = behavior;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_transcript(&self) -> Option<(String, TranscriptJson)> {
        self.transcripts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl ScoringEngine for FakeScoringEngine {
    async fn analyze(
        &self,
        transcript: &str,
        transcript_json: &TranscriptJson,
    ) -> Result<AnalysisResult, ScoringError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.transcripts
            .lock()
            .unwrap()
            .push((transcript.to_string(), transcript_json.clone()));

        let behavior = self.behavior.lock().unwrap().clone();
        match behavior {
            ScoringBehavior::Succeed(result) => Ok(result),
            ScoringBehavior::CreditExhausted => Err(ScoringError::CreditExhausted(
                "Your credit balance is too low".to_string(),
            )),
            ScoringBehavior::Fail(message) => Err(ScoringError::Rejected {
                status: 500,
                message,
            }),
        }
    }
}

pub struct FakeTranscriber {
    transcript: Option<String>,
    calls: AtomicUsize,
}

impl FakeTranscriber {
    pub fn succeeding(transcript: &str) -> Self {
        Self {
            transcript: Some(transcript.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            transcript: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe(
        &self,
        _audio: Vec<u8>,
        _file_name: &str,
        _content_type: &str,
    ) -> Result<Transcription, TranscriptionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.transcript {
            Some(transcript) => Ok(Transcription {
                transcript: transcript.clone(),
                transcript_json: TranscriptJson::default(),
                duration: Some(42.5),
            }),
            None => Err(TranscriptionError::Unavailable("connection refused".to_string())),
        }
    }
}

/// Real extractor that counts how often it was asked to work
#[derive(Default)]
pub struct CountingExtractor {
    inner: LocalTextExtractor,
    calls: AtomicUsize,
}

impl CountingExtractor {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextExtractor for CountingExtractor {
    async fn extract(
        &self,
        bytes: Vec<u8>,
        file_name: &str,
        mime_type: Option<&str>,
    ) -> Result<String, ExtractError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.extract(bytes, file_name, mime_type).await
    }
}

pub struct FakeAdmission {
    decision: AdmissionDecision,
    pub checks: Mutex<Vec<(String, Action, SubscriptionMode)>>,
    pub increments: Mutex<Vec<(String, UsageMetric, SubscriptionMode)>>,
}

impl FakeAdmission {
    pub fn allowing() -> Self {
        Self::with_decision(AdmissionDecision::allow())
    }

    pub fn denying(reason: &str) -> Self {
        Self::with_decision(AdmissionDecision::deny(reason))
    }

    fn with_decision(decision: AdmissionDecision) -> Self {
        Self {
            decision,
            checks: Mutex::new(Vec::new()),
            increments: Mutex::new(Vec::new()),
        }
    }

    pub fn check_count(&self) -> usize {
        self.checks.lock().unwrap().len()
    }

    pub fn increment_metrics(&self) -> Vec<UsageMetric> {
        self.increments.lock().unwrap().iter().map(|(_, m, _)| *m).collect()
    }
}

#[async_trait]
impl AdmissionControl for FakeAdmission {
    async fn can_perform_action(
        &self,
        organization_id: &str,
        action: Action,
        mode: SubscriptionMode,
    ) -> callscore_common::Result<AdmissionDecision> {
        self.checks
            .lock()
            .unwrap()
            .push((organization_id.to_string(), action, mode));
        Ok(self.decision.clone())
    }

    async fn increment_usage(
        &self,
        organization_id: &str,
        metric: UsageMetric,
        mode: SubscriptionMode,
    ) -> callscore_common::Result<()> {
        self.increments
            .lock()
            .unwrap()
            .push((organization_id.to_string(), metric, mode));
        Ok(())
    }
}
