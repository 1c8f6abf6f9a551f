//! Call records
//!
//! A call record moves `analyzing → completed | failed`; manual entries are
//! created `manual` and never change status again.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::TranscriptJson;

/// Which intake path produced the record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallOrigin {
    Upload,
    Transcript,
    Manual,
    Roleplay,
}

impl CallOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallOrigin::Upload => "upload",
            CallOrigin::Transcript => "transcript",
            CallOrigin::Manual => "manual",
            CallOrigin::Roleplay => "roleplay",
        }
    }
}

impl FromStr for CallOrigin {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upload" => Ok(CallOrigin::Upload),
            "transcript" => Ok(CallOrigin::Transcript),
            "manual" => Ok(CallOrigin::Manual),
            "roleplay" => Ok(CallOrigin::Roleplay),
            other => Err(format!("Unknown call origin: {}", other)),
        }
    }
}

/// Lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    /// Waiting on the scoring engine
    Analyzing,
    Completed,
    Failed,
    /// Entered by hand, never analyzed
    Manual,
}

impl CallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallStatus::Analyzing => "analyzing",
            CallStatus::Completed => "completed",
            CallStatus::Failed => "failed",
            CallStatus::Manual => "manual",
        }
    }

    /// No transition leaves a terminal status
    pub fn is_terminal(&self) -> bool {
        !matches!(self, CallStatus::Analyzing)
    }
}

impl FromStr for CallStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "analyzing" => Ok(CallStatus::Analyzing),
            "completed" => Ok(CallStatus::Completed),
            "failed" => Ok(CallStatus::Failed),
            "manual" => Ok(CallStatus::Manual),
            other => Err(format!("Unknown call status: {}", other)),
        }
    }
}

/// Why a call ended up `failed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisFailure {
    /// Scoring engine account is out of credit
    CreditExhausted,
    /// Scoring engine unreachable, rejected the request or answered garbage
    Upstream,
    /// Analysis produced but could not be stored
    Storage,
}

impl AnalysisFailure {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisFailure::CreditExhausted => "credit_exhausted",
            AnalysisFailure::Upstream => "upstream",
            AnalysisFailure::Storage => "storage",
        }
    }
}

impl FromStr for AnalysisFailure {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "credit_exhausted" => Ok(AnalysisFailure::CreditExhausted),
            "upstream" => Ok(AnalysisFailure::Upstream),
            "storage" => Ok(AnalysisFailure::Storage),
            other => Err(format!("Unknown analysis failure: {}", other)),
        }
    }
}

/// Whether the record may feed the monthly figures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisIntent {
    UpdateFigures,
    AnalysisOnly,
}

impl AnalysisIntent {
    pub fn from_add_to_figures(add_to_figures: bool) -> Self {
        if add_to_figures {
            AnalysisIntent::UpdateFigures
        } else {
            AnalysisIntent::AnalysisOnly
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisIntent::UpdateFigures => "update_figures",
            AnalysisIntent::AnalysisOnly => "analysis_only",
        }
    }
}

impl FromStr for AnalysisIntent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "update_figures" => Ok(AnalysisIntent::UpdateFigures),
            "analysis_only" => Ok(AnalysisIntent::AnalysisOnly),
            other => Err(format!("Unknown analysis intent: {}", other)),
        }
    }
}

/// Call result
///
/// Values outside the known set are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CallResult {
    Closed,
    Deposit,
    NoShow,
    Lost,
    FollowUp,
    Unqualified,
    Other(String),
}

impl CallResult {
    pub fn as_str(&self) -> &str {
        match self {
            CallResult::Closed => "closed",
            CallResult::Deposit => "deposit",
            CallResult::NoShow => "no_show",
            CallResult::Lost => "lost",
            CallResult::FollowUp => "follow_up",
            CallResult::Unqualified => "unqualified",
            CallResult::Other(value) => value,
        }
    }

    /// Closed or deposit
    pub fn is_sale(&self) -> bool {
        matches!(self, CallResult::Closed | CallResult::Deposit)
    }
}

impl From<String> for CallResult {
    fn from(value: String) -> Self {
        match value.as_str() {
            "closed" => CallResult::Closed,
            "deposit" => CallResult::Deposit,
            "no_show" => CallResult::NoShow,
            "lost" => CallResult::Lost,
            "follow_up" => CallResult::FollowUp,
            "unqualified" => CallResult::Unqualified,
            _ => CallResult::Other(value),
        }
    }
}

impl From<&str> for CallResult {
    fn from(value: &str) -> Self {
        CallResult::from(value.to_string())
    }
}

impl From<CallResult> for String {
    fn from(value: CallResult) -> Self {
        match value {
            CallResult::Other(value) => value,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for CallResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome fields of a call, all optional
///
/// Used both for what a rep supplied and for what the scoring engine
/// extracted from the conversation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallOutcome {
    #[serde(default)]
    pub result: Option<CallResult>,
    #[serde(default)]
    pub qualified: Option<bool>,
    #[serde(default)]
    pub cash_collected: Option<f64>,
    #[serde(default)]
    pub revenue_generated: Option<f64>,
    #[serde(default)]
    pub reason_for_outcome: Option<String>,
}

impl CallOutcome {
    /// Reason trimmed, blank reason dropped
    pub fn normalized(&self) -> Self {
        Self {
            reason_for_outcome: self
                .reason_for_outcome
                .as_deref()
                .map(str::trim)
                .filter(|reason| !reason.is_empty())
                .map(str::to_string),
            ..self.clone()
        }
    }

    pub fn has_any(&self) -> bool {
        self.result.is_some()
            || self.qualified.is_some()
            || self.cash_collected.is_some()
            || self.revenue_generated.is_some()
            || self.reason_for_outcome.is_some()
    }
}

/// Context a rep records alongside a manual entry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualContext {
    pub offer_id: Option<String>,
    pub offer_type: Option<String>,
    pub call_type: Option<String>,
    pub deposit_taken: Option<bool>,
}

/// One persisted call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRecord {
    pub id: Uuid,
    pub organization_id: String,
    pub user_id: String,
    pub origin: CallOrigin,
    pub file_name: String,
    pub file_size: Option<i64>,
    pub transcript: Option<String>,
    pub transcript_json: Option<TranscriptJson>,
    pub duration_seconds: Option<f64>,
    /// `None` only on rows written before intents existed
    pub analysis_intent: Option<AnalysisIntent>,
    pub status: CallStatus,
    #[serde(flatten)]
    pub outcome: CallOutcome,
    #[serde(flatten)]
    pub context: ManualContext,
    pub call_date: Option<DateTime<Utc>>,
    pub original_call_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Set only on `failed` records
    pub failure_reason: Option<AnalysisFailure>,
}

impl CallRecord {
    /// New record awaiting analysis
    #[allow(clippy::too_many_arguments)]
    pub fn analyzing(
        organization_id: &str,
        user_id: &str,
        origin: CallOrigin,
        file_name: impl Into<String>,
        file_size: Option<i64>,
        transcript: String,
        transcript_json: TranscriptJson,
        duration_seconds: Option<f64>,
        intent: AnalysisIntent,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            organization_id: organization_id.to_string(),
            user_id: user_id.to_string(),
            origin,
            file_name: file_name.into(),
            file_size,
            transcript: Some(transcript),
            transcript_json: Some(transcript_json),
            duration_seconds,
            analysis_intent: Some(intent),
            status: CallStatus::Analyzing,
            outcome: CallOutcome::default(),
            context: ManualContext::default(),
            call_date: None,
            original_call_id: None,
            created_at: Utc::now(),
            completed_at: None,
            failure_reason: None,
        }
    }

    /// Hand-entered record; it counts toward figures and is never analyzed
    pub fn manual(
        organization_id: &str,
        user_id: &str,
        outcome: CallOutcome,
        context: ManualContext,
        call_date: Option<DateTime<Utc>>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            organization_id: organization_id.to_string(),
            user_id: user_id.to_string(),
            origin: CallOrigin::Manual,
            file_name: "manual".to_string(),
            file_size: None,
            transcript: None,
            transcript_json: None,
            duration_seconds: None,
            analysis_intent: Some(AnalysisIntent::UpdateFigures),
            status: CallStatus::Manual,
            outcome: outcome.normalized(),
            context,
            call_date,
            original_call_id: None,
            created_at: now,
            completed_at: Some(now),
            failure_reason: None,
        }
    }

    /// Fresh analysis of the same conversation.
    ///
    /// Lineage always points at the root record so a chain of re-analyses is
    /// still booked once. Returns `None` when there is nothing to analyze.
    pub fn derivative(&self) -> Option<Self> {
        let transcript = self.transcript.clone().filter(|t| !t.trim().is_empty())?;
        if self.status == CallStatus::Manual {
            return None;
        }

        Some(Self {
            id: Uuid::new_v4(),
            organization_id: self.organization_id.clone(),
            user_id: self.user_id.clone(),
            origin: self.origin,
            file_name: self.file_name.clone(),
            file_size: self.file_size,
            transcript: Some(transcript),
            transcript_json: self.transcript_json.clone(),
            duration_seconds: self.duration_seconds,
            analysis_intent: self.analysis_intent,
            status: CallStatus::Analyzing,
            outcome: CallOutcome::default(),
            context: ManualContext::default(),
            call_date: self.call_date,
            original_call_id: Some(self.original_call_id.unwrap_or(self.id)),
            created_at: Utc::now(),
            completed_at: None,
            failure_reason: None,
        })
    }

    /// Date the call is reported under
    pub fn attribution_date(&self) -> DateTime<Utc> {
        self.call_date.unwrap_or(self.created_at)
    }
}
