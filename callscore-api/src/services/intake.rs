//! Intake paths
//!
//! Each path validates its input, asks admission control, creates one call
//! record and hands analysis to the orchestrator without waiting for it.
//! Roleplay completion is the exception: it is scored before returning.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::models::{
    AnalysisIntent, CallOrigin, CallOutcome, CallRecord, CallResult, CallerIdentity, ManualContext,
    RoleplayMessage, RoleplayStatus, TranscriptJson, Utterance,
};
use crate::services::admission::Action;
use crate::services::analysis_orchestrator::RoleplayScore;
use crate::services::text_extractor::is_allowed_transcript_file;
use crate::services::transcript_normalizer::normalize;
use crate::AppState;

/// Media types accepted for audio uploads
pub const ALLOWED_AUDIO_TYPES: &[&str] = &[
    "audio/mpeg",
    "audio/mp3",
    "audio/wav",
    "audio/m4a",
    "audio/webm",
];

/// File name recorded for pasted transcripts
pub const DEFAULT_PASTED_FILE_NAME: &str = "pasted-transcript.txt";

/// Spacing of roleplay messages without a recorded timestamp (ms)
pub const ROLEPLAY_MESSAGE_SPACING_MS: u64 = 5000;

/// Assumed length of one roleplay message (ms)
pub const ROLEPLAY_MESSAGE_DURATION_MS: u64 = 3000;

/// An uploaded audio file
#[derive(Debug, Clone)]
pub struct AudioUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
    pub add_to_figures: bool,
}

/// Where transcript text comes from
#[derive(Debug, Clone)]
pub enum TranscriptSource {
    Pasted {
        text: String,
        file_name: Option<String>,
    },
    Document {
        file_name: String,
        content_type: Option<String>,
        bytes: Vec<u8>,
    },
}

#[derive(Debug, Clone)]
pub struct TranscriptSubmission {
    pub source: TranscriptSource,
    pub add_to_figures: bool,
}

/// Hand-entered call
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualEntry {
    pub result: Option<String>,
    pub reason_for_outcome: Option<String>,
    /// RFC 3339 timestamp or `YYYY-MM-DD`
    pub date: Option<String>,
    pub offer_id: Option<String>,
    pub offer_type: Option<String>,
    pub call_type: Option<String>,
    pub qualified: Option<bool>,
    pub cash_collected: Option<f64>,
    pub revenue_generated: Option<f64>,
    pub deposit_taken: Option<bool>,
}

fn base_media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Check an upload before anything is spent on it
pub fn validate_audio(upload: &AudioUpload, max_bytes: usize) -> ApiResult<()> {
    if upload.bytes.is_empty() {
        return Err(ApiError::BadRequest("No file provided".to_string()));
    }

    let media_type = base_media_type(&upload.content_type);
    if !ALLOWED_AUDIO_TYPES.contains(&media_type.as_str()) {
        return Err(ApiError::BadRequest(format!(
            "Invalid file type '{}'. Supported: MP3, WAV, M4A, WebM",
            upload.content_type
        )));
    }

    if upload.bytes.len() > max_bytes {
        return Err(ApiError::BadRequest(format!(
            "File too large. Maximum size is {} bytes",
            max_bytes
        )));
    }

    Ok(())
}

/// Parse an RFC 3339 timestamp or a bare date (midnight UTC)
pub fn parse_call_date(value: &str) -> ApiResult<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| ApiError::BadRequest(format!("Invalid date: {}", value)))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

async fn admit(state: &AppState, caller: &CallerIdentity, action: Action) -> ApiResult<()> {
    let decision = state
        .admission
        .can_perform_action(&caller.organization_id, action, state.settings.subscription_mode)
        .await?;

    if !decision.allowed {
        info!(
            organization_id = %caller.organization_id,
            action = action.as_str(),
            reason = decision.reason.as_deref().unwrap_or(""),
            "Admission denied"
        );
        return Err(ApiError::AdmissionDenied(
            decision
                .reason
                .unwrap_or_else(|| "Action not allowed on the current plan".to_string()),
        ));
    }
    Ok(())
}

/// Usage is recorded after the fact; a failure here does not undo the intake
async fn report_usage(state: &AppState, caller: &CallerIdentity, action: Action) {
    let metric = action.metric();
    if let Err(e) = state
        .admission
        .increment_usage(&caller.organization_id, metric, state.settings.subscription_mode)
        .await
    {
        warn!(
            organization_id = %caller.organization_id,
            metric = metric.as_str(),
            error = %e,
            "Failed to record usage"
        );
    }
}

/// Persist an analyzing record, charge usage and start the analysis
async fn create_and_schedule(state: &AppState, caller: &CallerIdentity, call: CallRecord) -> ApiResult<CallRecord> {
    db::calls::insert_call(&state.db, &call).await?;
    report_usage(state, caller, Action::UploadCall).await;

    let transcript = call.transcript.clone().unwrap_or_default();
    let transcript_json = call.transcript_json.clone().unwrap_or_default();
    // Dropped: completion is observed through the record's status
    let _ = state.orchestrator().spawn(call.id, transcript, transcript_json);

    info!(
        call_id = %call.id,
        origin = call.origin.as_str(),
        intent = call.analysis_intent.map(|i| i.as_str()).unwrap_or("none"),
        "Call created, analysis scheduled"
    );
    Ok(call)
}

/// Audio upload: validate, transcribe synchronously, then analyze in the
/// background. A transcription failure leaves no record behind.
pub async fn intake_audio(state: &AppState, caller: &CallerIdentity, upload: AudioUpload) -> ApiResult<CallRecord> {
    validate_audio(&upload, state.settings.max_audio_bytes)?;
    admit(state, caller, Action::UploadCall).await?;

    let file_size = upload.bytes.len() as i64;
    let transcription = state
        .transcriber
        .transcribe(upload.bytes, &upload.file_name, &base_media_type(&upload.content_type))
        .await
        .map_err(|e| {
            warn!(file_name = %upload.file_name, error = %e, "Transcription failed");
            ApiError::from(e)
        })?;

    let transcript = transcription.transcript.trim().to_string();
    if transcript.is_empty() {
        return Err(ApiError::Upstream(
            "Transcription returned no text".to_string(),
        ));
    }
    let transcript_json = if transcription.transcript_json.is_empty() {
        normalize(&transcript)
    } else {
        transcription.transcript_json
    };

    let call = CallRecord::analyzing(
        &caller.organization_id,
        &caller.user_id,
        CallOrigin::Upload,
        upload.file_name,
        Some(file_size),
        transcript,
        transcript_json,
        transcription.duration,
        AnalysisIntent::from_add_to_figures(upload.add_to_figures),
    );

    create_and_schedule(state, caller, call).await
}

/// Pasted text or an uploaded document
pub async fn intake_transcript(
    state: &AppState,
    caller: &CallerIdentity,
    submission: TranscriptSubmission,
) -> ApiResult<CallRecord> {
    let (text, file_name, file_size) = match submission.source {
        TranscriptSource::Pasted { text, file_name } => {
            if text.trim().is_empty() {
                return Err(ApiError::BadRequest(
                    "transcript (string) is required, or upload a .txt / .pdf / .docx file"
                        .to_string(),
                ));
            }
            admit(state, caller, Action::UploadCall).await?;
            let file_name = non_blank(file_name).unwrap_or_else(|| DEFAULT_PASTED_FILE_NAME.to_string());
            (text, file_name, None)
        }
        TranscriptSource::Document {
            file_name,
            content_type,
            bytes,
        } => {
            if bytes.is_empty() {
                return Err(ApiError::BadRequest(
                    "No file provided. Upload a .txt, .pdf, or .docx transcript file.".to_string(),
                ));
            }
            if !is_allowed_transcript_file(&file_name, content_type.as_deref()) {
                return Err(ApiError::BadRequest(
                    "Unsupported file type. Use .txt, .pdf, or .docx.".to_string(),
                ));
            }
            admit(state, caller, Action::UploadCall).await?;

            let file_size = bytes.len() as i64;
            let text = state
                .extractor
                .extract(bytes, &file_name, content_type.as_deref())
                .await
                .map_err(|e| ApiError::BadRequest(e.to_string()))?;
            if text.trim().is_empty() {
                return Err(ApiError::BadRequest(
                    "File appears empty or no text could be extracted.".to_string(),
                ));
            }
            (text, file_name, Some(file_size))
        }
    };

    let transcript = text.trim().to_string();
    let transcript_json = normalize(&transcript);

    let call = CallRecord::analyzing(
        &caller.organization_id,
        &caller.user_id,
        CallOrigin::Transcript,
        file_name,
        file_size,
        transcript,
        transcript_json,
        None,
        AnalysisIntent::from_add_to_figures(submission.add_to_figures),
    );

    create_and_schedule(state, caller, call).await
}

/// Manual entry: stored as `manual`, counted in figures, never analyzed
pub async fn intake_manual(state: &AppState, caller: &CallerIdentity, entry: ManualEntry) -> ApiResult<CallRecord> {
    let result = non_blank(entry.result);
    let reason = non_blank(entry.reason_for_outcome);
    let (result, reason) = match (result, reason) {
        (Some(result), Some(reason)) => (result, reason),
        _ => {
            return Err(ApiError::BadRequest(
                "Missing required fields: result, reasonForOutcome".to_string(),
            ))
        }
    };

    let call_date = match entry.date.as_deref().filter(|d| !d.trim().is_empty()) {
        Some(date) => parse_call_date(date)?,
        None => Utc::now(),
    };

    admit(state, caller, Action::LogManualCall).await?;

    let call = CallRecord::manual(
        &caller.organization_id,
        &caller.user_id,
        CallOutcome {
            result: Some(CallResult::from(result)),
            qualified: entry.qualified,
            cash_collected: entry.cash_collected,
            revenue_generated: entry.revenue_generated,
            reason_for_outcome: Some(reason),
        },
        ManualContext {
            offer_id: non_blank(entry.offer_id),
            offer_type: non_blank(entry.offer_type),
            call_type: non_blank(entry.call_type),
            deposit_taken: entry.deposit_taken,
        },
        Some(call_date),
    );

    db::calls::insert_call(&state.db, &call).await?;
    report_usage(state, caller, Action::LogManualCall).await;

    info!(call_id = %call.id, result = %call.outcome.result.as_ref().map(|r| r.as_str()).unwrap_or(""), "Manual call logged");
    Ok(call)
}

/// Fresh analysis of an existing call as a new record linked to the root
pub async fn reanalyze(state: &AppState, caller: &CallerIdentity, call_id: Uuid) -> ApiResult<CallRecord> {
    let original = db::calls::load_call_for_organization(&state.db, call_id, &caller.organization_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Call {} not found", call_id)))?;

    let derivative = original.derivative().ok_or_else(|| {
        ApiError::BadRequest(format!("Call {} has no transcript to analyze", call_id))
    })?;

    admit(state, caller, Action::UploadCall).await?;

    info!(
        call_id = %derivative.id,
        original_call_id = ?derivative.original_call_id,
        "Re-analysis requested"
    );
    create_and_schedule(state, caller, derivative).await
}

/// Transcript text and utterances for a roleplay conversation.
///
/// Rep speaks as `A`, prospect as `B`. Messages without a recorded time are
/// spaced 5 s apart; each lasts 3 s.
pub fn roleplay_transcript(messages: &[RoleplayMessage]) -> (String, TranscriptJson) {
    let transcript = messages
        .iter()
        .map(|msg| format!("[{}] {}", msg.role.display_name(), msg.content))
        .collect::<Vec<_>>()
        .join("\n\n");

    let utterances = messages
        .iter()
        .enumerate()
        .map(|(idx, msg)| {
            // A zero timestamp counts as unrecorded
            let start = msg
                .timestamp_ms
                .filter(|ms| *ms > 0)
                .unwrap_or(idx as u64 * ROLEPLAY_MESSAGE_SPACING_MS);
            Utterance {
                speaker: msg.role.speaker().to_string(),
                start,
                end: start + ROLEPLAY_MESSAGE_DURATION_MS,
                text: msg.content.clone(),
            }
        })
        .collect();

    (transcript, TranscriptJson { utterances })
}

/// Score a finished roleplay session before returning
pub async fn score_roleplay(state: &AppState, caller: &CallerIdentity, session_id: Uuid) -> ApiResult<RoleplayScore> {
    let session = db::roleplay::load_session_for_caller(
        &state.db,
        session_id,
        &caller.organization_id,
        &caller.user_id,
    )
    .await?
    .ok_or_else(|| ApiError::NotFound("Roleplay session not found".to_string()))?;

    match session.status {
        RoleplayStatus::Ended => {}
        RoleplayStatus::InProgress => {
            return Err(ApiError::Conflict(format!(
                "Roleplay session {} has not ended",
                session_id
            )));
        }
        RoleplayStatus::Completed => {
            return Err(ApiError::Conflict(format!(
                "Roleplay session {} was already scored",
                session_id
            )));
        }
    }

    let messages = db::roleplay::load_messages(&state.db, session_id).await?;
    if messages.is_empty() {
        return Err(ApiError::BadRequest("No messages found in session".to_string()));
    }

    admit(state, caller, Action::ScoreRoleplay).await?;

    let (transcript, transcript_json) = roleplay_transcript(&messages);
    let score = state
        .orchestrator()
        .score_roleplay(&session, &transcript, &transcript_json)
        .await?;

    report_usage(state, caller, Action::ScoreRoleplay).await;
    Ok(score)
}
