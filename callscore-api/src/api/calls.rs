//! Call intake and status endpoints

use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Multipart, Path, Request, State};
use axum::http::{header, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::models::{AnalysisFailure, CallRecord, CallStatus, CallerIdentity, StoredAnalysis};
use crate::services::intake::{
    self, AudioUpload, ManualEntry, TranscriptSource, TranscriptSubmission,
};
use crate::services::scoring::CREDIT_REMEDIATION_MESSAGE;
use crate::AppState;

/// Returned by every intake endpoint
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntakeResponse {
    pub call_id: Uuid,
    pub status: CallStatus,
    pub message: String,
}

/// Call with its analysis, once there is one
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallDetailResponse {
    pub call: CallRecord,
    pub analysis: Option<StoredAnalysis>,
    /// Present only for failed calls
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureDetail>,
}

/// Why analysis failed, in the same code vocabulary as error bodies
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureDetail {
    pub code: &'static str,
    pub message: &'static str,
}

impl From<AnalysisFailure> for FailureDetail {
    fn from(reason: AnalysisFailure) -> Self {
        match reason {
            AnalysisFailure::CreditExhausted => Self {
                code: "CREDIT_EXHAUSTED",
                message: CREDIT_REMEDIATION_MESSAGE,
            },
            AnalysisFailure::Upstream => Self {
                code: "UPSTREAM_ERROR",
                message: "The scoring engine could not analyze this call. Re-analyze it to try again.",
            },
            AnalysisFailure::Storage => Self {
                code: "INTERNAL_ERROR",
                message: "The analysis could not be saved. Re-analyze the call to try again.",
            },
        }
    }
}

fn failure_detail(call: &CallRecord) -> Option<FailureDetail> {
    if call.status != CallStatus::Failed {
        return None;
    }
    // Rows failed before reasons were recorded
    Some(
        call.failure_reason
            .map(FailureDetail::from)
            .unwrap_or_else(|| FailureDetail::from(AnalysisFailure::Upstream)),
    )
}

/// Optional `metadata` multipart field
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadMetadata {
    add_to_figures: Option<bool>,
}

/// JSON body of a pasted transcript
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptBody {
    pub transcript: Option<String>,
    pub add_to_figures: Option<bool>,
    pub file_name: Option<String>,
}

struct UploadedFile {
    file_name: String,
    content_type: Option<String>,
    bytes: Vec<u8>,
}

/// Anything but an explicit `false` keeps the call in the figures
fn add_to_figures_from_metadata(raw: &str) -> bool {
    match serde_json::from_str::<UploadMetadata>(raw) {
        Ok(metadata) => metadata.add_to_figures != Some(false),
        Err(e) => {
            warn!(error = %e, "Ignoring unparseable upload metadata");
            true
        }
    }
}

/// Read the `file` and `metadata` fields of a multipart body
async fn read_multipart(mut multipart: Multipart) -> ApiResult<(Option<UploadedFile>, bool)> {
    let mut file = None;
    let mut add_to_figures = true;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await?.to_vec();
                file = Some(UploadedFile {
                    file_name,
                    content_type,
                    bytes,
                });
            }
            Some("metadata") => {
                let raw = field.text().await?;
                add_to_figures = add_to_figures_from_metadata(&raw);
            }
            _ => {}
        }
    }

    Ok((file, add_to_figures))
}

fn accepted(call: &CallRecord, message: &str) -> IntakeResponse {
    IntakeResponse {
        call_id: call.id,
        status: call.status,
        message: message.to_string(),
    }
}

/// POST /api/calls/upload
///
/// Multipart `file` (audio) plus optional `metadata` JSON. Transcribes before
/// returning; analysis continues in the background.
pub async fn upload_call(
    State(state): State<AppState>,
    caller: CallerIdentity,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<(StatusCode, Json<IntakeResponse>)> {
    let (file, add_to_figures) = read_multipart(multipart?).await?;
    let file = file.ok_or_else(|| ApiError::BadRequest("No file provided".to_string()))?;

    let upload = AudioUpload {
        file_name: file.file_name,
        content_type: file.content_type.unwrap_or_default(),
        bytes: file.bytes,
        add_to_figures,
    };

    let call = intake::intake_audio(&state, &caller, upload).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(accepted(&call, "Call uploaded successfully. Analysis in progress...")),
    ))
}

/// POST /api/calls/transcript
///
/// JSON `{transcript, addToFigures?, fileName?}` or multipart `file` +
/// optional `metadata`.
pub async fn create_transcript_call(
    State(state): State<AppState>,
    caller: CallerIdentity,
    request: Request,
) -> ApiResult<(StatusCode, Json<IntakeResponse>)> {
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.to_ascii_lowercase().starts_with("multipart/form-data"));

    let submission = if is_multipart {
        let multipart = Multipart::from_request(request, &state).await?;
        let (file, add_to_figures) = read_multipart(multipart).await?;
        let file = file.ok_or_else(|| {
            ApiError::BadRequest(
                "No file provided. Upload a .txt, .pdf, or .docx transcript file.".to_string(),
            )
        })?;
        TranscriptSubmission {
            source: TranscriptSource::Document {
                file_name: file.file_name,
                content_type: file.content_type,
                bytes: file.bytes,
            },
            add_to_figures,
        }
    } else {
        let body: Result<Json<TranscriptBody>, JsonRejection> =
            Json::from_request(request, &state).await;
        let Json(body) = body?;
        TranscriptSubmission {
            source: TranscriptSource::Pasted {
                text: body.transcript.unwrap_or_default(),
                file_name: body.file_name,
            },
            add_to_figures: body.add_to_figures != Some(false),
        }
    };

    let call = intake::intake_transcript(&state, &caller, submission).await?;
    Ok((
        StatusCode::CREATED,
        Json(accepted(&call, "Transcript saved. Analysis in progress...")),
    ))
}

/// POST /api/calls/manual
pub async fn log_manual_call(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<ManualEntry>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<IntakeResponse>)> {
    let Json(entry) = body?;
    let call = intake::intake_manual(&state, &caller, entry).await?;
    Ok((
        StatusCode::CREATED,
        Json(accepted(&call, "Call logged successfully (figures updated)")),
    ))
}

fn parse_call_id(raw: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| ApiError::NotFound(format!("Call {} not found", raw)))
}

/// GET /api/calls/{call_id}
///
/// Polled by clients to observe background analysis.
pub async fn get_call(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(call_id): Path<String>,
) -> ApiResult<Json<CallDetailResponse>> {
    let call_id = parse_call_id(&call_id)?;
    let call = db::calls::load_call_for_organization(&state.db, call_id, &caller.organization_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Call {} not found", call_id)))?;

    let analysis = db::analysis::load_call_analysis(&state.db, call_id).await?;
    let failure = failure_detail(&call);

    Ok(Json(CallDetailResponse {
        call,
        analysis,
        failure,
    }))
}

/// POST /api/calls/{call_id}/reanalyze
pub async fn reanalyze_call(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(call_id): Path<String>,
) -> ApiResult<(StatusCode, Json<IntakeResponse>)> {
    let call_id = parse_call_id(&call_id)?;
    let call = intake::reanalyze(&state, &caller, call_id).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(accepted(&call, "Re-analysis started")),
    ))
}

pub fn call_routes() -> Router<AppState> {
    Router::new()
        .route("/api/calls/upload", post(upload_call))
        .route("/api/calls/transcript", post(create_transcript_call))
        .route("/api/calls/manual", post(log_manual_call))
        .route("/api/calls/:call_id", get(get_call))
        .route("/api/calls/:call_id/reanalyze", post(reanalyze_call))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_defaults_to_figures() {
        assert!(add_to_figures_from_metadata("{}"));
        assert!(add_to_figures_from_metadata(r#"{"addToFigures": true}"#));
        assert!(add_to_figures_from_metadata("not json"));
        assert!(!add_to_figures_from_metadata(r#"{"addToFigures": false}"#));
    }

    #[test]
    fn test_failure_detail_only_for_failed_calls() {
        let mut call = CallRecord::manual("org", "user", Default::default(), Default::default(), None);
        call.failure_reason = Some(AnalysisFailure::CreditExhausted);
        assert_eq!(failure_detail(&call), None);

        call.status = CallStatus::Failed;
        let detail = failure_detail(&call).unwrap();
        assert_eq!(detail.code, "CREDIT_EXHAUSTED");
        assert_eq!(detail.message, CREDIT_REMEDIATION_MESSAGE);

        call.failure_reason = None;
        assert_eq!(failure_detail(&call).unwrap().code, "UPSTREAM_ERROR");
    }
}
