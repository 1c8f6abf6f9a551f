//! Roleplay session endpoints
//!
//! A session is created in progress, collects messages until it is ended,
//! and is then scored once.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::models::{
    CallerIdentity, RoleplayMessage, RoleplayRole, RoleplaySession, RoleplayStatus, StoredAnalysis,
};
use crate::services::intake;
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleplayScoreResponse {
    pub session_id: Uuid,
    pub overall_score: f64,
    pub analysis: StoredAnalysis,
    pub message: String,
}

/// Session with its transcript so far and its analysis once scored
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleplayDetailResponse {
    pub session: RoleplaySession,
    pub messages: Vec<RoleplayMessage>,
    pub analysis: Option<StoredAnalysis>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessage {
    pub role: RoleplayRole,
    pub content: String,
    #[serde(default)]
    pub timestamp_ms: Option<u64>,
}

fn session_not_found() -> ApiError {
    ApiError::NotFound("Roleplay session not found".to_string())
}

/// Session owned by the caller, or 404 for malformed ids and strangers alike
async fn owned_session(
    state: &AppState,
    caller: &CallerIdentity,
    session_id: &str,
) -> ApiResult<RoleplaySession> {
    let session_id = Uuid::parse_str(session_id).map_err(|_| session_not_found())?;
    db::roleplay::load_session_for_caller(
        &state.db,
        session_id,
        &caller.organization_id,
        &caller.user_id,
    )
    .await?
    .ok_or_else(session_not_found)
}

/// POST /api/roleplay
pub async fn create_session(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> ApiResult<(StatusCode, Json<RoleplaySession>)> {
    let session = RoleplaySession::new(&caller.organization_id, &caller.user_id);
    db::roleplay::insert_session(&state.db, &session).await?;

    info!(session_id = %session.id, user_id = %caller.user_id, "Roleplay session started");
    Ok((StatusCode::CREATED, Json(session)))
}

/// GET /api/roleplay/{session_id}
pub async fn get_session(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(session_id): Path<String>,
) -> ApiResult<Json<RoleplayDetailResponse>> {
    let session = owned_session(&state, &caller, &session_id).await?;
    let messages = db::roleplay::load_messages(&state.db, session.id).await?;
    let analysis = db::analysis::load_roleplay_analysis(&state.db, session.id).await?;

    Ok(Json(RoleplayDetailResponse {
        session,
        messages,
        analysis,
    }))
}

/// POST /api/roleplay/{session_id}/messages
pub async fn add_message(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(session_id): Path<String>,
    body: Result<Json<NewMessage>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<RoleplayMessage>)> {
    let session = owned_session(&state, &caller, &session_id).await?;
    let Json(body) = body?;

    let content = body.content.trim();
    if content.is_empty() {
        return Err(ApiError::BadRequest("Message content is required".to_string()));
    }

    let mut message = RoleplayMessage::new(session.id, body.role, content);
    if let Some(timestamp_ms) = body.timestamp_ms {
        message = message.with_timestamp(timestamp_ms);
    }

    if !db::roleplay::append_message(&state.db, &message).await? {
        return Err(ApiError::Conflict(format!(
            "Roleplay session {} is no longer accepting messages",
            session.id
        )));
    }

    Ok((StatusCode::CREATED, Json(message)))
}

/// POST /api/roleplay/{session_id}/end
pub async fn end_session(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(session_id): Path<String>,
) -> ApiResult<Json<RoleplaySession>> {
    let mut session = owned_session(&state, &caller, &session_id).await?;

    if !db::roleplay::end_session(&state.db, session.id).await? {
        return Err(ApiError::Conflict(format!(
            "Roleplay session {} has already ended",
            session.id
        )));
    }
    session.status = RoleplayStatus::Ended;

    info!(session_id = %session.id, "Roleplay session ended");
    Ok(Json(session))
}

/// POST /api/roleplay/{session_id}/score
pub async fn score_roleplay(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(session_id): Path<String>,
) -> ApiResult<Json<RoleplayScoreResponse>> {
    let session_id = Uuid::parse_str(&session_id).map_err(|_| session_not_found())?;

    let score = intake::score_roleplay(&state, &caller, session_id).await?;

    Ok(Json(RoleplayScoreResponse {
        session_id: score.session_id,
        overall_score: score.overall_score,
        analysis: score.analysis,
        message: "Roleplay scored successfully".to_string(),
    }))
}

pub fn roleplay_routes() -> Router<AppState> {
    Router::new()
        .route("/api/roleplay", post(create_session))
        .route("/api/roleplay/:session_id", get(get_session))
        .route("/api/roleplay/:session_id/messages", post(add_message))
        .route("/api/roleplay/:session_id/end", post(end_session))
        .route("/api/roleplay/:session_id/score", post(score_roleplay))
}
