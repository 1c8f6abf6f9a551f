//! Performance figures endpoint

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use callscore_common::YearMonth;
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};
use crate::models::{CallerIdentity, FiguresSummary};
use crate::services::figures_aggregator::compute_figures;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FiguresQuery {
    pub month: Option<String>,
    /// Viewer's offset from UTC in minutes (e.g. -300 for UTC-5)
    pub utc_offset_minutes: Option<i32>,
}

/// GET /api/performance/figures?month=YYYY-MM[&utcOffsetMinutes=N]
pub async fn get_figures(
    State(state): State<AppState>,
    caller: CallerIdentity,
    query: Result<Query<FiguresQuery>, axum::extract::rejection::QueryRejection>,
) -> ApiResult<Json<FiguresSummary>> {
    let Query(query) = query?;

    let month: YearMonth = query
        .month
        .as_deref()
        .ok_or_else(|| ApiError::BadRequest("month is required (YYYY-MM)".to_string()))?
        .parse()?;

    let offset = match query.utc_offset_minutes {
        Some(minutes) => callscore_common::time::offset_from_minutes(minutes)?,
        None => state.settings.default_utc_offset,
    };

    let summary = compute_figures(&state.db, &caller.user_id, month, offset).await?;
    Ok(Json(summary))
}

pub fn figures_routes() -> Router<AppState> {
    Router::new().route("/api/performance/figures", get(get_figures))
}
