//! Liveness and backlog endpoint

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;
use tracing::warn;

use crate::db;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `ok`, or `degraded` when the database does not answer
    pub status: &'static str,
    pub module: &'static str,
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub database: &'static str,
    /// Calls whose background analysis has not finished
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calls_analyzing: Option<i64>,
}

/// GET /health
///
/// Carries no per-call or per-organization detail; it is served without
/// caller identity.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime_seconds = Utc::now()
        .signed_duration_since(state.startup_time)
        .num_seconds()
        .max(0) as u64;

    let calls_analyzing = match db::calls::count_analyzing(&state.db).await {
        Ok(count) => Some(count),
        Err(e) => {
            warn!(error = %e, "Health check could not reach the database");
            None
        }
    };
    let (status, database) = match calls_analyzing {
        Some(_) => ("ok", "ok"),
        None => ("degraded", "unavailable"),
    };

    Json(HealthResponse {
        status,
        module: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds,
        database,
        calls_analyzing,
    })
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
