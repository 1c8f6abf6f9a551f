//! callscore-api library interface
//!
//! Exposes the router, shared state and services for the binary and for
//! integration tests.

pub mod api;
pub mod db;
pub mod error;
pub mod models;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::extract::DefaultBodyLimit;
use axum::Router;
use callscore_common::config::{SubscriptionMode, TomlConfig};
use chrono::{DateTime, FixedOffset, Offset, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::services::{
    AdmissionControl, AnalysisOrchestrator, ScoringEngine, TextExtractor, Transcriber,
};

/// Room for multipart framing and the metadata field on top of the audio
const MULTIPART_OVERHEAD_BYTES: usize = 1024 * 1024;

/// External collaborators, injected so tests can substitute them
#[derive(Clone)]
pub struct Collaborators {
    pub scoring: Arc<dyn ScoringEngine>,
    pub transcriber: Arc<dyn Transcriber>,
    pub extractor: Arc<dyn TextExtractor>,
    pub admission: Arc<dyn AdmissionControl>,
}

/// Runtime settings resolved from configuration
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub subscription_mode: SubscriptionMode,
    pub max_audio_bytes: usize,
    /// Offset used for figures when the viewer sends none
    pub default_utc_offset: FixedOffset,
}

impl ServiceSettings {
    pub fn from_config(config: &TomlConfig, subscription_mode: SubscriptionMode) -> callscore_common::Result<Self> {
        Ok(Self {
            subscription_mode,
            max_audio_bytes: config.intake.max_audio_bytes,
            default_utc_offset: callscore_common::time::offset_from_minutes(
                config.figures.default_utc_offset_minutes,
            )?,
        })
    }
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            subscription_mode: SubscriptionMode::Enforced,
            max_audio_bytes: callscore_common::config::DEFAULT_MAX_AUDIO_BYTES,
            default_utc_offset: Utc.fix(),
        }
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    pub scoring: Arc<dyn ScoringEngine>,
    pub transcriber: Arc<dyn Transcriber>,
    pub extractor: Arc<dyn TextExtractor>,
    pub admission: Arc<dyn AdmissionControl>,
    pub settings: ServiceSettings,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(db: SqlitePool, collaborators: Collaborators, settings: ServiceSettings) -> Self {
        Self {
            db,
            scoring: collaborators.scoring,
            transcriber: collaborators.transcriber,
            extractor: collaborators.extractor,
            admission: collaborators.admission,
            settings,
            startup_time: Utc::now(),
        }
    }

    pub fn orchestrator(&self) -> AnalysisOrchestrator {
        AnalysisOrchestrator::new(self.db.clone(), self.scoring.clone())
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let body_limit = state
        .settings
        .max_audio_bytes
        .saturating_add(MULTIPART_OVERHEAD_BYTES);

    Router::new()
        .merge(api::call_routes())
        .merge(api::roleplay_routes())
        .merge(api::figures_routes())
        .merge(api::health_routes())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
