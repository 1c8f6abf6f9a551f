//! Background analysis of call records
//!
//! Runs after intake has returned:
//! 1. Score the transcript
//! 2. On failure mark the call `failed` with the reason (no analysis row,
//!    no retry)
//! 3. Add a prospect-difficulty coaching note
//! 4. Insert the analysis row and complete the call in one transaction,
//!    copying extracted outcome fields when the call feeds the figures
//!
//! Roleplay scoring shares steps 1 and 3 and persists to the roleplay tables.

use callscore_common::Error as CommonError;
use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::db;
use crate::error::ApiError;
use crate::models::{
    AnalysisFailure, AnalysisIntent, AnalysisResult, CallStatus, CoachingRecommendation, Priority, RoleplaySession,
    StoredAnalysis, TranscriptJson,
};
use crate::services::scoring::{ScoringEngine, ScoringError};

/// Category used for the prospect-difficulty note
pub const DIFFICULTY_CATEGORY: &str = "Prospect Difficulty";

#[derive(Debug, Error)]
pub enum OrchestrationError {
    #[error(transparent)]
    Scoring(#[from] ScoringError),

    #[error(transparent)]
    Storage(#[from] CommonError),

    #[error("Roleplay session {0} is not awaiting a score")]
    NotAwaitingScore(Uuid),
}

impl From<sqlx::Error> for OrchestrationError {
    fn from(err: sqlx::Error) -> Self {
        OrchestrationError::Storage(CommonError::Database(err))
    }
}

impl From<OrchestrationError> for ApiError {
    fn from(err: OrchestrationError) -> Self {
        match err {
            OrchestrationError::Scoring(e) => e.into(),
            OrchestrationError::Storage(e) => ApiError::Common(e),
            e @ OrchestrationError::NotAwaitingScore(_) => ApiError::Conflict(e.to_string()),
        }
    }
}

/// How a background run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisOutcome {
    /// Analysis stored and the call completed
    Completed { outcome_written: bool },
    /// Call marked failed
    Failed,
    /// Call had already left `analyzing`; nothing written
    Skipped,
}

/// Scored roleplay, as persisted
#[derive(Debug, Clone)]
pub struct RoleplayScore {
    pub session_id: Uuid,
    pub overall_score: f64,
    pub analysis: StoredAnalysis,
}

/// Coaching note derived from execution resistance (0-10).
///
/// Low resistance scores mean the prospect could not act on a yes, which
/// points at lead quality rather than the rep.
pub fn execution_resistance_note(execution_resistance: Option<f64>) -> Option<CoachingRecommendation> {
    let score = execution_resistance?;

    if score <= 4.0 {
        Some(CoachingRecommendation {
            priority: Priority::Medium,
            category: DIFFICULTY_CATEGORY.to_string(),
            issue: format!("Extreme execution resistance ({}/10)", score),
            explanation: "The prospect had severe limits on their ability to act (money, authority or time). \
                          This is a lead quality or structural blocker, not a rep skill failure."
                .to_string(),
            action: "Review lead qualification and targeting before the call is booked. \
                     Do not treat the result as a rep skill gap."
                .to_string(),
        })
    } else if score <= 7.0 {
        Some(CoachingRecommendation {
            priority: Priority::Low,
            category: DIFFICULTY_CATEGORY.to_string(),
            issue: format!("Partial execution ability ({}/10)", score),
            explanation: "The prospect could act only partially. Some limits on money, authority or \
                          time shaped the outcome."
                .to_string(),
            action: "Confirm budget, decision makers and timeline earlier so the offer can be \
                     structured around them."
                .to_string(),
        })
    } else {
        None
    }
}

/// Append the prospect-difficulty note, leaving every score untouched
pub fn augment_recommendations(result: &mut AnalysisResult) {
    if let Some(note) = execution_resistance_note(result.execution_resistance()) {
        result.coaching_recommendations.push(note);
    }
}

/// Runs scoring and commits its results
#[derive(Clone)]
pub struct AnalysisOrchestrator {
    db: SqlitePool,
    scoring: Arc<dyn ScoringEngine>,
}

impl AnalysisOrchestrator {
    pub fn new(db: SqlitePool, scoring: Arc<dyn ScoringEngine>) -> Self {
        Self { db, scoring }
    }

    /// Run the analysis on its own task; completion is visible only through
    /// the call's status.
    pub fn spawn(
        &self,
        call_id: Uuid,
        transcript: String,
        transcript_json: TranscriptJson,
    ) -> JoinHandle<AnalysisOutcome> {
        let orchestrator = self.clone();
        tokio::spawn(async move {
            orchestrator
                .run_analysis(call_id, &transcript, &transcript_json)
                .await
        })
    }

    pub async fn run_analysis(
        &self,
        call_id: Uuid,
        transcript: &str,
        transcript_json: &TranscriptJson,
    ) -> AnalysisOutcome {
        info!(call_id = %call_id, utterances = transcript_json.len(), "Starting call analysis");

        let result = match self.score(transcript, transcript_json).await {
            Ok(result) => result,
            Err(e) => {
                let reason = if e.is_credit_exhausted() {
                    AnalysisFailure::CreditExhausted
                } else {
                    AnalysisFailure::Upstream
                };
                error!(call_id = %call_id, reason = reason.as_str(), error = %e, "Analysis failed");
                self.mark_failed(call_id, reason).await;
                return AnalysisOutcome::Failed;
            }
        };

        match self.commit(call_id, &result).await {
            Ok(Some(outcome_written)) => {
                info!(
                    call_id = %call_id,
                    overall_score = result.overall_score,
                    outcome_written,
                    "Call analysis completed"
                );
                AnalysisOutcome::Completed { outcome_written }
            }
            Ok(None) => {
                warn!(call_id = %call_id, "Call no longer analyzing, discarded analysis");
                AnalysisOutcome::Skipped
            }
            Err(e) => {
                error!(call_id = %call_id, error = %e, "Failed to store analysis");
                self.mark_failed(call_id, AnalysisFailure::Storage).await;
                AnalysisOutcome::Failed
            }
        }
    }

    /// Score a transcript and add the difficulty note
    pub async fn score(
        &self,
        transcript: &str,
        transcript_json: &TranscriptJson,
    ) -> Result<AnalysisResult, ScoringError> {
        let mut result = self.scoring.analyze(transcript, transcript_json).await?;
        augment_recommendations(&mut result);
        Ok(result)
    }

    /// Insert the analysis and complete the call atomically.
    ///
    /// Returns `None` when the call is gone or no longer analyzing,
    /// otherwise whether outcome fields were written back.
    async fn commit(&self, call_id: Uuid, result: &AnalysisResult) -> Result<Option<bool>, CommonError> {
        let mut tx = self.db.begin().await?;

        let intent = match db::calls::load_lifecycle(&mut tx, call_id).await? {
            Some((CallStatus::Analyzing, intent)) => intent,
            Some(_) | None => {
                tx.rollback().await?;
                return Ok(None);
            }
        };

        db::analysis::insert_call_analysis(&mut tx, call_id, result).await?;

        let write_back = match intent {
            Some(AnalysisIntent::UpdateFigures) => result
                .outcome
                .as_ref()
                .map(|outcome| outcome.normalized())
                .filter(|outcome| outcome.has_any()),
            _ => None,
        };

        let updated =
            db::calls::complete_analysis(&mut tx, call_id, write_back.as_ref(), Utc::now()).await?;
        if !updated {
            tx.rollback().await?;
            return Ok(None);
        }

        tx.commit().await?;
        Ok(Some(write_back.is_some()))
    }

    async fn mark_failed(&self, call_id: Uuid, reason: AnalysisFailure) {
        match db::calls::mark_failed(&self.db, call_id, reason).await {
            Ok(true) => info!(call_id = %call_id, "Call marked failed"),
            Ok(false) => warn!(call_id = %call_id, "Call not analyzing, status left unchanged"),
            Err(e) => error!(call_id = %call_id, error = %e, "Failed to mark call failed"),
        }
    }

    /// Score a roleplay transcript synchronously and persist the result with
    /// the session completion in one transaction.
    pub async fn score_roleplay(
        &self,
        session: &RoleplaySession,
        transcript: &str,
        transcript_json: &TranscriptJson,
    ) -> Result<RoleplayScore, OrchestrationError> {
        info!(session_id = %session.id, utterances = transcript_json.len(), "Scoring roleplay session");

        let result = match self.score(transcript, transcript_json).await {
            Ok(result) => result,
            Err(e) => {
                error!(session_id = %session.id, error = %e, "Roleplay scoring failed");
                return Err(e.into());
            }
        };

        let mut tx = self.db.begin().await?;
        let analysis = db::analysis::insert_roleplay_analysis(&mut tx, session.id, &result).await?;
        let updated = db::roleplay::complete_session(
            &mut tx,
            session.id,
            result.overall_score,
            analysis.id,
            Utc::now(),
        )
        .await?;
        if !updated {
            tx.rollback().await?;
            return Err(OrchestrationError::NotAwaitingScore(session.id));
        }
        tx.commit().await?;

        info!(session_id = %session.id, overall_score = result.overall_score, "Roleplay scored");

        Ok(RoleplayScore {
            session_id: session.id,
            overall_score: result.overall_score,
            analysis,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_low_resistance_is_medium_priority() {
        let note = execution_resistance_note(Some(3.0)).unwrap();
        assert_eq!(note.priority, Priority::Medium);
        assert_eq!(note.category, DIFFICULTY_CATEGORY);
        assert!(note.explanation.contains("lead quality"));

        assert_eq!(execution_resistance_note(Some(4.0)).unwrap().priority, Priority::Medium);
    }

    #[test]
    fn test_middle_resistance_is_low_priority() {
        for score in [5.0, 6.5, 7.0] {
            assert_eq!(execution_resistance_note(Some(score)).unwrap().priority, Priority::Low);
        }
    }

    #[test]
    fn test_high_or_missing_resistance_adds_nothing() {
        assert!(execution_resistance_note(Some(8.0)).is_none());
        assert!(execution_resistance_note(Some(10.0)).is_none());
        assert!(execution_resistance_note(None).is_none());
    }
}
