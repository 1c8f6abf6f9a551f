//! Analysis result persistence
//!
//! Call analyses live in `call_analysis`, roleplay analyses in
//! `roleplay_analysis`. Both tables allow one row per subject.

use callscore_common::Result;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use uuid::Uuid;

use super::{from_json, parse_timestamp, parse_uuid, to_json};
use crate::models::{AnalysisResult, StoredAnalysis};

/// Serialized column values shared by both analysis tables
struct AnalysisColumns {
    value_details: String,
    trust_details: String,
    fit_details: String,
    logistics_details: String,
    skill_scores: String,
    coaching_recommendations: String,
    timestamped_feedback: String,
}

impl AnalysisColumns {
    fn from_result(result: &AnalysisResult) -> Result<Self> {
        Ok(Self {
            value_details: to_json(&result.value, "value_details")?,
            trust_details: to_json(&result.trust, "trust_details")?,
            fit_details: to_json(&result.fit, "fit_details")?,
            logistics_details: to_json(&result.logistics, "logistics_details")?,
            skill_scores: to_json(&result.skill_scores, "skill_scores")?,
            coaching_recommendations: to_json(&result.coaching_recommendations, "coaching_recommendations")?,
            timestamped_feedback: to_json(&result.timestamped_feedback, "timestamped_feedback")?,
        })
    }
}

/// Insert the analysis row for a call
pub async fn insert_call_analysis(
    conn: &mut SqliteConnection,
    call_id: Uuid,
    result: &AnalysisResult,
) -> Result<StoredAnalysis> {
    let stored = StoredAnalysis {
        id: Uuid::new_v4(),
        subject_id: call_id,
        result: result.clone(),
        created_at: Utc::now(),
    };
    let columns = AnalysisColumns::from_result(result)?;
    let prospect_difficulty = result
        .prospect_difficulty
        .as_ref()
        .map(|d| to_json(d, "prospect_difficulty"))
        .transpose()?;
    let outcome = result
        .outcome
        .as_ref()
        .map(|o| to_json(o, "outcome"))
        .transpose()?;

    sqlx::query(
        r#"
        INSERT INTO call_analysis (
            id, call_id, overall_score, value_score, trust_score, fit_score, logistics_score,
            value_details, trust_details, fit_details, logistics_details, skill_scores,
            coaching_recommendations, timestamped_feedback, prospect_difficulty, outcome, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(stored.id.to_string())
    .bind(call_id.to_string())
    .bind(result.overall_score)
    .bind(result.value.score)
    .bind(result.trust.score)
    .bind(result.fit.score)
    .bind(result.logistics.score)
    .bind(&columns.value_details)
    .bind(&columns.trust_details)
    .bind(&columns.fit_details)
    .bind(&columns.logistics_details)
    .bind(&columns.skill_scores)
    .bind(&columns.coaching_recommendations)
    .bind(&columns.timestamped_feedback)
    .bind(prospect_difficulty)
    .bind(outcome)
    .bind(stored.created_at.to_rfc3339())
    .execute(&mut *conn)
    .await?;

    Ok(stored)
}

/// Insert the analysis row for a roleplay session
pub async fn insert_roleplay_analysis(
    conn: &mut SqliteConnection,
    session_id: Uuid,
    result: &AnalysisResult,
) -> Result<StoredAnalysis> {
    let stored = StoredAnalysis {
        id: Uuid::new_v4(),
        subject_id: session_id,
        result: result.clone(),
        created_at: Utc::now(),
    };
    let columns = AnalysisColumns::from_result(result)?;

    sqlx::query(
        r#"
        INSERT INTO roleplay_analysis (
            id, roleplay_session_id, overall_score, value_score, trust_score, fit_score,
            logistics_score, value_details, trust_details, fit_details, logistics_details,
            skill_scores, coaching_recommendations, timestamped_feedback, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(stored.id.to_string())
    .bind(session_id.to_string())
    .bind(result.overall_score)
    .bind(result.value.score)
    .bind(result.trust.score)
    .bind(result.fit.score)
    .bind(result.logistics.score)
    .bind(&columns.value_details)
    .bind(&columns.trust_details)
    .bind(&columns.fit_details)
    .bind(&columns.logistics_details)
    .bind(&columns.skill_scores)
    .bind(&columns.coaching_recommendations)
    .bind(&columns.timestamped_feedback)
    .bind(stored.created_at.to_rfc3339())
    .execute(&mut *conn)
    .await?;

    Ok(stored)
}

pub async fn load_call_analysis(pool: &SqlitePool, call_id: Uuid) -> Result<Option<StoredAnalysis>> {
    let row = sqlx::query(
        r#"
        SELECT id, call_id, overall_score, value_details, trust_details, fit_details,
               logistics_details, skill_scores, coaching_recommendations,
               timestamped_feedback, prospect_difficulty, outcome, created_at
        FROM call_analysis
        WHERE call_id = ?
        "#,
    )
    .bind(call_id.to_string())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(|row| analysis_from_row(row, "call_id")).transpose()
}

fn analysis_from_row(row: &SqliteRow, subject_column: &str) -> Result<StoredAnalysis> {
    let id: String = row.get("id");
    let subject_id: String = row.get(subject_column);
    let created_at: String = row.get("created_at");
    let prospect_difficulty: Option<String> = row.try_get("prospect_difficulty").unwrap_or(None);
    let outcome: Option<String> = row.try_get("outcome").unwrap_or(None);

    let result = AnalysisResult {
        overall_score: row.get("overall_score"),
        value: from_json(row.get("value_details"), "value_details")?,
        trust: from_json(row.get("trust_details"), "trust_details")?,
        fit: from_json(row.get("fit_details"), "fit_details")?,
        logistics: from_json(row.get("logistics_details"), "logistics_details")?,
        skill_scores: from_json(row.get("skill_scores"), "skill_scores")?,
        coaching_recommendations: from_json(row.get("coaching_recommendations"), "coaching_recommendations")?,
        timestamped_feedback: from_json(row.get("timestamped_feedback"), "timestamped_feedback")?,
        prospect_difficulty: prospect_difficulty
            .as_deref()
            .map(|json| from_json(json, "prospect_difficulty"))
            .transpose()?,
        outcome: outcome.as_deref().map(|json| from_json(json, "outcome")).transpose()?,
    };

    Ok(StoredAnalysis {
        id: parse_uuid(&id, "id")?,
        subject_id: parse_uuid(&subject_id, subject_column)?,
        result,
        created_at: parse_timestamp(&created_at, "created_at")?,
    })
}

pub async fn load_roleplay_analysis(pool: &SqlitePool, session_id: Uuid) -> Result<Option<StoredAnalysis>> {
    let row = sqlx::query(
        r#"
        SELECT id, roleplay_session_id, overall_score, value_details, trust_details,
               fit_details, logistics_details, skill_scores, coaching_recommendations,
               timestamped_feedback, created_at
        FROM roleplay_analysis
        WHERE roleplay_session_id = ?
        "#,
    )
    .bind(session_id.to_string())
    .fetch_optional(pool)
    .await?;

    row.as_ref()
        .map(|row| analysis_from_row(row, "roleplay_session_id"))
        .transpose()
}
