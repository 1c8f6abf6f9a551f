//! Roleplay session and message operations

use callscore_common::Result;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use uuid::Uuid;

use super::{parse_enum, parse_optional_timestamp, parse_timestamp, parse_uuid};
use crate::models::{RoleplayMessage, RoleplaySession};

pub async fn insert_session(pool: &SqlitePool, session: &RoleplaySession) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO roleplay_sessions (
            id, organization_id, user_id, status, overall_score, analysis_id, created_at, completed_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(session.id.to_string())
    .bind(&session.organization_id)
    .bind(&session.user_id)
    .bind(session.status.as_str())
    .bind(session.overall_score)
    .bind(session.analysis_id.map(|id| id.to_string()))
    .bind(session.created_at.to_rfc3339())
    .bind(session.completed_at.map(|dt| dt.to_rfc3339()))
    .execute(pool)
    .await?;

    Ok(())
}

/// Append a message to a session that is still in progress.
///
/// Returns false, writing nothing, once the session has ended.
pub async fn append_message(pool: &SqlitePool, message: &RoleplayMessage) -> Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO roleplay_messages (id, session_id, role, content, timestamp_ms, created_at)
        SELECT ?, ?, ?, ?, ?, ?
        WHERE EXISTS (
            SELECT 1 FROM roleplay_sessions WHERE id = ? AND status = 'in_progress'
        )
        "#,
    )
    .bind(message.id.to_string())
    .bind(message.session_id.to_string())
    .bind(message.role.as_str())
    .bind(&message.content)
    .bind(message.timestamp_ms.map(|ms| ms as i64))
    .bind(message.created_at.to_rfc3339())
    .bind(message.session_id.to_string())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Close a session to new messages. Returns false unless it was in progress.
pub async fn end_session(pool: &SqlitePool, session_id: Uuid) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE roleplay_sessions
        SET status = 'ended'
        WHERE id = ? AND status = 'in_progress'
        "#,
    )
    .bind(session_id.to_string())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Load a session owned by this user within this organization
pub async fn load_session_for_caller(
    pool: &SqlitePool,
    session_id: Uuid,
    organization_id: &str,
    user_id: &str,
) -> Result<Option<RoleplaySession>> {
    let row = sqlx::query(
        r#"
        SELECT id, organization_id, user_id, status, overall_score, analysis_id,
               created_at, completed_at
        FROM roleplay_sessions
        WHERE id = ? AND organization_id = ? AND user_id = ?
        "#,
    )
    .bind(session_id.to_string())
    .bind(organization_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(session_from_row).transpose()
}

/// Messages in recording order
pub async fn load_messages(pool: &SqlitePool, session_id: Uuid) -> Result<Vec<RoleplayMessage>> {
    let rows = sqlx::query(
        r#"
        SELECT id, session_id, role, content, timestamp_ms, created_at
        FROM roleplay_messages
        WHERE session_id = ?
        ORDER BY created_at, rowid
        "#,
    )
    .bind(session_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            let id: String = row.get("id");
            let session_id: String = row.get("session_id");
            let role: String = row.get("role");
            let timestamp_ms: Option<i64> = row.get("timestamp_ms");
            let created_at: String = row.get("created_at");

            Ok(RoleplayMessage {
                id: parse_uuid(&id, "id")?,
                session_id: parse_uuid(&session_id, "session_id")?,
                role: parse_enum(&role)?,
                content: row.get("content"),
                timestamp_ms: timestamp_ms.filter(|ms| *ms >= 0).map(|ms| ms as u64),
                created_at: parse_timestamp(&created_at, "created_at")?,
            })
        })
        .collect()
}

/// Mark an ended session scored. Returns false for any other status.
pub async fn complete_session(
    conn: &mut SqliteConnection,
    session_id: Uuid,
    overall_score: f64,
    analysis_id: Uuid,
    completed_at: DateTime<Utc>,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE roleplay_sessions
        SET status = 'completed', overall_score = ?, analysis_id = ?, completed_at = ?
        WHERE id = ? AND status = 'ended'
        "#,
    )
    .bind(overall_score)
    .bind(analysis_id.to_string())
    .bind(completed_at.to_rfc3339())
    .bind(session_id.to_string())
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

fn session_from_row(row: &SqliteRow) -> Result<RoleplaySession> {
    let id: String = row.get("id");
    let status: String = row.get("status");
    let analysis_id: Option<String> = row.get("analysis_id");
    let created_at: String = row.get("created_at");

    Ok(RoleplaySession {
        id: parse_uuid(&id, "id")?,
        organization_id: row.get("organization_id"),
        user_id: row.get("user_id"),
        status: parse_enum(&status)?,
        overall_score: row.get("overall_score"),
        analysis_id: analysis_id
            .as_deref()
            .map(|id| parse_uuid(id, "analysis_id"))
            .transpose()?,
        created_at: parse_timestamp(&created_at, "created_at")?,
        completed_at: parse_optional_timestamp(row.get("completed_at"), "completed_at")?,
    })
}
