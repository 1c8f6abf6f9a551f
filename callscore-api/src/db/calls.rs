//! Call record operations
//!
//! Every status change is guarded with `status = 'analyzing'` so a record
//! never leaves a terminal status.

use callscore_common::Result;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use uuid::Uuid;

use super::{from_json, parse_enum, parse_optional_timestamp, parse_timestamp, parse_uuid, to_json};
use crate::models::{
    AnalysisFailure, AnalysisIntent, CallOutcome, CallRecord, CallResult, CallStatus, FigureRow,
    ManualContext, TranscriptJson,
};

const CALL_COLUMNS: &str = r#"
    id, organization_id, user_id, origin, file_name, file_size, transcript,
    transcript_json, duration_seconds, analysis_intent, status, result, qualified,
    cash_collected, revenue_generated, reason_for_outcome, offer_id, offer_type,
    call_type, deposit_taken, call_date, original_call_id, created_at, completed_at,
    failure_reason
"#;

/// Insert a new call record in one statement
pub async fn insert_call(pool: &SqlitePool, call: &CallRecord) -> Result<()> {
    let transcript_json = call
        .transcript_json
        .as_ref()
        .map(|json| to_json(json, "transcript_json"))
        .transpose()?;

    sqlx::query(
        r#"
        INSERT INTO calls (
            id, organization_id, user_id, origin, file_name, file_size, transcript,
            transcript_json, duration_seconds, analysis_intent, status, result, qualified,
            cash_collected, revenue_generated, reason_for_outcome, offer_id, offer_type,
            call_type, deposit_taken, call_date, original_call_id, created_at, completed_at,
            failure_reason
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(call.id.to_string())
    .bind(&call.organization_id)
    .bind(&call.user_id)
    .bind(call.origin.as_str())
    .bind(&call.file_name)
    .bind(call.file_size)
    .bind(&call.transcript)
    .bind(transcript_json)
    .bind(call.duration_seconds)
    .bind(call.analysis_intent.map(|intent| intent.as_str()))
    .bind(call.status.as_str())
    .bind(call.outcome.result.as_ref().map(|r| r.as_str().to_string()))
    .bind(call.outcome.qualified)
    .bind(call.outcome.cash_collected)
    .bind(call.outcome.revenue_generated)
    .bind(&call.outcome.reason_for_outcome)
    .bind(&call.context.offer_id)
    .bind(&call.context.offer_type)
    .bind(&call.context.call_type)
    .bind(call.context.deposit_taken)
    .bind(call.call_date.map(|dt| dt.to_rfc3339()))
    .bind(call.original_call_id.map(|id| id.to_string()))
    .bind(call.created_at.to_rfc3339())
    .bind(call.completed_at.map(|dt| dt.to_rfc3339()))
    .bind(call.failure_reason.map(|reason| reason.as_str()))
    .execute(pool)
    .await?;

    Ok(())
}

/// Load a call only if it belongs to the organization
pub async fn load_call_for_organization(
    pool: &SqlitePool,
    call_id: Uuid,
    organization_id: &str,
) -> Result<Option<CallRecord>> {
    let sql = format!(
        "SELECT {} FROM calls WHERE id = ? AND organization_id = ?",
        CALL_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(call_id.to_string())
        .bind(organization_id)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(call_from_row).transpose()
}

/// Status and intent, read inside the commit transaction
pub async fn load_lifecycle(
    conn: &mut SqliteConnection,
    call_id: Uuid,
) -> Result<Option<(CallStatus, Option<AnalysisIntent>)>> {
    let row = sqlx::query("SELECT status, analysis_intent FROM calls WHERE id = ?")
        .bind(call_id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        Some(row) => {
            let status: String = row.get("status");
            let intent: Option<String> = row.get("analysis_intent");
            Ok(Some((
                parse_enum(&status)?,
                intent.as_deref().map(parse_enum).transpose()?,
            )))
        }
        None => Ok(None),
    }
}

/// Mark a call `completed`, copying non-null outcome fields in the same
/// statement. Returns false when the call was no longer analyzing.
pub async fn complete_analysis(
    conn: &mut SqliteConnection,
    call_id: Uuid,
    write_back: Option<&CallOutcome>,
    completed_at: DateTime<Utc>,
) -> Result<bool> {
    let outcome = write_back.cloned().unwrap_or_default();

    let result = sqlx::query(
        r#"
        UPDATE calls SET
            status = 'completed',
            completed_at = ?,
            result = COALESCE(?, result),
            qualified = COALESCE(?, qualified),
            cash_collected = COALESCE(?, cash_collected),
            revenue_generated = COALESCE(?, revenue_generated),
            reason_for_outcome = COALESCE(?, reason_for_outcome)
        WHERE id = ? AND status = 'analyzing'
        "#,
    )
    .bind(completed_at.to_rfc3339())
    .bind(outcome.result.map(String::from))
    .bind(outcome.qualified)
    .bind(outcome.cash_collected)
    .bind(outcome.revenue_generated)
    .bind(outcome.reason_for_outcome)
    .bind(call_id.to_string())
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Mark a call `failed` with its reason. Returns false when the call was no
/// longer analyzing.
pub async fn mark_failed(pool: &SqlitePool, call_id: Uuid, reason: AnalysisFailure) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE calls SET status = 'failed', completed_at = ?, failure_reason = ?
        WHERE id = ? AND status = 'analyzing'
        "#,
    )
    .bind(Utc::now().to_rfc3339())
    .bind(reason.as_str())
    .bind(call_id.to_string())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Calls still waiting on the scoring engine, across all organizations
pub async fn count_analyzing(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM calls WHERE status = 'analyzing'")
        .fetch_one(pool)
        .await?;

    Ok(count)
}

/// Rows of one rep that may count toward figures
pub async fn load_figure_rows(pool: &SqlitePool, user_id: &str) -> Result<Vec<FigureRow>> {
    let rows = sqlx::query(
        r#"
        SELECT status, analysis_intent, result, qualified, cash_collected,
               revenue_generated, call_date, created_at, original_call_id
        FROM calls
        WHERE user_id = ?
          AND (status = 'manual'
               OR (status = 'completed'
                   AND (analysis_intent IS NULL OR analysis_intent = 'update_figures')))
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            let status: String = row.get("status");
            let intent: Option<String> = row.get("analysis_intent");
            let result: Option<String> = row.get("result");
            let created_at: String = row.get("created_at");
            let original_call_id: Option<String> = row.get("original_call_id");

            Ok(FigureRow {
                status: parse_enum(&status)?,
                analysis_intent: intent.as_deref().map(parse_enum).transpose()?,
                result: result.map(CallResult::from),
                qualified: row.get("qualified"),
                cash_collected: row.get("cash_collected"),
                revenue_generated: row.get("revenue_generated"),
                call_date: parse_optional_timestamp(row.get("call_date"), "call_date")?,
                created_at: parse_timestamp(&created_at, "created_at")?,
                original_call_id: original_call_id
                    .as_deref()
                    .map(|id| parse_uuid(id, "original_call_id"))
                    .transpose()?,
            })
        })
        .collect()
}

fn call_from_row(row: &SqliteRow) -> Result<CallRecord> {
    let id: String = row.get("id");
    let origin: String = row.get("origin");
    let status: String = row.get("status");
    let intent: Option<String> = row.get("analysis_intent");
    let transcript_json: Option<String> = row.get("transcript_json");
    let result: Option<String> = row.get("result");
    let original_call_id: Option<String> = row.get("original_call_id");
    let created_at: String = row.get("created_at");
    let failure_reason: Option<String> = row.get("failure_reason");

    Ok(CallRecord {
        id: parse_uuid(&id, "id")?,
        organization_id: row.get("organization_id"),
        user_id: row.get("user_id"),
        origin: parse_enum(&origin)?,
        file_name: row.get("file_name"),
        file_size: row.get("file_size"),
        transcript: row.get("transcript"),
        transcript_json: transcript_json
            .as_deref()
            .map(|json| from_json::<TranscriptJson>(json, "transcript_json"))
            .transpose()?,
        duration_seconds: row.get("duration_seconds"),
        analysis_intent: intent.as_deref().map(parse_enum).transpose()?,
        status: parse_enum(&status)?,
        outcome: CallOutcome {
            result: result.map(CallResult::from),
            qualified: row.get("qualified"),
            cash_collected: row.get("cash_collected"),
            revenue_generated: row.get("revenue_generated"),
            reason_for_outcome: row.get("reason_for_outcome"),
        },
        context: ManualContext {
            offer_id: row.get("offer_id"),
            offer_type: row.get("offer_type"),
            call_type: row.get("call_type"),
            deposit_taken: row.get("deposit_taken"),
        },
        call_date: parse_optional_timestamp(row.get("call_date"), "call_date")?,
        original_call_id: original_call_id
            .as_deref()
            .map(|id| parse_uuid(id, "original_call_id"))
            .transpose()?,
        created_at: parse_timestamp(&created_at, "created_at")?,
        completed_at: parse_optional_timestamp(row.get("completed_at"), "completed_at")?,
        failure_reason: failure_reason.as_deref().map(parse_enum).transpose()?,
    })
}
