//! Database initialization
//!
//! Creates the database on first run, applies connection pragmas, creates
//! every table, then synchronizes columns of tables that may predate the
//! current schema.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // WAL lets figures reads proceed while a background analysis commits
    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;
    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    init_schema(&pool).await?;

    Ok(pool)
}

/// Create all tables, add missing columns, then create indexes.
///
/// Idempotent: safe to call on every startup and from tests against an
/// in-memory pool.
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query("PRAGMA foreign_keys = ON").execute(pool).await?;

    create_calls_table(pool).await?;
    create_call_analysis_table(pool).await?;
    create_roleplay_sessions_table(pool).await?;
    create_roleplay_messages_table(pool).await?;
    create_roleplay_analysis_table(pool).await?;
    create_usage_counters_table(pool).await?;

    crate::db::table_schemas::sync_all_table_schemas(pool).await?;

    create_indexes(pool).await?;

    info!("Database schema initialized");
    Ok(())
}

/// Create the calls table
///
/// One row per uploaded, pasted, manual or re-analyzed call.
pub async fn create_calls_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS calls (
            id TEXT PRIMARY KEY,
            organization_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            origin TEXT NOT NULL DEFAULT 'upload',
            file_name TEXT NOT NULL,
            file_size INTEGER,
            transcript TEXT,
            transcript_json TEXT,
            duration_seconds REAL,
            analysis_intent TEXT,
            status TEXT NOT NULL,
            result TEXT,
            qualified INTEGER,
            cash_collected REAL,
            revenue_generated REAL,
            reason_for_outcome TEXT,
            offer_id TEXT,
            offer_type TEXT,
            call_type TEXT,
            deposit_taken INTEGER,
            call_date TEXT,
            original_call_id TEXT REFERENCES calls(id),
            created_at TEXT NOT NULL,
            completed_at TEXT,
            failure_reason TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the call_analysis table (at most one row per call)
pub async fn create_call_analysis_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS call_analysis (
            id TEXT PRIMARY KEY,
            call_id TEXT NOT NULL UNIQUE REFERENCES calls(id) ON DELETE CASCADE,
            overall_score REAL NOT NULL,
            value_score REAL NOT NULL,
            trust_score REAL NOT NULL,
            fit_score REAL NOT NULL,
            logistics_score REAL NOT NULL,
            value_details TEXT NOT NULL,
            trust_details TEXT NOT NULL,
            fit_details TEXT NOT NULL,
            logistics_details TEXT NOT NULL,
            skill_scores TEXT NOT NULL DEFAULT '{}',
            coaching_recommendations TEXT NOT NULL DEFAULT '[]',
            timestamped_feedback TEXT NOT NULL DEFAULT '[]',
            prospect_difficulty TEXT,
            outcome TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_roleplay_sessions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS roleplay_sessions (
            id TEXT PRIMARY KEY,
            organization_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'in_progress',
            overall_score REAL,
            analysis_id TEXT,
            created_at TEXT NOT NULL,
            completed_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_roleplay_messages_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS roleplay_messages (
            id TEXT PRIMARY KEY,
            session_id TEXT NOT NULL REFERENCES roleplay_sessions(id) ON DELETE CASCADE,
            role TEXT NOT NULL,
            content TEXT NOT NULL,
            timestamp_ms INTEGER,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the roleplay_analysis table (at most one row per session)
pub async fn create_roleplay_analysis_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS roleplay_analysis (
            id TEXT PRIMARY KEY,
            roleplay_session_id TEXT NOT NULL UNIQUE REFERENCES roleplay_sessions(id) ON DELETE CASCADE,
            overall_score REAL NOT NULL,
            value_score REAL NOT NULL,
            trust_score REAL NOT NULL,
            fit_score REAL NOT NULL,
            logistics_score REAL NOT NULL,
            value_details TEXT NOT NULL,
            trust_details TEXT NOT NULL,
            fit_details TEXT NOT NULL,
            logistics_details TEXT NOT NULL,
            skill_scores TEXT NOT NULL DEFAULT '{}',
            coaching_recommendations TEXT NOT NULL DEFAULT '[]',
            timestamped_feedback TEXT NOT NULL DEFAULT '[]',
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the usage_counters table
///
/// One counter per organization, metric and calendar month (`YYYY-MM`).
pub async fn create_usage_counters_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS usage_counters (
            organization_id TEXT NOT NULL,
            metric TEXT NOT NULL,
            period TEXT NOT NULL,
            count INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (organization_id, metric, period)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_indexes(pool: &SqlitePool) -> Result<()> {
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_calls_user_status ON calls(user_id, status)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_calls_organization ON calls(organization_id)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_roleplay_messages_session ON roleplay_messages(session_id, created_at)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
