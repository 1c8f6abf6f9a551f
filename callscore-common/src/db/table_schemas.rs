//! Table schema definitions
//!
//! Expected columns of the tables whose shape grew over time. Adding a
//! column here (and to the CREATE TABLE statement in `init.rs`) is enough for
//! existing databases to pick it up on the next startup.

use crate::db::schema_sync::{sync_table, ColumnDefinition, TableSchema};
use crate::Result;
use sqlx::SqlitePool;
use tracing::info;

/// calls table schema
pub struct CallsTableSchema;

impl TableSchema for CallsTableSchema {
    fn table_name() -> &'static str {
        "calls"
    }

    fn expected_columns() -> Vec<ColumnDefinition> {
        vec![
            ColumnDefinition::new("id", "TEXT").primary_key(),
            ColumnDefinition::new("organization_id", "TEXT").not_null(),
            ColumnDefinition::new("user_id", "TEXT").not_null(),
            ColumnDefinition::new("origin", "TEXT").not_null().default("'upload'"),
            ColumnDefinition::new("file_name", "TEXT").not_null(),
            ColumnDefinition::new("file_size", "INTEGER"),
            ColumnDefinition::new("transcript", "TEXT"),
            ColumnDefinition::new("transcript_json", "TEXT"),
            ColumnDefinition::new("duration_seconds", "REAL"),
            // NULL on rows created before intents existed; counted as update_figures
            ColumnDefinition::new("analysis_intent", "TEXT"),
            ColumnDefinition::new("status", "TEXT").not_null(),
            ColumnDefinition::new("result", "TEXT"),
            ColumnDefinition::new("qualified", "INTEGER"),
            ColumnDefinition::new("cash_collected", "REAL"),
            ColumnDefinition::new("revenue_generated", "REAL"),
            ColumnDefinition::new("reason_for_outcome", "TEXT"),
            ColumnDefinition::new("offer_id", "TEXT"),
            ColumnDefinition::new("offer_type", "TEXT"),
            ColumnDefinition::new("call_type", "TEXT"),
            ColumnDefinition::new("deposit_taken", "INTEGER"),
            ColumnDefinition::new("call_date", "TEXT"),
            ColumnDefinition::new("original_call_id", "TEXT"),
            ColumnDefinition::new("created_at", "TEXT").not_null(),
            ColumnDefinition::new("completed_at", "TEXT"),
            // Set together with status = failed
            ColumnDefinition::new("failure_reason", "TEXT"),
        ]
    }
}

/// call_analysis table schema
pub struct CallAnalysisTableSchema;

impl TableSchema for CallAnalysisTableSchema {
    fn table_name() -> &'static str {
        "call_analysis"
    }

    fn expected_columns() -> Vec<ColumnDefinition> {
        vec![
            ColumnDefinition::new("id", "TEXT").primary_key(),
            ColumnDefinition::new("call_id", "TEXT").not_null(),
            ColumnDefinition::new("overall_score", "REAL").not_null(),
            ColumnDefinition::new("value_score", "REAL").not_null(),
            ColumnDefinition::new("trust_score", "REAL").not_null(),
            ColumnDefinition::new("fit_score", "REAL").not_null(),
            ColumnDefinition::new("logistics_score", "REAL").not_null(),
            ColumnDefinition::new("value_details", "TEXT").not_null(),
            ColumnDefinition::new("trust_details", "TEXT").not_null(),
            ColumnDefinition::new("fit_details", "TEXT").not_null(),
            ColumnDefinition::new("logistics_details", "TEXT").not_null(),
            ColumnDefinition::new("skill_scores", "TEXT").not_null().default("'{}'"),
            ColumnDefinition::new("coaching_recommendations", "TEXT").not_null().default("'[]'"),
            ColumnDefinition::new("timestamped_feedback", "TEXT").not_null().default("'[]'"),
            ColumnDefinition::new("prospect_difficulty", "TEXT"),
            ColumnDefinition::new("outcome", "TEXT"),
            ColumnDefinition::new("created_at", "TEXT").not_null(),
        ]
    }
}

/// Synchronize every declared table schema
pub async fn sync_all_table_schemas(pool: &SqlitePool) -> Result<()> {
    let added = sync_table::<CallsTableSchema>(pool).await?
        + sync_table::<CallAnalysisTableSchema>(pool).await?;

    if added > 0 {
        info!("Schema sync added {} column(s)", added);
    }

    Ok(())
}
