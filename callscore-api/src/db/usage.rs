//! Usage counter operations

use callscore_common::Result;
use sqlx::SqlitePool;

/// Current count, 0 when nothing was recorded yet
pub async fn get_count(pool: &SqlitePool, organization_id: &str, metric: &str, period: &str) -> Result<i64> {
    let count: Option<i64> = sqlx::query_scalar(
        "SELECT count FROM usage_counters WHERE organization_id = ? AND metric = ? AND period = ?",
    )
    .bind(organization_id)
    .bind(metric)
    .bind(period)
    .fetch_optional(pool)
    .await?;

    Ok(count.unwrap_or(0))
}

pub async fn increment(pool: &SqlitePool, organization_id: &str, metric: &str, period: &str) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO usage_counters (organization_id, metric, period, count)
        VALUES (?, ?, ?, 1)
        ON CONFLICT(organization_id, metric, period) DO UPDATE SET count = count + 1
        "#,
    )
    .bind(organization_id)
    .bind(metric)
    .bind(period)
    .execute(pool)
    .await?;

    Ok(())
}
