//! Monthly figures aggregation

mod helpers;

use callscore_api::db;
use callscore_api::models::{
    AnalysisIntent, CallOrigin, CallOutcome, CallRecord, CallResult, CallStatus, FiguresSummary,
    TranscriptJson,
};
use callscore_api::services::figures_aggregator::compute_figures;
use callscore_common::YearMonth;
use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use helpers::{create_test_db, ORG_ID, USER_ID};
use sqlx::SqlitePool;
use uuid::Uuid;

fn utc() -> FixedOffset {
    FixedOffset::east_opt(0).unwrap()
}

fn march() -> YearMonth {
    "2024-03".parse().unwrap()
}

fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
}

/// Completed analyzed call with the given outcome
fn completed_call(intent: Option<AnalysisIntent>, outcome: CallOutcome, created_at: DateTime<Utc>) -> CallRecord {
    let mut call = CallRecord::analyzing(
        ORG_ID,
        USER_ID,
        CallOrigin::Upload,
        "call.mp3",
        Some(2048),
        "Speaker A: hi".to_string(),
        TranscriptJson::default(),
        Some(120.0),
        AnalysisIntent::UpdateFigures,
    );
    call.analysis_intent = intent;
    call.status = CallStatus::Completed;
    call.outcome = outcome;
    call.created_at = created_at;
    call.completed_at = Some(created_at);
    call
}

fn manual_call(outcome: CallOutcome, call_date: DateTime<Utc>) -> CallRecord {
    CallRecord::manual(ORG_ID, USER_ID, outcome, Default::default(), Some(call_date))
}

async fn insert(pool: &SqlitePool, call: &CallRecord) {
    db::calls::insert_call(pool, call).await.unwrap();
}

/// (a) a qualified close worth 5000, (b) a no-show, (c) a re-analysis of
/// (a) that came back as a deposit with 1000 collected
async fn seed_march_scenario(pool: &SqlitePool) {
    let closed = completed_call(
        Some(AnalysisIntent::UpdateFigures),
        CallOutcome {
            result: Some(CallResult::Closed),
            qualified: Some(true),
            revenue_generated: Some(5000.0),
            reason_for_outcome: Some("Signed".to_string()),
            ..Default::default()
        },
        at(2024, 3, 10, 15),
    );
    insert(pool, &closed).await;

    let no_show = completed_call(
        Some(AnalysisIntent::UpdateFigures),
        CallOutcome {
            result: Some(CallResult::NoShow),
            ..Default::default()
        },
        at(2024, 3, 12, 9),
    );
    insert(pool, &no_show).await;

    let mut rerun = closed.derivative().unwrap();
    rerun.status = CallStatus::Completed;
    rerun.outcome = CallOutcome {
        result: Some(CallResult::Deposit),
        cash_collected: Some(1000.0),
        ..Default::default()
    };
    rerun.created_at = at(2024, 3, 20, 9);
    rerun.completed_at = Some(rerun.created_at);
    assert_eq!(rerun.original_call_id, Some(closed.id));
    insert(pool, &rerun).await;
}

#[tokio::test]
async fn test_march_scenario() {
    let (_dir, pool) = create_test_db().await;
    seed_march_scenario(&pool).await;

    let summary = compute_figures(&pool, USER_ID, march(), utc()).await.unwrap();

    assert_eq!(summary.calls_booked, 2);
    assert_eq!(summary.calls_showed, 1);
    assert_eq!(summary.calls_qualified, 1);
    assert_eq!(summary.sales_made, 2);
    assert_eq!(summary.close_rate, 200.0);
    assert_eq!(summary.show_rate, 50.0);
    assert_eq!(summary.qualified_rate, 100.0);
    assert_eq!(summary.revenue_generated, 5000.0);
    assert_eq!(summary.cash_collected, 1000.0);
    assert_eq!(summary.cash_collected_pct, 20.0);
}

#[tokio::test]
async fn test_figures_are_idempotent() {
    let (_dir, pool) = create_test_db().await;
    seed_march_scenario(&pool).await;

    let first = compute_figures(&pool, USER_ID, march(), utc()).await.unwrap();
    let second = compute_figures(&pool, USER_ID, march(), utc()).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_ineligible_rows_are_ignored() {
    let (_dir, pool) = create_test_db().await;
    let closed = CallOutcome {
        result: Some(CallResult::Closed),
        cash_collected: Some(700.0),
        revenue_generated: Some(700.0),
        ..Default::default()
    };

    // Analysis-only, still analyzing, failed, other rep
    insert(&pool, &completed_call(Some(AnalysisIntent::AnalysisOnly), closed.clone(), at(2024, 3, 5, 12))).await;

    let mut analyzing = completed_call(Some(AnalysisIntent::UpdateFigures), closed.clone(), at(2024, 3, 5, 12));
    analyzing.status = CallStatus::Analyzing;
    insert(&pool, &analyzing).await;

    let mut failed = completed_call(Some(AnalysisIntent::UpdateFigures), closed.clone(), at(2024, 3, 5, 12));
    failed.status = CallStatus::Failed;
    insert(&pool, &failed).await;

    let mut other_rep = completed_call(Some(AnalysisIntent::UpdateFigures), closed.clone(), at(2024, 3, 5, 12));
    other_rep.user_id = "user-2".to_string();
    insert(&pool, &other_rep).await;

    let summary = compute_figures(&pool, USER_ID, march(), utc()).await.unwrap();
    assert_eq!(summary, FiguresSummary::zeroed(march()));
}

#[tokio::test]
async fn test_rows_without_intent_count() {
    let (_dir, pool) = create_test_db().await;
    let outcome = CallOutcome {
        result: Some(CallResult::Lost),
        ..Default::default()
    };
    insert(&pool, &completed_call(None, outcome, at(2024, 3, 2, 8))).await;

    let summary = compute_figures(&pool, USER_ID, march(), utc()).await.unwrap();
    assert_eq!(summary.calls_booked, 1);
    assert_eq!(summary.calls_showed, 1);
    assert_eq!(summary.calls_qualified, 0);
    assert_eq!(summary.sales_made, 0);
    assert_eq!(summary.close_rate, 0.0);
    assert_eq!(summary.show_rate, 100.0);
}

#[tokio::test]
async fn test_call_date_wins_over_created_at() {
    let (_dir, pool) = create_test_db().await;

    // Created in March but dated February
    let mut backdated = completed_call(Some(AnalysisIntent::UpdateFigures), CallOutcome::default(), at(2024, 3, 3, 10));
    backdated.call_date = Some(at(2024, 2, 28, 10));
    insert(&pool, &backdated).await;

    let summary = compute_figures(&pool, USER_ID, march(), utc()).await.unwrap();
    assert_eq!(summary.calls_booked, 0);

    let february: YearMonth = "2024-02".parse().unwrap();
    let summary = compute_figures(&pool, USER_ID, february, utc()).await.unwrap();
    assert_eq!(summary.calls_booked, 1);
}

#[tokio::test]
async fn test_month_follows_viewer_offset() {
    let (_dir, pool) = create_test_db().await;

    // 02:00 UTC on April 1st is still March 31st in UTC-5
    insert(
        &pool,
        &manual_call(
            CallOutcome {
                result: Some(CallResult::Closed),
                ..Default::default()
            },
            at(2024, 4, 1, 2),
        ),
    )
    .await;

    let new_york = FixedOffset::west_opt(5 * 3600).unwrap();
    let in_march = compute_figures(&pool, USER_ID, march(), new_york).await.unwrap();
    assert_eq!(in_march.sales_made, 1);

    let in_march_utc = compute_figures(&pool, USER_ID, march(), utc()).await.unwrap();
    assert_eq!(in_march_utc.sales_made, 0);
}

#[tokio::test]
async fn test_missing_column_yields_zeroed_summary() {
    // A database from before intents existed, never synchronized
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    sqlx::query(
        "CREATE TABLE calls (id TEXT PRIMARY KEY, user_id TEXT NOT NULL, status TEXT NOT NULL, created_at TEXT NOT NULL)",
    )
    .execute(&pool)
    .await
    .unwrap();
    sqlx::query("INSERT INTO calls (id, user_id, status, created_at) VALUES (?, ?, 'manual', ?)")
        .bind(Uuid::new_v4().to_string())
        .bind(USER_ID)
        .bind(at(2024, 3, 1, 0).to_rfc3339())
        .execute(&pool)
        .await
        .unwrap();

    let summary = compute_figures(&pool, USER_ID, march(), utc()).await.unwrap();
    assert_eq!(summary, FiguresSummary::zeroed(march()));
}
