//! Usage ledger admission tests

mod helpers;

use callscore_api::db;
use callscore_api::services::{Action, AdmissionControl, UsageLedger, UsageMetric};
use callscore_common::config::SubscriptionMode;
use helpers::{count_rows, create_test_db};

#[tokio::test]
async fn test_call_limit_enforced_per_organization() {
    let (_temp_dir, pool) = create_test_db().await;
    let ledger = UsageLedger::new(pool.clone(), 2);
    let mode = SubscriptionMode::Enforced;

    for _ in 0..2 {
        let decision = ledger.can_perform_action("org-a", Action::UploadCall, mode).await.unwrap();
        assert!(decision.allowed);
        ledger.increment_usage("org-a", UsageMetric::Calls, mode).await.unwrap();
    }

    let decision = ledger.can_perform_action("org-a", Action::UploadCall, mode).await.unwrap();
    assert!(!decision.allowed);
    assert_eq!(
        decision.reason.as_deref(),
        Some("Monthly call limit reached (2/2). Upgrade your plan to analyze more calls.")
    );

    // Other organizations have their own counters
    let other = ledger.can_perform_action("org-b", Action::UploadCall, mode).await.unwrap();
    assert!(other.allowed);
}

#[tokio::test]
async fn test_only_uploads_are_limited() {
    let (_temp_dir, pool) = create_test_db().await;
    let ledger = UsageLedger::new(pool.clone(), 1);
    let mode = SubscriptionMode::Enforced;

    ledger.increment_usage("org-a", UsageMetric::Calls, mode).await.unwrap();

    assert!(!ledger.can_perform_action("org-a", Action::UploadCall, mode).await.unwrap().allowed);
    assert!(ledger.can_perform_action("org-a", Action::LogManualCall, mode).await.unwrap().allowed);
    assert!(ledger.can_perform_action("org-a", Action::ScoreRoleplay, mode).await.unwrap().allowed);
}

#[tokio::test]
async fn test_zero_limit_is_unlimited() {
    let (_temp_dir, pool) = create_test_db().await;
    let ledger = UsageLedger::new(pool.clone(), 0);
    let mode = SubscriptionMode::Enforced;

    for _ in 0..5 {
        ledger.increment_usage("org-a", UsageMetric::Calls, mode).await.unwrap();
    }
    assert!(ledger.can_perform_action("org-a", Action::UploadCall, mode).await.unwrap().allowed);
}

#[tokio::test]
async fn test_bypassed_mode_allows_and_records_nothing() {
    let (_temp_dir, pool) = create_test_db().await;
    let ledger = UsageLedger::new(pool.clone(), 1);
    let mode = SubscriptionMode::Bypassed;

    for _ in 0..3 {
        assert!(ledger.can_perform_action("org-a", Action::UploadCall, mode).await.unwrap().allowed);
        ledger.increment_usage("org-a", UsageMetric::Calls, mode).await.unwrap();
    }
    assert_eq!(count_rows(&pool, "usage_counters").await, 0);
}

#[tokio::test]
async fn test_metrics_are_counted_separately() {
    let (_temp_dir, pool) = create_test_db().await;
    let ledger = UsageLedger::new(pool.clone(), 10);
    let mode = SubscriptionMode::Enforced;

    ledger.increment_usage("org-a", UsageMetric::Calls, mode).await.unwrap();
    ledger.increment_usage("org-a", UsageMetric::ManualCalls, mode).await.unwrap();
    ledger.increment_usage("org-a", UsageMetric::ManualCalls, mode).await.unwrap();
    ledger.increment_usage("org-a", UsageMetric::Roleplays, mode).await.unwrap();

    let period: String = sqlx::query_scalar("SELECT period FROM usage_counters LIMIT 1")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(period.len(), 7);

    let manual = db::usage::get_count(&pool, "org-a", UsageMetric::ManualCalls.as_str(), &period)
        .await
        .unwrap();
    assert_eq!(manual, 2);
    assert_eq!(count_rows(&pool, "usage_counters").await, 3);
}
