//! Admission control collaborator
//!
//! Every intake asks `can_perform_action` before creating anything and
//! reports usage afterwards. The subscription mode travels with each call.

use async_trait::async_trait;
use callscore_common::config::SubscriptionMode;
use callscore_common::{Result, YearMonth};
use chrono::{Offset, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::debug;

use crate::db;

/// Gated actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    UploadCall,
    LogManualCall,
    ScoreRoleplay,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::UploadCall => "upload_call",
            Action::LogManualCall => "log_manual_call",
            Action::ScoreRoleplay => "score_roleplay",
        }
    }

    /// Counter charged when the action succeeds
    pub fn metric(&self) -> UsageMetric {
        match self {
            Action::UploadCall => UsageMetric::Calls,
            Action::LogManualCall => UsageMetric::ManualCalls,
            Action::ScoreRoleplay => UsageMetric::Roleplays,
        }
    }
}

/// Usage counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageMetric {
    Calls,
    ManualCalls,
    Roleplays,
}

impl UsageMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            UsageMetric::Calls => "calls",
            UsageMetric::ManualCalls => "manual_calls",
            UsageMetric::Roleplays => "roleplays",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdmissionDecision {
    pub allowed: bool,
    pub reason: Option<String>,
}

impl AdmissionDecision {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
        }
    }
}

#[async_trait]
pub trait AdmissionControl: Send + Sync {
    async fn can_perform_action(
        &self,
        organization_id: &str,
        action: Action,
        mode: SubscriptionMode,
    ) -> Result<AdmissionDecision>;

    async fn increment_usage(
        &self,
        organization_id: &str,
        metric: UsageMetric,
        mode: SubscriptionMode,
    ) -> Result<()>;
}

/// Monthly per-organization counters in the `usage_counters` table.
///
/// Only call uploads are limited; a limit of 0 means unlimited.
pub struct UsageLedger {
    db: SqlitePool,
    monthly_call_limit: u32,
}

impl UsageLedger {
    pub fn new(db: SqlitePool, monthly_call_limit: u32) -> Self {
        Self {
            db,
            monthly_call_limit,
        }
    }

    /// Counters roll over at UTC month boundaries
    fn current_period() -> String {
        YearMonth::containing(Utc::now(), Utc.fix()).to_string()
    }
}

#[async_trait]
impl AdmissionControl for UsageLedger {
    async fn can_perform_action(
        &self,
        organization_id: &str,
        action: Action,
        mode: SubscriptionMode,
    ) -> Result<AdmissionDecision> {
        if mode == SubscriptionMode::Bypassed {
            return Ok(AdmissionDecision::allow());
        }
        if action != Action::UploadCall || self.monthly_call_limit == 0 {
            return Ok(AdmissionDecision::allow());
        }

        let period = Self::current_period();
        let used = db::usage::get_count(&self.db, organization_id, UsageMetric::Calls.as_str(), &period).await?;
        debug!(organization_id, used, limit = self.monthly_call_limit, "Checked call usage");

        if used >= i64::from(self.monthly_call_limit) {
            return Ok(AdmissionDecision::deny(format!(
                "Monthly call limit reached ({}/{}). Upgrade your plan to analyze more calls.",
                used, self.monthly_call_limit
            )));
        }
        Ok(AdmissionDecision::allow())
    }

    async fn increment_usage(
        &self,
        organization_id: &str,
        metric: UsageMetric,
        mode: SubscriptionMode,
    ) -> Result<()> {
        if mode == SubscriptionMode::Bypassed {
            return Ok(());
        }
        let period = Self::current_period();
        db::usage::increment(&self.db, organization_id, metric.as_str(), &period).await
    }
}
