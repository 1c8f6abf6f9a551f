//! Scoring engine output and its persisted form

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::CallOutcome;

/// Score for one of the four categories plus whatever detail the engine
/// attaches (strengths, weaknesses, evidence quotes)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryScore {
    pub score: f64,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoachingRecommendation {
    pub priority: Priority,
    pub category: String,
    pub issue: String,
    pub explanation: String,
    pub action: String,
}

/// Feedback pinned to a point in the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimestampedFeedback {
    /// Offset into the call (ms)
    #[serde(default)]
    pub timestamp: Option<f64>,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

/// How hard the prospect was to sell to
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProspectDifficulty {
    /// 0 (cannot act) to 10 (fully able to buy)
    #[serde(default)]
    pub execution_resistance: Option<f64>,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

/// Result of one scoring run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub overall_score: f64,
    pub value: CategoryScore,
    pub trust: CategoryScore,
    pub fit: CategoryScore,
    pub logistics: CategoryScore,
    #[serde(default)]
    pub skill_scores: BTreeMap<String, Value>,
    #[serde(default)]
    pub coaching_recommendations: Vec<CoachingRecommendation>,
    #[serde(default)]
    pub timestamped_feedback: Vec<TimestampedFeedback>,
    #[serde(default)]
    pub prospect_difficulty: Option<ProspectDifficulty>,
    /// Outcome the engine read out of the conversation
    #[serde(default)]
    pub outcome: Option<CallOutcome>,
}

impl AnalysisResult {
    pub fn execution_resistance(&self) -> Option<f64> {
        self.prospect_difficulty
            .as_ref()
            .and_then(|difficulty| difficulty.execution_resistance)
    }
}

/// Analysis row as stored for a call or a roleplay session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredAnalysis {
    pub id: Uuid,
    /// Call id, or roleplay session id for roleplay analyses
    pub subject_id: Uuid,
    #[serde(flatten)]
    pub result: AnalysisResult,
    pub created_at: DateTime<Utc>,
}
