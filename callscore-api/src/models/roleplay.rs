//! Roleplay practice sessions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleplayStatus {
    InProgress,
    Ended,
    /// Scored; cannot be scored again
    Completed,
}

impl RoleplayStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoleplayStatus::InProgress => "in_progress",
            RoleplayStatus::Ended => "ended",
            RoleplayStatus::Completed => "completed",
        }
    }
}

impl FromStr for RoleplayStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(RoleplayStatus::InProgress),
            "ended" => Ok(RoleplayStatus::Ended),
            "completed" => Ok(RoleplayStatus::Completed),
            other => Err(format!("Unknown roleplay status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleplayRole {
    Rep,
    Prospect,
}

impl RoleplayRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoleplayRole::Rep => "rep",
            RoleplayRole::Prospect => "prospect",
        }
    }

    /// Label used in the transcript text
    pub fn display_name(&self) -> &'static str {
        match self {
            RoleplayRole::Rep => "Rep",
            RoleplayRole::Prospect => "Prospect",
        }
    }

    /// Speaker id used in utterances
    pub fn speaker(&self) -> &'static str {
        match self {
            RoleplayRole::Rep => "A",
            RoleplayRole::Prospect => "B",
        }
    }
}

impl FromStr for RoleplayRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rep" => Ok(RoleplayRole::Rep),
            "prospect" => Ok(RoleplayRole::Prospect),
            other => Err(format!("Unknown roleplay role: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleplaySession {
    pub id: Uuid,
    pub organization_id: String,
    pub user_id: String,
    pub status: RoleplayStatus,
    pub overall_score: Option<f64>,
    pub analysis_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl RoleplaySession {
    pub fn new(organization_id: &str, user_id: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            organization_id: organization_id.to_string(),
            user_id: user_id.to_string(),
            status: RoleplayStatus::InProgress,
            overall_score: None,
            analysis_id: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleplayMessage {
    pub id: Uuid,
    pub session_id: Uuid,
    pub role: RoleplayRole,
    pub content: String,
    /// Offset into the session when the message was recorded (ms)
    pub timestamp_ms: Option<u64>,
    pub created_at: DateTime<Utc>,
}

impl RoleplayMessage {
    pub fn new(session_id: Uuid, role: RoleplayRole, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id,
            role,
            content: content.into(),
            timestamp_ms: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_timestamp(mut self, timestamp_ms: u64) -> Self {
        self.timestamp_ms = Some(timestamp_ms);
        self
    }
}
