//! Monthly performance figures

use chrono::{DateTime, Utc};
use callscore_common::YearMonth;
use serde::Serialize;
use uuid::Uuid;

use super::{AnalysisIntent, CallResult, CallStatus};

/// Figures for one rep and one calendar month
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FiguresSummary {
    pub month: YearMonth,
    pub calls_booked: u32,
    pub calls_showed: u32,
    pub calls_qualified: u32,
    pub sales_made: u32,
    /// Percent, one decimal
    pub close_rate: f64,
    pub show_rate: f64,
    pub qualified_rate: f64,
    pub cash_collected: f64,
    pub revenue_generated: f64,
    pub cash_collected_pct: f64,
}

impl FiguresSummary {
    pub fn zeroed(month: YearMonth) -> Self {
        Self {
            month,
            calls_booked: 0,
            calls_showed: 0,
            calls_qualified: 0,
            sales_made: 0,
            close_rate: 0.0,
            show_rate: 0.0,
            qualified_rate: 0.0,
            cash_collected: 0.0,
            revenue_generated: 0.0,
            cash_collected_pct: 0.0,
        }
    }
}

/// The columns of a call row that figures are computed from
#[derive(Debug, Clone, PartialEq)]
pub struct FigureRow {
    pub status: CallStatus,
    pub analysis_intent: Option<AnalysisIntent>,
    pub result: Option<CallResult>,
    pub qualified: Option<bool>,
    pub cash_collected: Option<f64>,
    pub revenue_generated: Option<f64>,
    pub call_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub original_call_id: Option<Uuid>,
}

impl FigureRow {
    /// Manual entries, plus completed analyses not marked analysis-only.
    ///
    /// Rows without an intent predate intents and count.
    pub fn is_eligible(&self) -> bool {
        match self.status {
            CallStatus::Manual => true,
            CallStatus::Completed => self.analysis_intent != Some(AnalysisIntent::AnalysisOnly),
            CallStatus::Analyzing | CallStatus::Failed => false,
        }
    }

    pub fn attribution_date(&self) -> DateTime<Utc> {
        self.call_date.unwrap_or(self.created_at)
    }
}
