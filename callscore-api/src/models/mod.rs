//! Data models for callscore-api
//!
//! - Call records and their lifecycle status
//! - Canonical transcripts consumed by the scoring engine
//! - Analysis results and roleplay sessions
//! - Monthly figures

pub mod analysis;
pub mod call_record;
pub mod caller;
pub mod figures;
pub mod roleplay;
pub mod transcript;

pub use analysis::{
    AnalysisResult, CategoryScore, CoachingRecommendation, Priority, ProspectDifficulty,
    StoredAnalysis, TimestampedFeedback,
};
pub use call_record::{
    AnalysisFailure, AnalysisIntent, CallOrigin, CallOutcome, CallRecord, CallResult, CallStatus, ManualContext,
};
pub use caller::CallerIdentity;
pub use figures::{FigureRow, FiguresSummary};
pub use roleplay::{RoleplayMessage, RoleplayRole, RoleplaySession, RoleplayStatus};
pub use transcript::{TranscriptJson, Utterance};
