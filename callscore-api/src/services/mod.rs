//! Services for callscore-api
//!
//! Intake, background analysis, figures aggregation and the external
//! collaborators they depend on.

pub mod admission;
pub mod analysis_orchestrator;
pub mod figures_aggregator;
pub mod intake;
pub mod scoring;
pub mod text_extractor;
pub mod transcript_normalizer;
pub mod transcription;

pub use admission::{Action, AdmissionControl, AdmissionDecision, UsageLedger, UsageMetric};
pub use analysis_orchestrator::{AnalysisOrchestrator, AnalysisOutcome, OrchestrationError, RoleplayScore};
pub use figures_aggregator::{compute_figures, summarize};
pub use scoring::{HttpScoringEngine, ScoringEngine, ScoringError};
pub use text_extractor::{ExtractError, LocalTextExtractor, TextExtractor};
pub use transcript_normalizer::normalize;
pub use transcription::{HttpTranscriber, Transcriber, Transcription, TranscriptionError};
