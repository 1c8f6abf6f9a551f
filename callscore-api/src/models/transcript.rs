//! Canonical transcript shape shared by every intake path
//!
//! Serializes exactly as the scoring engine expects:
//! `{"utterances": [{"speaker", "start", "end", "text"}]}` with times in ms.

use serde::{Deserialize, Serialize};

/// One labeled, time-stamped unit of transcript text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utterance {
    pub speaker: String,
    /// Start time (ms)
    pub start: u64,
    /// End time (ms)
    pub end: u64,
    pub text: String,
}

/// Ordered utterance sequence
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptJson {
    pub utterances: Vec<Utterance>,
}

impl TranscriptJson {
    pub fn is_empty(&self) -> bool {
        self.utterances.is_empty()
    }

    pub fn len(&self) -> usize {
        self.utterances.len()
    }
}
