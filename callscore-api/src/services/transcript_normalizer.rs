//! Plain transcript text to canonical utterances
//!
//! Pasted and extracted transcripts carry no timing, so utterances get
//! synthetic slots: utterance `i` spans `[2000*i, 2000*i + 1000)` ms.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::{TranscriptJson, Utterance};

/// Spacing between synthetic utterance starts (ms)
pub const UTTERANCE_SPACING_MS: u64 = 2000;

/// Synthetic utterance length (ms)
pub const UTTERANCE_DURATION_MS: u64 = 1000;

/// Speaker used when a line carries no marker
pub const DEFAULT_SPEAKER: &str = "Speaker A";

/// `[Speaker A]`, `Speaker 1:`, `speaker b` and friends at line start
static SPEAKER_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(\s*\[?\s*Speaker\s+\w+\s*\]?\s*:?\s*)(.*)$")
        .unwrap_or_else(|e| panic!("speaker marker pattern: {}", e))
});

/// Convert transcript text into an utterance sequence.
///
/// Lines whose text is empty after marker removal are skipped. Text that is
/// non-empty but yields no utterances becomes one utterance holding the
/// whole trimmed text.
pub fn normalize(text: &str) -> TranscriptJson {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return TranscriptJson::default();
    }

    let mut utterances = Vec::new();
    for line in trimmed.lines() {
        let (speaker, line_text) = match SPEAKER_MARKER.captures(line) {
            Some(caps) => {
                let marker = caps.get(1).map_or("", |m| m.as_str());
                let rest = caps.get(2).map_or("", |m| m.as_str());
                (speaker_label(marker), rest.trim())
            }
            None => (DEFAULT_SPEAKER.to_string(), line.trim()),
        };

        if line_text.is_empty() {
            continue;
        }

        let start = UTTERANCE_SPACING_MS * utterances.len() as u64;
        utterances.push(Utterance {
            speaker,
            start,
            end: start + UTTERANCE_DURATION_MS,
            text: line_text.to_string(),
        });
    }

    if utterances.is_empty() {
        utterances.push(Utterance {
            speaker: DEFAULT_SPEAKER.to_string(),
            start: 0,
            end: UTTERANCE_DURATION_MS,
            text: trimmed.to_string(),
        });
    }

    TranscriptJson { utterances }
}

fn speaker_label(marker: &str) -> String {
    let label: String = marker
        .chars()
        .filter(|c| !matches!(c, '[' | ']' | ':'))
        .collect();
    let label = label.trim();
    if label.is_empty() {
        DEFAULT_SPEAKER.to_string()
    } else {
        label.to_string()
    }
}
