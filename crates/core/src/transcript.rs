//! Recognizer output

use serde::{Deserialize, Serialize};

/// One recognizer result for the caller's audio.
///
/// Partial results (`is_final == false`) refine the running hypothesis.
/// A final result closes a segment; `is_end_of_speech` additionally means
/// the recognizer detected the caller stopped talking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TranscriptEvent {
    pub text: String,
    pub is_final: bool,
    pub is_end_of_speech: bool,
}

impl TranscriptEvent {
    pub fn partial(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: false,
            is_end_of_speech: false,
        }
    }

    pub fn final_result(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: true,
            is_end_of_speech: false,
        }
    }

    /// Final result that also marks the end of the caller's speech
    pub fn end_of_speech(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: true,
            is_end_of_speech: true,
        }
    }

    /// Final or end-of-speech
    pub fn closes_segment(&self) -> bool {
        self.is_final || self.is_end_of_speech
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}
