use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Transcribed utterance handed over by the speech recognizer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechTranscription {
    /// Transcribed text
    pub text: String,

    /// Confidence score (0.0 to 1.0)
    pub confidence: f32,

    /// Timestamp when transcription was generated (Unix milliseconds)
    pub timestamp: i64,
}

impl SpeechTranscription {
    /// Create a new speech transcription
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence,
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    /// Check if transcription is empty
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Check if confidence is above threshold
    pub fn is_confident(&self, threshold: f32) -> bool {
        self.confidence >= threshold
    }
}
