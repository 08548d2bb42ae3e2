//! Command interpreter: free-text utterance -> structured [`Intent`].
//!
//! Input is cleaned up first (recognizer artifacts, case, whitespace,
//! politeness fillers) and then checked against an ordered pattern table;
//! the first matching row decides the intent. Location names are captured
//! as spoken and are resolved later by the orchestrator.

mod patterns;
mod preprocess;

pub use patterns::extract_duration;
pub use preprocess::{preprocess_text, strip_wake_word};

use automation_lib::Intent;
use patterns::INTENT_PATTERNS;
use thiserror::Error;

/// The utterance did not match any known command. Carries the original text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized command: '{0}'")]
pub struct Unrecognized(pub String);

#[derive(Debug, Clone, Default)]
pub struct CommandInterpreter {
    _private: (),
}

impl CommandInterpreter {
    pub fn new() -> Self {
        // Build the table up front so a bad pattern shows at startup
        tracing::debug!("Command interpreter ready with {} patterns", INTENT_PATTERNS.len());
        Self { _private: () }
    }

    /// Map an utterance to an intent. Recognition failure is an ordinary
    /// outcome and never panics.
    pub fn interpret(&self, utterance: &str) -> Result<Intent, Unrecognized> {
        let cleaned = preprocess_text(utterance);
        tracing::debug!("Original: '{}' -> Cleaned: '{}'", utterance, cleaned);

        if cleaned.is_empty() {
            return Err(Unrecognized(utterance.to_string()));
        }

        for pattern in INTENT_PATTERNS.iter() {
            if let Some(intent) = pattern.apply(&cleaned) {
                tracing::info!(pattern = pattern.name, "Parsed intent: {}", intent);
                return Ok(intent);
            }
        }

        tracing::warn!("No pattern matched for: '{}'", cleaned);
        Err(Unrecognized(utterance.to_string()))
    }

    /// Wake-word gated variant used by the voice intake. Returns `None` when
    /// the wake word is absent, so the utterance should be ignored.
    pub fn interpret_after_wake_word(
        &self,
        utterance: &str,
        wake_word: &str,
    ) -> Option<Result<Intent, Unrecognized>> {
        let command = strip_wake_word(utterance, wake_word)?;
        Some(self.interpret(&command))
    }
}
