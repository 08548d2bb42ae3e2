use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Text-to-speech command
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsCommand {
    pub text: String,
    pub timestamp: i64,
    pub priority: TtsPriority,
}

impl TtsCommand {
    pub fn new(text: impl Into<String>, priority: TtsPriority) -> Self {
        Self {
            text: text.into(),
            timestamp: Utc::now().timestamp_millis(),
            priority,
        }
    }

    pub fn normal(text: impl Into<String>) -> Self {
        Self::new(text, TtsPriority::Normal)
    }
}

/// Priority for TTS messages
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum TtsPriority {
    Low = 0,
    #[default]
    Normal = 1,
    High = 2,
    Emergency = 3,
}
