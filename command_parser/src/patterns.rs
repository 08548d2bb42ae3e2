use automation_lib::{Direction, Intent};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// Builds the intent from the full text and the pattern's captures
type Build = fn(&str, &Captures<'_>) -> Option<Intent>;

/// One row of the intent table: a regex over preprocessed text and the
/// function that turns its captures into an intent
pub(crate) struct IntentPattern {
    pub name: &'static str,
    regex: Regex,
    build: Build,
}

impl IntentPattern {
    fn new(name: &'static str, pattern: &str, build: Build) -> Self {
        Self {
            name,
            regex: Regex::new(pattern).expect("intent pattern is valid"),
            build,
        }
    }

    pub fn apply(&self, text: &str) -> Option<Intent> {
        let caps = self.regex.captures(text)?;
        (self.build)(text, &caps)
    }
}

/// Ordered intent table. Earlier rows win, so more specific phrases must
/// come before the generic ones they contain.
pub(crate) static INTENT_PATTERNS: Lazy<Vec<IntentPattern>> = Lazy::new(|| {
    vec![
        IntentPattern::new(
            "emergency_stop",
            r"\bemergency\b|\be-?stop\b|\bstop\b.*\b(now|immediately)\b|\babort\b",
            |_, _| Some(Intent::EmergencyStop),
        ),
        IntentPattern::new(
            "stop_following",
            r"\b(stop|quit|end)\s+(following|tracking)\b|\bdon'?t\s+follow\b",
            |_, _| Some(Intent::StopFollowing),
        ),
        IntentPattern::new(
            "stop",
            r"\b(stop|halt|freeze|brake)\b",
            |_, _| Some(Intent::Stop),
        ),
        IntentPattern::new(
            "navigate_to",
            r"\b(?:navigate|go|head|drive|move|take\s+me|return)\s+(?:back\s+)?to\s+(?:the\s+|my\s+)?(?P<location>[a-z0-9][a-z0-9' ]*?)\s*(?:now)?$",
            |_, caps| {
                let location = caps.name("location")?.as_str().trim();
                (!location.is_empty()).then(|| Intent::NavigateTo {
                    location: location.to_string(),
                })
            },
        ),
        IntentPattern::new(
            "explore",
            r"\b(explore|patrol|wander|look\s+around)\b",
            |_, _| Some(Intent::Explore),
        ),
        IntentPattern::new(
            "query_objects",
            r"\b(what|tell\s+me)\b.*\b(you\s+)?(see|detect)\b|\bwhat'?s?\s+(is\s+)?around\b|\bscan\b",
            |_, _| Some(Intent::QueryObjects),
        ),
        IntentPattern::new(
            "follow_person",
            r"\bfollow\s+(me|(the\s+)?person)\b|\bstart\s+following\b",
            |_, _| Some(Intent::FollowPerson),
        ),
        IntentPattern::new(
            "mode_toggle",
            r"\b(?P<verb>turn\s+on|turn\s+off|enable|disable|activate|deactivate)\s+(?:the\s+)?(?P<name>[a-z][a-z ]*?)(?:\s+mode)?$",
            |_, caps| {
                let on = matches!(
                    caps.name("verb")?.as_str().split_whitespace().last()?,
                    "on" | "enable" | "activate"
                );
                let name = caps.name("name")?.as_str().trim().to_string();
                (!name.is_empty()).then_some(Intent::ModeToggle { name, on })
            },
        ),
        IntentPattern::new(
            "move_forward",
            r"\b(move|go|drive|head)\b.*\b(forward|ahead|straight)\b|\badvance\b",
            |text, _| Some(movement(Direction::Forward, text)),
        ),
        IntentPattern::new(
            "move_backward",
            r"\b(move|go|drive|head)\b.*\b(back|backward|backwards|reverse)\b|\bback\s+up\b",
            |text, _| Some(movement(Direction::Backward, text)),
        ),
        IntentPattern::new(
            "turn_left",
            r"\b(turn|rotate|spin)\b.*\bleft\b",
            |text, _| Some(movement(Direction::Left, text)),
        ),
        IntentPattern::new(
            "turn_right",
            r"\b(turn|rotate|spin)\b.*\bright\b",
            |text, _| Some(movement(Direction::Right, text)),
        ),
    ]
});

fn movement(direction: Direction, text: &str) -> Intent {
    Intent::Move {
        direction,
        duration: extract_duration(text),
    }
}

static DURATION_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"for\s+(\d+(?:\.\d+)?)\s*(seconds?|secs?|s|minutes?|mins?)\b")
        .expect("valid regex")
});

/// "for 3 seconds" -> 3.0, "for 1 minute" -> 60.0
pub fn extract_duration(text: &str) -> Option<f32> {
    DURATION_REGEX.captures(text).and_then(|cap| {
        let value = cap[1].parse::<f32>().ok()?;
        let seconds = if cap[2].starts_with("min") {
            value * 60.0
        } else {
            value
        };
        Some(seconds)
    })
}
