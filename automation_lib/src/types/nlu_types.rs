use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of a short manual movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Forward,
    Backward,
    Left,
    Right,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Forward => f.write_str("forward"),
            Direction::Backward => f.write_str("backward"),
            Direction::Left => f.write_str("left"),
            Direction::Right => f.write_str("right"),
        }
    }
}

/// Intent classification for natural language commands
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "intent", rename_all = "snake_case")]
pub enum Intent {
    // Motion control
    Move {
        direction: Direction,
        /// Seconds, when the user said "for N seconds"
        duration: Option<f32>,
    },
    Stop,
    EmergencyStop,

    // Navigation
    NavigateTo {
        location: String,
    },
    Explore,

    // Perception
    QueryObjects,
    FollowPerson,
    StopFollowing,

    // System
    ModeToggle {
        name: String,
        on: bool,
    },
}

impl Intent {
    /// Stop-type intents pass the health gate unconditionally
    pub fn is_safety_stop(&self) -> bool {
        matches!(self, Intent::Stop | Intent::EmergencyStop)
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Intent::Move {
                direction,
                duration: Some(secs),
            } => write!(f, "move {} for {:.1}s", direction, secs),
            Intent::Move { direction, .. } => write!(f, "move {}", direction),
            Intent::Stop => f.write_str("stop"),
            Intent::EmergencyStop => f.write_str("emergency stop"),
            Intent::NavigateTo { location } => write!(f, "navigate to {}", location),
            Intent::Explore => f.write_str("explore"),
            Intent::QueryObjects => f.write_str("query objects"),
            Intent::FollowPerson => f.write_str("follow person"),
            Intent::StopFollowing => f.write_str("stop following"),
            Intent::ModeToggle { name, on } => {
                write!(f, "{} mode {}", name, if *on { "on" } else { "off" })
            }
        }
    }
}
