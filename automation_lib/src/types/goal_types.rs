use crate::Pose;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identity of one submitted goal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GoalId(Uuid);

impl GoalId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for GoalId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for GoalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The first block of the uuid is plenty to tell goals apart in logs
        let text = self.0.to_string();
        f.write_str(&text[..8])
    }
}

/// Motion target submitted to the navigation executor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "poses")]
pub enum Goal {
    SinglePose(Pose),
    /// Ordered legs, never empty once accepted by the executor
    WaypointSequence(Vec<Pose>),
}

impl Goal {
    /// Poses in the order they are driven to
    pub fn legs(&self) -> &[Pose] {
        match self {
            Goal::SinglePose(pose) => std::slice::from_ref(pose),
            Goal::WaypointSequence(poses) => poses,
        }
    }

    pub fn leg_count(&self) -> usize {
        self.legs().len()
    }

    pub fn is_waypoint_sequence(&self) -> bool {
        matches!(self, Goal::WaypointSequence(_))
    }
}

/// Error classes reported by the motion backend when a goal fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalErrorKind {
    /// Transient sensor dropout (recoverable)
    SensorDropout,
    /// Planner temporarily unable to accept work (recoverable)
    PlannerBusy,
    /// No path to the target exists
    Unreachable,
    /// Target pose is malformed or outside the map
    InvalidPose,
}

impl GoalErrorKind {
    pub fn is_recoverable(&self) -> bool {
        matches!(self, GoalErrorKind::SensorDropout | GoalErrorKind::PlannerBusy)
    }

    /// Short phrase used in logs and spoken feedback
    pub fn describe(&self) -> &'static str {
        match self {
            GoalErrorKind::SensorDropout => "sensor dropout",
            GoalErrorKind::PlannerBusy => "planner busy",
            GoalErrorKind::Unreachable => "target unreachable",
            GoalErrorKind::InvalidPose => "invalid pose",
        }
    }
}

impl fmt::Display for GoalErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// Goal state machine: `Pending -> Running -> {Succeeded, Failed, TimedOut, Cancelled}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "error", rename_all = "snake_case")]
pub enum GoalState {
    Pending,
    Running,
    Succeeded,
    Failed(GoalErrorKind),
    TimedOut,
    Cancelled,
}

impl GoalState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, GoalState::Pending | GoalState::Running)
    }
}

impl fmt::Display for GoalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GoalState::Pending => f.write_str("pending"),
            GoalState::Running => f.write_str("running"),
            GoalState::Succeeded => f.write_str("succeeded"),
            GoalState::Failed(kind) => write!(f, "failed ({})", kind),
            GoalState::TimedOut => f.write_str("timed out"),
            GoalState::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// Observable status of one goal handle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalStatus {
    pub state: GoalState,
    /// Fraction in [0.0, 1.0], never decreases for a given goal
    pub progress: f32,
    pub completed_legs: usize,
    pub total_legs: usize,
    pub retries_remaining: u32,
}

impl GoalStatus {
    pub fn pending(total_legs: usize, retries: u32) -> Self {
        Self {
            state: GoalState::Pending,
            progress: 0.0,
            completed_legs: 0,
            total_legs,
            retries_remaining: retries,
        }
    }
}
