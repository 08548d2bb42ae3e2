//! Spoken responses for dispatch results and goal outcomes

use crate::error::DispatchError;
use crate::orchestrator::Dispatched;
use automation_lib::{GoalState, TtsCommand, TtsPriority};
use navigation_executor::GoalOutcome;
use std::collections::BTreeMap;

pub fn acknowledge(dispatched: &Dispatched) -> TtsCommand {
    match dispatched {
        Dispatched::Stopped => TtsCommand::normal("Stopping"),
        Dispatched::EmergencyStopped => {
            TtsCommand::new("Emergency stop activated", TtsPriority::Emergency)
        }
        Dispatched::Navigating { location, .. } => {
            TtsCommand::normal(format!("Navigating to {}", location))
        }
        Dispatched::Exploring { stops, .. } => {
            TtsCommand::normal(format!("Starting exploration of {} locations", stops))
        }
        Dispatched::Moving { direction, .. } => TtsCommand::normal(format!("Moving {}", direction)),
        Dispatched::Objects(counts) => TtsCommand::normal(describe_detections(counts)),
        Dispatched::Following => TtsCommand::normal("Starting follow me mode"),
        Dispatched::FollowingStopped => TtsCommand::normal("Stopped following"),
        Dispatched::ModeChanged { name, on } => TtsCommand::normal(format!(
            "{} mode {}",
            name,
            if *on { "on" } else { "off" }
        )),
    }
}

pub fn dispatch_error(error: &DispatchError) -> TtsCommand {
    match error {
        DispatchError::Blocked(reason) => TtsCommand::new(
            format!("I can't do that right now, {} check failed", reason),
            TtsPriority::High,
        ),
        DispatchError::UnknownLocation(name) => {
            TtsCommand::normal(format!("Unknown location: {}", name))
        }
        DispatchError::InvalidGoal(reason) => {
            TtsCommand::normal(format!("I can't go there, {}", reason))
        }
        DispatchError::ModuleUnavailable(module) => {
            TtsCommand::normal(format!("The {} module is not available", module))
        }
        DispatchError::Perception(_) => TtsCommand::normal("I couldn't look around right now"),
    }
}

pub fn not_understood() -> TtsCommand {
    TtsCommand::normal("I didn't understand that command")
}

/// Cancellations are not announced; they were requested by someone.
pub fn goal_outcome(outcome: &GoalOutcome) -> Option<TtsCommand> {
    let text = match outcome.state {
        GoalState::Succeeded if outcome.goal.is_waypoint_sequence() => "Exploration complete".to_string(),
        GoalState::Succeeded => "I have arrived".to_string(),
        GoalState::Failed(kind) => format!("Navigation failed, {}", kind),
        GoalState::TimedOut => "Navigation timed out".to_string(),
        GoalState::Cancelled | GoalState::Pending | GoalState::Running => return None,
    };
    Some(TtsCommand::normal(text))
}

/// "I see a chair and 2 persons"
pub fn describe_detections(counts: &BTreeMap<String, usize>) -> String {
    let parts: Vec<String> = counts
        .iter()
        .map(|(class, &count)| match count {
            1 => format!("a {}", class),
            n => format!("{} {}s", n, class),
        })
        .collect();

    match parts.as_slice() {
        [] => "I don't see anything".to_string(),
        [only] => format!("I see {}", only),
        [rest @ .., last] => format!("I see {} and {}", rest.join(", "), last),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use automation_lib::{Goal, GoalErrorKind, GoalId, Pose};
    use std::sync::Arc;

    fn counts(pairs: &[(&str, usize)]) -> BTreeMap<String, usize> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_describe_detections() {
        assert_eq!(describe_detections(&counts(&[])), "I don't see anything");
        assert_eq!(describe_detections(&counts(&[("cup", 1)])), "I see a cup");
        assert_eq!(
            describe_detections(&counts(&[("person", 2), ("chair", 1)])),
            "I see a chair and 2 persons"
        );
        assert_eq!(
            describe_detections(&counts(&[("person", 2), ("chair", 1), ("cup", 3)])),
            "I see a chair, 3 cups and 2 persons"
        );
    }

    #[test]
    fn test_emergency_ack_priority() {
        let ack = acknowledge(&Dispatched::EmergencyStopped);
        assert_eq!(ack.priority, TtsPriority::Emergency);
        assert_eq!(ack.text, "Emergency stop activated");
    }

    #[test]
    fn test_blocked_is_high_priority() {
        let spoken = dispatch_error(&DispatchError::Blocked("battery".into()));
        assert_eq!(spoken.priority, TtsPriority::High);
        assert!(spoken.text.contains("battery"));
    }

    #[test]
    fn test_goal_outcomes() {
        let outcome = |goal: Goal, state| GoalOutcome {
            id: GoalId::new(),
            goal: Arc::new(goal),
            state,
            completed_legs: 0,
            total_legs: 1,
        };
        let single = Goal::SinglePose(Pose::origin());

        assert_eq!(
            goal_outcome(&outcome(single.clone(), GoalState::Succeeded)).unwrap().text,
            "I have arrived"
        );
        assert_eq!(
            goal_outcome(&outcome(
                Goal::WaypointSequence(vec![Pose::origin()]),
                GoalState::Succeeded
            ))
            .unwrap()
            .text,
            "Exploration complete"
        );
        assert_eq!(
            goal_outcome(&outcome(single.clone(), GoalState::Failed(GoalErrorKind::Unreachable)))
                .unwrap()
                .text,
            "Navigation failed, target unreachable"
        );
        assert!(goal_outcome(&outcome(single, GoalState::Cancelled)).is_none());
    }
}
