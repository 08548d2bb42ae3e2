use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NavigationError {
    /// Rejected before reaching the state machine
    #[error("invalid goal: {0}")]
    InvalidGoal(String),

    #[error("navigation executor is not running")]
    ExecutorStopped,
}
