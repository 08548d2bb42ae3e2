use automation_lib::{Goal, GoalId, GoalState, GoalStatus};
use std::sync::Arc;
use tokio::sync::watch;

/// Read-only view of one submitted goal. Only the executor holds the
/// sending side of the status channel, so nothing else can change it.
#[derive(Debug, Clone)]
pub struct GoalHandle {
    id: GoalId,
    goal: Arc<Goal>,
    status: watch::Receiver<GoalStatus>,
}

impl GoalHandle {
    pub(crate) fn new(id: GoalId, goal: Arc<Goal>, status: watch::Receiver<GoalStatus>) -> Self {
        Self { id, goal, status }
    }

    pub fn id(&self) -> GoalId {
        self.id
    }

    pub fn goal(&self) -> &Goal {
        &self.goal
    }

    pub fn status(&self) -> GoalStatus {
        self.status.borrow().clone()
    }

    pub fn state(&self) -> GoalState {
        self.status.borrow().state
    }

    pub fn progress(&self) -> f32 {
        self.status.borrow().progress
    }

    pub fn is_terminal(&self) -> bool {
        self.state().is_terminal()
    }

    /// Receiver notified on every status change
    pub fn subscribe(&self) -> watch::Receiver<GoalStatus> {
        self.status.clone()
    }

    /// Wait until the goal reaches a terminal state and return its final
    /// status. If the executor goes away first, the last known status is
    /// returned.
    pub async fn wait_terminal(&self) -> GoalStatus {
        let mut rx = self.status.clone();
        if let Ok(status) = rx.wait_for(|status| status.state.is_terminal()).await {
            return status.clone();
        }
        let last = rx.borrow().clone();
        last
    }
}
