use crate::backend::{BackendStatus, BackendUpdate, GoalToken, MotionBackend, Twist};
use crate::error::NavigationError;
use crate::handle::GoalHandle;
use automation_lib::{Direction, Goal, GoalId, GoalState, GoalStatus, NavigationConfig, Pose};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, oneshot, watch, Notify};
use tokio::time::{sleep_until, Instant};

const COMMAND_CAPACITY: usize = 32;
const OUTCOME_CAPACITY: usize = 64;

/// Longest wait a deadline is allowed to express (about 30 years)
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// `now + after`, saturated so oversized durations cannot panic
fn deadline_after(after: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(after.min(FAR_FUTURE)).unwrap_or(now)
}

#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Deadline for each leg, counted from the leg's first issue
    pub goal_timeout: Duration,
    /// Re-issues allowed per goal for recoverable failures
    pub retry_limit: u32,
    pub retry_backoff: Duration,
    pub cancel_timeout: Duration,
    pub drive_speed: f64,
    pub turn_speed: f64,
    pub default_move: Duration,
    /// Timed drives are clamped to this
    pub max_move: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self::from(&NavigationConfig::default())
    }
}

impl From<&NavigationConfig> for ExecutorConfig {
    fn from(config: &NavigationConfig) -> Self {
        Self {
            goal_timeout: config.goal_timeout(),
            retry_limit: config.retry_limit,
            retry_backoff: config.retry_backoff(),
            cancel_timeout: config.cancel_timeout(),
            drive_speed: config.drive_speed,
            turn_speed: config.turn_speed,
            default_move: config.default_move(),
            max_move: config.max_move(),
        }
    }
}

/// Short open-loop motion, e.g. "move forward for 3 seconds"
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriveCommand {
    pub direction: Direction,
    /// Falls back to the configured default when `None`
    pub duration: Option<Duration>,
}

/// Terminal result of one goal, broadcast once per goal
#[derive(Debug, Clone)]
pub struct GoalOutcome {
    pub id: GoalId,
    pub goal: Arc<Goal>,
    pub state: GoalState,
    pub completed_legs: usize,
    pub total_legs: usize,
}

enum Command {
    Submit {
        goal: Goal,
        reply: oneshot::Sender<GoalHandle>,
    },
    Cancel {
        reply: oneshot::Sender<()>,
    },
    Drive {
        command: DriveCommand,
        reply: oneshot::Sender<()>,
    },
}

/// Handle to the navigation executor task. Cheap to clone; all clones talk
/// to the same task, which is the only owner of goal state.
#[derive(Clone)]
pub struct NavigationExecutor {
    commands: mpsc::Sender<Command>,
    emergency: Arc<Notify>,
    backend: Arc<dyn MotionBackend>,
    current: watch::Receiver<Option<GoalHandle>>,
    outcomes: broadcast::Sender<GoalOutcome>,
}

impl NavigationExecutor {
    /// Start the executor task on the current runtime
    pub fn spawn(backend: Arc<dyn MotionBackend>, config: ExecutorConfig) -> Self {
        let (commands, command_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (current_tx, current) = watch::channel(None);
        let (outcomes, _) = broadcast::channel(OUTCOME_CAPACITY);
        let emergency = Arc::new(Notify::new());

        let actor = Actor {
            updates: backend.subscribe(),
            updates_open: true,
            backend: backend.clone(),
            config,
            commands: command_rx,
            emergency: emergency.clone(),
            current: current_tx,
            outcomes: outcomes.clone(),
            active: None,
            drive_until: None,
        };
        tokio::spawn(actor.run());

        Self {
            commands,
            emergency,
            backend,
            current,
            outcomes,
        }
    }

    async fn submit(&self, goal: Goal) -> Result<GoalHandle, NavigationError> {
        let (reply, handle) = oneshot::channel();
        self.commands
            .send(Command::Submit { goal, reply })
            .await
            .map_err(|_| NavigationError::ExecutorStopped)?;
        handle.await.map_err(|_| NavigationError::ExecutorStopped)
    }

    /// Drive to a single pose. Any active goal is cancelled first.
    pub async fn navigate_to_pose(&self, pose: Pose) -> Result<GoalHandle, NavigationError> {
        self.submit(Goal::SinglePose(pose)).await
    }

    /// Drive through `poses` in order. An empty list is rejected here and
    /// never reaches the executor task.
    pub async fn follow_waypoints(&self, poses: Vec<Pose>) -> Result<GoalHandle, NavigationError> {
        if poses.is_empty() {
            return Err(NavigationError::InvalidGoal(
                "waypoint sequence is empty".to_string(),
            ));
        }
        self.submit(Goal::WaypointSequence(poses)).await
    }

    /// Cancel the active goal and any timed drive. Returns once the goal is
    /// terminal.
    pub async fn cancel_active(&self) -> Result<(), NavigationError> {
        let (reply, done) = oneshot::channel();
        self.commands
            .send(Command::Cancel { reply })
            .await
            .map_err(|_| NavigationError::ExecutorStopped)?;
        done.await.map_err(|_| NavigationError::ExecutorStopped)
    }

    /// Timed velocity drive. Supersedes any active goal.
    pub async fn drive(&self, command: DriveCommand) -> Result<(), NavigationError> {
        let (reply, done) = oneshot::channel();
        self.commands
            .send(Command::Drive { command, reply })
            .await
            .map_err(|_| NavigationError::ExecutorStopped)?;
        done.await.map_err(|_| NavigationError::ExecutorStopped)
    }

    /// Halt the base immediately and cancel whatever the executor is doing.
    /// Does not queue behind pending commands.
    pub async fn emergency_stop(&self) {
        self.backend.halt().await;
        self.emergency.notify_one();
    }

    /// Stop all base motion without touching goal state
    pub async fn halt(&self) {
        self.backend.halt().await;
    }

    /// Most recently submitted goal, which may already be terminal
    pub fn current_handle(&self) -> Option<GoalHandle> {
        self.current.borrow().clone()
    }

    pub fn is_active(&self) -> bool {
        self.current
            .borrow()
            .as_ref()
            .is_some_and(|handle| !handle.is_terminal())
    }

    pub fn subscribe_outcomes(&self) -> broadcast::Receiver<GoalOutcome> {
        self.outcomes.subscribe()
    }
}

struct ActiveGoal {
    id: GoalId,
    goal: Arc<Goal>,
    status: watch::Sender<GoalStatus>,
    leg: usize,
    /// Backend token of the in-flight attempt; `None` while backing off
    token: Option<GoalToken>,
    leg_deadline: Instant,
    retry_at: Option<Instant>,
}

struct Actor {
    backend: Arc<dyn MotionBackend>,
    config: ExecutorConfig,
    commands: mpsc::Receiver<Command>,
    emergency: Arc<Notify>,
    updates: broadcast::Receiver<BackendUpdate>,
    updates_open: bool,
    current: watch::Sender<Option<GoalHandle>>,
    outcomes: broadcast::Sender<GoalOutcome>,
    active: Option<ActiveGoal>,
    drive_until: Option<Instant>,
}

/// Sleep until `deadline`, or forever when there is none
fn sleep_until_opt(deadline: Option<Instant>) -> impl Future<Output = ()> {
    async move {
        match deadline {
            Some(deadline) => sleep_until(deadline).await,
            None => std::future::pending().await,
        }
    }
}

impl Actor {
    async fn run(mut self) {
        tracing::info!(
            "Navigation executor started (leg timeout {:?}, {} retries)",
            self.config.goal_timeout,
            self.config.retry_limit
        );

        loop {
            let leg_deadline = self.active.as_ref().map(|a| a.leg_deadline);
            let retry_at = self.active.as_ref().and_then(|a| a.retry_at);
            let drive_until = self.drive_until;

            tokio::select! {
                biased;

                _ = self.emergency.notified() => self.on_emergency().await,

                command = self.commands.recv() => match command {
                    Some(command) => self.on_command(command).await,
                    None => break,
                },

                update = self.updates.recv(), if self.updates_open => match update {
                    Ok(update) => self.on_update(update).await,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Backend update stream lagged");
                    }
                    Err(RecvError::Closed) => {
                        tracing::error!("Backend update stream closed");
                        self.updates_open = false;
                    }
                },

                _ = sleep_until_opt(retry_at) => self.on_retry().await,

                _ = sleep_until_opt(leg_deadline) => self.on_leg_timeout().await,

                _ = sleep_until_opt(drive_until) => self.on_drive_elapsed().await,
            }
        }

        if self.active.is_some() {
            self.abandon(GoalState::Cancelled).await;
        }
        tracing::info!("Navigation executor stopped");
    }

    async fn on_command(&mut self, command: Command) {
        match command {
            Command::Submit { goal, reply } => {
                let handle = self.start_goal(goal).await;
                let _ = reply.send(handle);
            }
            Command::Cancel { reply } => {
                if self.active.is_some() {
                    self.abandon(GoalState::Cancelled).await;
                }
                self.stop_drive().await;
                let _ = reply.send(());
            }
            Command::Drive { command, reply } => {
                if self.active.is_some() {
                    self.abandon(GoalState::Cancelled).await;
                }
                self.start_drive(command).await;
                let _ = reply.send(());
            }
        }
    }

    async fn start_goal(&mut self, goal: Goal) -> GoalHandle {
        // Last goal wins: the previous handle is terminal before the new
        // one is issued
        if self.active.is_some() {
            self.abandon(GoalState::Cancelled).await;
        }
        self.stop_drive().await;

        let id = GoalId::new();
        let goal = Arc::new(goal);
        let (status, status_rx) =
            watch::channel(GoalStatus::pending(goal.leg_count(), self.config.retry_limit));
        let handle = GoalHandle::new(id, goal.clone(), status_rx);
        self.current.send_replace(Some(handle.clone()));

        tracing::info!(
            goal_id = %id,
            legs = goal.leg_count(),
            "Goal accepted"
        );

        self.active = Some(ActiveGoal {
            id,
            goal,
            status,
            leg: 0,
            token: None,
            leg_deadline: deadline_after(self.config.goal_timeout),
            retry_at: None,
        });
        self.issue_leg().await;
        handle
    }

    /// Send the current leg of the active goal to the backend
    async fn issue_leg(&mut self) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        let pose = active.goal.legs()[active.leg];
        let token = self.backend.send_goal(pose).await;

        tracing::debug!(
            goal_id = %active.id,
            leg = active.leg,
            %token,
            "Issued leg to {}",
            pose
        );

        active.token = Some(token);
        active.retry_at = None;
        active.status.send_modify(|status| status.state = GoalState::Running);
    }

    async fn on_update(&mut self, update: BackendUpdate) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        if active.token != Some(update.token) {
            tracing::trace!(token = %update.token, "Ignoring update for stale token");
            return;
        }

        match update.status {
            BackendStatus::Running => {
                let single = !active.goal.is_waypoint_sequence();
                active.status.send_if_modified(|status| {
                    let progress = if single {
                        update.progress.clamp(0.0, 1.0)
                    } else {
                        status.completed_legs as f32 / status.total_legs as f32
                    };
                    if progress > status.progress {
                        status.progress = progress;
                        true
                    } else {
                        false
                    }
                });
            }
            BackendStatus::Succeeded => {
                let total = active.goal.leg_count();
                active.status.send_modify(|status| {
                    status.completed_legs += 1;
                    status.progress = status
                        .progress
                        .max(status.completed_legs as f32 / total as f32);
                });

                if active.leg + 1 < total {
                    active.leg += 1;
                    active.token = None;
                    active.leg_deadline = deadline_after(self.config.goal_timeout);
                    tracing::info!(goal_id = %active.id, "Leg {}/{} reached", active.leg, total);
                    self.issue_leg().await;
                } else {
                    self.finish(GoalState::Succeeded);
                }
            }
            BackendStatus::Failed(kind) => {
                let retries_remaining = active.status.borrow().retries_remaining;
                if kind.is_recoverable() && retries_remaining > 0 {
                    active.token = None;
                    active.retry_at = Some(deadline_after(self.config.retry_backoff));
                    active
                        .status
                        .send_modify(|status| status.retries_remaining -= 1);
                    tracing::warn!(
                        goal_id = %active.id,
                        leg = active.leg,
                        "Leg failed ({}), retrying in {:?} ({} retries left)",
                        kind,
                        self.config.retry_backoff,
                        retries_remaining - 1
                    );
                } else {
                    self.finish(GoalState::Failed(kind));
                }
            }
            BackendStatus::Cancelled => {
                tracing::warn!(goal_id = %active.id, "Backend cancelled the goal");
                self.finish(GoalState::Cancelled);
            }
        }
    }

    async fn on_retry(&mut self) {
        if let Some(active) = self.active.as_ref() {
            tracing::info!(goal_id = %active.id, leg = active.leg, "Retrying leg");
        }
        self.issue_leg().await;
    }

    async fn on_leg_timeout(&mut self) {
        if let Some(active) = self.active.as_ref() {
            tracing::warn!(
                goal_id = %active.id,
                leg = active.leg,
                "Leg exceeded {:?}",
                self.config.goal_timeout
            );
        }
        self.abandon(GoalState::TimedOut).await;
    }

    async fn on_emergency(&mut self) {
        tracing::warn!("Emergency stop");
        // The base was already halted by the caller
        if self.active.is_some() {
            self.finish(GoalState::Cancelled);
        }
        self.drive_until = None;
    }

    /// Cancel the in-flight backend goal, if any, and end the active goal in
    /// `state`. The backend acknowledgement is awaited up to the cancel
    /// timeout; after that the goal ends anyway.
    async fn abandon(&mut self, state: GoalState) {
        let token = self.active.as_ref().and_then(|a| a.token);
        if let Some(token) = token {
            match tokio::time::timeout(self.config.cancel_timeout, self.backend.cancel(token)).await
            {
                Ok(Ok(())) => tracing::debug!(%token, "Backend acknowledged cancel"),
                Ok(Err(e)) => tracing::warn!(%token, "Backend cancel failed: {}", e),
                Err(_) => tracing::warn!(
                    %token,
                    "Backend did not acknowledge cancel within {:?}, forcing {}",
                    self.config.cancel_timeout,
                    state
                ),
            }
        }
        self.finish(state);
    }

    /// Move the active goal to a terminal state and announce it
    fn finish(&mut self, state: GoalState) {
        let Some(active) = self.active.take() else {
            return;
        };

        active.status.send_modify(|status| {
            status.state = state;
            if state == GoalState::Succeeded {
                status.progress = 1.0;
            }
        });
        let status = active.status.borrow().clone();

        match state {
            GoalState::Succeeded => tracing::info!(goal_id = %active.id, "Goal succeeded"),
            _ => tracing::warn!(
                goal_id = %active.id,
                completed_legs = status.completed_legs,
                "Goal ended: {}",
                state
            ),
        }

        let outcome = GoalOutcome {
            id: active.id,
            goal: active.goal,
            state,
            completed_legs: status.completed_legs,
            total_legs: status.total_legs,
        };
        // No subscribers is fine
        let _ = self.outcomes.send(outcome);
    }

    async fn start_drive(&mut self, command: DriveCommand) {
        let speed = self.config.drive_speed;
        let turn = self.config.turn_speed;
        let twist = match command.direction {
            Direction::Forward => Twist::new(speed, 0.0),
            Direction::Backward => Twist::new(-speed, 0.0),
            Direction::Left => Twist::new(0.0, turn),
            Direction::Right => Twist::new(0.0, -turn),
        };
        let requested = command.duration.unwrap_or(self.config.default_move);
        let duration = requested.min(self.config.max_move);
        if duration < requested {
            tracing::warn!("Clamping drive of {:?} to {:?}", requested, duration);
        }

        tracing::info!("Driving {} for {:?}", command.direction, duration);
        self.backend.set_velocity(twist).await;
        self.drive_until = Some(deadline_after(duration));
    }

    async fn stop_drive(&mut self) {
        if self.drive_until.take().is_some() {
            self.backend.set_velocity(Twist::zero()).await;
        }
    }

    async fn on_drive_elapsed(&mut self) {
        tracing::debug!("Timed drive finished");
        self.stop_drive().await;
    }
}
