//! Motion backend boundary.
//!
//! The external navigation stack (localization, planning, control) is opaque
//! to the executor. It accepts one pose goal at a time, reports progress and
//! outcome on a broadcast stream keyed by [`GoalToken`], and acknowledges
//! cancellation.

use async_trait::async_trait;
use automation_lib::{GoalErrorKind, Pose};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{broadcast, mpsc, oneshot};

const UPDATE_CAPACITY: usize = 256;

/// Backend-side identity of one issued pose goal. Every retry of a leg gets
/// a fresh token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GoalToken(pub u64);

impl fmt::Display for GoalToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendStatus {
    Running,
    Succeeded,
    Failed(GoalErrorKind),
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackendUpdate {
    pub token: GoalToken,
    pub status: BackendStatus,
    /// Fraction of the current pose goal completed, 0.0-1.0
    pub progress: f32,
}

/// Velocity command for the base: m/s forward, rad/s counter-clockwise
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Twist {
    pub linear: f64,
    pub angular: f64,
}

impl Twist {
    pub fn new(linear: f64, angular: f64) -> Self {
        Self { linear, angular }
    }

    pub fn zero() -> Self {
        Self::default()
    }

    pub fn is_zero(&self) -> bool {
        self.linear == 0.0 && self.angular == 0.0
    }
}

#[async_trait]
pub trait MotionBackend: Send + Sync {
    /// Hand a pose goal to the stack. Outcomes arrive on [`subscribe`].
    ///
    /// [`subscribe`]: MotionBackend::subscribe
    async fn send_goal(&self, pose: Pose) -> GoalToken;

    /// Ask the stack to abandon `token`. Resolves once the stack has
    /// acknowledged; callers bound the wait themselves.
    async fn cancel(&self, token: GoalToken) -> eyre::Result<()>;

    /// Stop all motion now, whatever is in progress
    async fn halt(&self);

    async fn set_velocity(&self, twist: Twist);

    fn subscribe(&self) -> broadcast::Receiver<BackendUpdate>;
}

/// Request forwarded from a [`ChannelBackend`] to whatever drives the stack
#[derive(Debug)]
pub enum BackendRequest {
    Goal { token: GoalToken, pose: Pose },
    Cancel {
        token: GoalToken,
        ack: oneshot::Sender<()>,
    },
    Halt,
    Velocity(Twist),
}

/// Backend that forwards every request over a channel. The other end, a
/// [`BackendLink`], belongs to the bridge to the real stack (or to a test).
pub struct ChannelBackend {
    requests: mpsc::UnboundedSender<BackendRequest>,
    updates: broadcast::Sender<BackendUpdate>,
    next_token: AtomicU64,
}

/// Stack side of a [`ChannelBackend`]
pub struct BackendLink {
    requests: mpsc::UnboundedReceiver<BackendRequest>,
    updates: broadcast::Sender<BackendUpdate>,
}

pub fn channel_backend() -> (ChannelBackend, BackendLink) {
    let (req_tx, req_rx) = mpsc::unbounded_channel();
    let (updates, _) = broadcast::channel(UPDATE_CAPACITY);

    let backend = ChannelBackend {
        requests: req_tx,
        updates: updates.clone(),
        next_token: AtomicU64::new(1),
    };
    let link = BackendLink {
        requests: req_rx,
        updates,
    };
    (backend, link)
}

impl ChannelBackend {
    fn forward(&self, request: BackendRequest) -> bool {
        if self.requests.send(request).is_err() {
            tracing::warn!("Motion backend link is closed, request dropped");
            return false;
        }
        true
    }
}

#[async_trait]
impl MotionBackend for ChannelBackend {
    async fn send_goal(&self, pose: Pose) -> GoalToken {
        let token = GoalToken(self.next_token.fetch_add(1, Ordering::Relaxed));
        self.forward(BackendRequest::Goal { token, pose });
        token
    }

    async fn cancel(&self, token: GoalToken) -> eyre::Result<()> {
        let (ack, acked) = oneshot::channel();
        if !self.forward(BackendRequest::Cancel { token, ack }) {
            return Err(eyre::eyre!("backend link closed"));
        }
        acked
            .await
            .map_err(|_| eyre::eyre!("backend dropped cancel request for {}", token))
    }

    async fn halt(&self) {
        self.forward(BackendRequest::Halt);
    }

    async fn set_velocity(&self, twist: Twist) {
        self.forward(BackendRequest::Velocity(twist));
    }

    fn subscribe(&self) -> broadcast::Receiver<BackendUpdate> {
        self.updates.subscribe()
    }
}

impl BackendLink {
    /// Next request, or `None` once the backend has been dropped
    pub async fn recv(&mut self) -> Option<BackendRequest> {
        self.requests.recv().await
    }

    pub fn try_recv(&mut self) -> Option<BackendRequest> {
        self.requests.try_recv().ok()
    }

    /// Publish a status update for `token`
    pub fn report(&self, token: GoalToken, status: BackendStatus, progress: f32) {
        let update = BackendUpdate {
            token,
            status,
            progress,
        };
        // Nobody listening is fine
        let _ = self.updates.send(update);
    }
}
