//! Navigation executor and motion backend adapter.
//!
//! The executor runs as a single task that owns the active goal. It issues
//! legs to a [`MotionBackend`], follows the backend's update stream, and
//! drives the goal state machine:
//!
//! `Pending -> Running -> {Succeeded, Failed, TimedOut, Cancelled}`
//!
//! Recoverable backend failures are retried after a fixed backoff, each leg
//! has its own deadline, and a newly submitted goal always cancels the
//! previous one. Emergency stop bypasses the command queue.

pub mod backend;
mod error;
mod executor;
mod handle;
pub mod simulated;

pub use backend::{
    channel_backend, BackendLink, BackendRequest, BackendStatus, BackendUpdate, ChannelBackend,
    GoalToken, MotionBackend, Twist,
};
pub use error::NavigationError;
pub use executor::{DriveCommand, ExecutorConfig, GoalOutcome, NavigationExecutor};
pub use handle::GoalHandle;
pub use simulated::{SimulatedBackend, SIMULATED_SENSORS};
