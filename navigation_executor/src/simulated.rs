use crate::backend::{
    channel_backend, BackendLink, BackendRequest, BackendStatus, BackendUpdate, ChannelBackend,
    GoalToken, MotionBackend, Twist,
};
use async_trait::async_trait;
use automation_lib::{normalize_angle, GoalErrorKind, Pose, SimulationConfig};
use health_monitor::SensorReporter;
use nalgebra::Vector2;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::time::MissedTickBehavior;

/// Distance at which the simulated base counts as arrived (m)
const ARRIVAL_TOLERANCE: f64 = 0.01;

/// Streams the simulated base reports as alive on every tick
pub const SIMULATED_SENSORS: [&str; 3] = ["lidar", "imu", "odom"];

/// Stand-in for a real navigation stack: drives straight toward each goal
/// at a fixed speed and reports progress on every tick.
pub struct SimulatedBackend {
    inner: ChannelBackend,
    pose: watch::Receiver<Pose>,
}

impl SimulatedBackend {
    /// Start the simulation task on the current runtime
    pub fn spawn(config: SimulationConfig) -> Self {
        Self::start(config, None)
    }

    /// Like [`spawn`](Self::spawn), and also pings [`SIMULATED_SENSORS`]
    /// through `sensors` on every tick
    pub fn spawn_with_sensors(config: SimulationConfig, sensors: SensorReporter) -> Self {
        Self::start(config, Some(sensors))
    }

    fn start(config: SimulationConfig, sensors: Option<SensorReporter>) -> Self {
        let (inner, link) = channel_backend();
        let (pose_tx, pose) = watch::channel(config.start_pose);

        let sim = Simulation::new(config, link, pose_tx, sensors);
        tokio::spawn(sim.run());

        Self { inner, pose }
    }

    /// Current simulated pose
    pub fn pose(&self) -> Pose {
        *self.pose.borrow()
    }
}

#[async_trait]
impl MotionBackend for SimulatedBackend {
    async fn send_goal(&self, pose: Pose) -> GoalToken {
        self.inner.send_goal(pose).await
    }

    async fn cancel(&self, token: GoalToken) -> eyre::Result<()> {
        self.inner.cancel(token).await
    }

    async fn halt(&self) {
        self.inner.halt().await
    }

    async fn set_velocity(&self, twist: Twist) {
        self.inner.set_velocity(twist).await
    }

    fn subscribe(&self) -> broadcast::Receiver<BackendUpdate> {
        self.inner.subscribe()
    }
}

struct Target {
    token: GoalToken,
    pose: Pose,
    start_distance: f64,
}

struct Simulation {
    config: SimulationConfig,
    link: BackendLink,
    pose_tx: watch::Sender<Pose>,
    sensors: Option<SensorReporter>,
    position: Vector2<f64>,
    yaw: f64,
    target: Option<Target>,
    velocity: Twist,
}

impl Simulation {
    fn new(
        config: SimulationConfig,
        link: BackendLink,
        pose_tx: watch::Sender<Pose>,
        sensors: Option<SensorReporter>,
    ) -> Self {
        let start = config.start_pose;
        Self {
            config,
            link,
            pose_tx,
            sensors,
            position: Vector2::new(start.x, start.y),
            yaw: start.yaw,
            target: None,
            velocity: Twist::zero(),
        }
    }

    async fn run(mut self) {
        // A zero period would panic in `interval`
        let period = self.config.update_interval().max(Duration::from_millis(1));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(
            "Simulated motion backend running at {:.2} m/s, arena radius {:.1} m",
            self.config.speed,
            self.config.arena_radius
        );

        loop {
            tokio::select! {
                request = self.link.recv() => match request {
                    Some(request) => self.handle(request),
                    None => break,
                },
                _ = ticker.tick() => {
                    self.step(period.as_secs_f64());
                    self.ping_sensors();
                }
            }
        }

        tracing::debug!("Simulated motion backend stopped");
    }

    fn handle(&mut self, request: BackendRequest) {
        match request {
            BackendRequest::Goal { token, pose } => self.accept_goal(token, pose),
            BackendRequest::Cancel { token, ack } => {
                if self.target.as_ref().is_some_and(|t| t.token == token) {
                    self.target = None;
                    self.link.report(token, BackendStatus::Cancelled, 0.0);
                }
                let _ = ack.send(());
            }
            BackendRequest::Halt => {
                if let Some(target) = self.target.take() {
                    self.link.report(target.token, BackendStatus::Cancelled, 0.0);
                }
                self.velocity = Twist::zero();
            }
            BackendRequest::Velocity(twist) => {
                self.velocity = twist;
            }
        }
    }

    fn ping_sensors(&self) {
        if let Some(sensors) = &self.sensors {
            for name in SIMULATED_SENSORS {
                sensors.ping(name);
            }
        }
    }

    fn accept_goal(&mut self, token: GoalToken, pose: Pose) {
        if let Some(previous) = self.target.take() {
            self.link.report(previous.token, BackendStatus::Cancelled, 0.0);
        }

        if !pose.is_finite() {
            self.link.report(token, BackendStatus::Failed(GoalErrorKind::InvalidPose), 0.0);
            return;
        }

        let goal = Vector2::new(pose.x, pose.y);
        if goal.norm() > self.config.arena_radius {
            tracing::debug!("Goal {} lies outside the arena", pose);
            self.link.report(token, BackendStatus::Failed(GoalErrorKind::Unreachable), 0.0);
            return;
        }

        self.velocity = Twist::zero();
        self.target = Some(Target {
            token,
            pose,
            start_distance: (goal - self.position).norm(),
        });
        self.link.report(token, BackendStatus::Running, 0.0);
    }

    fn step(&mut self, dt: f64) {
        if let Some(target) = &self.target {
            let goal = Vector2::new(target.pose.x, target.pose.y);
            let offset = goal - self.position;
            let remaining = offset.norm();
            let reach = self.config.speed * dt;

            if remaining <= reach + ARRIVAL_TOLERANCE {
                self.position = goal;
                self.yaw = target.pose.yaw;
                self.link.report(target.token, BackendStatus::Succeeded, 1.0);
                self.target = None;
            } else {
                self.position += offset / remaining * reach;
                self.yaw = offset.y.atan2(offset.x);
                let progress = if target.start_distance > 0.0 {
                    1.0 - (remaining - reach) / target.start_distance
                } else {
                    1.0
                };
                self.link
                    .report(target.token, BackendStatus::Running, progress.clamp(0.0, 1.0) as f32);
            }
        } else if !self.velocity.is_zero() {
            self.yaw = normalize_angle(self.yaw + self.velocity.angular * dt);
            let heading = Vector2::new(self.yaw.cos(), self.yaw.sin());
            self.position += heading * self.velocity.linear * dt;
        } else {
            return;
        }

        self.pose_tx
            .send_replace(Pose::new(self.position.x, self.position.y, self.yaw));
    }
}
