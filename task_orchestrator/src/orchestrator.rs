use crate::error::{DispatchError, StartError};
use crate::feedback;
use crate::lifecycle::ModuleLifecycle;
use crate::modules::{DETECTION, NAVIGATION};
use crate::perception::Perception;
use crate::speech::Speaker;
use automation_lib::{
    count_by_class, AutomationConfig, Direction, Intent, LocationStore, NamedLocations, Pose,
};
use command_parser::{CommandInterpreter, Unrecognized};
use eyre::Result;
use health_monitor::HealthHandle;
use navigation_executor::{
    DriveCommand, GoalHandle, GoalOutcome, NavigationError, NavigationExecutor,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// What a successfully dispatched intent set in motion
#[derive(Debug, Clone)]
pub enum Dispatched {
    Stopped,
    EmergencyStopped,
    Navigating { location: String, handle: GoalHandle },
    Exploring { handle: GoalHandle, stops: usize },
    Moving { direction: Direction, duration: Duration },
    Objects(BTreeMap<String, usize>),
    Following,
    FollowingStopped,
    ModeChanged { name: String, on: bool },
}

/// Shared capabilities the orchestrator routes intents to
#[derive(Clone)]
pub struct Services {
    pub health: HealthHandle,
    pub navigation: NavigationExecutor,
    pub perception: Arc<dyn Perception>,
    pub speaker: Arc<dyn Speaker>,
}

/// Routes intents to modules behind the health gate and owns the
/// orchestrator-level state (locations, modes).
pub struct Orchestrator {
    config: AutomationConfig,
    lifecycle: ModuleLifecycle,
    services: Services,
    interpreter: CommandInterpreter,
    locations: NamedLocations,
    modes: BTreeMap<String, bool>,
    following: bool,
}

impl Orchestrator {
    pub fn new(config: AutomationConfig, lifecycle: ModuleLifecycle, services: Services) -> Self {
        let locations = config.effective_locations();
        Self {
            config,
            lifecycle,
            services,
            interpreter: CommandInterpreter::new(),
            locations,
            modes: BTreeMap::new(),
            following: false,
        }
    }

    pub async fn start(&mut self) -> Result<(), StartError> {
        self.lifecycle.start().await
    }

    pub async fn shutdown(&mut self) {
        self.lifecycle.shutdown().await;
    }

    pub fn lifecycle(&self) -> &ModuleLifecycle {
        &self.lifecycle
    }

    /// Carry out one intent.
    ///
    /// Unless the intent is `Stop` or `EmergencyStop`, it is rejected with
    /// [`DispatchError::Blocked`] when the latest health snapshot is
    /// unhealthy, and with [`DispatchError::ModuleUnavailable`] when a module
    /// it needs is not running.
    pub async fn dispatch(&mut self, intent: Intent) -> Result<Dispatched, DispatchError> {
        if !intent.is_safety_stop() {
            let snapshot = self.services.health.latest();
            if !snapshot.overall_healthy {
                tracing::warn!(%intent, "Blocked by health gate: {}", snapshot.describe_issues());
                return Err(DispatchError::Blocked(
                    snapshot
                        .primary_reason()
                        .unwrap_or_else(|| "unhealthy".to_string()),
                ));
            }
        }

        if let Some(module) = required_module(&intent) {
            if !self.lifecycle.is_available(module) {
                tracing::warn!(%intent, module, "Required module is not running");
                return Err(DispatchError::ModuleUnavailable(module.to_string()));
            }
        }

        tracing::info!(%intent, "Dispatching");
        let navigation = &self.services.navigation;

        match intent {
            Intent::Stop => {
                if let Err(e) = navigation.cancel_active().await {
                    tracing::warn!("Cancel during stop failed: {}", e);
                }
                navigation.halt().await;
                Ok(Dispatched::Stopped)
            }
            Intent::EmergencyStop => {
                navigation.emergency_stop().await;
                self.following = false;
                Ok(Dispatched::EmergencyStopped)
            }
            Intent::NavigateTo { location } => {
                let pose = self
                    .locations
                    .get(&location)
                    .ok_or_else(|| DispatchError::UnknownLocation(location.clone()))?;
                let handle = navigation
                    .navigate_to_pose(pose)
                    .await
                    .map_err(navigation_error)?;
                self.following = false;
                Ok(Dispatched::Navigating { location, handle })
            }
            Intent::Explore => {
                let poses: Vec<Pose> = self.locations.iter().map(|(_, pose)| *pose).collect();
                if poses.is_empty() {
                    return Err(DispatchError::InvalidGoal(
                        "no named locations to explore".to_string(),
                    ));
                }
                let stops = poses.len();
                let handle = navigation
                    .follow_waypoints(poses)
                    .await
                    .map_err(navigation_error)?;
                self.following = false;
                Ok(Dispatched::Exploring { handle, stops })
            }
            Intent::Move {
                direction,
                duration,
            } => {
                let max_move = self.config.navigation.max_move();
                let duration = duration
                    .map(|secs| Duration::try_from_secs_f32(secs).unwrap_or(max_move))
                    .unwrap_or_else(|| self.config.navigation.default_move())
                    .min(max_move);
                navigation
                    .drive(DriveCommand {
                        direction,
                        duration: Some(duration),
                    })
                    .await
                    .map_err(navigation_error)?;
                Ok(Dispatched::Moving {
                    direction,
                    duration,
                })
            }
            Intent::QueryObjects => {
                let detections = self
                    .services
                    .perception
                    .detect_once()
                    .await
                    .map_err(|e| DispatchError::Perception(format!("{:#}", e)))?;
                let counts = count_by_class(&detections, self.config.detection.confidence);
                tracing::info!("Detected {:?}", counts);
                Ok(Dispatched::Objects(counts))
            }
            Intent::FollowPerson => {
                self.following = true;
                Ok(Dispatched::Following)
            }
            Intent::StopFollowing => {
                self.following = false;
                Ok(Dispatched::FollowingStopped)
            }
            Intent::ModeToggle { name, on } => {
                self.modes.insert(name.clone(), on);
                Ok(Dispatched::ModeChanged { name, on })
            }
        }
    }

    /// Dispatch and speak the result
    pub async fn handle_intent(&mut self, intent: Intent) -> Result<Dispatched, DispatchError> {
        let result = self.dispatch(intent).await;
        let spoken = match &result {
            Ok(dispatched) => feedback::acknowledge(dispatched),
            Err(e) => {
                tracing::warn!("Intent rejected: {}", e);
                feedback::dispatch_error(e)
            }
        };
        self.services.speaker.speak(spoken);
        result
    }

    /// Interpret and handle one utterance. Unrecognized input is answered
    /// with spoken feedback and yields `None`.
    pub async fn handle_utterance(
        &mut self,
        utterance: &str,
    ) -> Option<Result<Dispatched, DispatchError>> {
        match self.interpreter.interpret(utterance) {
            Ok(intent) => Some(self.handle_intent(intent).await),
            Err(Unrecognized(text)) => {
                self.handle_unrecognized(&text);
                None
            }
        }
    }

    pub fn handle_unrecognized(&self, utterance: &str) {
        tracing::info!("Unrecognized command: '{}'", utterance);
        self.services.speaker.speak(feedback::not_understood());
    }

    /// Add or replace a named location
    pub fn add_location(&mut self, name: &str, pose: Pose) -> Option<Pose> {
        self.locations.insert(name, pose)
    }

    pub fn remove_location(&mut self, name: &str) -> Option<Pose> {
        self.locations.remove(name)
    }

    pub fn locations(&self) -> &NamedLocations {
        &self.locations
    }

    pub fn save_locations(&self, store: &dyn LocationStore) -> Result<()> {
        store.save(&self.locations)
    }

    pub fn mode(&self, name: &str) -> Option<bool> {
        self.modes.get(name).copied()
    }

    pub fn is_following(&self) -> bool {
        self.following
    }

    pub fn subscribe_outcomes(&self) -> broadcast::Receiver<GoalOutcome> {
        self.services.navigation.subscribe_outcomes()
    }
}

fn required_module(intent: &Intent) -> Option<&'static str> {
    match intent {
        Intent::NavigateTo { .. } | Intent::Explore | Intent::Move { .. } => Some(NAVIGATION),
        Intent::QueryObjects | Intent::FollowPerson => Some(DETECTION),
        Intent::Stop
        | Intent::EmergencyStop
        | Intent::StopFollowing
        | Intent::ModeToggle { .. } => None,
    }
}

fn navigation_error(error: NavigationError) -> DispatchError {
    match error {
        NavigationError::InvalidGoal(reason) => DispatchError::InvalidGoal(reason),
        NavigationError::ExecutorStopped => DispatchError::ModuleUnavailable(NAVIGATION.to_string()),
    }
}
