use crate::{NamedLocations, Pose};
use eyre::{Result, WrapErr};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Upper bound for any configured duration (one year)
const MAX_CONFIG_SECS: f64 = 365.0 * 24.0 * 3600.0;

/// Top-level configuration, loaded from TOML. Every section and field has a
/// default so a partial file is valid.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AutomationConfig {
    pub maintenance: MaintenanceConfig,
    pub navigation: NavigationConfig,
    pub detection: DetectionConfig,
    pub voice: VoiceConfig,
    pub simulation: SimulationConfig,
    /// Named locations; when empty the built-in set is used
    pub locations: NamedLocations,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MaintenanceConfig {
    /// Battery percentage at or below which the robot is unhealthy
    pub battery_threshold: f32,
    pub health_check_interval_secs: f64,
    pub cpu_threshold: f32,
    pub memory_threshold: f32,
    /// Sensor name -> seconds without data before it is considered stale
    pub sensor_timeouts: BTreeMap<String, f64>,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        let mut sensor_timeouts = BTreeMap::new();
        sensor_timeouts.insert("lidar".to_string(), 10.0);
        sensor_timeouts.insert("imu".to_string(), 10.0);
        sensor_timeouts.insert("odom".to_string(), 10.0);

        Self {
            battery_threshold: 20.0,
            health_check_interval_secs: 30.0,
            cpu_threshold: 90.0,
            memory_threshold: 90.0,
            sensor_timeouts,
        }
    }
}

impl MaintenanceConfig {
    pub fn health_check_interval(&self) -> Duration {
        Duration::from_secs_f64(self.health_check_interval_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationConfig {
    /// Timeout for a single leg (the whole goal for single-pose goals)
    pub goal_timeout_secs: f64,
    pub retry_limit: u32,
    pub retry_backoff_ms: u64,
    /// How long to wait for the backend to acknowledge a cancel
    pub cancel_timeout_ms: u64,
    /// Linear speed for manual moves (m/s)
    pub drive_speed: f64,
    /// Angular speed for manual turns (rad/s)
    pub turn_speed: f64,
    /// Duration of a manual move when none was spoken
    pub default_move_secs: f64,
    /// Longest manual move; spoken durations are clamped to this
    pub max_move_secs: f64,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            goal_timeout_secs: 120.0,
            retry_limit: 2,
            retry_backoff_ms: 1000,
            cancel_timeout_ms: 2000,
            drive_speed: 0.5,
            turn_speed: 0.5,
            default_move_secs: 2.0,
            max_move_secs: 30.0,
        }
    }
}

impl NavigationConfig {
    pub fn goal_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.goal_timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn cancel_timeout(&self) -> Duration {
        Duration::from_millis(self.cancel_timeout_ms)
    }

    pub fn default_move(&self) -> Duration {
        Duration::from_secs_f64(self.default_move_secs)
    }

    pub fn max_move(&self) -> Duration {
        Duration::from_secs_f64(self.max_move_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Minimum confidence for a detection to be reported
    pub confidence: f32,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self { confidence: 0.5 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    pub wake_word: String,
    /// Ignore utterances that do not contain the wake word
    pub require_wake_word: bool,
    /// Transcriptions below this confidence are dropped
    pub min_confidence: f32,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            wake_word: "turtlebot".to_string(),
            require_wake_word: false,
            min_confidence: 0.5,
        }
    }
}

/// Parameters of the simulated motion backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Travel speed toward a goal (m/s)
    pub speed: f64,
    /// Progress report period (ms)
    pub update_interval_ms: u64,
    /// Goals farther than this from the origin are unreachable (m)
    pub arena_radius: f64,
    pub start_pose: Pose,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            speed: 0.5,
            update_interval_ms: 200,
            arena_radius: 10.0,
            start_pose: Pose::origin(),
        }
    }
}

impl SimulationConfig {
    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms)
    }
}

impl AutomationConfig {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .wrap_err_with(|| format!("reading config {}", path.display()))?;
        let config: AutomationConfig = toml::from_str(&content)
            .wrap_err_with(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    /// Load `path` when given, otherwise fall back to defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                tracing::info!("Loading config from {}", path.display());
                Self::load_from_file(path)?
            }
            None => {
                tracing::info!("Using default configuration");
                Self::default()
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Configured locations, or the built-in set when none are configured
    pub fn effective_locations(&self) -> NamedLocations {
        if self.locations.is_empty() {
            NamedLocations::with_defaults()
        } else {
            self.locations.clone()
        }
    }

    pub fn validate(&self) -> Result<()> {
        let maintenance = &self.maintenance;
        if !(0.0..=100.0).contains(&maintenance.battery_threshold) {
            return Err(eyre::eyre!(
                "battery_threshold ({}) must be within 0-100",
                maintenance.battery_threshold
            ));
        }

        positive_secs("health_check_interval_secs", maintenance.health_check_interval_secs)?;
        for (name, secs) in &maintenance.sensor_timeouts {
            positive_secs(&format!("sensor timeout for {}", name), *secs)?;
        }

        let navigation = &self.navigation;
        positive_secs("goal_timeout_secs", navigation.goal_timeout_secs)?;
        positive_secs("default_move_secs", navigation.default_move_secs)?;
        positive_secs("max_move_secs", navigation.max_move_secs)?;
        if navigation.default_move_secs > navigation.max_move_secs {
            return Err(eyre::eyre!(
                "default_move_secs ({}) exceeds max_move_secs ({})",
                navigation.default_move_secs,
                navigation.max_move_secs
            ));
        }
        if navigation.cancel_timeout_ms == 0 {
            return Err(eyre::eyre!("cancel_timeout_ms must be positive"));
        }

        if !(0.0..=1.0).contains(&self.detection.confidence) {
            return Err(eyre::eyre!(
                "detection confidence ({}) must be within 0-1",
                self.detection.confidence
            ));
        }

        if !(self.simulation.speed.is_finite() && self.simulation.speed > 0.0) {
            return Err(eyre::eyre!("simulation speed ({}) must be positive", self.simulation.speed));
        }
        if self.simulation.update_interval_ms == 0 {
            return Err(eyre::eyre!("simulation update_interval_ms must be positive"));
        }

        Ok(())
    }
}

/// Seconds fields feed `Duration::from_secs_f64`, which panics on NaN,
/// infinity and values past `Duration::MAX`
fn positive_secs(field: &str, secs: f64) -> Result<()> {
    if secs.is_finite() && secs > 0.0 && secs <= MAX_CONFIG_SECS {
        Ok(())
    } else {
        Err(eyre::eyre!("{} ({}) must be a positive number of seconds", field, secs))
    }
}
