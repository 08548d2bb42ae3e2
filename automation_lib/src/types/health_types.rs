use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Battery reading at poll time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BatteryStatus {
    /// State of charge, 0-100
    pub percent: f32,
    pub charging: bool,
}

impl Default for BatteryStatus {
    fn default() -> Self {
        Self {
            percent: 100.0,
            charging: false,
        }
    }
}

/// Liveness of one sensor stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorStatus {
    Ok,
    /// No data within the sensor's staleness threshold
    Stale,
    /// Never reported since startup
    Unknown,
}

impl fmt::Display for SensorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorStatus::Ok => f.write_str("ok"),
            SensorStatus::Stale => f.write_str("stale"),
            SensorStatus::Unknown => f.write_str("unknown"),
        }
    }
}

/// Host resource pressure, percentages 0-100
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceUsage {
    pub cpu_percent: f32,
    pub memory_percent: f32,
}

/// Why a snapshot is unhealthy. The display form is the reason string the
/// dispatch gate reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "issue", content = "sensor", rename_all = "snake_case")]
pub enum HealthIssue {
    LowBattery,
    StaleSensor(String),
    Overloaded,
}

impl fmt::Display for HealthIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthIssue::LowBattery => f.write_str("battery"),
            HealthIssue::StaleSensor(name) => write!(f, "sensor {} stale", name),
            HealthIssue::Overloaded => f.write_str("overloaded"),
        }
    }
}

/// One complete health evaluation. Snapshots are never mutated after they
/// are published; every poll produces a new one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    /// Poll counter, 0 for the startup snapshot
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub overall_healthy: bool,
    pub battery: BatteryStatus,
    pub sensors: BTreeMap<String, SensorStatus>,
    pub resources: ResourceUsage,
    pub issues: Vec<HealthIssue>,
    /// Wall-clock time of the most recent sensor report, if any
    pub last_updated: Option<DateTime<Utc>>,
}

impl HealthSnapshot {
    /// Snapshot published before the first poll completes
    pub fn initial() -> Self {
        Self {
            sequence: 0,
            timestamp: Utc::now(),
            overall_healthy: true,
            battery: BatteryStatus::default(),
            sensors: BTreeMap::new(),
            resources: ResourceUsage::default(),
            issues: Vec::new(),
            last_updated: None,
        }
    }

    /// Reason string for the first issue, e.g. "battery"
    pub fn primary_reason(&self) -> Option<String> {
        self.issues.first().map(|issue| issue.to_string())
    }

    /// All issues joined for logs and speech
    pub fn describe_issues(&self) -> String {
        self.issues
            .iter()
            .map(|issue| issue.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}
