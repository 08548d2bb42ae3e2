use crate::probes::{BatteryProbe, ResourceProbe};
use automation_lib::{
    BatteryStatus, HealthIssue, HealthSnapshot, MaintenanceConfig, ResourceUsage, SensorStatus,
};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};

/// Staleness threshold for sensors that report without a configured one
const DEFAULT_SENSOR_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug)]
struct SensorPing {
    name: String,
    at: Instant,
    wall: DateTime<Utc>,
}

/// Sending side for sensor liveness reports. Cheap to clone; hand one to
/// every sensor stream.
#[derive(Debug, Clone)]
pub struct SensorReporter {
    tx: mpsc::UnboundedSender<SensorPing>,
}

impl SensorReporter {
    /// Record that `name` produced data just now
    pub fn ping(&self, name: &str) {
        let ping = SensorPing {
            name: name.to_string(),
            at: Instant::now(),
            wall: Utc::now(),
        };
        if self.tx.send(ping).is_err() {
            tracing::debug!("Health monitor gone, dropping ping from {}", name);
        }
    }
}

/// Read side of the published health state
#[derive(Debug, Clone)]
pub struct HealthHandle {
    rx: watch::Receiver<Arc<HealthSnapshot>>,
}

impl HealthHandle {
    /// Last published snapshot. Never blocks; the returned value is never
    /// modified afterwards.
    pub fn latest(&self) -> Arc<HealthSnapshot> {
        self.rx.borrow().clone()
    }

    pub fn is_healthy(&self) -> bool {
        self.rx.borrow().overall_healthy
    }

    /// Receiver notified on every new snapshot
    pub fn subscribe(&self) -> watch::Receiver<Arc<HealthSnapshot>> {
        self.rx.clone()
    }
}

/// Decide overall health from one set of readings. Issues are listed in
/// the order battery, sensors, resources.
pub fn evaluate(
    config: &MaintenanceConfig,
    battery: &BatteryStatus,
    sensors: &BTreeMap<String, SensorStatus>,
    resources: &ResourceUsage,
) -> (bool, Vec<HealthIssue>) {
    let mut issues = Vec::new();

    if battery.percent <= config.battery_threshold {
        issues.push(HealthIssue::LowBattery);
    }

    for (name, status) in sensors {
        if *status == SensorStatus::Stale {
            issues.push(HealthIssue::StaleSensor(name.clone()));
        }
    }

    if resources.cpu_percent > config.cpu_threshold
        || resources.memory_percent > config.memory_threshold
    {
        issues.push(HealthIssue::Overloaded);
    }

    (issues.is_empty(), issues)
}

/// Periodic health poller. Owns the probes and the sensor liveness table;
/// everyone else reads through a [`HealthHandle`].
pub struct HealthMonitor {
    config: MaintenanceConfig,
    battery_probe: Box<dyn BatteryProbe>,
    resource_probe: Box<dyn ResourceProbe>,

    last_battery: BatteryStatus,
    last_resources: ResourceUsage,
    last_seen: BTreeMap<String, Instant>,
    last_report: Option<DateTime<Utc>>,
    sequence: u64,

    ping_tx: mpsc::UnboundedSender<SensorPing>,
    pings: mpsc::UnboundedReceiver<SensorPing>,
    snapshot_tx: watch::Sender<Arc<HealthSnapshot>>,
}

impl HealthMonitor {
    pub fn new(
        config: MaintenanceConfig,
        battery_probe: Box<dyn BatteryProbe>,
        resource_probe: Box<dyn ResourceProbe>,
    ) -> Self {
        let (ping_tx, pings) = mpsc::unbounded_channel();
        let (snapshot_tx, _) = watch::channel(Arc::new(HealthSnapshot::initial()));

        Self {
            config,
            battery_probe,
            resource_probe,
            last_battery: BatteryStatus::default(),
            last_resources: ResourceUsage::default(),
            last_seen: BTreeMap::new(),
            last_report: None,
            sequence: 0,
            ping_tx,
            pings,
            snapshot_tx,
        }
    }

    pub fn handle(&self) -> HealthHandle {
        HealthHandle {
            rx: self.snapshot_tx.subscribe(),
        }
    }

    pub fn sensor_reporter(&self) -> SensorReporter {
        SensorReporter {
            tx: self.ping_tx.clone(),
        }
    }

    fn record(&mut self, ping: SensorPing) {
        tracing::trace!("Sensor ping from {}", ping.name);
        self.last_seen.insert(ping.name, ping.at);
        self.last_report = Some(ping.wall);
    }

    fn sensor_statuses(&self, now: Instant) -> BTreeMap<String, SensorStatus> {
        let mut statuses = BTreeMap::new();

        for name in self.config.sensor_timeouts.keys() {
            statuses.insert(name.clone(), SensorStatus::Unknown);
        }

        for (name, seen) in &self.last_seen {
            let timeout = self
                .config
                .sensor_timeouts
                .get(name)
                .map(|secs| Duration::from_secs_f64(*secs))
                .unwrap_or(DEFAULT_SENSOR_TIMEOUT);

            let status = if now.saturating_duration_since(*seen) > timeout {
                SensorStatus::Stale
            } else {
                SensorStatus::Ok
            };
            statuses.insert(name.clone(), status);
        }

        statuses
    }

    /// Run one evaluation and publish the resulting snapshot
    pub fn poll_once(&mut self) -> Arc<HealthSnapshot> {
        while let Ok(ping) = self.pings.try_recv() {
            self.record(ping);
        }

        match self.battery_probe.read() {
            Ok(battery) => self.last_battery = battery,
            Err(e) => tracing::warn!("Battery probe failed, keeping last reading: {}", e),
        }

        match self.resource_probe.sample() {
            Ok(resources) => self.last_resources = resources,
            Err(e) => tracing::warn!("Resource probe failed, keeping last sample: {}", e),
        }

        let sensors = self.sensor_statuses(Instant::now());
        let (overall_healthy, issues) =
            evaluate(&self.config, &self.last_battery, &sensors, &self.last_resources);

        self.sequence += 1;
        let snapshot = Arc::new(HealthSnapshot {
            sequence: self.sequence,
            timestamp: Utc::now(),
            overall_healthy,
            battery: self.last_battery,
            sensors,
            resources: self.last_resources,
            issues,
            last_updated: self.last_report,
        });

        let previous = self.snapshot_tx.send_replace(snapshot.clone());
        self.log_transition(&previous, &snapshot);
        snapshot
    }

    fn log_transition(&self, previous: &HealthSnapshot, current: &HealthSnapshot) {
        tracing::info!(
            sequence = current.sequence,
            "Health: battery {:.0}%, cpu {:.0}%, memory {:.0}%, healthy={}",
            current.battery.percent,
            current.resources.cpu_percent,
            current.resources.memory_percent,
            current.overall_healthy
        );

        if previous.overall_healthy && !current.overall_healthy {
            tracing::warn!("System became unhealthy: {}", current.describe_issues());
        } else if !previous.overall_healthy && current.overall_healthy {
            tracing::info!("System health recovered");
        }
    }

    /// Poll on the configured interval until `shutdown` flips to true or its
    /// sender is dropped. The first poll happens immediately.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let period = self.config.health_check_interval();
        tracing::info!("Health monitor polling every {:?}", period);

        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.poll_once();
                }
                Some(ping) = self.pings.recv() => {
                    self.record(ping);
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Health monitor stopped");
    }
}
