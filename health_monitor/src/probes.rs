use automation_lib::{BatteryStatus, ResourceUsage};
use eyre::Result;
use sysinfo::System;
use tokio::time::Instant;

/// Source of battery readings, queried once per poll
pub trait BatteryProbe: Send {
    fn read(&mut self) -> Result<BatteryStatus>;
}

/// Source of host CPU/memory pressure, queried once per poll
pub trait ResourceProbe: Send {
    fn sample(&mut self) -> Result<ResourceUsage>;
}

/// Battery that drains linearly from its starting charge and never drops
/// below a floor. Used when no real battery telemetry is wired in.
pub struct SimulatedBattery {
    start_percent: f32,
    drain_per_hour: f32,
    floor: f32,
    started: Instant,
}

impl SimulatedBattery {
    pub fn new(start_percent: f32) -> Self {
        Self {
            start_percent,
            drain_per_hour: 10.0,
            floor: 20.0,
            started: Instant::now(),
        }
    }

    pub fn with_drain(mut self, drain_per_hour: f32, floor: f32) -> Self {
        self.drain_per_hour = drain_per_hour;
        self.floor = floor;
        self
    }
}

impl BatteryProbe for SimulatedBattery {
    fn read(&mut self) -> Result<BatteryStatus> {
        let hours = self.started.elapsed().as_secs_f32() / 3600.0;
        let percent = (self.start_percent - hours * self.drain_per_hour).max(self.floor);
        Ok(BatteryStatus {
            percent,
            charging: false,
        })
    }
}

/// Battery that always reports the same reading
#[derive(Debug, Clone, Copy)]
pub struct FixedBattery(pub BatteryStatus);

impl FixedBattery {
    pub fn percent(percent: f32) -> Self {
        Self(BatteryStatus {
            percent,
            charging: false,
        })
    }
}

impl BatteryProbe for FixedBattery {
    fn read(&mut self) -> Result<BatteryStatus> {
        Ok(self.0)
    }
}

/// Resource usage that never changes
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedResources(pub ResourceUsage);

impl ResourceProbe for FixedResources {
    fn sample(&mut self) -> Result<ResourceUsage> {
        Ok(self.0)
    }
}

/// Host CPU and memory usage through `sysinfo`
pub struct SysinfoProbe {
    sys: System,
}

impl SysinfoProbe {
    pub fn new() -> Self {
        let mut sys = System::new();
        // CPU usage is a delta, so take a baseline now
        sys.refresh_cpu_usage();
        sys.refresh_memory();
        Self { sys }
    }
}

impl Default for SysinfoProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceProbe for SysinfoProbe {
    fn sample(&mut self) -> Result<ResourceUsage> {
        self.sys.refresh_cpu_usage();
        self.sys.refresh_memory();

        let total = self.sys.total_memory();
        if total == 0 {
            return Err(eyre::eyre!("total memory reported as zero"));
        }

        Ok(ResourceUsage {
            cpu_percent: self.sys.global_cpu_usage(),
            memory_percent: (self.sys.used_memory() as f64 / total as f64 * 100.0) as f32,
        })
    }
}
