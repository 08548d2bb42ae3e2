//! Health monitor: polls battery, sensor liveness and host resources on a
//! fixed interval and publishes an immutable [`HealthSnapshot`] per poll.
//!
//! Readers hold a [`HealthHandle`]; reading the latest snapshot is a single
//! `Arc` clone out of a `watch` channel, so a reader always sees one whole
//! snapshot.
//!
//! [`HealthSnapshot`]: automation_lib::HealthSnapshot

mod monitor;
pub mod probes;

pub use monitor::{evaluate, HealthHandle, HealthMonitor, SensorReporter};
pub use probes::{
    BatteryProbe, FixedBattery, FixedResources, ResourceProbe, SimulatedBattery, SysinfoProbe,
};
