use async_trait::async_trait;
use automation_lib::Detection;
use eyre::{bail, Result};

/// Object detector the orchestrator queries on demand. Frame acquisition
/// belongs to the implementation.
#[async_trait]
pub trait Perception: Send + Sync {
    async fn detect_once(&self) -> Result<Vec<Detection>>;
}

/// Returns the same detections on every call
#[derive(Debug, Clone, Default)]
pub struct StaticPerception(pub Vec<Detection>);

#[async_trait]
impl Perception for StaticPerception {
    async fn detect_once(&self) -> Result<Vec<Detection>> {
        Ok(self.0.clone())
    }
}

/// Placeholder for builds without a detector attached
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailablePerception;

#[async_trait]
impl Perception for UnavailablePerception {
    async fn detect_once(&self) -> Result<Vec<Detection>> {
        bail!("no object detector attached")
    }
}
