//! Lifecycle adapters for the capability modules

use crate::module::Module;
use crate::perception::Perception;
use crate::runtime::RuntimeHandle;
use crate::speech::SpeechInput;
use async_trait::async_trait;
use eyre::{eyre, Result, WrapErr};
use health_monitor::HealthMonitor;
use navigation_executor::NavigationExecutor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub const HEALTH: &str = "health";
pub const NAVIGATION: &str = "navigation";
pub const DETECTION: &str = "detection";
pub const VOICE: &str = "voice";

/// Runs the health poller as a background task
pub struct HealthModule {
    monitor: Option<HealthMonitor>,
    shutdown: Option<watch::Sender<bool>>,
    task: Option<JoinHandle<()>>,
}

impl HealthModule {
    pub fn new(monitor: HealthMonitor) -> Self {
        Self {
            monitor: Some(monitor),
            shutdown: None,
            task: None,
        }
    }
}

#[async_trait]
impl Module for HealthModule {
    async fn init(&mut self) -> Result<()> {
        let monitor = self
            .monitor
            .as_mut()
            .ok_or_else(|| eyre!("health monitor already running"))?;
        // Publish a real snapshot before anything is dispatched
        let snapshot = monitor.poll_once();
        if !snapshot.overall_healthy {
            tracing::warn!("Starting unhealthy: {}", snapshot.describe_issues());
        }
        Ok(())
    }

    async fn start(&mut self) -> Result<()> {
        let monitor = self
            .monitor
            .take()
            .ok_or_else(|| eyre!("health monitor already running"))?;
        let (tx, rx) = watch::channel(false);
        self.shutdown = Some(tx);
        self.task = Some(tokio::spawn(monitor.run(rx)));
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(true);
        }
        if let Some(task) = self.task.take() {
            task.await.wrap_err("health monitor task failed")?;
        }
        Ok(())
    }
}

pub struct NavigationModule {
    executor: NavigationExecutor,
}

impl NavigationModule {
    pub fn new(executor: NavigationExecutor) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl Module for NavigationModule {
    async fn init(&mut self) -> Result<()> {
        // Start from a standstill
        self.executor.halt().await;
        Ok(())
    }

    async fn start(&mut self) -> Result<()> {
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        self.executor
            .cancel_active()
            .await
            .wrap_err("cancelling active goal")?;
        self.executor.halt().await;
        Ok(())
    }
}

/// Wraps the detector; init runs one detection as a self-test
pub struct DetectionModule {
    perception: Arc<dyn Perception>,
}

impl DetectionModule {
    pub fn new(perception: Arc<dyn Perception>) -> Self {
        Self { perception }
    }
}

#[async_trait]
impl Module for DetectionModule {
    async fn init(&mut self) -> Result<()> {
        let detections = self
            .perception
            .detect_once()
            .await
            .wrap_err("detector self-test failed")?;
        tracing::debug!("Detector self-test saw {} objects", detections.len());
        Ok(())
    }

    async fn start(&mut self) -> Result<()> {
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Owns the blocking speech input and feeds utterances to the runtime
pub struct VoiceModule {
    input: Option<Box<dyn SpeechInput>>,
    runtime: RuntimeHandle,
    stopping: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl VoiceModule {
    pub fn new(input: Box<dyn SpeechInput>, runtime: RuntimeHandle) -> Self {
        Self {
            input: Some(input),
            runtime,
            stopping: Arc::new(AtomicBool::new(false)),
            task: None,
        }
    }
}

#[async_trait]
impl Module for VoiceModule {
    async fn init(&mut self) -> Result<()> {
        if self.input.is_none() {
            return Err(eyre!("speech input already taken"));
        }
        Ok(())
    }

    async fn start(&mut self) -> Result<()> {
        let mut input = self
            .input
            .take()
            .ok_or_else(|| eyre!("speech input already taken"))?;
        let runtime = self.runtime.clone();
        let stopping = self.stopping.clone();
        let rt = tokio::runtime::Handle::current();

        self.task = Some(tokio::task::spawn_blocking(move || {
            while !stopping.load(Ordering::Relaxed) {
                match input.listen() {
                    Ok(Some(heard)) => {
                        if !rt.block_on(runtime.submit_utterance(heard)) {
                            break;
                        }
                    }
                    Ok(None) => {
                        tracing::info!("Speech input closed");
                        rt.block_on(runtime.end_of_input());
                        break;
                    }
                    Err(e) => {
                        tracing::error!("Speech input failed: {:#}", e);
                        rt.block_on(runtime.end_of_input());
                        break;
                    }
                }
            }
        }));
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        self.stopping.store(true, Ordering::Relaxed);
        // A listener blocked in `listen` exits after its next utterance
        if let Some(task) = self.task.take() {
            if task.is_finished() {
                task.await.wrap_err("voice intake failed")?;
            }
        }
        Ok(())
    }
}
