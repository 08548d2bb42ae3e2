use automation_lib::{init_global_tracing, AutomationConfig, LocationStore, TomlLocationStore};
use clap::Parser;
use eyre::{Result, WrapErr};
use health_monitor::{HealthMonitor, SimulatedBattery, SysinfoProbe};
use navigation_executor::{ExecutorConfig, NavigationExecutor, SimulatedBackend};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use task_orchestrator::modules::{DETECTION, HEALTH, NAVIGATION, VOICE};
use task_orchestrator::{
    runtime, DetectionModule, HealthModule, LogSpeaker, ModuleDescriptor, ModuleLifecycle,
    NavigationModule, Orchestrator, Perception, Services, Speaker, StdinSpeechInput,
    UnavailablePerception, VoiceModule,
};
use tokio::sync::watch;

#[derive(Parser)]
#[command(name = "task_orchestrator")]
#[command(about = "Voice-driven robot task orchestrator with simulated navigation")]
struct Cli {
    /// TOML configuration file; built-in defaults when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// TOML file with a [locations] table, loaded on start and saved on exit
    #[arg(short, long)]
    locations: Option<PathBuf>,

    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_global_tracing(if cli.verbose { "debug" } else { "info" })?;

    let runtime = tokio::runtime::Runtime::new().wrap_err("creating tokio runtime")?;
    let result = runtime.block_on(run(cli));
    // The stdin reader may still be blocked in read_line
    runtime.shutdown_timeout(Duration::from_millis(500));
    result
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = AutomationConfig::load_or_default(cli.config.as_deref())?;

    let store = cli.locations.map(TomlLocationStore::new);
    if let Some(store) = store.as_ref().filter(|s| s.path().exists()) {
        config.locations = store.load()?;
    }

    let monitor = HealthMonitor::new(
        config.maintenance.clone(),
        Box::new(SimulatedBattery::new(85.0)),
        Box::new(SysinfoProbe::new()),
    );
    let health = monitor.handle();

    let backend = Arc::new(SimulatedBackend::spawn_with_sensors(
        config.simulation.clone(),
        monitor.sensor_reporter(),
    ));
    let executor = NavigationExecutor::spawn(backend, ExecutorConfig::from(&config.navigation));

    let perception: Arc<dyn Perception> = Arc::new(UnavailablePerception);
    let speaker: Arc<dyn Speaker> = Arc::new(LogSpeaker);
    let (runtime_handle, events) = runtime::channel(executor.clone(), config.voice.clone());

    let descriptors = vec![
        ModuleDescriptor::new(HEALTH, HealthModule::new(monitor)).critical(),
        ModuleDescriptor::new(NAVIGATION, NavigationModule::new(executor.clone()))
            .depends_on(HEALTH)
            .critical(),
        ModuleDescriptor::new(DETECTION, DetectionModule::new(perception.clone()))
            .depends_on(HEALTH),
        ModuleDescriptor::new(
            VOICE,
            VoiceModule::new(Box::new(StdinSpeechInput), runtime_handle),
        )
        .depends_on(NAVIGATION),
    ];

    let lifecycle = ModuleLifecycle::initialize(descriptors).await?;
    let services = Services {
        health,
        navigation: executor.clone(),
        perception,
        speaker: speaker.clone(),
    };
    let mut orchestrator = Orchestrator::new(config, lifecycle, services);
    orchestrator.start().await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let feedback = runtime::spawn_outcome_feedback(
        orchestrator.subscribe_outcomes(),
        speaker,
        shutdown_rx.clone(),
    );

    tracing::info!(
        "Ready with {} locations; type commands, e.g. 'go to the kitchen'",
        orchestrator.locations().len()
    );

    tokio::select! {
        _ = runtime::run(&mut orchestrator, events, shutdown_rx) => {}
        _ = tokio::signal::ctrl_c() => tracing::info!("Interrupted"),
    }

    let _ = shutdown_tx.send(true);
    orchestrator.shutdown().await;
    let _ = feedback.await;

    if let Some(store) = store {
        orchestrator.save_locations(&store)?;
    }
    Ok(())
}
