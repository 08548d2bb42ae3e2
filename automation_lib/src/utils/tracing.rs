//! Centralized tracing initialization for the orchestrator binary.
//!
//! `main` calls [`init_global_tracing`] once before the runtime starts.

use tracing_subscriber::EnvFilter;

/// Install the subscriber process-wide so that logs from runtime worker and
/// blocking threads are kept too.
///
/// - Respects the `RUST_LOG` environment variable, falling back to
///   `default_filter` (the binary passes "debug" under `--verbose`)
/// - Outputs compact logs with the emitting target (component crate)
///
/// # Example
/// ```no_run
/// use automation_lib::init_global_tracing;
///
/// fn main() -> eyre::Result<()> {
///     init_global_tracing("info")?;
///     // Orchestrator code here
///     Ok(())
/// }
/// ```
pub fn init_global_tracing(default_filter: &str) -> eyre::Result<()> {
    tracing::subscriber::set_global_default(build_subscriber(default_filter))
        .map_err(|e| eyre::eyre!("failed to install tracing subscriber: {}", e))
}

fn build_subscriber(default_filter: &str) -> impl tracing::Subscriber + Send + Sync {
    use tracing_subscriber::layer::SubscriberExt;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_target(true)
        .with_file(false)
        .with_line_number(false);

    tracing_subscriber::Registry::default()
        .with(env_filter)
        .with(fmt_layer)
}
