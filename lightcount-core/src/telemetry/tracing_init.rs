//! Logging setup. Grounded on the teacher's
//! `telemetry::tracing::init_tracing_with_otel`, minus the OpenTelemetry
//! exporter layer this daemon has no use for (spec.md §6's ambient
//! logging section).

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

/// Install a global `tracing` subscriber. `log_level` is used only as a
/// fallback default; `RUST_LOG` always wins when set.
pub fn init_tracing(log_level: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level.to_string()));
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(true);

    let subscriber = Registry::default().with(env_filter).with(fmt_layer);
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| format!("failed to set global tracing subscriber: {e}"))?;
    Ok(())
}
