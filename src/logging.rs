//! Logging and tracing configuration

use crate::config::LoggingConfig;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber. `RUST_LOG` takes precedence over the configured level.
///
/// Formats: `json` (default for deployments), `pretty`, `compact`; anything else
/// falls back to the plain fmt layer.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);
    match config.format.as_str() {
        "json" => registry
            .with(fmt::layer().with_target(false).json())
            .try_init()?,
        "pretty" => registry.with(fmt::layer().pretty()).try_init()?,
        "compact" => registry.with(fmt::layer().compact()).try_init()?,
        _ => registry.with(fmt::layer()).try_init()?,
    }

    Ok(())
}
