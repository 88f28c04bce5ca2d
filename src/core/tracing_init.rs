use crate::core::config::LoggingConfig;
use anyhow::{Context, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber. `RUST_LOG` overrides the configured level.
///
/// Logs go to stderr so the peer CLI can keep stdout for its results.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .context("Invalid log filter")?;

    let registry = tracing_subscriber::registry().with(env_filter);

    let installed = if config.is_console() {
        registry
            .with(
                fmt::layer()
                    .compact()
                    .with_target(true)
                    .with_ansi(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    } else {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    };

    installed.context("Failed to install tracing subscriber")
}
