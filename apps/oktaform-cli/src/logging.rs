//! tracing subscriber setup for the CLI.
//!
//! Logs go to stderr so plan and apply output on stdout stays parseable.

use clap::ValueEnum;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{CliError, CliResult};

/// Log line format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Initialize the global subscriber.
///
/// `RUST_LOG` wins over `filter` when it is set and parses.
pub fn init_logging(filter: &str, format: LogFormat) -> CliResult<()> {
    let filter_layer = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter))
        .map_err(|e| CliError::Validation(format!("Invalid log filter '{filter}': {e}")))?;

    let installed = match format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false),
            )
            .with(filter_layer)
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_current_span(true)
                    .flatten_event(true),
            )
            .with(filter_layer)
            .try_init(),
    };
    installed.map_err(|e| CliError::Io(format!("Failed to install log subscriber: {e}")))?;

    tracing::debug!(filter = %filter, ?format, "Logging initialized");
    Ok(())
}
