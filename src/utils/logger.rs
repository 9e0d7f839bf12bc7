use thiserror::Error;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LoggingConfig;

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Invalid logging.level '{0}'. Valid values: trace, debug, info, warn, error")]
    InvalidLevel(String),
    #[error("Failed to install log subscriber: {0}")]
    Install(String),
}

pub fn parse_level(level: &str) -> Result<LevelFilter, LoggingError> {
    match level.trim().to_lowercase().as_str() {
        "trace" => Ok(LevelFilter::TRACE),
        "debug" => Ok(LevelFilter::DEBUG),
        "info" => Ok(LevelFilter::INFO),
        "warn" => Ok(LevelFilter::WARN),
        "error" => Ok(LevelFilter::ERROR),
        _ => Err(LoggingError::InvalidLevel(level.to_string())),
    }
}

/// Install the global subscriber. `RUST_LOG` directives, if set, refine the configured level.
pub fn init_logging(logging_config: &LoggingConfig) -> Result<(), LoggingError> {
    let level_filter = parse_level(&logging_config.level)?;
    let filter_layer = EnvFilter::builder()
        .with_default_directive(level_filter.into())
        .from_env_lossy();

    let installed = match logging_config.format.to_lowercase().as_str() {
        "json" => tracing_subscriber::registry()
            .with(filter_layer)
            .with(
                fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_current_span(false)
                    .with_span_list(false),
            )
            .try_init(),
        // Human-readable console output, also the fallback for unknown formats
        _ => tracing_subscriber::registry()
            .with(filter_layer)
            .with(fmt::layer().pretty())
            .try_init(),
    };
    installed.map_err(|e| LoggingError::Install(e.to_string()))?;

    tracing::info!(
        service.name = %logging_config.service_name,
        service.version = %logging_config.service_version,
        "Logging initialised"
    );
    Ok(())
}
