//! Structured logging with JSON or human-readable output.

use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    prelude::*,
};

use crate::{LogTarget, TelemetryConfig, TelemetryError};

/// Build the level filter: `RUST_LOG` wins over the configured level.
///
/// # Errors
///
/// Returns an error if the configured level is not a valid filter directive.
pub fn build_env_filter(config: &TelemetryConfig) -> Result<EnvFilter, TelemetryError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.log_level)
        .map_err(|e| TelemetryError::Config(format!("invalid log level {:?}: {e}", config.log_level)))
}

/// Initialize the logging subsystem.
pub(crate) fn init_logging(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let env_filter = build_env_filter(config)?;
    let subscriber = tracing_subscriber::registry().with(env_filter);

    match (config.json_logs, config.target) {
        (true, LogTarget::Stderr) => subscriber
            .with(json_layer().with_writer(std::io::stderr))
            .try_init(),
        (true, LogTarget::Stdout) => subscriber
            .with(json_layer().with_writer(std::io::stdout))
            .try_init(),
        (false, LogTarget::Stderr) => subscriber
            .with(pretty_layer().with_writer(std::io::stderr))
            .try_init(),
        (false, LogTarget::Stdout) => subscriber
            .with(pretty_layer().with_writer(std::io::stdout))
            .try_init(),
    }
    .map_err(|e| TelemetryError::LoggingInit(e.to_string()))
}

fn json_layer<S>() -> fmt::Layer<S, fmt::format::JsonFields, fmt::format::Format<fmt::format::Json>>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_file(true)
        .with_line_number(true)
        .with_thread_ids(true)
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
}

fn pretty_layer<S>() -> fmt::Layer<S>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fmt::layer()
        .with_ansi(true)
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
}
