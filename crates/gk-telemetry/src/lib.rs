//! Gatekeeper Telemetry - logging and metrics for the limiter and its collaborators
//!
//! - **Structured Logging**: JSON or human-readable `tracing` output with `RUST_LOG` overrides
//! - **Metrics**: admission, snapshot, and traffic counters through the `metrics` facade
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use gk_telemetry::{TelemetryConfig, init_telemetry};
//!
//! init_telemetry(&TelemetryConfig::new("gatekeeper").with_json_logs(false))?;
//!
//! tracing::info!(principal = "alice", "admitted");
//! gk_telemetry::metrics::record_admission(true);
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod logging;
pub mod metrics;

pub use logging::*;

use std::sync::OnceLock;

/// Global telemetry state.
static TELEMETRY: OnceLock<TelemetryConfig> = OnceLock::new();

/// Destination for log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogTarget {
    /// Standard error (keeps stdout clean for command output).
    #[default]
    Stderr,
    /// Standard output.
    Stdout,
}

/// Configuration for telemetry initialization.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to the startup log line.
    pub service_name: String,

    /// Log level filter (e.g., "info", "debug", "trace").
    pub log_level: String,

    /// Enable JSON log output.
    pub json_logs: bool,

    /// Where log lines are written.
    pub target: LogTarget,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "gatekeeper".to_string(),
            log_level: "info".to_string(),
            json_logs: true,
            target: LogTarget::Stderr,
        }
    }
}

impl TelemetryConfig {
    /// Create a new configuration with the given service name.
    #[must_use]
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            ..Default::default()
        }
    }

    /// Set the log level.
    #[must_use]
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Enable or disable JSON logs.
    #[must_use]
    pub const fn with_json_logs(mut self, enabled: bool) -> Self {
        self.json_logs = enabled;
        self
    }

    /// Set the log destination.
    #[must_use]
    pub const fn with_target(mut self, target: LogTarget) -> Self {
        self.target = target;
        self
    }
}

/// Initialize logging and register metric descriptions.
///
/// This should be called once at application startup. Subsequent calls are no-ops.
///
/// # Errors
///
/// Returns an error if a global subscriber could not be installed.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    if TELEMETRY.get().is_some() {
        return Ok(());
    }

    init_logging(config)?;
    metrics::init_metrics();

    tracing::debug!(
        service = %config.service_name,
        log_level = %config.log_level,
        json_logs = config.json_logs,
        "telemetry initialized"
    );

    let _ = TELEMETRY.set(config.clone());

    Ok(())
}

/// Telemetry error type.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// Failed to initialize logging.
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}
