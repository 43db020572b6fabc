//! Gatekeeper command-line interface.
//!
//! - `gatekeeper check <id>` - admit one request and persist the result
//! - `gatekeeper status <id>` - remaining admissions in the current window
//! - `gatekeeper clear <id>` - forget a principal's history
//! - `gatekeeper shell` - interactive session over one loaded snapshot
//! - `gatekeeper monitor --port <port>` - admit inbound connections as they arrive

#![forbid(unsafe_code)]

mod config;
mod gate;
mod monitor;
mod shell;

use anyhow::Result;
use clap::{Parser, Subcommand};
use gk_telemetry::{TelemetryConfig, init_telemetry};

use config::{GlobalArgs, Settings};
use gate::Gate;

/// Per-principal sliding-window rate limiter.
#[derive(Parser)]
#[command(name = "gatekeeper")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log a request for a principal.
    Check {
        /// Principal identifier (user id, client IP, ...).
        principal: String,
    },

    /// Show remaining requests for a principal.
    Status {
        /// Principal identifier.
        principal: String,
    },

    /// Reset a principal's history.
    Clear {
        /// Principal identifier.
        principal: String,
    },

    /// Interactive command loop; saves on exit.
    Shell,

    /// Admit inbound TCP connections on a port, keyed by peer address.
    ///
    /// Runs until Ctrl-C or `--duration-secs`, then saves the snapshot.
    Monitor(monitor::MonitorArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout carries only command output.
    init_telemetry(
        &TelemetryConfig::new("gatekeeper")
            .with_log_level(cli.global.log_level.as_str())
            .with_json_logs(cli.global.json_logs),
    )?;

    let settings = Settings::resolve(&cli.global)?;
    let gate = Gate::open(&settings)?;

    match cli.command {
        Commands::Check { principal } => println!("{}", gate.check(&principal)),
        Commands::Status { principal } => println!("{}", gate.status(&principal)),
        Commands::Clear { principal } => println!("{}", gate.clear(&principal)),
        // Both save on their own way out.
        Commands::Shell => return shell::run_stdio(&gate).await,
        Commands::Monitor(args) => return monitor::run(&gate, &args).await,
    }

    gate.save()?;
    Ok(())
}
