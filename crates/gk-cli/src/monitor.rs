//! `gatekeeper monitor`: admit inbound connections on a port until interrupted.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::Args;
use gk_traffic::TrafficMonitor;

use crate::gate::{Gate, check_message};

/// How often the command checks that the capture session is still alive.
const LIVENESS_INTERVAL: Duration = Duration::from_millis(250);

/// Arguments for the `monitor` command.
#[derive(Args, Debug)]
pub struct MonitorArgs {
    /// Port to observe.
    #[arg(long, short = 'p')]
    pub port: u16,

    /// Stop after this many seconds instead of waiting for Ctrl-C.
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub duration_secs: Option<u64>,
}

/// Run the monitor, then save the snapshot.
///
/// # Errors
///
/// Returns an error if the port cannot be bound, the session dies on its own,
/// or the snapshot cannot be written.
pub async fn run(gate: &Gate, args: &MonitorArgs) -> Result<()> {
    let monitor = TrafficMonitor::new();
    let limiter = Arc::clone(gate.limiter());
    monitor
        .start(args.port, move |principal| {
            println!("{}", check_message(&limiter, principal));
        })
        .await
        .context("failed to start traffic monitor")?;
    tracing::info!(port = args.port, duration_secs = ?args.duration_secs, "monitor running");

    let outcome = tokio::select! {
        signal = tokio::signal::ctrl_c() => signal.context("failed to listen for Ctrl-C"),
        () = deadline(args.duration_secs) => Ok(()),
        () = session_ended(&monitor) => Err(anyhow!(
            "traffic monitor on port {} stopped unexpectedly",
            args.port
        )),
    };

    monitor.stop().await;
    let records = gate.save()?;
    tracing::info!(records, "snapshot saved on monitor exit");

    outcome
}

async fn deadline(duration_secs: Option<u64>) {
    match duration_secs {
        Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
        None => std::future::pending().await,
    }
}

async fn session_ended(monitor: &TrafficMonitor) {
    let mut ticker = tokio::time::interval(LIVENESS_INTERVAL);
    loop {
        ticker.tick().await;
        if !monitor.is_active() {
            return;
        }
    }
}
