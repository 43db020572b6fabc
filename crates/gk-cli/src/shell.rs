//! `gatekeeper shell`: interactive command loop over one controller.

use std::io::Write;
use std::sync::Arc;

use anyhow::Result;
use gk_traffic::TrafficMonitor;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::gate::{Gate, check_message};

const HELP: &str = "\
--- Gatekeeper CLI Commands ---
  check <user_id>        Log a request
  status <user_id>       View remaining hits
  clear <user_id>        Reset user limits
  throttle [<0.0-1.0>]   Show or set the global throttle
  save                   Write the snapshot now
  monitor start <port>   Admit inbound connections on <port>
  monitor stop           Stop the traffic monitor
  help                   Show this menu
  exit                   Save and quit
-------------------------------";

enum Step {
    Continue,
    Exit,
}

/// Run the shell on the process's stdin and stdout.
pub async fn run_stdio(gate: &Gate) -> Result<()> {
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut stdout = std::io::stdout();
    run(gate, stdin, &mut stdout).await
}

/// Read commands from `input` until `exit` or end of input, then save.
pub async fn run<R, W>(gate: &Gate, input: R, out: &mut W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let config = gate.limiter().config();
    let monitor = TrafficMonitor::new();
    let mut lines = input.lines();

    writeln!(
        out,
        "Rate Limiter System Active ({} req / {}s)",
        config.max_requests, config.window_secs
    )?;
    writeln!(out, "{HELP}")?;

    loop {
        write!(out, ">> ")?;
        out.flush()?;

        let Some(line) = lines.next_line().await? else {
            writeln!(out)?;
            break;
        };

        match dispatch(gate, &monitor, &line, out).await? {
            Step::Continue => {}
            Step::Exit => break,
        }
    }

    monitor.stop().await;
    gate.save()?;
    writeln!(out, "Data saved. Goodbye!")?;
    Ok(())
}

async fn dispatch<W: Write>(
    gate: &Gate,
    monitor: &TrafficMonitor,
    line: &str,
    out: &mut W,
) -> Result<Step> {
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return Ok(Step::Continue);
    };
    let arg = words.next();

    match (command, arg) {
        ("exit" | "quit", _) => return Ok(Step::Exit),
        ("help", _) => writeln!(out, "{HELP}")?,
        ("check" | "status" | "clear", None) => writeln!(out, "Error: Provide a user ID.")?,
        ("check", Some(principal)) => writeln!(out, "{}", gate.check(principal))?,
        ("status", Some(principal)) => writeln!(out, "{}", gate.status(principal))?,
        ("clear", Some(principal)) => writeln!(out, "{}", gate.clear(principal))?,
        ("throttle", None) => writeln!(out, "{}", gate.throttle(None))?,
        ("throttle", Some(value)) => match value.parse::<f64>() {
            Ok(multiplier) => writeln!(out, "{}", gate.throttle(Some(multiplier)))?,
            Err(_) => writeln!(out, "Error: throttle expects a number between 0.0 and 1.0.")?,
        },
        ("save", _) => match gate.save() {
            Ok(records) => writeln!(out, "Saved {records} records.")?,
            Err(e) => writeln!(out, "Error: {e:#}")?,
        },
        ("monitor", Some("start")) => match words.next().map(str::parse::<u16>) {
            Some(Ok(port)) => {
                let limiter = Arc::clone(gate.limiter());
                let started = monitor
                    .start(port, move |principal| {
                        println!("[MONITOR] {}", check_message(&limiter, principal));
                    })
                    .await;
                match started {
                    Ok(true) => writeln!(out, "Monitoring inbound traffic on port {port}.")?,
                    Ok(false) => writeln!(out, "Error: monitor already running.")?,
                    Err(e) => writeln!(out, "Error: {e}")?,
                }
            }
            _ => writeln!(out, "Error: usage: monitor start <port>")?,
        },
        ("monitor", Some("stop")) => {
            monitor.stop().await;
            writeln!(out, "Monitor stopped.")?;
        }
        ("monitor", _) => {
            let state = if monitor.is_active() { "running" } else { "stopped" };
            writeln!(out, "Monitor is {state}.")?;
        }
        (other, _) => writeln!(out, "Unknown command: {other}. Type 'help' for options.")?,
    }

    Ok(Step::Continue)
}
