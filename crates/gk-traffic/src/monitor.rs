//! Capture session manager.

use gk_telemetry::metrics;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;

use crate::TrafficError;
use crate::source::{FlowSource, TcpAcceptSource, normalize_origin};

/// A running capture task and its shutdown signal.
struct Session {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl Session {
    fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

/// Runs at most one flow-observation session at a time.
///
/// The session slot stays locked while `stop` joins the capture task, so a
/// session is never replaced before its predecessor has fully exited.
/// `start` and `start_with_source` must be called from within a tokio
/// runtime.
#[derive(Default)]
pub struct TrafficMonitor {
    session: Mutex<Option<Session>>,
}

impl TrafficMonitor {
    /// Create an idle monitor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Observe TCP connections accepted on `port`, calling `on_principal`
    /// with each normalized origin.
    ///
    /// Returns `Ok(false)` if a session is already running.
    ///
    /// # Errors
    ///
    /// Returns `TrafficError::Bind` if the port cannot be opened; no session
    /// is started in that case.
    pub async fn start<F>(&self, port: u16, on_principal: F) -> Result<bool, TrafficError>
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        if self.is_active() {
            tracing::warn!(port, "traffic monitor already running");
            return Ok(false);
        }

        let source = TcpAcceptSource::bind(port).await?;
        let started = self.start_with_source(source, on_principal);
        if started {
            tracing::info!(port, "monitoring inbound traffic");
        }
        Ok(started)
    }

    /// Run a session over an arbitrary flow source.
    ///
    /// Returns `false` if a session is already running or being stopped.
    pub fn start_with_source<S, F>(&self, source: S, on_principal: F) -> bool
    where
        S: FlowSource,
        F: Fn(&str) + Send + Sync + 'static,
    {
        // A held lock means `stop` is still joining the previous session.
        let Ok(mut slot) = self.session.try_lock() else {
            tracing::warn!("traffic monitor is stopping");
            return false;
        };
        if slot.as_ref().is_some_and(Session::is_running) {
            tracing::warn!("traffic monitor already running");
            return false;
        }

        let (shutdown, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(run_session(source, shutdown_rx, on_principal));
        // Any previous session here has already finished.
        *slot = Some(Session { shutdown, handle });
        true
    }

    /// Signal the running session to stop and wait until it has exited.
    ///
    /// No callback runs after this returns. Calling it while idle is a no-op.
    pub async fn stop(&self) {
        let mut slot = self.session.lock().await;
        let Some(session) = slot.take() else {
            return;
        };

        // The task may already have exited on its own; a closed channel is fine.
        let _ = session.shutdown.send(true);
        if let Err(e) = session.handle.await {
            tracing::error!(error = %e, "traffic monitor task failed");
        }
        drop(slot);
        tracing::info!("traffic monitor stopped");
    }

    /// Whether a session is currently observing flows, or still shutting down.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.session
            .try_lock()
            .map_or(true, |slot| slot.as_ref().is_some_and(Session::is_running))
    }
}

impl std::fmt::Debug for TrafficMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrafficMonitor")
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}

async fn run_session<S, F>(mut source: S, mut shutdown: watch::Receiver<bool>, on_principal: F)
where
    S: FlowSource,
    F: Fn(&str),
{
    let kind = source.kind();
    let mut observed: u64 = 0;

    loop {
        tokio::select! {
            biased;
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            next = source.next_origin() => match next {
                Ok(Some(origin)) => {
                    let principal = normalize_origin(origin);
                    observed += 1;
                    tracing::trace!(source = kind, principal = %principal, "flow observed");
                    metrics::record_flow_observed(kind);
                    on_principal(&principal);
                }
                Ok(None) => {
                    tracing::info!(source = kind, "flow source exhausted");
                    break;
                }
                Err(e) => {
                    tracing::error!(source = kind, error = %e, "flow source failed");
                    break;
                }
            },
        }
    }

    tracing::debug!(source = kind, observed, "capture session ended");
}
