//! Gatekeeper Traffic - observe inbound flows and feed their origins to a callback
//!
//! A [`TrafficMonitor`] runs at most one capture session at a time. Each
//! session pulls origin addresses from a [`FlowSource`], normalizes them to
//! principal strings, and hands them to the caller's callback, typically an
//! `AdmissionController::try_admit`.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use gk_traffic::TrafficMonitor;
//!
//! let monitor = TrafficMonitor::new();
//! let limiter = Arc::clone(&limiter);
//! let started = monitor
//!     .start(8080, move |principal| {
//!         limiter.try_admit(principal);
//!     })
//!     .await?;
//! assert!(started);
//! // ...
//! monitor.stop().await;
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod monitor;
mod source;

pub use monitor::TrafficMonitor;
pub use source::{ChannelSource, FlowSource, TcpAcceptSource, normalize_origin};

use thiserror::Error;

/// Errors raised by a flow source.
#[derive(Debug, Error)]
pub enum TrafficError {
    /// The listening socket could not be opened.
    #[error("failed to bind port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    /// Accepting an inbound flow failed.
    #[error("accept failed: {0}")]
    Accept(#[source] std::io::Error),
}
