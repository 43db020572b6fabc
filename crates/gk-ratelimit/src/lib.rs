//! Gatekeeper Rate Limit - per-principal sliding-window admission control
//!
//! This crate is the core of Gatekeeper:
//!
//! - **Admission**: one sliding window of admission timestamps per principal key
//! - **Global throttle**: a multiplier in `[0.0, 1.0]` that scales every ceiling down
//! - **Persistence**: an encrypted, line-oriented snapshot that survives restarts
//! - **Thread-safe**: every operation runs under a single `parking_lot` mutex
//!
//! # Quick Start
//!
//! ```rust
//! use gk_ratelimit::{AdmissionController, RateLimitConfig};
//!
//! let limiter = AdmissionController::new(RateLimitConfig::new(3, 10)).unwrap();
//!
//! assert!(limiter.try_admit("alice"));
//! assert!(limiter.try_admit("alice"));
//! assert!(limiter.try_admit("alice"));
//! assert!(!limiter.try_admit("alice"));
//!
//! assert_eq!(limiter.remaining("alice"), 0);
//! assert_eq!(limiter.remaining("bob"), 3);
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod clock;
mod controller;
mod snapshot;
mod window;

pub use clock::*;
pub use controller::*;
pub use snapshot::*;
pub use window::PrincipalWindow;

use std::time::Duration;

/// Principal status snapshot.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct PrincipalStatus {
    /// Effective ceiling for the current window.
    pub limit: u32,

    /// Remaining admissions in the current window.
    pub remaining: u32,

    /// Time until the oldest admission leaves the window.
    pub reset_after: Duration,

    /// Whether the next admission would be denied.
    pub is_limited: bool,
}

/// Rate limit error.
#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    /// Invalid configuration.
    #[error("Invalid rate limit configuration: {0}")]
    InvalidConfig(String),
}

/// Configuration for the admission controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RateLimitConfig {
    /// Maximum admissions per principal per window.
    pub max_requests: u32,

    /// Window length in seconds.
    pub window_secs: u64,
}

impl RateLimitConfig {
    /// Create a new rate limit configuration.
    #[must_use]
    pub const fn new(max_requests: u32, window_secs: u64) -> Self {
        Self {
            max_requests,
            window_secs,
        }
    }

    /// Window length as a `Duration`.
    #[must_use]
    pub const fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    /// Reject zero ceilings and zero-length windows.
    ///
    /// # Errors
    ///
    /// Returns `RateLimitError::InvalidConfig` naming the offending field.
    pub fn validate(&self) -> Result<(), RateLimitError> {
        if self.max_requests == 0 {
            return Err(RateLimitError::InvalidConfig(
                "max_requests must be > 0".into(),
            ));
        }
        if self.window_secs == 0 {
            return Err(RateLimitError::InvalidConfig(
                "window_secs must be > 0".into(),
            ));
        }
        Ok(())
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::new(10, 60)
    }
}
