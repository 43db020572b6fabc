//! The limiter bound to its snapshot file, plus the user-facing messages.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use gk_ratelimit::{AdmissionController, SnapshotCodec};

use crate::config::Settings;

/// A controller loaded from, and saved back to, one snapshot file.
#[derive(Debug)]
pub struct Gate {
    limiter: Arc<AdmissionController>,
    codec: SnapshotCodec,
    db: PathBuf,
}

impl Gate {
    /// Build the controller and load the snapshot, if any.
    pub fn open(settings: &Settings) -> Result<Self> {
        let limiter = AdmissionController::new(settings.limits)?;
        let codec = SnapshotCodec::from_secret(&settings.secret)?;

        let report = limiter
            .load(&settings.db, &codec)
            .with_context(|| format!("failed to load snapshot {}", settings.db.display()))?;
        if report.skipped > 0 {
            tracing::warn!(
                skipped = report.skipped,
                "some snapshot records could not be read and were dropped"
            );
        }

        Ok(Self {
            limiter: Arc::new(limiter),
            codec,
            db: settings.db.clone(),
        })
    }

    /// Shared handle to the controller.
    pub const fn limiter(&self) -> &Arc<AdmissionController> {
        &self.limiter
    }

    /// Write the snapshot back to disk.
    pub fn save(&self) -> Result<usize> {
        self.limiter
            .save(&self.db, &self.codec)
            .with_context(|| format!("failed to save snapshot {}", self.db.display()))
    }

    /// Admit `principal` and describe the decision.
    pub fn check(&self, principal: &str) -> String {
        check_message(&self.limiter, principal)
    }

    /// Describe the remaining budget for `principal`.
    pub fn status(&self, principal: &str) -> String {
        let status = self.limiter.status(principal);
        let mut line = format!(
            "User {principal} has {} requests left.",
            status.remaining
        );
        if status.is_limited {
            line.push_str(&format!(
                " Window resets in {}s.",
                whole_seconds(status.reset_after)
            ));
        }
        line
    }

    /// Forget `principal`'s history.
    pub fn clear(&self, principal: &str) -> String {
        self.limiter.clear(principal);
        format!("History cleared for {principal}")
    }

    /// Show or change the global throttle.
    pub fn throttle(&self, multiplier: Option<f64>) -> String {
        if let Some(value) = multiplier {
            self.limiter.set_throttle(value);
        }
        format!(
            "Throttle multiplier {:.2} (effective limit {} of {})",
            self.limiter.get_throttle(),
            self.limiter.effective_limit(),
            self.limiter.config().max_requests
        )
    }
}

/// Admit `principal` on `limiter` and describe the decision.
pub fn check_message(limiter: &AdmissionController, principal: &str) -> String {
    if limiter.try_admit(principal) {
        format!("[ALLOWED] Request logged for {principal}")
    } else {
        format!(
            "[DENIED] Rate limit exceeded for {principal}. Try again in {}s.",
            whole_seconds(limiter.reset_eta(principal))
        )
    }
}

/// Seconds rounded up, so a pending reset never reads as "0s".
pub fn whole_seconds(d: Duration) -> u64 {
    let secs = d.as_secs();
    if d.subsec_nanos() > 0 { secs + 1 } else { secs }
}
