//! Sliding-window admission controller.
//!
//! One window per principal, one global throttle multiplier, one lock. Every
//! public operation takes the lock once and holds it until it returns, so
//! each call is atomic with respect to every other call.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use gk_telemetry::metrics;
use parking_lot::Mutex;

use crate::snapshot::{LoadReport, SnapshotCodec, SnapshotError};
use crate::window::PrincipalWindow;
use crate::{Clock, PrincipalStatus, RateLimitConfig, RateLimitError, SystemClock};

/// State guarded by the controller's lock.
#[derive(Debug)]
struct ControllerState {
    principals: HashMap<String, PrincipalWindow>,
    throttle: f64,
}

/// Per-principal sliding-window rate limiter.
pub struct AdmissionController {
    config: RateLimitConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<ControllerState>,
}

impl AdmissionController {
    /// Create a controller on the wall clock.
    ///
    /// # Errors
    ///
    /// Returns an error if `max_requests` or `window_secs` is zero.
    pub fn new(config: RateLimitConfig) -> Result<Self, RateLimitError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a controller with an injected time source.
    ///
    /// # Errors
    ///
    /// Returns an error if `max_requests` or `window_secs` is zero.
    pub fn with_clock(config: RateLimitConfig, clock: Arc<dyn Clock>) -> Result<Self, RateLimitError> {
        config.validate()?;
        Ok(Self {
            config,
            clock,
            state: Mutex::new(ControllerState {
                principals: HashMap::new(),
                throttle: 1.0,
            }),
        })
    }

    /// Configuration this controller was built with.
    #[must_use]
    pub const fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Check and, if allowed, record one admission for `key`.
    ///
    /// A denied call leaves the window untouched.
    pub fn try_admit(&self, key: &str) -> bool {
        let now = self.clock.now_ms();
        let window_len = self.config.window();

        let allowed = {
            let mut state = self.state.lock();
            let limit = effective_limit(self.config.max_requests, state.throttle);
            let window = state.principals.entry(key.to_owned()).or_default();
            window.evict_expired(now, window_len);

            if window.len() < limit as usize {
                window.record(now);
                true
            } else {
                false
            }
        };

        if allowed {
            tracing::trace!(principal = key, "admitted");
        } else {
            tracing::debug!(principal = key, "denied: rate limit exceeded");
        }
        metrics::record_admission(allowed);

        allowed
    }

    /// Admissions left for `key` in the current window.
    ///
    /// A principal that has never been seen reports the configured
    /// `max_requests`, regardless of the throttle.
    pub fn remaining(&self, key: &str) -> u32 {
        let now = self.clock.now_ms();
        let mut state = self.state.lock();
        let limit = effective_limit(self.config.max_requests, state.throttle);

        match state.principals.get_mut(key) {
            None => self.config.max_requests,
            Some(window) => {
                window.evict_expired(now, self.config.window());
                limit.saturating_sub(len_u32(window))
            }
        }
    }

    /// Time until the least recently admitted call leaves the window.
    ///
    /// Zero for unseen principals and for windows that are empty after expiry.
    pub fn reset_eta(&self, key: &str) -> Duration {
        let now = self.clock.now_ms();
        let mut state = self.state.lock();

        state.principals.get_mut(key).map_or(Duration::ZERO, |window| {
            window.evict_expired(now, self.config.window());
            window.time_until_slot(now, self.config.window())
        })
    }

    /// Limit, remaining, and reset time for `key` in one critical section.
    pub fn status(&self, key: &str) -> PrincipalStatus {
        let now = self.clock.now_ms();
        let mut state = self.state.lock();
        let limit = effective_limit(self.config.max_requests, state.throttle);

        let (remaining, reset_after, held) = match state.principals.get_mut(key) {
            None => (self.config.max_requests, Duration::ZERO, 0),
            Some(window) => {
                window.evict_expired(now, self.config.window());
                let held = len_u32(window);
                (
                    limit.saturating_sub(held),
                    window.time_until_slot(now, self.config.window()),
                    held,
                )
            }
        };

        PrincipalStatus {
            limit,
            remaining,
            reset_after,
            is_limited: held >= limit,
        }
    }

    /// Forget all history for `key`. Returns whether a window existed.
    pub fn clear(&self, key: &str) -> bool {
        let removed = self.state.lock().principals.remove(key).is_some();
        tracing::debug!(principal = key, removed, "principal cleared");
        removed
    }

    /// Set the global throttle multiplier, clamped to `[0.0, 1.0]`.
    ///
    /// NaN is treated as `0.0`. Returns the stored value.
    pub fn set_throttle(&self, multiplier: f64) -> f64 {
        let multiplier = if multiplier.is_nan() {
            0.0
        } else {
            multiplier.clamp(0.0, 1.0)
        };

        let limit = {
            let mut state = self.state.lock();
            state.throttle = multiplier;
            effective_limit(self.config.max_requests, multiplier)
        };

        tracing::info!(multiplier, effective_limit = limit, "global throttle multiplier set");
        metrics::record_throttle(multiplier);
        multiplier
    }

    /// Current global throttle multiplier.
    pub fn get_throttle(&self) -> f64 {
        self.state.lock().throttle
    }

    /// Ceiling currently applied to every principal.
    pub fn effective_limit(&self) -> u32 {
        effective_limit(self.config.max_requests, self.state.lock().throttle)
    }

    /// Number of principals with a materialized window.
    pub fn principal_count(&self) -> usize {
        self.state.lock().principals.len()
    }

    /// Write every non-empty window to `path`.
    ///
    /// The file is written next to `path` and renamed over it. The lock is held
    /// for the duration so the snapshot is a consistent view.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created, written, or renamed.
    pub fn save(&self, path: &Path, codec: &SnapshotCodec) -> Result<usize, SnapshotError> {
        let started = Instant::now();
        let now = self.clock.now_ms();
        let tmp = tmp_path(path);

        let written = {
            let mut state = self.state.lock();
            for window in state.principals.values_mut() {
                window.evict_expired(now, self.config.window());
            }

            let result = write_and_replace(&state.principals, codec, &tmp, path);
            if result.is_err() {
                // Never leave a partial temp file next to the snapshot.
                let _ = fs::remove_file(&tmp);
            }
            result?
        };

        tracing::info!(path = %path.display(), records = written, "snapshot saved");
        metrics::record_snapshot("save", written as u64, started);
        Ok(written)
    }

    /// Replace every window with the contents of the snapshot at `path`.
    ///
    /// A missing file is an empty snapshot. Corrupt lines are skipped and
    /// counted in the returned report.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read, or declares an
    /// unsupported format version.
    pub fn load(&self, path: &Path, codec: &SnapshotCodec) -> Result<LoadReport, SnapshotError> {
        let started = Instant::now();
        let mut state = self.state.lock();

        let (principals, report) = match File::open(path) {
            Ok(file) => codec.read(BufReader::new(file))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "no snapshot found, starting empty");
                (HashMap::new(), LoadReport::default())
            }
            Err(e) => return Err(SnapshotError::io(path, e)),
        };

        state.principals = principals;
        drop(state);

        tracing::info!(
            path = %path.display(),
            loaded = report.loaded,
            skipped = report.skipped,
            "snapshot loaded"
        );
        metrics::record_snapshot("load", report.loaded as u64, started);
        Ok(report)
    }
}

impl std::fmt::Debug for AdmissionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionController")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// `max(1, floor(max_requests * multiplier))`.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn effective_limit(max_requests: u32, multiplier: f64) -> u32 {
    let scaled = (f64::from(max_requests) * multiplier).floor();
    (scaled as u32).clamp(1, max_requests.max(1))
}

fn len_u32(window: &PrincipalWindow) -> u32 {
    u32::try_from(window.len()).unwrap_or(u32::MAX)
}

fn write_and_replace(
    principals: &HashMap<String, PrincipalWindow>,
    codec: &SnapshotCodec,
    tmp: &Path,
    path: &Path,
) -> Result<usize, SnapshotError> {
    let file = File::create(tmp).map_err(|e| SnapshotError::io(tmp, e))?;
    let mut out = BufWriter::new(file);
    let written = codec.write(principals, &mut out)?;
    out.flush().map_err(|e| SnapshotError::io(tmp, e))?;
    out.get_ref()
        .sync_all()
        .map_err(|e| SnapshotError::io(tmp, e))?;
    drop(out);
    fs::rename(tmp, path).map_err(|e| SnapshotError::io(path, e))?;
    Ok(written)
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}
