//! Per-principal sliding window.

use std::collections::VecDeque;
use std::time::Duration;

/// Admission timestamps for one principal, oldest first.
///
/// Timestamps are appended in non-decreasing order, so expiry is always a
/// prefix trim from the front.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrincipalWindow {
    timestamps: VecDeque<u64>,
}

impl PrincipalWindow {
    /// Create an empty window.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a window from already-ordered timestamps.
    ///
    /// Returns `None` if the timestamps are not in non-decreasing order.
    #[must_use]
    pub fn from_timestamps(timestamps: Vec<u64>) -> Option<Self> {
        if timestamps.windows(2).any(|pair| pair[0] > pair[1]) {
            return None;
        }
        Some(Self {
            timestamps: timestamps.into(),
        })
    }

    /// Drop every timestamp at least `window` old relative to `now_ms`.
    ///
    /// Returns the number of evicted entries.
    pub fn evict_expired(&mut self, now_ms: u64, window: Duration) -> usize {
        let window_ms = duration_ms(window);
        let mut evicted = 0;

        while let Some(&front) = self.timestamps.front() {
            if now_ms.saturating_sub(front) >= window_ms {
                self.timestamps.pop_front();
                evicted += 1;
            } else {
                break;
            }
        }

        evicted
    }

    /// Record an admission at `now_ms`.
    ///
    /// A clock that stepped backwards is pinned to the newest entry so the
    /// ordering invariant holds.
    pub fn record(&mut self, now_ms: u64) {
        let at = self.timestamps.back().map_or(now_ms, |&last| last.max(now_ms));
        self.timestamps.push_back(at);
    }

    /// Number of admissions currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    /// Whether the window holds no admissions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Oldest admission still held.
    #[must_use]
    pub fn oldest(&self) -> Option<u64> {
        self.timestamps.front().copied()
    }

    /// Time until the oldest admission leaves the window.
    #[must_use]
    pub fn time_until_slot(&self, now_ms: u64, window: Duration) -> Duration {
        self.oldest().map_or(Duration::ZERO, |oldest| {
            let elapsed = Duration::from_millis(now_ms.saturating_sub(oldest));
            window.saturating_sub(elapsed)
        })
    }

    /// Iterate over timestamps, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        self.timestamps.iter().copied()
    }
}

pub(crate) fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
