//! Metrics for the admission controller, snapshot codec, and traffic monitor.
//!
//! Values go through the `metrics` facade; nothing is recorded until the
//! embedding application installs a recorder.

use std::sync::OnceLock;
use std::time::Instant;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};

/// Admission decisions, labelled `outcome=allowed|denied`.
pub const ADMISSIONS_TOTAL: &str = "gatekeeper_admissions_total";
/// Current global throttle multiplier.
pub const THROTTLE_MULTIPLIER: &str = "gatekeeper_throttle_multiplier";
/// Snapshot records written or loaded, labelled `op=save|load`.
pub const SNAPSHOT_RECORDS_TOTAL: &str = "gatekeeper_snapshot_records_total";
/// Snapshot lines discarded during load, labelled `reason`.
pub const SNAPSHOT_SKIPPED_TOTAL: &str = "gatekeeper_snapshot_skipped_total";
/// Snapshot save/load duration.
pub const SNAPSHOT_DURATION_SECONDS: &str = "gatekeeper_snapshot_duration_seconds";
/// Flows observed by the traffic monitor, labelled `source=tcp|channel`.
pub const FLOWS_OBSERVED_TOTAL: &str = "gatekeeper_flows_observed_total";

static METRICS_INITIALIZED: OnceLock<bool> = OnceLock::new();

/// Register descriptions for every Gatekeeper metric.
pub fn init_metrics() {
    if METRICS_INITIALIZED.set(true).is_err() {
        return;
    }

    describe_counter!(ADMISSIONS_TOTAL, "Admission decisions by outcome");
    describe_gauge!(THROTTLE_MULTIPLIER, "Global throttle multiplier in [0, 1]");
    describe_counter!(SNAPSHOT_RECORDS_TOTAL, "Snapshot records written or loaded");
    describe_counter!(
        SNAPSHOT_SKIPPED_TOTAL,
        "Snapshot lines discarded during load"
    );
    describe_histogram!(
        SNAPSHOT_DURATION_SECONDS,
        "Snapshot save/load duration in seconds"
    );
    describe_counter!(FLOWS_OBSERVED_TOTAL, "Inbound flows observed by the traffic monitor");
}

/// Record one admission decision.
pub fn record_admission(allowed: bool) {
    let outcome = if allowed { "allowed" } else { "denied" };
    counter!(ADMISSIONS_TOTAL, "outcome" => outcome).increment(1);
}

/// Record a throttle multiplier change.
pub fn record_throttle(multiplier: f64) {
    gauge!(THROTTLE_MULTIPLIER).set(multiplier);
}

/// Record a completed snapshot operation.
pub fn record_snapshot(op: &'static str, records: u64, started: Instant) {
    counter!(SNAPSHOT_RECORDS_TOTAL, "op" => op).increment(records);
    histogram!(SNAPSHOT_DURATION_SECONDS, "op" => op).record(started.elapsed().as_secs_f64());
}

/// Record a discarded snapshot line.
pub fn record_snapshot_skipped(reason: &'static str) {
    counter!(SNAPSHOT_SKIPPED_TOTAL, "reason" => reason).increment(1);
}

/// Record an observed inbound flow.
pub fn record_flow_observed(source: &'static str) {
    counter!(FLOWS_OBSERVED_TOTAL, "source" => source).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init_metrics();
        init_metrics();
        assert_eq!(METRICS_INITIALIZED.get(), Some(&true));
    }

    #[test]
    fn test_helpers_without_recorder() {
        // The facade is a no-op until a recorder is installed.
        record_admission(true);
        record_admission(false);
        record_throttle(0.5);
        record_snapshot("save", 3, Instant::now());
        record_snapshot_skipped("decrypt");
        record_flow_observed("tcp");
    }
}
