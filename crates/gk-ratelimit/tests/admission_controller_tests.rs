//! Behavioral tests for the admission controller.
//!
//! Validates:
//! - Per-window ceilings and expiry
//! - Global throttle scaling and the floor of one admission per window
//! - Concurrent admission never exceeding the ceiling
//! - `clear` restoring full capacity

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use gk_ratelimit::{AdmissionController, ManualClock, RateLimitConfig};

const T0: u64 = 1_700_000_000_000;

fn limiter(max_requests: u32, window_secs: u64) -> (AdmissionController, ManualClock) {
    let clock = ManualClock::new(T0);
    let limiter = AdmissionController::with_clock(
        RateLimitConfig::new(max_requests, window_secs),
        Arc::new(clock.clone()),
    )
    .expect("valid config");
    (limiter, clock)
}

// ============================================================================
// Window Ceiling Tests
// ============================================================================

#[test]
fn three_per_ten_seconds_scenario() {
    // Given max_requests=3, window_seconds=10
    let (limiter, clock) = limiter(3, 10);

    // Three calls in immediate succession are admitted
    assert!(limiter.try_admit("a"));
    assert!(limiter.try_admit("a"));
    assert!(limiter.try_admit("a"));

    // The fourth within the same window is denied
    assert!(!limiter.try_admit("a"));

    // The reset ETA is in (0, 10] seconds
    let eta = limiter.reset_eta("a");
    assert!(eta > Duration::ZERO);
    assert!(eta <= Duration::from_secs(10));

    // After waiting past the ETA, a fifth call is admitted
    clock.advance(eta + Duration::from_millis(1));
    assert!(limiter.try_admit("a"));
}

#[test]
fn admitted_count_never_exceeds_limit_within_window() {
    let (limiter, clock) = limiter(5, 60);

    let mut admitted = 0;
    for _ in 0..50 {
        if limiter.try_admit("burst") {
            admitted += 1;
        }
        clock.advance(Duration::from_millis(500));
    }

    // 50 calls spread over 25s all fall in one 60s window
    assert_eq!(admitted, 5);
}

#[test]
fn remaining_recovers_after_window_elapses() {
    let (limiter, clock) = limiter(4, 10);
    for _ in 0..4 {
        assert!(limiter.try_admit("a"));
    }
    assert_eq!(limiter.remaining("a"), 0);

    clock.advance(Duration::from_secs(10));

    assert_eq!(limiter.remaining("a"), 4);
    assert_eq!(limiter.reset_eta("a"), Duration::ZERO);
}

#[test]
fn window_slides_one_slot_at_a_time() {
    let (limiter, clock) = limiter(2, 10);

    assert!(limiter.try_admit("a"));
    clock.advance(Duration::from_secs(4));
    assert!(limiter.try_admit("a"));
    assert!(!limiter.try_admit("a"));

    // First admission expires at t=10s, second is still live
    clock.advance(Duration::from_secs(6));
    assert_eq!(limiter.remaining("a"), 1);
    assert_eq!(limiter.reset_eta("a"), Duration::from_secs(4));
    assert!(limiter.try_admit("a"));
    assert!(!limiter.try_admit("a"));
}

#[test]
fn principals_are_independent() {
    let (limiter, _clock) = limiter(1, 10);

    assert!(limiter.try_admit("alice"));
    assert!(!limiter.try_admit("alice"));
    assert!(limiter.try_admit("bob"));
    assert_eq!(limiter.remaining("carol"), 1);
}

// ============================================================================
// Throttle Tests
// ============================================================================

#[test]
fn half_throttle_halves_the_ceiling() {
    let (limiter, _clock) = limiter(4, 10);
    limiter.set_throttle(0.5);
    assert_eq!(limiter.effective_limit(), 2);

    let results: Vec<bool> = (0..6).map(|_| limiter.try_admit("a")).collect();

    assert_eq!(results, vec![true, true, false, false, false, false]);
}

#[test]
fn zero_throttle_still_allows_one_per_window() {
    let (limiter, clock) = limiter(10, 10);
    limiter.set_throttle(0.0);

    assert!(limiter.try_admit("a"));
    assert!(!limiter.try_admit("a"));
    assert_eq!(limiter.remaining("a"), 0);

    clock.advance(Duration::from_secs(10));
    assert!(limiter.try_admit("a"));
}

#[test]
fn restoring_throttle_restores_capacity() {
    let (limiter, _clock) = limiter(4, 10);
    limiter.set_throttle(0.25);
    assert!(limiter.try_admit("a"));
    assert!(!limiter.try_admit("a"));

    limiter.set_throttle(1.0);

    assert_eq!(limiter.remaining("a"), 3);
    assert!(limiter.try_admit("a"));
}

// ============================================================================
// Clear Tests
// ============================================================================

#[test]
fn clear_restores_max_requests() {
    let (limiter, _clock) = limiter(3, 10);
    for _ in 0..5 {
        limiter.try_admit("a");
    }

    limiter.clear("a");

    assert_eq!(limiter.remaining("a"), 3);
    assert_eq!(limiter.reset_eta("a"), Duration::ZERO);
}

#[test]
fn clear_unknown_principal_is_noop() {
    let (limiter, _clock) = limiter(3, 10);

    assert!(!limiter.clear("nobody"));
    assert_eq!(limiter.principal_count(), 0);
}

// ============================================================================
// Concurrency Tests
// ============================================================================

#[test]
fn concurrent_admissions_respect_ceiling() {
    let (limiter, _clock) = limiter(25, 60);
    let limiter = Arc::new(limiter);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let limiter = Arc::clone(&limiter);
            thread::spawn(move || (0..20).filter(|_| limiter.try_admit("shared")).count())
        })
        .collect();

    let admitted: usize = handles
        .into_iter()
        .map(|h| h.join().expect("worker panicked"))
        .sum();

    assert_eq!(admitted, 25);
    assert_eq!(limiter.remaining("shared"), 0);
}

#[test]
fn concurrent_throttle_changes_never_exceed_full_ceiling() {
    let (limiter, _clock) = limiter(10, 60);
    let limiter = Arc::new(limiter);

    let toggler = {
        let limiter = Arc::clone(&limiter);
        thread::spawn(move || {
            for i in 0..200 {
                limiter.set_throttle(if i % 2 == 0 { 0.3 } else { 1.0 });
            }
        })
    };
    let workers: Vec<_> = (0..4)
        .map(|_| {
            let limiter = Arc::clone(&limiter);
            thread::spawn(move || (0..50).filter(|_| limiter.try_admit("p")).count())
        })
        .collect();

    toggler.join().expect("toggler panicked");
    let admitted: usize = workers
        .into_iter()
        .map(|h| h.join().expect("worker panicked"))
        .sum();

    assert!(admitted >= 3, "at least the throttled ceiling is reachable");
    assert!(admitted <= 10, "admitted {admitted} exceeds max_requests");
}

#[test]
fn wall_clock_controller_admits() {
    let limiter = AdmissionController::new(RateLimitConfig::new(2, 1)).unwrap();

    assert!(limiter.try_admit("wall"));
    assert!(limiter.try_admit("wall"));
    assert!(!limiter.try_admit("wall"));

    let eta = limiter.reset_eta("wall");
    assert!(eta <= Duration::from_secs(1));
}
