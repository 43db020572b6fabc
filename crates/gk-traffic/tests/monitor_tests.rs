//! Traffic monitor driving an admission controller.
//!
//! Validates:
//! - Observed origins are admitted through the controller
//! - Only one session runs at a time
//! - No callback runs after `stop` returns

use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use gk_ratelimit::{AdmissionController, RateLimitConfig};
use gk_traffic::{ChannelSource, TcpAcceptSource, TrafficMonitor};

async fn eventually(cond: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached within 5s");
}

fn controller(max_requests: u32) -> Arc<AdmissionController> {
    Arc::new(AdmissionController::new(RateLimitConfig::new(max_requests, 60)).unwrap())
}

// ============================================================================
// Session Lifecycle Tests
// ============================================================================

#[tokio::test]
async fn second_start_is_rejected_while_active() {
    let monitor = TrafficMonitor::new();
    let (_tx1, first) = ChannelSource::new(1);
    let (_tx2, second) = ChannelSource::new(1);

    assert!(monitor.start_with_source(first, |_| {}));
    assert!(monitor.is_active());
    assert!(!monitor.start_with_source(second, |_| {}));

    monitor.stop().await;
    assert!(!monitor.is_active());
}

#[tokio::test]
async fn stop_is_idempotent() {
    let monitor = TrafficMonitor::new();
    let (_tx, source) = ChannelSource::new(1);
    assert!(monitor.start_with_source(source, |_| {}));

    monitor.stop().await;
    monitor.stop().await;

    assert!(!monitor.is_active());
}

#[tokio::test]
async fn restart_after_stop() {
    let monitor = TrafficMonitor::new();
    let (_tx, source) = ChannelSource::new(1);
    assert!(monitor.start_with_source(source, |_| {}));
    monitor.stop().await;

    let (_tx, source) = ChannelSource::new(1);
    assert!(monitor.start_with_source(source, |_| {}));
    monitor.stop().await;
}

#[tokio::test]
async fn no_callbacks_after_stop_returns() {
    let monitor = TrafficMonitor::new();
    let (tx, source) = ChannelSource::new(64);
    let calls = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&calls);
    assert!(monitor.start_with_source(source, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    }));

    tx.send(IpAddr::from([10, 0, 0, 1])).await.unwrap();
    eventually(|| calls.load(Ordering::SeqCst) == 1).await;

    monitor.stop().await;
    let at_stop = calls.load(Ordering::SeqCst);

    // The receiver is gone with the session; later sends go nowhere.
    let _ = tx.send(IpAddr::from([10, 0, 0, 2])).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(calls.load(Ordering::SeqCst), at_stop);
}

// ============================================================================
// Controller Integration Tests
// ============================================================================

#[tokio::test]
async fn observed_origins_consume_admissions() {
    let limiter = controller(2);
    let monitor = TrafficMonitor::new();
    let (tx, source) = ChannelSource::new(16);
    let decisions = Arc::new(AtomicUsize::new(0));

    let sink = Arc::clone(&limiter);
    let seen = Arc::clone(&decisions);
    assert!(monitor.start_with_source(source, move |principal| {
        sink.try_admit(principal);
        seen.fetch_add(1, Ordering::SeqCst);
    }));

    for _ in 0..3 {
        tx.send(IpAddr::from([192, 168, 0, 9])).await.unwrap();
    }
    tx.send(IpAddr::from([192, 168, 0, 10])).await.unwrap();
    eventually(|| decisions.load(Ordering::SeqCst) == 4).await;
    monitor.stop().await;

    assert_eq!(limiter.remaining("192.168.0.9"), 0);
    assert_eq!(limiter.remaining("192.168.0.10"), 1);
}

#[tokio::test]
async fn tcp_connections_are_rate_limited_by_peer() {
    let limiter = controller(5);
    let monitor = TrafficMonitor::new();
    let source = TcpAcceptSource::bind(0).await.unwrap();
    let port = source.local_addr().unwrap().port();

    let sink = Arc::clone(&limiter);
    assert!(monitor.start_with_source(source, move |principal| {
        sink.try_admit(principal);
    }));

    for _ in 0..2 {
        let _stream = tokio::net::TcpStream::connect(("127.0.0.1", port))
            .await
            .unwrap();
    }
    eventually(|| limiter.remaining("127.0.0.1") == 3).await;

    monitor.stop().await;
    assert!(!monitor.is_active());
}
