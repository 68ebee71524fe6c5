#![allow(non_snake_case)]

use super::*;
use std::time::Duration;

#[test]
fn ShutdownHandle___new___not_triggered() {
    let handle = ShutdownHandle::new();

    assert!(!handle.is_triggered());
    assert_eq!(handle.reason(), None);
}

#[test]
fn ShutdownHandle___trigger___first_reason_wins() {
    let handle = ShutdownHandle::new();

    assert!(handle.trigger(ShutdownReason::TransportLost("eof".into())));
    assert!(!handle.trigger(ShutdownReason::Requested));

    assert_eq!(
        handle.reason(),
        Some(ShutdownReason::TransportLost("eof".into()))
    );
}

#[test]
fn ShutdownHandle___signal___observes_later_trigger() {
    let handle = ShutdownHandle::new();
    let signal = handle.signal();

    assert!(!signal.is_triggered());
    handle.trigger(ShutdownReason::Requested);

    assert!(signal.is_triggered());
}

#[test]
fn ShutdownHandle___clone___shares_state() {
    let handle = ShutdownHandle::default();
    let clone = handle.clone();

    clone.trigger(ShutdownReason::Requested);

    assert!(handle.is_triggered());
}

#[tokio::test]
async fn ShutdownSignal___wait___returns_immediately_when_triggered() {
    let handle = ShutdownHandle::new();
    handle.trigger(ShutdownReason::Requested);
    let mut signal = handle.signal();

    let reason = tokio::time::timeout(Duration::from_millis(100), signal.wait())
        .await
        .unwrap();

    assert_eq!(reason, ShutdownReason::Requested);
}

#[tokio::test]
async fn ShutdownSignal___wait___wakes_on_trigger() {
    let handle = ShutdownHandle::new();
    let mut signal = handle.signal();

    let waiter = tokio::spawn(async move { signal.wait().await });
    tokio::time::sleep(Duration::from_millis(10)).await;
    handle.trigger(ShutdownReason::TransportLost("reset".into()));

    let reason = tokio::time::timeout(Duration::from_secs(1), waiter)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reason, ShutdownReason::TransportLost("reset".into()));
}

#[tokio::test]
async fn ShutdownSignal___wait___handle_dropped_reports_runtime_dropped() {
    let handle = ShutdownHandle::new();
    let mut signal = handle.signal();
    drop(handle);

    assert_eq!(signal.wait().await, ShutdownReason::RuntimeDropped);
}

#[test]
fn ShutdownReason___display___describes_cause() {
    assert_eq!(
        ShutdownReason::TransportLost("eof".into()).to_string(),
        "transport lost: eof"
    );
}
