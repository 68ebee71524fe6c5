#![allow(non_snake_case)]

use super::*;

#[test]
fn BridgeConfig___default___uses_legacy_port_and_timeout() {
    let config = BridgeConfig::default();

    assert_eq!(config.port, 50007);
    assert_eq!(config.reply_timeout(), Duration::from_secs(120));
    assert_eq!(config.poll_interval(), Duration::from_millis(2));
    assert_eq!(config.bind_address, "127.0.0.1");
    assert_eq!(config.queue_workers, 1);
    assert!(config.worker_threads.is_none());
}

#[test]
fn BridgeConfig___from_empty_bytes___returns_defaults() {
    let config = BridgeConfig::from_json(&[]).unwrap();

    assert_eq!(config.port, DEFAULT_PORT);
    assert_eq!(config.reply_timeout_ms, DEFAULT_REPLY_TIMEOUT_MS);
}

#[test]
fn BridgeConfig___from_json___overrides_only_given_fields() {
    let json = r#"{"port": 6000, "queue_workers": 3}"#;

    let config = BridgeConfig::from_json(json.as_bytes()).unwrap();

    assert_eq!(config.port, 6000);
    assert_eq!(config.queue_workers, 3);
    assert_eq!(config.queue_capacity, 1024);
}

#[test]
fn BridgeConfig___from_json___invalid_json_returns_error() {
    let result = BridgeConfig::from_json(b"{port:");

    assert!(result.is_err());
}

#[test]
fn BridgeConfig___listen_address___joins_host_and_port() {
    let config = BridgeConfig::default().with_port(4242);

    assert_eq!(config.listen_address(), "127.0.0.1:4242");
}

#[test]
fn BridgeConfig___poll_interval___never_zero() {
    let config = BridgeConfig {
        poll_interval_ms: 0,
        ..Default::default()
    };

    assert_eq!(config.poll_interval(), Duration::from_millis(1));
}

#[test]
fn BridgeConfig___resolve_viewer_executable___joins_relative_path() {
    let config = BridgeConfig {
        viewer_executable: Some(PathBuf::from("../bin/appletviewer")),
        ..Default::default()
    };

    let resolved = config.resolve_viewer_executable(Path::new("/usr/lib/plugin"));

    assert_eq!(
        resolved,
        Some(PathBuf::from("/usr/lib/plugin/../bin/appletviewer"))
    );
}

#[test]
fn BridgeConfig___resolve_viewer_executable___keeps_absolute_path() {
    let config = BridgeConfig {
        viewer_executable: Some(PathBuf::from("/opt/jre/bin/appletviewer")),
        ..Default::default()
    };

    let resolved = config.resolve_viewer_executable(Path::new("/usr/lib/plugin"));

    assert_eq!(resolved, Some(PathBuf::from("/opt/jre/bin/appletviewer")));
}

#[test]
fn BridgeConfig___resolve_viewer_executable___none_when_unset() {
    let config = BridgeConfig::default();

    assert!(config.resolve_viewer_executable(Path::new("/tmp")).is_none());
}

#[test]
fn BridgeConfig___validate___accepts_defaults() {
    assert!(BridgeConfig::default().validate().is_ok());
}

#[test]
fn BridgeConfig___validate___rejects_zero_timeout() {
    let config = BridgeConfig::default().with_reply_timeout(Duration::ZERO);

    assert!(matches!(config.validate(), Err(BridgeError::Config(_))));
}

#[test]
fn BridgeConfig___validate___rejects_unknown_log_level() {
    let config = BridgeConfig {
        log_level: "chatty".into(),
        ..Default::default()
    };

    assert!(matches!(config.validate(), Err(BridgeError::Config(_))));
}

#[test]
fn BridgeConfig___serialize___roundtrips_through_json() {
    let config = BridgeConfig::default().with_port(1234).with_queue_workers(2);

    let json = serde_json::to_vec(&config).unwrap();
    let restored = BridgeConfig::from_json(&json).unwrap();

    assert_eq!(restored.port, 1234);
    assert_eq!(restored.queue_workers, 2);
}
