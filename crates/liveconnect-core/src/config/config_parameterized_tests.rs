#![allow(non_snake_case)]

use super::*;
use test_case::test_case;

#[test_case(r#"{"log_level": "trace"}"#, LogLevel::Trace)]
#[test_case(r#"{"log_level": "debug"}"#, LogLevel::Debug)]
#[test_case(r#"{"log_level": "warn"}"#, LogLevel::Warn)]
#[test_case(r#"{"log_level": "error"}"#, LogLevel::Error)]
#[test_case(r#"{"log_level": "bogus"}"#, LogLevel::Info)]
#[test_case(r#"{}"#, LogLevel::Info)]
fn BridgeConfig___log_level_json___parses_level(json: &str, expected: LogLevel) {
    let config = BridgeConfig::from_json(json.as_bytes()).unwrap();

    assert_eq!(config.log_level(), expected);
}

#[test_case(r#"{"reply_timeout_ms": 10}"#, 10)]
#[test_case(r#"{"reply_timeout_ms": 5000}"#, 5000)]
#[test_case(r#"{}"#, 120000)]
fn BridgeConfig___reply_timeout_json___parses_correctly(json: &str, expected_ms: u64) {
    let config = BridgeConfig::from_json(json.as_bytes()).unwrap();

    assert_eq!(config.reply_timeout(), Duration::from_millis(expected_ms));
}

#[test_case(BridgeConfig::default().with_queue_capacity(0))]
#[test_case(BridgeConfig::default().with_queue_workers(0))]
#[test_case(BridgeConfig { bind_address: " ".into(), ..Default::default() })]
fn BridgeConfig___validate___rejects_degenerate_values(config: BridgeConfig) {
    assert!(config.validate().is_err());
}
