//! Tests for the full validation pipeline.

use super::*;

#[test]
fn default_config_validates() {
    let config = CodepairConfig::default();
    assert!(validate(&config).is_ok());
}

#[test]
fn catches_debounce_too_large() {
    let mut config = CodepairConfig::default();
    config.sync.debounce_ms = 20_000;
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("sync.debounce_ms"));
}

#[test]
fn catches_zero_base_delay() {
    let mut config = CodepairConfig::default();
    config.sync.reconnect_base_delay_ms = 0;
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("sync.reconnect_base_delay_ms"));
}

#[test]
fn catches_max_delay_below_base() {
    let mut config = CodepairConfig::default();
    config.sync.reconnect_base_delay_ms = 5_000;
    config.sync.reconnect_max_delay_ms = 1_000;
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("sync.reconnect_max_delay_ms"));
}

#[test]
fn catches_bad_ws_scheme() {
    let mut config = CodepairConfig::default();
    config.server.ws_base_url = "http://localhost:8000".into();
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("server.ws_base_url"));
}

#[test]
fn catches_unknown_log_level() {
    let mut config = CodepairConfig::default();
    config.logging.level = "loud".into();
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("logging.level"));
}

#[test]
fn catches_zero_expiration() {
    let mut config = CodepairConfig::default();
    config.session.expiration_hours = 0;
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("session.expiration_hours"));
}

#[test]
fn collects_multiple_errors() {
    let mut config = CodepairConfig::default();
    config.relay.port = 0;
    config.sync.max_reconnect_attempts = 1_000;
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("relay.port"));
    assert!(err.contains("sync.max_reconnect_attempts"));
    assert!(err.contains("; "));
}
