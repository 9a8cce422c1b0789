//! Full configuration validation.
//!
//! Each section has its own validator; this orchestrator calls them all
//! and collects errors into a single `ConfigError`.

mod helpers;

#[cfg(test)]
mod tests;

use crate::schema::{CodepairConfig, LOG_LEVELS};
use codepair_common::ConfigError;

use helpers::{validate_range, validate_scheme};

/// Run all validations on a config, collecting all errors.
pub fn validate(config: &CodepairConfig) -> Result<(), ConfigError> {
    let mut errors: Vec<String> = Vec::new();

    validate_server(&mut errors, config);
    validate_sync(&mut errors, config);
    validate_session(&mut errors, config);
    validate_relay(&mut errors, config);
    validate_logging(&mut errors, config);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(errors.join("; ")))
    }
}

fn validate_server(errors: &mut Vec<String>, config: &CodepairConfig) {
    validate_scheme(
        errors,
        "server.api_base_url",
        &config.server.api_base_url,
        &["http://", "https://"],
    );
    validate_scheme(
        errors,
        "server.ws_base_url",
        &config.server.ws_base_url,
        &["ws://", "wss://"],
    );
}

fn validate_sync(errors: &mut Vec<String>, config: &CodepairConfig) {
    let sync = &config.sync;
    validate_range(errors, "sync.debounce_ms", sync.debounce_ms, 0, 10_000);
    validate_range(
        errors,
        "sync.reconnect_base_delay_ms",
        sync.reconnect_base_delay_ms,
        1,
        60_000,
    );
    validate_range(
        errors,
        "sync.reconnect_max_delay_ms",
        sync.reconnect_max_delay_ms,
        sync.reconnect_base_delay_ms,
        600_000,
    );
    validate_range(
        errors,
        "sync.max_reconnect_attempts",
        u64::from(sync.max_reconnect_attempts),
        0,
        100,
    );
}

fn validate_session(errors: &mut Vec<String>, config: &CodepairConfig) {
    validate_range(
        errors,
        "session.expiration_hours",
        u64::from(config.session.expiration_hours),
        1,
        720,
    );
}

fn validate_relay(errors: &mut Vec<String>, config: &CodepairConfig) {
    validate_range(errors, "relay.port", u64::from(config.relay.port), 1, 65_535);
    validate_range(
        errors,
        "relay.channel_capacity",
        config.relay.channel_capacity as u64,
        1,
        65_536,
    );
}

fn validate_logging(errors: &mut Vec<String>, config: &CodepairConfig) {
    if !LOG_LEVELS.contains(&config.logging.level.as_str()) {
        errors.push(format!(
            "logging.level = {:?} must be one of {}",
            config.logging.level,
            LOG_LEVELS.join(", ")
        ));
    }
}
