//! codepair configuration system.
//!
//! TOML-based configuration with validation. All sections use sensible
//! defaults so partial configs work out of the box.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use codepair_config::{load_config, config_to_json};
//!
//! let config = load_config().expect("failed to load config");
//! println!("{}", config_to_json(&config));
//! ```

pub mod schema;
pub mod toml_loader;
pub mod validation;

pub use schema::{
    CodepairConfig, LoggingConfig, RelayConfig, ServerConfig, SessionConfig, SyncConfig,
};
pub use toml_loader::{load_default, load_from_path, CONFIG_ENV};

use codepair_common::ConfigError;

/// Load config from the platform default path and validate it strictly.
pub fn load_config() -> Result<CodepairConfig, ConfigError> {
    let config = toml_loader::load_default()?;
    validation::validate(&config)?;
    Ok(config)
}

/// Serialize a config to a pretty-printed JSON string.
pub fn config_to_json(config: &CodepairConfig) -> String {
    serde_json::to_string_pretty(config)
        .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize config: {e}\"}}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_to_json_contains_all_sections() {
        let json = config_to_json(&CodepairConfig::default());
        assert!(json.contains("\"server\""));
        assert!(json.contains("\"sync\""));
        assert!(json.contains("\"session\""));
        assert!(json.contains("\"relay\""));
        assert!(json.contains("\"logging\""));
    }

    #[test]
    fn default_config_round_trips_through_json() {
        let json = config_to_json(&CodepairConfig::default());
        let parsed: CodepairConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.sync.debounce_ms, 300);
        assert_eq!(parsed.relay.port, 8000);
    }
}
