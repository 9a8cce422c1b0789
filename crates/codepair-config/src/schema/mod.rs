//! Configuration schema types for codepair.
//!
//! All structs use `serde(default)` so partial configs work correctly.

mod logging;
mod relay;
mod server;
mod session;
mod sync;

pub use logging::*;
pub use relay::*;
pub use server::*;
pub use session::*;
pub use sync::*;

use serde::{Deserialize, Serialize};

/// Root configuration.
///
/// Only override what you want to change.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CodepairConfig {
    pub server: ServerConfig,
    pub sync: SyncConfig,
    pub session: SessionConfig,
    pub relay: RelayConfig,
    pub logging: LoggingConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_sync_contract() {
        let config = CodepairConfig::default();
        assert_eq!(config.sync.debounce_ms, 300);
        assert_eq!(config.sync.reconnect_base_delay_ms, 1000);
        assert_eq!(config.sync.reconnect_max_delay_ms, 30_000);
        assert_eq!(config.sync.max_reconnect_attempts, 5);
        assert_eq!(config.session.expiration_hours, 24);
    }

    #[test]
    fn expiration_converts_to_millis() {
        let session = SessionConfig {
            expiration_hours: 2,
        };
        assert_eq!(session.expiration_ms(), 7_200_000);
    }

    #[test]
    fn relay_bind_addr() {
        let relay = RelayConfig {
            host: "127.0.0.1".into(),
            port: 9000,
            ..RelayConfig::default()
        };
        assert_eq!(relay.bind_addr(), "127.0.0.1:9000");
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let config: CodepairConfig = toml::from_str("[sync]\ndebounce_ms = 150\n").unwrap();
        assert_eq!(config.sync.debounce_ms, 150);
        assert_eq!(config.sync.max_reconnect_attempts, 5);
        assert_eq!(config.server.ws_base_url, "ws://localhost:8000");
    }
}
