use serde::{Deserialize, Serialize};

/// Timing knobs for the live-sync engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Trailing-edge debounce window for code broadcasts.
    pub debounce_ms: u64,
    /// First reconnect delay; doubles on every scheduled retry.
    pub reconnect_base_delay_ms: u64,
    /// Upper bound for the reconnect delay.
    pub reconnect_max_delay_ms: u64,
    /// Scheduled retries before the connection is declared failed.
    pub max_reconnect_attempts: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 300,
            reconnect_base_delay_ms: 1000,
            reconnect_max_delay_ms: 30_000,
            max_reconnect_attempts: 5,
        }
    }
}
