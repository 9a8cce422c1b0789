use serde::{Deserialize, Serialize};

/// Where the session API and the live-sync relay live.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Base URL of the session REST API.
    pub api_base_url: String,
    /// Base URL for WebSocket connections; the session path is appended.
    pub ws_base_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000".into(),
            ws_base_url: "ws://localhost:8000".into(),
        }
    }
}
