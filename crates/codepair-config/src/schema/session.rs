use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Lifetime of a session from creation.
    pub expiration_hours: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            expiration_hours: 24,
        }
    }
}

impl SessionConfig {
    pub fn expiration_ms(&self) -> i64 {
        i64::from(self.expiration_hours) * 60 * 60 * 1000
    }
}
