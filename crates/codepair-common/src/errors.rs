use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("config parse error: {0}")]
    ParseError(String),

    #[error("config validation error: {0}")]
    ValidationError(String),
}

/// Failures of the live-sync layer.
///
/// None of these cross the coordinator boundary as a return value; they
/// are logged, turned into connection-state changes, or reported through
/// `is_supported()`.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("transport unavailable: {0}")]
    TransportUnavailable(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("malformed message: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("Session not found")]
    NotFound,

    #[error("Session has expired")]
    Expired,

    #[error("Participant not found")]
    ParticipantNotFound,

    #[error("invalid session id: {0}")]
    InvalidSessionId(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("storage error: {0}")]
    Storage(String),
}

#[derive(Debug, thiserror::Error)]
pub enum CodepairError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}
