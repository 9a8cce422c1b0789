//! Reading a `CodepairConfig` from disk.

use std::path::Path;

use codepair_common::ConfigError;

use super::paths::{create_default_config, default_config_path};
use crate::schema::CodepairConfig;
use crate::validation;

/// Parse the TOML file at `path`. Absent sections and keys take their
/// defaults.
///
/// Validation problems are only logged here. The relay binary and other
/// strict callers run [`validation::validate`] on the result.
pub fn load_from_path(path: &Path) -> Result<CodepairConfig, ConfigError> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }
        Err(e) => {
            return Err(ConfigError::ParseError(format!("cannot read {}: {e}", path.display())));
        }
    };

    let config = toml::from_str::<CodepairConfig>(&text)
        .map_err(|e| ConfigError::ParseError(format!("{}: {e}", path.display())))?;

    if let Err(problem) = validation::validate(&config) {
        tracing::warn!(path = %path.display(), "{problem}");
    }
    tracing::debug!(path = %path.display(), "Loaded codepair config");
    Ok(config)
}

/// Load from [`default_config_path`]. A missing file is created with the
/// commented template and the defaults are returned.
pub fn load_default() -> Result<CodepairConfig, ConfigError> {
    let path = default_config_path()?;
    match load_from_path(&path) {
        Err(ConfigError::FileNotFound(_)) => {
            create_default_config(&path)?;
            Ok(CodepairConfig::default())
        }
        other => other,
    }
}
