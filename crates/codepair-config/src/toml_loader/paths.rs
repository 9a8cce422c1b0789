//! Where the config file lives, and writing the commented default.

use std::path::{Path, PathBuf};

use codepair_common::ConfigError;

use super::template::default_config_toml;

/// Environment variable that points at an explicit config file.
pub const CONFIG_ENV: &str = "CODEPAIR_CONFIG";

/// `$CODEPAIR_CONFIG` if set, otherwise `<config dir>/codepair/config.toml`.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    if let Some(explicit) = std::env::var_os(CONFIG_ENV).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(explicit));
    }
    dirs::config_dir()
        .map(|base| base.join("codepair").join("config.toml"))
        .ok_or_else(|| ConfigError::ParseError("no platform config directory".into()))
}

/// Write the commented default config to `path`, creating parent dirs.
pub fn create_default_config(path: &Path) -> Result<(), ConfigError> {
    let io_failure = |what: &str, at: &Path, e: std::io::Error| {
        ConfigError::ParseError(format!("{what} {}: {e}", at.display()))
    };

    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| io_failure("cannot create", dir, e))?;
    }
    std::fs::write(path, default_config_toml()).map_err(|e| io_failure("cannot write", path, e))?;

    tracing::info!(path = %path.display(), "Wrote default codepair config");
    Ok(())
}
