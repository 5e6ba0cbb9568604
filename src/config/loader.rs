//! Probe configuration file loading and parsing.

use std::path::Path;

use super::model::ProbeConfig;
use crate::error::ConfigError;

/// Strictly parses configuration text. Blank documents are rejected.
pub fn parse_str(content: &str) -> Result<ProbeConfig, ConfigError> {
    if content.trim().is_empty() {
        return Err(ConfigError::ParseFailed("EOF: empty document".to_string()));
    }

    serde_yaml::from_str(content).map_err(|e| ConfigError::ParseFailed(e.to_string()))
}

/// Loads the configuration file from disk and parses it.
pub async fn load_from_path(path: &Path) -> Result<ProbeConfig, ConfigError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    parse_str(&content)
}
