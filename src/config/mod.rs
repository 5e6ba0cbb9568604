//! Probe configuration model, loading, and the shared live copy.

pub mod loader;
pub mod model;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::error::ConfigError;
pub use model::ProbeConfig;

/// The exporter's live configuration, swapped in place on reload.
pub type SharedConfig = Arc<RwLock<ProbeConfig>>;

/// Owns the configuration path and the live configuration loaded from it.
pub struct ConfigManager {
    config: SharedConfig,
    config_path: PathBuf,
}

impl ConfigManager {
    /// Creates a new ConfigManager by loading and parsing the config file.
    pub async fn new(config_path: &Path) -> Result<Self, ConfigError> {
        let config = loader::load_from_path(config_path).await?;

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            config_path: config_path.to_path_buf(),
        })
    }

    /// Returns a thread-safe reference to the current configuration.
    pub fn get_config(&self) -> SharedConfig {
        Arc::clone(&self.config)
    }

    /// Returns the path to the configuration file.
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }
}
