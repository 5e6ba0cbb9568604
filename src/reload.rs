//! Reload consumer: re-reads the config file and swaps the live configuration.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::config::{loader, SharedConfig};
use crate::error::ReloadError;
use crate::metrics::Metrics;
use crate::sidecar::ReloadReceiver;

/// Events emitted by the reload manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigReloadEvent {
    /// Configuration was successfully reloaded.
    Reloaded { modules: usize },
    /// Configuration reload failed; the previous configuration stays live.
    Failed { error: String },
}

/// Answers reload requests by loading the config file into the live copy.
pub struct ReloadManager {
    config: SharedConfig,
    config_path: PathBuf,
    metrics: Arc<Metrics>,
    events_tx: Option<mpsc::Sender<ConfigReloadEvent>>,
}

impl ReloadManager {
    /// Creates a reload manager for `config_path`.
    pub fn new(config: SharedConfig, config_path: &Path, metrics: Arc<Metrics>) -> Self {
        Self {
            config,
            config_path: config_path.to_path_buf(),
            metrics,
            events_tx: None,
        }
    }

    /// Publishes reload outcomes on `events_tx`.
    pub fn with_events(mut self, events_tx: mpsc::Sender<ConfigReloadEvent>) -> Self {
        self.events_tx = Some(events_tx);
        self
    }

    /// Loads and strictly parses the file, then replaces the live configuration.
    pub async fn reload(&self) -> Result<(), ReloadError> {
        let result = loader::load_from_path(&self.config_path).await;

        let event = match result {
            Ok(new_config) => {
                let modules = new_config.modules.len();
                *self.config.write().await = new_config;
                self.metrics.record_reload(true, Some(modules));
                tracing::info!(modules, "Configuration reloaded successfully");
                Ok(ConfigReloadEvent::Reloaded { modules })
            }
            Err(e) => {
                self.metrics.record_reload(false, None);
                tracing::error!(error = %e, "Configuration reload failed");
                Err(e)
            }
        };

        if let Some(tx) = &self.events_tx {
            let notice = match &event {
                Ok(ev) => ev.clone(),
                Err(e) => ConfigReloadEvent::Failed {
                    error: e.to_string(),
                },
            };
            let _ = tx.send(notice).await;
        }

        event.map(|_| ()).map_err(ReloadError::from)
    }

    /// Serves reload requests one at a time until every sender is dropped.
    pub async fn run(self, mut rx: ReloadReceiver) {
        while let Some(reply_tx) = rx.recv().await {
            let result = self.reload().await;
            if reply_tx.send(result).is_err() {
                tracing::warn!("Reload requester went away before the reply");
            }
        }
        tracing::debug!("Reload channel closed");
    }
}
