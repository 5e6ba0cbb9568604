//! Error types for the probe sidecar.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::validation::ValidationErrors;

/// Configuration loading and parsing errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("error parsing config: {0}")]
    ParseFailed(String),
}

/// Failures of a single config update transaction.
#[derive(Error, Debug)]
pub enum SidecarError {
    #[error("{0}")]
    Validation(#[from] ValidationErrors),

    #[error("Read config file '{path}' failed: {source}")]
    ReadConfig {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Write config file '{path}' failed: {source}")]
    WriteConfig {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("sidecar failed to reload config: {0}")]
    Reload(#[from] ReloadError),
}

impl SidecarError {
    /// Returns true if the request itself was at fault.
    pub fn is_validation(&self) -> bool {
        matches!(self, SidecarError::Validation(_))
    }
}

/// Failures on either side of the reload handshake.
#[derive(Error, Debug)]
pub enum ReloadError {
    #[error("{0}")]
    Rejected(String),

    #[error("reload channel is closed")]
    ChannelClosed,

    #[error("reload consumer dropped the request without replying")]
    NoReply,

    #[error("no reload reply within {0:?}")]
    Timeout(Duration),

    #[error("config update was cancelled before the reload completed")]
    Cancelled,

    #[error(transparent)]
    Load(#[from] ConfigError),
}

/// HTTP server and metrics export errors.
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Failed to bind '{addr}': {source}")]
    BindFailed {
        addr: std::net::SocketAddr,
        source: std::io::Error,
    },

    #[error("Failed to accept connection: {0}")]
    AcceptFailed(std::io::Error),

    #[error("Prometheus metrics export failed: {0}")]
    PrometheusFailed(String),
}
