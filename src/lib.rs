//! Probe Sidecar - validated, rollback-safe config updates for probe exporters.
//!
//! This library accepts new probe configuration text, atomically replaces the
//! exporter's config file, signals a reload, and restores the previous file
//! when the reload is rejected.

pub mod cli;
pub mod config;
pub mod error;
pub mod metrics;
pub mod reload;
pub mod server;
pub mod sidecar;
pub mod validation;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::cli::{Cli, Commands, PushArgs, RunArgs};
use crate::config::ConfigManager;
use crate::metrics::Metrics;
use crate::reload::{ConfigReloadEvent, ReloadManager};
use crate::server::{ServerState, SidecarServer};
use crate::sidecar::SidecarService;

/// Runs the sidecar with the provided CLI arguments.
pub async fn run(cli: Cli) -> Result<()> {
    setup_logging(cli.log_level())?;

    match cli.command {
        Commands::Run(args) => run_sidecar(args, &cli.config).await,
        Commands::ConfigValidate => validate_config(&cli.config).await,
        Commands::ConfigShow => show_config(&cli.config).await,
        Commands::ConfigPush(args) => push_config(args).await,
    }
}

/// Initializes the tracing subscriber for structured logging.
fn setup_logging(level: &str) -> Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    fmt()
        .with_env_filter(filter)
        .json()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {}", e))?;

    Ok(())
}

/// Runs the reload consumer and HTTP API until shutdown.
async fn run_sidecar(args: RunArgs, config_path: &Path) -> Result<()> {
    info!(path = %config_path.display(), "Starting probe sidecar");

    let config_manager = ConfigManager::new(config_path)
        .await
        .context("Failed to load initial configuration")?;
    let config = config_manager.get_config();

    let metrics = Arc::new(Metrics::new()?);
    metrics
        .modules
        .set(config.read().await.modules.len() as f64);

    info!("Configuration loaded");

    // Reload consumer
    let (reload_tx, reload_rx) = sidecar::reload_channel(16);
    let (events_tx, mut events_rx) = mpsc::channel(16);
    let reload_manager = ReloadManager::new(
        config.clone(),
        config_manager.config_path(),
        metrics.clone(),
    )
    .with_events(events_tx);
    tokio::spawn(reload_manager.run(reload_rx));

    // Update coordinator
    let mut sidecar = SidecarService::new(config_manager.config_path(), metrics.clone());
    if let Some(timeout) = args.reload_timeout() {
        sidecar = sidecar.with_reload_timeout(timeout);
    }

    let state = Arc::new(ServerState {
        sidecar: Arc::new(sidecar),
        reload_tx: reload_tx.clone(),
        config,
        metrics,
    });

    let server = SidecarServer::new(state, args.listen);
    tokio::spawn(async move {
        if let Err(e) = server.start().await {
            error!(error = %e, "Sidecar HTTP server failed");
        }
    });
    info!(addr = %args.listen, "Sidecar API started");

    let mut hangup = Hangup::new().context("Failed to install SIGHUP handler")?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }

            _ = hangup.recv() => {
                info!("SIGHUP received, reloading configuration");
                let reload_tx = reload_tx.clone();
                tokio::spawn(async move {
                    if let Err(e) = sidecar::request_reload(&reload_tx).await {
                        warn!(error = %e, "Reload on SIGHUP failed");
                    }
                });
            }

            Some(event) = events_rx.recv() => {
                match event {
                    ConfigReloadEvent::Reloaded { modules } => {
                        info!(modules, "Configuration reloaded");
                    }
                    ConfigReloadEvent::Failed { error } => {
                        warn!(%error, "Configuration reload failed");
                    }
                }
            }
        }
    }

    info!("Shutting down probe sidecar");
    Ok(())
}

/// SIGHUP stream; never fires on platforms without it.
struct Hangup {
    #[cfg(unix)]
    inner: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl Hangup {
    fn new() -> std::io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};
        Ok(Self {
            inner: signal(SignalKind::hangup())?,
        })
    }

    async fn recv(&mut self) {
        self.inner.recv().await;
    }
}

#[cfg(not(unix))]
impl Hangup {
    fn new() -> std::io::Result<Self> {
        Ok(Self {})
    }

    async fn recv(&mut self) {
        std::future::pending::<()>().await
    }
}

/// Validates the configuration file and reports any issues.
async fn validate_config(config_path: &Path) -> Result<()> {
    let text = tokio::fs::read_to_string(config_path)
        .await
        .with_context(|| format!("Failed to read {}", config_path.display()))?;

    let errors = validation::validate(&text);
    println!("{}", validation::report::format_report(&errors));
    if !errors.is_empty() {
        anyhow::bail!(errors);
    }

    let config = validation::parse_config(&text)?;
    println!("Found {} module(s):", config.modules.len());
    for (name, module) in &config.modules {
        println!("  - {} (prober: {:?})", name, module.prober);
    }

    Ok(())
}

/// Displays the parsed configuration.
async fn show_config(config_path: &Path) -> Result<()> {
    let config = config::loader::load_from_path(config_path).await?;
    let yaml = serde_yaml::to_string(&config)?;
    println!("{}", yaml);
    Ok(())
}

/// Submits a configuration file to a running sidecar.
async fn push_config(args: PushArgs) -> Result<()> {
    let yaml = tokio::fs::read_to_string(&args.file)
        .await
        .with_context(|| format!("Failed to read {}", args.file.display()))?;

    let url = format!(
        "{}{}",
        args.url.trim_end_matches('/'),
        server::SIDECAR_CONFIG_PATH
    );
    let response = reqwest::Client::new()
        .put(&url)
        .json(&validation::UpdateConfigCmd::new(yaml))
        .send()
        .await
        .with_context(|| format!("Failed to reach sidecar at {}", url))?;

    let status = response.status();
    let body: serde_json::Value = response.json().await.unwrap_or_default();

    if status.is_success() {
        println!("Configuration updated and reloaded.");
        return Ok(());
    }

    if let Some(errors) = body.get("errors").and_then(|e| e.as_array()) {
        for error in errors {
            println!("ERROR {}", error.as_str().unwrap_or_default());
        }
    }
    if let Some(error) = body.get("error").and_then(|e| e.as_str()) {
        println!("ERROR {}", error);
    }
    anyhow::bail!("sidecar rejected the update ({})", status)
}
