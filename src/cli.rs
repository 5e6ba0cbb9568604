//! Command-line interface definitions.

use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Config update sidecar for probe exporters.
#[derive(Parser, Debug)]
#[command(name = "probe-sidecar", version, about, long_about = None)]
pub struct Cli {
    /// Path to the probe configuration file.
    #[arg(
        short,
        long,
        default_value = "/etc/blackbox_exporter/config.yml",
        env = "CONFIG_PATH",
        global = true
    )]
    pub config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Returns the log level based on verbosity flags.
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve the sidecar API and answer reload requests.
    Run(RunArgs),

    /// Validate the configuration file without starting.
    #[command(name = "config-validate")]
    ConfigValidate,

    /// Display the parsed configuration.
    #[command(name = "config-show")]
    ConfigShow,

    /// Submit a configuration file to a running sidecar.
    #[command(name = "config-push")]
    ConfigPush(PushArgs),
}

/// Arguments for the run subcommand.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Address the HTTP API listens on.
    #[arg(long, default_value = "0.0.0.0:9115", env = "SIDECAR_LISTEN")]
    pub listen: SocketAddr,

    /// Seconds to wait for a reload reply before rolling back (0 waits forever).
    #[arg(long, default_value = "30", env = "SIDECAR_RELOAD_TIMEOUT")]
    pub reload_timeout: u64,
}

impl RunArgs {
    /// The reload timeout, or `None` when unbounded.
    pub fn reload_timeout(&self) -> Option<Duration> {
        (self.reload_timeout > 0).then(|| Duration::from_secs(self.reload_timeout))
    }
}

/// Arguments for the config-push subcommand.
#[derive(Args, Debug)]
pub struct PushArgs {
    /// Base URL of the running sidecar.
    #[arg(long, default_value = "http://127.0.0.1:9115", env = "SIDECAR_URL")]
    pub url: String,

    /// Configuration file to submit.
    pub file: PathBuf,
}
