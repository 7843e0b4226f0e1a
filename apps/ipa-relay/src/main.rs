//! appdb package relay entry point.

mod app;
mod config;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// Manage, serve and upload locally stored `.ipa` packages.
#[derive(Parser, Debug)]
#[command(name = "appdb-ipa-relay", version, about)]
struct Cli {
    /// Configuration file (defaults to the per-user relay.toml).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List stored packages, adopting any waiting in the inbox.
    List,
    /// Print the Info.plist of a package as base64-encoded JSON.
    Info {
        name: String,
        /// Print the decoded JSON instead.
        #[arg(long)]
        json: bool,
    },
    /// Rename a stored package.
    Rename { from: String, to: String },
    /// Delete a stored package.
    Delete { name: String },
    /// Serve the store on the loopback interface until Ctrl-C.
    Serve {
        /// Overrides the configured port.
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Upload a stored package. Ctrl-C cancels.
    Upload {
        name: String,
        /// Overrides the configured upload URL.
        #[arg(long)]
        url: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => config::Config::load_from(path)?,
        None => config::Config::load()?,
    };
    tracing::debug!(store_root = %config.store_root, "configuration loaded");

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(app::run(config, cli.command))
}
