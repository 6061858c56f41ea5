//! # Command Line Interface
//!
//! Argument parsing and process bootstrap for a peersync node.
//!
//! ## Commands
//!
//! - `run` - Start a node from a port, a peers file and a sync directory
//! - `start` - Start a node described by a TOML node file
//! - `peers` - Validate a peers file and list its entries
//!
//! A node runs until Ctrl+C. Socket bind and initial scan failures abort
//! startup with a non-zero exit.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::*;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;

use crate::config::{self, NodeConfig, NodeFile, SyncSettings};
use crate::sync::SyncNode;

/// Command-line interface structure for peersync.
#[derive(Parser)]
#[command(name = "peersync")]
#[command(about = "Keeps a directory in sync across a fixed set of peers over UDP")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a node from command-line arguments
    Run {
        /// UDP port to listen on
        #[arg(value_parser = clap::value_parser!(u16).range(1..))]
        port: u16,
        /// File listing peer addresses, one host:port per line
        peers_file: PathBuf,
        /// Directory to keep in sync
        sync_dir: PathBuf,
        #[command(flatten)]
        tuning: TuningArgs,
    },

    /// Run a node described by a TOML node file
    Start {
        /// Path to the node file
        config: PathBuf,
    },

    /// Validate a peers file and print its entries
    Peers {
        /// File listing peer addresses, one host:port per line
        peers_file: PathBuf,
    },
}

/// Runtime tuning shared by the `run` command.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct TuningArgs {
    /// Address to bind the UDP socket to
    #[arg(long, default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// Milliseconds between directory scans
    #[arg(long, default_value_t = 2000, value_parser = clap::value_parser!(u64).range(1..))]
    pub poll_interval_ms: u64,

    /// Milliseconds allowed for resolving and sending to one peer
    #[arg(long, default_value_t = 1000, value_parser = clap::value_parser!(u64).range(1..))]
    pub send_timeout_ms: u64,

    /// Also scan once filesystem activity settles
    #[arg(long)]
    pub watch: bool,

    /// Milliseconds without filesystem activity before a watch-triggered scan
    #[arg(long, default_value_t = 300, requires = "watch")]
    pub watch_debounce_ms: u64,
}

impl TuningArgs {
    pub fn settings(&self) -> SyncSettings {
        SyncSettings {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            send_timeout: Duration::from_millis(self.send_timeout_ms),
            bind_host: self.host,
            watch: self.watch,
            watch_debounce: Duration::from_millis(self.watch_debounce_ms),
        }
    }
}

/// Start a node from command-line arguments.
pub async fn run_node(port: u16, peers_file: PathBuf, sync_dir: PathBuf, tuning: TuningArgs) -> Result<()> {
    let port = config::validate_port(port)?;
    let peers = config::load_peers(&peers_file).await?;
    let settings = tuning.settings();
    let node_config = NodeConfig::new(settings.advertised_address(port), peers, sync_dir);

    serve(node_config, settings, port).await
}

/// Start a node from a TOML node file.
pub async fn start_from_file(path: PathBuf) -> Result<()> {
    let file = NodeFile::load(&path).await?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    let (node_config, settings, port) = file
        .resolve(base_dir)
        .await
        .with_context(|| format!("invalid node file {}", path.display()))?;

    serve(node_config, settings, port).await
}

/// Validate a peers file and list what it contains.
pub async fn show_peers(peers_file: PathBuf) -> Result<()> {
    let peers = config::load_peers(&peers_file).await?;

    println!("{} {} peer(s) in {}", "✅".green(), peers.len(), peers_file.display());
    for peer in &peers {
        println!("   {}", peer);
    }
    Ok(())
}

async fn serve(node_config: NodeConfig, settings: SyncSettings, port: u16) -> Result<()> {
    info!("Starting peersync node...");

    let node = SyncNode::bind(node_config, settings, port).await?;

    println!("🚀 Node started on port {}", port);
    println!("📂 Synced directory: {}", node.config().sync_dir().display());
    println!("🌐 Known peers: {:?}", node.config().peers());
    println!("💚 Running. Press Ctrl+C to stop.");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(node.run(shutdown_rx));

    tokio::signal::ctrl_c().await?;

    println!("\n🛑 Node stopping...");
    let _ = shutdown_tx.send(true);
    handle.await??;

    Ok(())
}
