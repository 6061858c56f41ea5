//! # peersync CLI Application
//!
//! Entry point for the peersync directory replication node.

use anyhow::Result;
use clap::Parser;
use colored::*;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use peersync::cli::{self, Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "peersync=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    if let Err(e) = match cli.command {
        Commands::Run {
            port,
            peers_file,
            sync_dir,
            tuning,
        } => cli::run_node(port, peers_file, sync_dir, tuning).await,
        Commands::Start { config } => cli::start_from_file(config).await,
        Commands::Peers { peers_file } => cli::show_peers(peers_file).await,
    } {
        eprintln!(
            "{} {}\n{}",
            "Error:".red().bold(),
            format!("{:#}", e).red(),
            "Tip: Run with --help for usage information.".yellow()
        );
        std::process::exit(1);
    }
    Ok(())
}
