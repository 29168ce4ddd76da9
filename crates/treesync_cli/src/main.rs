//! Treesync CLI
//!
//! Keeps directory replicas consistent across machines.
//!
//! # Commands
//!
//! - `serve` - Share a directory and relay changes between joining peers
//! - `join` - Mirror a served directory and stream local changes to it

use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use treesync_engine::{ClientConfig, SyncClient};
use treesync_server::{ServerConfig, SyncServer};

/// Near-real-time directory replication over TCP.
#[derive(Parser)]
#[command(name = "treesync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Share a directory and relay changes between joining peers
    Serve {
        /// Directory to share
        #[arg(short, long, default_value = "./shared")]
        root: PathBuf,

        /// Address to listen on
        #[arg(short, long, default_value = "127.0.0.1:9000")]
        bind: SocketAddr,

        /// Maximum concurrent peers
        #[arg(long, default_value_t = 64)]
        max_peers: usize,
    },

    /// Mirror a served directory and stream local changes to it
    Join {
        /// Local replica directory
        #[arg(short, long, default_value = "./local")]
        root: PathBuf,

        /// Address of the serving peer
        #[arg(short, long, default_value = "127.0.0.1:9000")]
        server: SocketAddr,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Serve {
            root,
            bind,
            max_peers,
        } => {
            let config = ServerConfig::new(bind, root).with_max_peers(max_peers);
            let server = SyncServer::bind(config).await?;
            tokio::select! {
                result = server.run() => result?,
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("shutting down");
                    server.shutdown();
                }
            }
        }
        Commands::Join { root, server } => {
            let client = SyncClient::new(ClientConfig::new(server, root));
            tokio::select! {
                result = client.run() => result?,
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("shutting down");
                }
            }
        }
    }

    Ok(())
}
