use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use skiff::registry::ServerRegistry;
use skiff::server::bind::{bind_with_fallback, DEFAULT_MAX_ATTEMPTS, DEFAULT_PORT};
use skiff::server::{self, AppState};

/// Local web UI for SFTP transfers between this machine and configured servers.
#[derive(Parser, Debug)]
#[command(name = "skiff", version, about)]
struct Args {
    /// Preferred HTTP port; the next ports are tried if it is taken
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1")]
    bind: String,

    /// How many consecutive ports to try before giving up
    #[arg(long, default_value_t = DEFAULT_MAX_ATTEMPTS)]
    max_attempts: u32,

    /// Server list file (default: ~/.skiff/servers.json)
    #[arg(long)]
    servers_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();

    let registry = match args.servers_file {
        Some(path) => ServerRegistry::with_path(path),
        None => ServerRegistry::new().context("could not determine home directory")?,
    };

    let listener = bind_with_fallback(&args.bind, args.port, args.max_attempts).await?;
    let addr = listener.local_addr()?;
    info!("listening on http://{}", addr);

    server::serve(listener, AppState::new(registry)).await?;
    Ok(())
}
