//! codepair-relay binary: load config, set up logging, serve.

use std::path::PathBuf;

use clap::Parser;
use codepair_common::CodepairError;
use codepair_config::{load_default, load_from_path, validation, CodepairConfig};
use codepair_relay::SessionHub;
use tokio::net::TcpListener;

#[derive(Parser)]
#[command(name = "codepair-relay", about = "WebSocket relay for live code sessions")]
struct Args {
    /// Port to listen on. Overrides the config file.
    #[arg(short, long)]
    port: Option<u16>,

    /// Interface to bind. Overrides the config file.
    #[arg(long)]
    host: Option<String>,

    /// Config file to use instead of the platform default.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn load(args: &Args) -> Result<CodepairConfig, CodepairError> {
    let mut config = match &args.config {
        Some(path) => load_from_path(path)?,
        None => load_default().unwrap_or_default(),
    };
    if let Some(port) = args.port {
        config.relay.port = port;
    }
    if let Some(host) = &args.host {
        config.relay.host = host.clone();
    }
    validation::validate(&config)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), CodepairError> {
    let args = Args::parse();
    let config = load(&args)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("codepair_relay={}", config.logging.level).into()),
        )
        .init();

    let addr = config.relay.bind_addr();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("codepair-relay listening on {}", addr);

    codepair_relay::serve(listener, SessionHub::new(), config.relay.channel_capacity).await;
    Ok(())
}
