//! Warden - Authority Server
//!
//! Usage: `warden_server [config.ron]`

use std::path::PathBuf;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use warden_server::shutdown::{shutdown_channel, wait_for_signal};
use warden_server::{Server, ServerConfig};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    tracing::info!("Starting Warden authority server");

    let config = match std::env::args().nth(1).map(PathBuf::from) {
        Some(path) => match ServerConfig::load(&path) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!("{e}");
                std::process::exit(1);
            }
        },
        None => ServerConfig::default(),
    };

    let server = match Server::boot(config) {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("Boot failed: {e}");
            std::process::exit(1);
        }
    };

    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    let tick_loop = tokio::spawn(server.run(shutdown_rx));

    wait_for_signal().await;
    shutdown_tx.trigger();

    match tick_loop.await {
        Ok(Ok(())) => tracing::info!("Server stopped"),
        Ok(Err(e)) => {
            tracing::error!("Server stopped with error: {e}");
            std::process::exit(1);
        }
        Err(e) => {
            tracing::error!("Tick loop panicked: {e}");
            std::process::exit(1);
        }
    }
}
