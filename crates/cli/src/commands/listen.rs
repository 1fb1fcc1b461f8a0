//! `blockwright listen` — Serve an in-memory world on the command channel.

use blockwright_config::AppConfig;
use blockwright_world::{Dispatcher, SimulatedWorld};
use tokio::net::TcpListener;
use tracing::info;

pub async fn run(host: Option<String>, port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    if let Some(host) = host {
        config.world.host = host;
    }
    if let Some(port) = port {
        config.world.port = port;
    }

    let addr = config.world.address();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| format!("Failed to bind {addr}: {e}"))?;

    println!("🌍 Simulated world listening on {addr}");
    println!("   Press Ctrl+C to stop.\n");

    let world = SimulatedWorld::default();
    let mut dispatcher = Dispatcher::new(world.clone(), config.world.max_frame_bytes);
    tokio::select! {
        result = dispatcher.serve(listener) => result?,
        _ = tokio::signal::ctrl_c() => {
            info!(blocks = world.block_count(), "Shutting down");
        }
    }

    Ok(())
}
