//! Survival Game Server - authoritative multiplayer simulation
//!
//! Entry point. Wires together:
//! - world generation from a logged seed
//! - the single-owner simulation loop
//! - WebSocket transport and the HTTP health and operator routes

mod app;
mod config;
mod game;
mod http;
mod util;
mod ws;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::app::AppState;
use crate::config::Config;
use crate::game::world::World;
use crate::game::{worldgen, GameHandle, GameServer};
use crate::http::build_router;
use crate::util::time::init_server_time;

/// Inbound events buffered ahead of the simulation loop
const INPUT_QUEUE_DEPTH: usize = 4096;

/// How long to wait for the simulation and socket writers to wind down
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;

    init_tracing(&config.log_level, config.log_json);
    init_server_time();

    info!("Starting Survival Game Server");
    info!("Server address: {}", config.server_addr);

    // World
    let seed = config.game.world_seed.unwrap_or_else(rand::random);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let resources = worldgen::generate(&config.game, &mut rng)?;
    info!(
        seed,
        resources = resources.len(),
        map_size = config.game.map_size,
        "World generated"
    );

    let world = World::new(Arc::new(config.game.clone()), resources, rng);
    let (server, game) = GameServer::new(world, INPUT_QUEUE_DEPTH);
    let simulation = tokio::spawn(server.run());

    let state = AppState::new(Arc::new(config.clone()), game.clone());
    let router = build_router(state);

    let addr: SocketAddr = config.server_addr;
    let listener = TcpListener::bind(addr).await?;

    info!("Server listening on {}", addr);
    info!("Health check: http://{}/health", addr);
    info!("WebSocket endpoint: ws://{}/ws", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal(game.clone()))
        .await?;

    // The loop ends once every handle is gone; open sockets may still hold one
    drop(game);
    if tokio::time::timeout(SHUTDOWN_GRACE, simulation).await.is_err() {
        warn!("Simulation still running after grace period");
    }
    info!("Server shutdown complete");
    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str, json: bool) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .init();
    }
}

/// Graceful shutdown signal handler. Returns only after every connected
/// player has been sent a disconnect.
async fn shutdown_signal(game: GameHandle) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        }
    }

    if !game.shutdown("server shutting down").await {
        warn!("Simulation stopped before players could be notified");
    }
}
