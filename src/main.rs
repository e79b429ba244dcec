//! Skyduel relay server
//!
//! This is the main entry point for the relay. It handles:
//! - WebSocket connections speaking the broadcast store protocol
//! - HTTP health and store inspection endpoints
//! - Headless bot sessions flying in the same world

use std::net::SocketAddr;

use rand::Rng;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use skyduel::app::AppState;
use skyduel::bot::BotPilot;
use skyduel::config::Config;
use skyduel::game::{GameSession, WorldHazards};
use skyduel::http::build_router;
use skyduel::util::time::{init_server_time, unix_millis};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    init_tracing(&config.log_level, config.log_json);

    // Initialize server time tracking
    init_server_time();

    info!("Starting Skyduel relay");
    info!("Server address: {}", config.server_addr);

    // Create application state
    let state = AppState::new(config.clone());

    // Every session in this process shares one world
    let world = WorldHazards::generate(config.world_seed, &config.tuning.world);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let bots = spawn_bots(&state, &config, &world, shutdown_rx);

    // Build router
    let router = build_router(state);

    // Start server
    let addr: SocketAddr = config.server_addr;
    let listener = TcpListener::bind(addr).await?;

    info!("Server listening on {}", addr);
    info!("Health check: http://{}/health", addr);
    info!("WebSocket endpoint: ws://{}/ws", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Let bots remove their pose records before exiting
    let _ = shutdown_tx.send(true);
    for bot in bots {
        if let Err(e) = bot.await {
            warn!(error = %e, "Bot task failed");
        }
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Start the configured number of headless sessions
fn spawn_bots(
    state: &AppState,
    config: &Config,
    world: &WorldHazards,
    shutdown: watch::Receiver<bool>,
) -> Vec<JoinHandle<()>> {
    let base_seed = config
        .bot_seed
        .unwrap_or_else(|| rand::thread_rng().gen());

    (0..config.bot_count)
        .map(|i| {
            let seed = base_seed.wrapping_add(i as u64);
            let session_id = format!("bot-{}", Uuid::new_v4().simple());
            info!(session_id = %session_id, seed, "Spawning bot");

            let session = GameSession::new(
                state.relay.clone(),
                session_id,
                &config.tuning,
                world.clone(),
                seed,
                unix_millis(),
            );
            tokio::spawn(session.run(BotPilot::new(seed), shutdown.clone()))
        })
        .collect()
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str, json: bool) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(|| tracing_subscriber::fmt::layer().with_target(true)))
        .init();
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install terminate handler");
                std::future::pending::<()>().await;
            }
        }
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
}
