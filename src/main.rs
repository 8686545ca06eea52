use std::sync::Arc;
use tokio::sync::{broadcast, watch, RwLock};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use hole_arena_server::config::{GameConfig, ServerConfig};
use hole_arena_server::game::constants::net::BROADCAST_CAPACITY;
use hole_arena_server::lobby::manager::LobbyManager;
use hole_arena_server::metrics::{self, Metrics};
use hole_arena_server::net::game_session::{self, SessionBroadcast};
use hole_arena_server::net::session::SessionMode;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    info!("Hole Arena Server v{}", env!("CARGO_PKG_VERSION"));

    let config = ServerConfig::load_or_default();
    config.validate()?;
    let game_config = GameConfig::load_or_default();
    game_config.validate()?;
    info!(
        "Configuration loaded: {}:{}, max_sessions={}, max_players={}, tick_rate={}",
        config.bind_address, config.port, config.max_sessions, config.max_players_per_session, config.tick_rate
    );

    let metrics = Arc::new(Metrics::new());
    let metrics_clone = metrics.clone();
    let metrics_port = config.metrics_port;
    tokio::spawn(async move {
        if let Err(e) = metrics::start_metrics_server(metrics_clone, metrics_port).await {
            error!("Metrics server error: {}", e);
        }
    });

    let lobby = LobbyManager::new(config.max_sessions, config.max_players_per_session, game_config)
        .with_tick_dt(config.tick_dt());
    let lobby_manager = Arc::new(RwLock::new(lobby));

    if config.host_on_start {
        let ticket = game_session::start_session(&lobby_manager, SessionMode::Host, &config.host_name).await?;
        info!("Hosting session, join code: {}", ticket.code);
    }

    let (broadcast_tx, _) = broadcast::channel::<SessionBroadcast>(BROADCAST_CAPACITY);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let session_loop = tokio::spawn(game_session::run(
        lobby_manager.clone(),
        config.clone(),
        metrics.clone(),
        broadcast_tx,
        shutdown_rx,
    ));

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    shutdown_tx.send(true)?;
    if let Err(e) = session_loop.await {
        error!("Session loop failed: {}", e);
    }

    lobby_manager.write().await.shutdown_all_rooms().await;
    info!("Server stopped");

    Ok(())
}
