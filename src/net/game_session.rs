//! Session boundary and server tick driver
//!
//! Peers reach the lobby through the functions here; `run` advances every
//! session on a fixed interval and publishes effects and snapshots to
//! whatever transport subscribes to the broadcast channel.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::{broadcast, watch, RwLock};
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::game::game_loop::GameLoopEvent;
use crate::game::state::PeerId;
use crate::lobby::manager::{LobbyManager, RoomUpdate, SessionError};
use crate::metrics::Metrics;
use crate::net::protocol::{encode, ClientMessage, ServerMessage};
use crate::net::session::{SessionCode, SessionMode, SessionTicket};

/// Encoded server message addressed to every peer of one session
#[derive(Debug, Clone)]
pub struct SessionBroadcast {
    pub code: SessionCode,
    pub payload: Arc<Vec<u8>>,
}

/// Host a new session
pub async fn start_session(
    lobby: &RwLock<LobbyManager>,
    mode: SessionMode,
    host_name: &str,
) -> Result<SessionTicket, SessionError> {
    lobby.write().await.start_session(mode, host_name)
}

/// Join a session by its code
pub async fn join_session(
    lobby: &RwLock<LobbyManager>,
    code: &str,
    player_name: &str,
) -> Result<SessionTicket, SessionError> {
    lobby.write().await.join_session(code, player_name)
}

/// Transport for `peer_id` went away without a `Leave`
pub async fn disconnect(lobby: &RwLock<LobbyManager>, peer_id: PeerId) -> Result<(), SessionError> {
    lobby.write().await.disconnect(peer_id)
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Apply one client message on behalf of `peer_id`; returns the direct reply, if any
pub async fn handle_client_message(
    lobby: &RwLock<LobbyManager>,
    peer_id: PeerId,
    message: ClientMessage,
) -> Option<ServerMessage> {
    match message {
        ClientMessage::JoinRequest { code, player_name } => {
            let result = lobby.write().await.join_session_as(peer_id, &code, &player_name);
            Some(match result {
                Ok(ticket) => ServerMessage::JoinAccepted {
                    player_id: ticket.peer_id,
                    session_code: ticket.code.to_string(),
                    is_host: ticket.is_host,
                },
                Err(e) => ServerMessage::JoinRejected { reason: e.to_string() },
            })
        }
        ClientMessage::Input(input) => {
            let sender = lobby.read().await.input_sender(peer_id);
            match sender {
                Ok(sender) => {
                    if let Err(e) = sender.try_send(peer_id, input) {
                        debug!("Dropping input from {}: {}", peer_id, e);
                    }
                }
                Err(e) => debug!("Dropping input from {}: {}", peer_id, e),
            }
            None
        }
        ClientMessage::SetReady { ready } => {
            if let Err(e) = lobby.write().await.set_ready(peer_id, ready) {
                debug!("Ready toggle from {} ignored: {}", peer_id, e);
            }
            None
        }
        ClientMessage::StartCountdown => {
            if let Err(e) = lobby.write().await.start_countdown(peer_id) {
                debug!("Countdown request from {} refused: {}", peer_id, e);
            }
            None
        }
        ClientMessage::Leave => {
            if let Err(e) = lobby.write().await.leave_session(peer_id) {
                debug!("Leave from {} ignored: {}", peer_id, e);
            }
            None
        }
        ClientMessage::Ping { timestamp } => Some(ServerMessage::Pong {
            client_timestamp: timestamp,
            server_timestamp: unix_millis(),
        }),
    }
}

fn publish(
    tx: &broadcast::Sender<SessionBroadcast>,
    metrics: &Metrics,
    code: &SessionCode,
    message: &ServerMessage,
) -> bool {
    let payload = match encode(message) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("Failed to encode message for {}: {}", code, e);
            return false;
        }
    };
    metrics.bytes_broadcast.fetch_add(payload.len() as u64, Ordering::Relaxed);
    // No subscribers is not an error; nobody is listening yet
    let _ = tx.send(SessionBroadcast {
        code: code.clone(),
        payload: Arc::new(payload),
    });
    true
}

fn record_events(update: &RoomUpdate, metrics: &Metrics) {
    for event in &update.events {
        match event {
            GameLoopEvent::ObjectConsumed(_) => {
                metrics.consumptions_total.fetch_add(1, Ordering::Relaxed);
            }
            GameLoopEvent::ObjectSpawned(_) => {
                metrics.spawns_total.fetch_add(1, Ordering::Relaxed);
            }
            GameLoopEvent::SpawnDeferred(e) => {
                debug!("Spawn deferred in {}: {}", update.code, e);
                metrics.spawn_failures_total.fetch_add(1, Ordering::Relaxed);
            }
            GameLoopEvent::MatchFinished(result) => {
                metrics.matches_finished.fetch_add(1, Ordering::Relaxed);
                info!(
                    "Session {} finished after {:.1}s, {} players, {} total points",
                    update.code,
                    result.match_duration,
                    result.rankings.len(),
                    result.total_score
                );
            }
            GameLoopEvent::PhaseChanged(_) => {}
        }
    }
}

/// One server step: advance every session, publish effects and (when
/// `send_snapshots`) a snapshot per session, refresh gauges.
pub async fn step(
    lobby: &RwLock<LobbyManager>,
    metrics: &Metrics,
    tx: &broadcast::Sender<SessionBroadcast>,
    dt: f32,
    send_snapshots: bool,
) {
    let mut lobby = lobby.write().await;
    let updates = lobby.update_all(dt);

    for update in &updates {
        record_events(update, metrics);
        for effect in &update.effects {
            if publish(tx, metrics, &update.code, &ServerMessage::Effect(*effect)) {
                metrics.effects_broadcast.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    for (code, reason) in lobby.drain_closed() {
        publish(tx, metrics, &code, &ServerMessage::Kicked { reason });
    }

    if send_snapshots {
        for room in lobby.rooms() {
            if publish(tx, metrics, &room.code, &ServerMessage::Snapshot(room.get_snapshot())) {
                metrics.snapshots_broadcast.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    let consumables = lobby
        .rooms()
        .map(|r| r.game_state().live_consumable_count())
        .sum();
    metrics.set_population(lobby.room_count(), lobby.total_player_count(), consumables);
}

/// Drive all sessions until `shutdown` flips to true
pub async fn run(
    lobby: Arc<RwLock<LobbyManager>>,
    config: ServerConfig,
    metrics: Arc<Metrics>,
    tx: broadcast::Sender<SessionBroadcast>,
    mut shutdown: watch::Receiver<bool>,
) {
    let tick_duration = Duration::from_secs_f32(config.tick_dt());
    let ticks_per_snapshot = config.ticks_per_snapshot();
    let mut ticker = interval(tick_duration);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut last_tick = Instant::now();
    let mut server_tick: u64 = 0;

    info!(
        "Session loop running at {} Hz, snapshots every {} ticks",
        config.tick_rate, ticks_per_snapshot
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let started = Instant::now();
                let dt = started.duration_since(last_tick).as_secs_f32();
                last_tick = started;
                server_tick += 1;

                let send_snapshots = server_tick % ticks_per_snapshot == 0;
                step(&lobby, &metrics, &tx, dt, send_snapshots).await;

                metrics.record_tick_time(started.elapsed());
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    info!("Session loop stopping after {} ticks", server_tick);
                    break;
                }
            }
        }
    }
}
