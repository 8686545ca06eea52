use hashbrown::HashMap;
use std::time::Instant;

use crate::config::GameConfig;
use crate::game::events::StampedEffect;
use crate::game::game_loop::{GameLoop, GameLoopEvent};
use crate::game::state::{GameState, MatchPhase, PeerId, PlayerId};
use crate::game::input_buffer::InputSender;
use crate::lobby::player::LobbyPlayer;
use crate::net::protocol::GameSnapshot;
use crate::net::session::{SessionCode, SessionMode};

/// One hosted session: its peers and its simulation
pub struct GameRoom {
    pub code: SessionCode,
    pub mode: SessionMode,
    pub max_players: usize,
    pub created_at: Instant,
    host: PeerId,
    players: HashMap<PeerId, LobbyPlayer>,
    game_loop: GameLoop,
    auto_start: bool,
}

impl GameRoom {
    /// Create a room with its host already attached. In `Host` mode the host
    /// gets an avatar; in `Server` mode it only holds authority.
    pub fn new(
        code: SessionCode,
        mode: SessionMode,
        host: LobbyPlayer,
        config: GameConfig,
        max_players: usize,
    ) -> Self {
        let auto_start = config.match_config.auto_start_when_ready;
        let mut game_loop = GameLoop::new(config, host.id);
        if host.has_avatar {
            game_loop.add_player(host.id, &host.name);
        }

        let host_id = host.id;
        let mut players = HashMap::new();
        players.insert(host_id, host);

        Self {
            code,
            mode,
            max_players,
            created_at: Instant::now(),
            host: host_id,
            players,
            game_loop,
            auto_start,
        }
    }

    pub fn host(&self) -> PeerId {
        self.host
    }

    pub fn phase(&self) -> MatchPhase {
        self.game_loop.phase()
    }

    /// Peers with an avatar that are still connected
    pub fn participant_count(&self) -> usize {
        self.players.values().filter(|p| p.is_participant()).count()
    }

    pub fn peer_count(&self) -> usize {
        self.players.len()
    }

    /// Peers whose transport is still up, the host included
    pub fn connected_count(&self) -> usize {
        self.players.values().filter(|p| p.is_connected()).count()
    }

    pub fn is_full(&self) -> bool {
        self.participant_count() >= self.max_players
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn game_state(&self) -> &GameState {
        self.game_loop.state()
    }

    pub fn game_loop(&self) -> &GameLoop {
        &self.game_loop
    }

    pub fn game_loop_mut(&mut self) -> &mut GameLoop {
        &mut self.game_loop
    }

    /// Attach a peer and spawn its avatar
    pub fn add_player(&mut self, lobby_player: LobbyPlayer) -> Result<PlayerId, RoomError> {
        if self.phase() == MatchPhase::Ended {
            return Err(RoomError::MatchOver);
        }
        if self.is_full() {
            return Err(RoomError::RoomFull);
        }

        let player_id = lobby_player.id;
        self.game_loop.add_player(player_id, &lobby_player.name);
        self.players.insert(player_id, lobby_player);
        Ok(player_id)
    }

    /// Detach a peer and destroy its avatar
    pub fn remove_player(&mut self, peer_id: PeerId) -> Option<LobbyPlayer> {
        let mut player = self.players.remove(&peer_id)?;
        player.leave();
        self.game_loop.remove_player(peer_id);
        Some(player)
    }

    /// Transport dropped without a leave; the avatar goes, the peer entry stays
    pub fn disconnect_player(&mut self, peer_id: PeerId) -> Result<(), RoomError> {
        let player = self.players.get_mut(&peer_id).ok_or(RoomError::PlayerNotFound)?;
        player.disconnect();
        self.game_loop.remove_player(peer_id);
        Ok(())
    }

    pub fn get_player(&self, peer_id: PeerId) -> Option<&LobbyPlayer> {
        self.players.get(&peer_id)
    }

    pub fn player_ids(&self) -> Vec<PeerId> {
        self.players.keys().copied().collect()
    }

    /// Set lobby readiness. Ok(false) when the match is past the lobby.
    pub fn set_ready(&mut self, peer_id: PeerId, ready: bool) -> Result<bool, RoomError> {
        if !self.players.contains_key(&peer_id) || self.game_loop.state().get_player(peer_id).is_none() {
            return Err(RoomError::PlayerNotFound);
        }
        let changed = self.game_loop.set_ready(peer_id, ready);
        if changed && self.auto_start && self.game_loop.all_ready() {
            tracing::info!("All players ready in {}, starting countdown", self.code);
            self.game_loop.request_start_countdown();
        }
        Ok(changed)
    }

    /// Host-only Lobby -> Countdown. Ok(false) outside the lobby.
    pub fn start_countdown(&mut self, requester: PeerId) -> Result<bool, RoomError> {
        if requester != self.host {
            return Err(RoomError::NotHost);
        }
        Ok(self.game_loop.request_start_countdown())
    }

    /// Steering input handle for connection tasks
    pub fn input_sender(&self) -> InputSender {
        self.game_loop.input_sender()
    }

    /// Advance the simulation by wall-clock `dt`
    pub fn update(&mut self, dt: f32) -> Vec<GameLoopEvent> {
        self.game_loop.update(dt)
    }

    /// Run a single tick (for testing or manual control)
    pub fn tick(&mut self) -> Vec<GameLoopEvent> {
        self.game_loop.tick()
    }

    pub fn drain_effects(&mut self) -> Vec<StampedEffect> {
        self.game_loop.drain_effects()
    }

    pub fn get_snapshot(&self) -> GameSnapshot {
        self.game_loop.snapshot()
    }

    pub fn age(&self) -> std::time::Duration {
        self.created_at.elapsed()
    }
}

/// Room errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    #[error("Session is full")]
    RoomFull,
    #[error("Match is already over")]
    MatchOver,
    #[error("Only the host can do that")]
    NotHost,
    #[error("Player not found")]
    PlayerNotFound,
}
