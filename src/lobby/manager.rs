use hashbrown::HashMap;
use rand::rngs::StdRng;
use rand::SeedableRng;
use uuid::Uuid;

use crate::config::GameConfig;
use crate::game::constants::physics::DT;
use crate::game::events::StampedEffect;
use crate::game::game_loop::GameLoopEvent;
use crate::game::input_buffer::InputSender;
use crate::game::state::{MatchPhase, PeerId};
use crate::lobby::player::LobbyPlayer;
use crate::lobby::room::{GameRoom, RoomError};
use crate::net::session::{SessionCode, SessionMode, SessionTicket};

/// Session lifecycle errors; `Display` is the user-facing reason
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("Invalid join code")]
    InvalidCode,
    #[error("No session with that code")]
    SessionNotFound,
    #[error("Session is full")]
    SessionFull,
    #[error("Match is already over")]
    MatchOver,
    #[error("Server is hosting too many sessions")]
    TooManySessions,
    #[error("Already in a session")]
    AlreadyInSession,
    #[error("Not in a session")]
    NotInSession,
    #[error(transparent)]
    Room(#[from] RoomError),
}

/// What one session produced during `update_all`
#[derive(Debug)]
pub struct RoomUpdate {
    pub code: SessionCode,
    pub events: Vec<GameLoopEvent>,
    pub effects: Vec<StampedEffect>,
}

/// Owns every live session, keyed by join code
pub struct LobbyManager {
    rooms: HashMap<SessionCode, GameRoom>,
    peer_rooms: HashMap<PeerId, SessionCode>,
    max_sessions: usize,
    max_players_per_session: usize,
    game_config: GameConfig,
    /// Fixed step handed to every new room's loop
    tick_dt: f32,
    /// Sessions closed since the last `drain_closed`, with the reason peers see
    closed: Vec<(SessionCode, String)>,
    code_rng: StdRng,
}

impl LobbyManager {
    pub fn new(max_sessions: usize, max_players_per_session: usize, game_config: GameConfig) -> Self {
        Self {
            rooms: HashMap::new(),
            peer_rooms: HashMap::new(),
            max_sessions,
            max_players_per_session,
            game_config,
            tick_dt: DT,
            closed: Vec::new(),
            code_rng: StdRng::from_entropy(),
        }
    }

    /// Run rooms at `tick_dt` seconds per tick instead of the default rate
    pub fn with_tick_dt(mut self, tick_dt: f32) -> Self {
        self.tick_dt = tick_dt;
        self
    }

    pub fn tick_dt(&self) -> f32 {
        self.tick_dt
    }

    /// Host a new session and return the host's ticket
    pub fn start_session(&mut self, mode: SessionMode, host_name: &str) -> Result<SessionTicket, SessionError> {
        self.start_session_as(Uuid::new_v4(), mode, host_name)
    }

    /// Host a new session for a known peer
    pub fn start_session_as(
        &mut self,
        peer_id: PeerId,
        mode: SessionMode,
        host_name: &str,
    ) -> Result<SessionTicket, SessionError> {
        if self.peer_rooms.contains_key(&peer_id) {
            return Err(SessionError::AlreadyInSession);
        }
        if self.rooms.len() >= self.max_sessions {
            tracing::warn!("Refusing new session: {} sessions live", self.rooms.len());
            return Err(SessionError::TooManySessions);
        }

        let rooms = &self.rooms;
        let code = SessionCode::generate_unique(&mut self.code_rng, |c| rooms.contains_key(c));
        let playing = mode == SessionMode::Host;
        let host = LobbyPlayer::host(peer_id, host_name, playing);
        let mut room = GameRoom::new(
            code.clone(),
            mode,
            host,
            self.game_config.clone(),
            self.max_players_per_session,
        );
        room.game_loop_mut().set_tick_dt(self.tick_dt);

        self.rooms.insert(code.clone(), room);
        self.peer_rooms.insert(peer_id, code.clone());
        tracing::info!("Session {} started ({:?} mode)", code, mode);

        Ok(SessionTicket {
            code,
            peer_id,
            player_id: playing.then_some(peer_id),
            is_host: true,
        })
    }

    /// Join an existing session by code
    pub fn join_session(&mut self, code: &str, name: &str) -> Result<SessionTicket, SessionError> {
        self.join_session_as(Uuid::new_v4(), code, name)
    }

    /// Join an existing session for a known peer
    pub fn join_session_as(&mut self, peer_id: PeerId, code: &str, name: &str) -> Result<SessionTicket, SessionError> {
        if self.peer_rooms.contains_key(&peer_id) {
            return Err(SessionError::AlreadyInSession);
        }
        let code = SessionCode::parse(code).map_err(|_| SessionError::InvalidCode)?;
        let room = self.rooms.get_mut(&code).ok_or(SessionError::SessionNotFound)?;

        let player_id = room
            .add_player(LobbyPlayer::new(peer_id, name))
            .map_err(|e| {
                tracing::info!("Join to {} rejected: {}", code, e);
                match e {
                    RoomError::RoomFull => SessionError::SessionFull,
                    RoomError::MatchOver => SessionError::MatchOver,
                    other => other.into(),
                }
            })?;

        self.peer_rooms.insert(peer_id, code.clone());
        tracing::info!("Player {} joined session {}", player_id, code);

        Ok(SessionTicket {
            code,
            peer_id,
            player_id: Some(player_id),
            is_host: false,
        })
    }

    /// Leave the current session. The host leaving closes the session.
    pub fn leave_session(&mut self, peer_id: PeerId) -> Result<(), SessionError> {
        let code = self.peer_rooms.remove(&peer_id).ok_or(SessionError::NotInSession)?;
        let Some(room) = self.rooms.get_mut(&code) else {
            return Ok(());
        };

        if room.host() == peer_id {
            tracing::info!("Host left session {}, closing", code);
            self.close_with_reason(&code, "Host left the session");
            return Ok(());
        }

        room.remove_player(peer_id);
        tracing::info!("Player {} left session {}", peer_id, code);
        Ok(())
    }

    /// Transport dropped without a leave. The peer loses its session; a
    /// dropped host closes the session like a leave does.
    pub fn disconnect(&mut self, peer_id: PeerId) -> Result<(), SessionError> {
        let code = self.peer_rooms.remove(&peer_id).ok_or(SessionError::NotInSession)?;
        let Some(room) = self.rooms.get_mut(&code) else {
            return Ok(());
        };

        if room.host() == peer_id {
            tracing::info!("Host of session {} disconnected, closing", code);
            self.close_with_reason(&code, "Host disconnected");
            return Ok(());
        }

        room.disconnect_player(peer_id)?;
        tracing::info!("Player {} disconnected from session {}", peer_id, code);
        Ok(())
    }

    /// Remove a session and every peer mapped to it
    pub fn close_session(&mut self, code: &SessionCode) -> Option<GameRoom> {
        let room = self.rooms.remove(code)?;
        for peer_id in room.player_ids() {
            self.peer_rooms.remove(&peer_id);
        }
        Some(room)
    }

    fn close_with_reason(&mut self, code: &SessionCode, reason: &str) {
        if self.close_session(code).is_some() {
            self.closed.push((code.clone(), reason.to_string()));
        }
    }

    /// Sessions closed by the lobby itself since the last call
    pub fn drain_closed(&mut self) -> Vec<(SessionCode, String)> {
        std::mem::take(&mut self.closed)
    }

    fn room_of(&self, peer_id: PeerId) -> Result<&GameRoom, SessionError> {
        let code = self.peer_rooms.get(&peer_id).ok_or(SessionError::NotInSession)?;
        self.rooms.get(code).ok_or(SessionError::SessionNotFound)
    }

    fn room_of_mut(&mut self, peer_id: PeerId) -> Result<&mut GameRoom, SessionError> {
        let code = self.peer_rooms.get(&peer_id).ok_or(SessionError::NotInSession)?;
        self.rooms.get_mut(code).ok_or(SessionError::SessionNotFound)
    }

    pub fn set_ready(&mut self, peer_id: PeerId, ready: bool) -> Result<bool, SessionError> {
        Ok(self.room_of_mut(peer_id)?.set_ready(peer_id, ready)?)
    }

    pub fn start_countdown(&mut self, peer_id: PeerId) -> Result<bool, SessionError> {
        Ok(self.room_of_mut(peer_id)?.start_countdown(peer_id)?)
    }

    /// Input handle for a peer's connection task
    pub fn input_sender(&self, peer_id: PeerId) -> Result<InputSender, SessionError> {
        Ok(self.room_of(peer_id)?.input_sender())
    }

    pub fn get_room(&self, code: &SessionCode) -> Option<&GameRoom> {
        self.rooms.get(code)
    }

    pub fn get_room_mut(&mut self, code: &SessionCode) -> Option<&mut GameRoom> {
        self.rooms.get_mut(code)
    }

    pub fn rooms(&self) -> impl Iterator<Item = &GameRoom> {
        self.rooms.values()
    }

    pub fn session_of(&self, peer_id: PeerId) -> Option<&SessionCode> {
        self.peer_rooms.get(&peer_id)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Avatars across every session
    pub fn total_player_count(&self) -> usize {
        self.rooms.values().map(|r| r.game_state().player_count()).sum()
    }

    /// Advance every session by `dt` and collect what happened
    pub fn update_all(&mut self, dt: f32) -> Vec<RoomUpdate> {
        let mut updates = Vec::with_capacity(self.rooms.len());
        for (code, room) in self.rooms.iter_mut() {
            let events = room.update(dt);
            let effects = room.drain_effects();
            if !events.is_empty() || !effects.is_empty() {
                updates.push(RoomUpdate {
                    code: code.clone(),
                    events,
                    effects,
                });
            }
        }

        // Sessions nobody is connected to, or finished with no players left
        let abandoned: Vec<SessionCode> = self
            .rooms
            .iter()
            .filter(|(_, room)| {
                room.connected_count() == 0
                    || (room.phase() == MatchPhase::Ended && room.participant_count() == 0)
            })
            .map(|(code, _)| code.clone())
            .collect();
        for code in abandoned {
            tracing::info!("Session {} abandoned, removing", code);
            self.close_with_reason(&code, "Session closed");
        }

        updates
    }

    /// Shutdown all rooms
    pub async fn shutdown_all_rooms(&mut self) {
        for (code, room) in self.rooms.iter() {
            tracing::info!("Closing session {} ({} peers)", code, room.peer_count());
        }
        self.rooms.clear();
        self.peer_rooms.clear();
    }
}

impl Default for LobbyManager {
    fn default() -> Self {
        Self::new(100, crate::game::constants::game::MAX_PLAYERS, GameConfig::default())
    }
}
