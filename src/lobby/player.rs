use std::time::Instant;

use crate::game::state::{sanitize_name, PeerId};

/// Player connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerConnectionState {
    /// Connected and active
    Connected,
    /// Transport dropped; avatar already destroyed
    Disconnected,
    /// Left the session
    Left,
}

/// A peer attached to a session (the host included)
#[derive(Debug, Clone)]
pub struct LobbyPlayer {
    pub id: PeerId,
    pub name: String,
    pub connection_state: PlayerConnectionState,
    pub is_host: bool,
    /// False for a dedicated-server host, which has no avatar
    pub has_avatar: bool,
    pub joined_at: Instant,
}

impl LobbyPlayer {
    pub fn new(id: PeerId, name: &str) -> Self {
        Self {
            id,
            name: sanitize_name(name),
            connection_state: PlayerConnectionState::Connected,
            is_host: false,
            has_avatar: true,
            joined_at: Instant::now(),
        }
    }

    /// Host peer; `playing` is false for a dedicated server
    pub fn host(id: PeerId, name: &str, playing: bool) -> Self {
        Self {
            is_host: true,
            has_avatar: playing,
            ..Self::new(id, name)
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection_state == PlayerConnectionState::Connected
    }

    /// Counts against the session's player cap
    pub fn is_participant(&self) -> bool {
        self.has_avatar && self.is_connected()
    }

    pub fn disconnect(&mut self) {
        self.connection_state = PlayerConnectionState::Disconnected;
    }

    pub fn leave(&mut self) {
        self.connection_state = PlayerConnectionState::Left;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_player_new() {
        let id = Uuid::new_v4();
        let player = LobbyPlayer::new(id, "Test");
        assert_eq!(player.id, id);
        assert!(player.is_connected());
        assert!(player.is_participant());
        assert!(!player.is_host);
    }

    #[test]
    fn test_name_is_sanitized() {
        let player = LobbyPlayer::new(Uuid::new_v4(), "   A very long display name indeed   ");
        assert_eq!(player.name.chars().count(), 16);
        assert_eq!(LobbyPlayer::new(Uuid::new_v4(), "  ").name, "Player");
    }

    #[test]
    fn test_dedicated_host_not_participant() {
        let host = LobbyPlayer::host(Uuid::new_v4(), "Server", false);
        assert!(host.is_host);
        assert!(!host.is_participant());
        assert!(LobbyPlayer::host(Uuid::new_v4(), "Host", true).is_participant());
    }

    #[test]
    fn test_player_disconnect_and_leave() {
        let mut player = LobbyPlayer::new(Uuid::new_v4(), "Test");
        player.disconnect();
        assert!(!player.is_connected());
        assert!(!player.is_participant());
        player.leave();
        assert_eq!(player.connection_state, PlayerConnectionState::Left);
    }
}
