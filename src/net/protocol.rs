use serde::{Deserialize, Serialize};

use crate::game::events::StampedEffect;
use crate::game::state::{ConsumableTier, EntityId, GameState, MatchPhase, PlayerId};
use crate::util::vec2::Vec2;

/// Messages from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ClientMessage {
    /// Request to join the session with the given code
    JoinRequest { code: String, player_name: String },
    /// Steering input for a tick
    Input(MoveInput),
    /// Toggle lobby readiness
    SetReady { ready: bool },
    /// Host asks to start the countdown
    StartCountdown,
    /// Request to leave the game
    Leave,
    /// Ping for latency measurement
    Ping { timestamp: u64 },
}

/// Messages from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ServerMessage {
    /// Confirmation of joining with assigned player ID
    JoinAccepted {
        player_id: PlayerId,
        session_code: String,
        is_host: bool,
    },
    /// Join was rejected
    JoinRejected { reason: String },
    /// Full authoritative state
    Snapshot(GameSnapshot),
    /// Presentation-only effect
    Effect(StampedEffect),
    /// Pong response with server timestamp
    Pong {
        client_timestamp: u64,
        server_timestamp: u64,
    },
    /// Session closed under the player
    Kicked { reason: String },
}

/// Steering input for one tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MoveInput {
    /// Input sequence number; newer wins within a tick
    pub sequence: u64,
    /// Server tick this input is for
    pub tick: u64,
    /// Desired ground-plane direction, magnitude <= 1
    pub direction: Vec2,
}

impl MoveInput {
    pub fn new(sequence: u64, tick: u64, direction: Vec2) -> Self {
        Self {
            sequence,
            tick,
            direction,
        }
    }
}

/// Replicated match and entity state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub tick: u64,
    pub match_phase: MatchPhase,
    pub remaining_time: f32,
    pub players: Vec<PlayerSnapshot>,
    pub consumables: Vec<ConsumableSnapshot>,
}

impl GameSnapshot {
    pub fn from_game_state(state: &GameState) -> Self {
        Self {
            tick: state.tick,
            match_phase: state.match_state.phase,
            remaining_time: state.match_state.remaining_time,
            players: state.players_in_order().map(PlayerSnapshot::from_player).collect(),
            consumables: state
                .consumables
                .iter()
                .filter(|c| !c.is_consumed())
                .map(ConsumableSnapshot::from_consumable)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub id: PlayerId,
    pub name: String,
    pub position: Vec2,
    pub rotation: f32,
    pub hole_radius: f32,
    pub score: u64,
    pub ready: bool,
}

impl PlayerSnapshot {
    pub fn from_player(player: &crate::game::state::PlayerState) -> Self {
        Self {
            id: player.id,
            name: player.display_name.clone(),
            position: player.position,
            rotation: player.rotation,
            hole_radius: player.hole_radius(),
            score: player.score(),
            ready: player.ready,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumableSnapshot {
    pub id: EntityId,
    pub template: String,
    pub tier: ConsumableTier,
    pub position: Vec2,
    pub height: f32,
}

impl ConsumableSnapshot {
    pub fn from_consumable(consumable: &crate::game::state::Consumable) -> Self {
        Self {
            id: consumable.id,
            template: consumable.template.clone(),
            tier: consumable.tier,
            position: consumable.position,
            height: consumable.height,
        }
    }
}

/// Wire codec errors
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("encode error: {0}")]
    Encode(String),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Encode a message using bincode
/// Uses legacy config for fixed-size integers
pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>, CodecError> {
    bincode::serde::encode_to_vec(message, bincode::config::legacy()).map_err(|e| CodecError::Encode(e.to_string()))
}

/// Decode a message using bincode
pub fn decode<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T, CodecError> {
    bincode::serde::decode_from_slice(data, bincode::config::legacy())
        .map(|(msg, _)| msg)
        .map_err(|e| CodecError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::events::EffectEvent;
    use crate::game::state::{Consumable, ConsumableTemplate, Ownership, PlayerState};
    use uuid::Uuid;

    #[test]
    fn test_client_message_join() {
        let msg = ClientMessage::JoinRequest {
            code: "ABC234".to_string(),
            player_name: "Alice".to_string(),
        };
        let decoded: ClientMessage = decode(&encode(&msg).unwrap()).unwrap();
        match decoded {
            ClientMessage::JoinRequest { code, player_name } => {
                assert_eq!(code, "ABC234");
                assert_eq!(player_name, "Alice");
            }
            _ => panic!("Wrong message type"),
        }
    }

    #[test]
    fn test_client_message_input() {
        let msg = ClientMessage::Input(MoveInput::new(42, 100, Vec2::new(0.6, -0.8)));
        let decoded: ClientMessage = decode(&encode(&msg).unwrap()).unwrap();
        match decoded {
            ClientMessage::Input(input) => {
                assert_eq!(input.sequence, 42);
                assert_eq!(input.tick, 100);
                assert_eq!(input.direction, Vec2::new(0.6, -0.8));
            }
            _ => panic!("Wrong message type"),
        }
    }

    #[test]
    fn test_snapshot_from_state() {
        let mut state = GameState::new();
        state.tick = 77;
        state.match_state.phase = MatchPhase::Playing;
        state.match_state.remaining_time = 42.0;

        let host = Uuid::new_v4();
        let id = Uuid::new_v4();
        state.add_player(PlayerState::new(id, "Alice", Ownership::avatar(host, id), Vec2::new(1.0, 2.0), 12.566_371, 0));

        let template = ConsumableTemplate::new("Bench", ConsumableTier::Large, 1.1, 6, 0.8);
        state.add_consumable(Consumable::new(1, &template, Vec2::ZERO, 10.0, Ownership::authority_only(host)));
        state.add_consumable(Consumable::new(2, &template, Vec2::ONE, 10.0, Ownership::authority_only(host)));
        state.consumables[0].mark_consumed();

        let snapshot = GameSnapshot::from_game_state(&state);
        assert_eq!(snapshot.tick, 77);
        assert_eq!(snapshot.match_phase, MatchPhase::Playing);
        assert_eq!(snapshot.players.len(), 1);
        assert!((snapshot.players[0].hole_radius - 2.0).abs() < 1e-4);
        // Consumed entities are not replicated
        assert_eq!(snapshot.consumables.len(), 1);
        assert_eq!(snapshot.consumables[0].id, 2);

        let decoded: ServerMessage = decode(&encode(&ServerMessage::Snapshot(snapshot)).unwrap()).unwrap();
        match decoded {
            ServerMessage::Snapshot(s) => {
                assert_eq!(s.players[0].name, "Alice");
                assert_eq!(s.consumables[0].tier, ConsumableTier::Large);
                assert_eq!(s.remaining_time, 42.0);
            }
            _ => panic!("Wrong message type"),
        }
    }

    #[test]
    fn test_effect_message() {
        let msg = ServerMessage::Effect(StampedEffect {
            tick: 9,
            sequence: 2,
            effect: EffectEvent::ObjectConsumed {
                position: Vec2::new(3.0, 4.0),
                intensity: 0.5,
            },
        });
        match decode::<ServerMessage>(&encode(&msg).unwrap()).unwrap() {
            ServerMessage::Effect(e) => {
                assert_eq!(e.tick, 9);
                assert_eq!(e.sequence, 2);
                assert!(matches!(e.effect, EffectEvent::ObjectConsumed { intensity, .. } if intensity == 0.5));
            }
            _ => panic!("Wrong message type"),
        }
    }

    #[test]
    fn test_match_phase_encoding() {
        // Legacy config encodes unit variants as a u32 index
        assert_eq!(encode(&MatchPhase::Lobby).unwrap(), vec![0, 0, 0, 0]);
        assert_eq!(encode(&MatchPhase::Ended).unwrap(), vec![3, 0, 0, 0]);
    }

    #[test]
    fn test_invalid_decode() {
        let garbage = vec![0xFF, 0xFE, 0xFD];
        let result: Result<ClientMessage, _> = decode(&garbage);
        assert!(matches!(result, Err(CodecError::Decode(_))));
    }
}
