use hashbrown::HashMap;

use crate::config::MovementConfig;
use crate::game::constants::movement::{INPUT_DEADZONE_SQ, ROTATION_MIN_SPEED_SQ};
use crate::game::state::{GameState, PeerId, PlayerId, PlayerState};
use crate::util::vec2::Vec2;

/// Clean up a raw input direction: non-finite becomes zero, anything longer
/// than 1 is renormalized to unit length.
pub fn sanitize_direction(direction: Vec2) -> Vec2 {
    if !direction.is_finite() {
        return Vec2::ZERO;
    }
    if direction.length_sq() > 1.0 {
        direction.normalize()
    } else {
        direction
    }
}

/// Wrap an angle into [-PI, PI]
fn wrap_angle(angle: f32) -> f32 {
    use std::f32::consts::{PI, TAU};
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    if wrapped < -PI {
        wrapped + TAU
    } else {
        wrapped
    }
}

/// Integrate one player for one tick
///
/// Velocity moves toward `direction * max_speed` at most `acceleration * dt`
/// (or toward zero at most `deceleration * dt` when there is no input), then
/// the position integrates and facing turns toward the direction of travel.
pub fn step_player(player: &mut PlayerState, direction: Vec2, config: &MovementConfig, arena_half_extents: Vec2, dt: f32) {
    let direction = sanitize_direction(direction);

    player.velocity = if direction.length_sq() > INPUT_DEADZONE_SQ {
        player
            .velocity
            .move_towards(direction * config.max_speed, config.acceleration * dt)
    } else {
        player.velocity.move_towards(Vec2::ZERO, config.deceleration * dt)
    };

    player.position = (player.position + player.velocity * dt).clamp_to_rect(arena_half_extents);

    if player.velocity.length_sq() > ROTATION_MIN_SPEED_SQ {
        let target = player.velocity.angle();
        let step = (config.rotation_speed * dt).min(1.0);
        let delta = wrap_angle(target - player.rotation);
        player.rotation = wrap_angle(player.rotation + delta * step);
    }
}

/// Move every player the local peer has authority over, in join order.
/// Players without an entry in `directions` get zero input.
pub fn update(
    state: &mut GameState,
    directions: &HashMap<PlayerId, Vec2>,
    authority: PeerId,
    config: &MovementConfig,
    arena_half_extents: Vec2,
    dt: f32,
) {
    if !state.match_state.phase.is_playing() {
        return;
    }

    for i in 0..state.player_order().len() {
        let id = state.player_order()[i];
        let Some(player) = state.get_player_mut(id) else {
            continue;
        };
        if !player.ownership.has_state_authority(authority) {
            continue;
        }
        let direction = directions.get(&id).copied().unwrap_or(Vec2::ZERO);
        step_player(player, direction, config, arena_half_extents, dt);
    }
}

/// Zero all velocities; applied when a match enters Playing
pub fn reset_velocities(state: &mut GameState) {
    for player in state.players.values_mut() {
        player.velocity = Vec2::ZERO;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::constants::physics::DT;
    use crate::game::state::{MatchPhase, Ownership};
    use uuid::Uuid;

    const ARENA: Vec2 = Vec2 { x: 40.0, y: 40.0 };

    fn host() -> PeerId {
        Uuid::from_u128(1)
    }

    fn config() -> MovementConfig {
        MovementConfig::default()
    }

    fn create_player(position: Vec2) -> PlayerState {
        let id = Uuid::new_v4();
        PlayerState::new(id, "Mover", Ownership::avatar(host(), id), position, 3.14, 0)
    }

    fn create_test_state(phase: MatchPhase) -> (GameState, PlayerId) {
        let mut state = GameState::new();
        state.match_state.phase = phase;
        let player = create_player(Vec2::ZERO);
        let id = player.id;
        state.add_player(player);
        (state, id)
    }

    #[test]
    fn test_sanitize_direction() {
        assert_eq!(sanitize_direction(Vec2::new(f32::NAN, 1.0)), Vec2::ZERO);
        assert_eq!(sanitize_direction(Vec2::new(f32::INFINITY, 0.0)), Vec2::ZERO);
        assert!((sanitize_direction(Vec2::new(3.0, 4.0)).length() - 1.0).abs() < 1e-5);
        assert_eq!(sanitize_direction(Vec2::new(0.3, 0.4)), Vec2::new(0.3, 0.4));
    }

    #[test]
    fn test_acceleration_is_rate_limited() {
        let cfg = config();
        let mut player = create_player(Vec2::ZERO);
        let mut prev = player.velocity;
        for _ in 0..120 {
            step_player(&mut player, Vec2::new(1.0, 0.0), &cfg, ARENA, DT);
            let change = (player.velocity - prev).length();
            assert!(change <= cfg.acceleration * DT + 1e-4);
            prev = player.velocity;
        }
        assert!(player.velocity.approx_eq(Vec2::new(cfg.max_speed, 0.0), 1e-3));
    }

    #[test]
    fn test_deceleration_is_rate_limited() {
        let cfg = config();
        let mut player = create_player(Vec2::ZERO);
        player.velocity = Vec2::new(0.0, cfg.max_speed);
        let mut prev = player.velocity;
        for _ in 0..60 {
            step_player(&mut player, Vec2::ZERO, &cfg, ARENA, DT);
            assert!((player.velocity - prev).length() <= cfg.deceleration * DT + 1e-4);
            prev = player.velocity;
        }
        assert_eq!(player.velocity, Vec2::ZERO);
    }

    #[test]
    fn test_oversized_input_capped_at_max_speed() {
        let cfg = config();
        let mut player = create_player(Vec2::ZERO);
        for _ in 0..300 {
            step_player(&mut player, Vec2::new(100.0, 100.0), &cfg, ARENA, DT);
        }
        assert!(player.velocity.length() <= cfg.max_speed + 1e-3);
    }

    #[test]
    fn test_position_integrates_velocity() {
        let cfg = config();
        let mut player = create_player(Vec2::new(1.0, 1.0));
        player.velocity = Vec2::new(cfg.max_speed, 0.0);
        step_player(&mut player, Vec2::new(1.0, 0.0), &cfg, ARENA, DT);
        assert!((player.position.x - (1.0 + cfg.max_speed * DT)).abs() < 1e-5);
        assert!((player.position.y - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_rotation_turns_toward_travel() {
        let cfg = config();
        let mut player = create_player(Vec2::ZERO);
        for _ in 0..240 {
            step_player(&mut player, Vec2::new(0.0, 1.0), &cfg, ARENA, DT);
        }
        assert!((player.rotation - std::f32::consts::FRAC_PI_2).abs() < 1e-2);
    }

    #[test]
    fn test_rotation_uses_shortest_arc() {
        let cfg = MovementConfig {
            rotation_speed: 30.0,
            ..config()
        };
        let mut player = create_player(Vec2::ZERO);
        player.rotation = 3.0;
        player.velocity = Vec2::from_angle(-3.0) * 2.0;
        step_player(&mut player, Vec2::from_angle(-3.0), &cfg, ARENA, DT);
        // Going the short way crosses PI instead of sweeping through zero
        assert!(player.rotation.abs() > 3.0);
    }

    #[test]
    fn test_no_rotation_when_still() {
        let cfg = config();
        let mut player = create_player(Vec2::ZERO);
        player.rotation = 1.0;
        step_player(&mut player, Vec2::ZERO, &cfg, ARENA, DT);
        assert_eq!(player.rotation, 1.0);
    }

    #[test]
    fn test_arena_clamp() {
        let cfg = config();
        let mut player = create_player(Vec2::new(39.99, 0.0));
        player.velocity = Vec2::new(cfg.max_speed, 0.0);
        for _ in 0..60 {
            step_player(&mut player, Vec2::new(1.0, 0.0), &cfg, ARENA, DT);
        }
        assert_eq!(player.position.x, 40.0);
    }

    #[test]
    fn test_no_movement_outside_playing() {
        for phase in [MatchPhase::Lobby, MatchPhase::Countdown, MatchPhase::Ended] {
            let (mut state, id) = create_test_state(phase);
            state.get_player_mut(id).unwrap().velocity = Vec2::new(2.0, 0.0);
            let mut inputs = HashMap::new();
            inputs.insert(id, Vec2::new(1.0, 0.0));

            for _ in 0..30 {
                update(&mut state, &inputs, host(), &config(), ARENA, DT);
            }
            let player = state.get_player(id).unwrap();
            assert_eq!(player.position, Vec2::ZERO);
            assert_eq!(player.velocity, Vec2::new(2.0, 0.0));
        }
    }

    #[test]
    fn test_missing_input_means_zero() {
        let (mut state, id) = create_test_state(MatchPhase::Playing);
        state.get_player_mut(id).unwrap().velocity = Vec2::new(1.0, 0.0);
        update(&mut state, &HashMap::new(), host(), &config(), ARENA, DT);
        let v = state.get_player(id).unwrap().velocity;
        assert!(v.x < 1.0);
    }

    #[test]
    fn test_skips_players_without_authority() {
        let (mut state, id) = create_test_state(MatchPhase::Playing);
        let mut inputs = HashMap::new();
        inputs.insert(id, Vec2::new(1.0, 0.0));
        update(&mut state, &inputs, Uuid::from_u128(99), &config(), ARENA, DT);
        assert_eq!(state.get_player(id).unwrap().velocity, Vec2::ZERO);
    }

    #[test]
    fn test_reset_velocities() {
        let (mut state, id) = create_test_state(MatchPhase::Countdown);
        state.get_player_mut(id).unwrap().velocity = Vec2::new(3.0, -1.0);
        reset_velocities(&mut state);
        assert_eq!(state.get_player(id).unwrap().velocity, Vec2::ZERO);
    }

    #[test]
    fn test_wrap_angle() {
        use std::f32::consts::PI;
        assert!((wrap_angle(3.0 * PI) - PI).abs() < 1e-4 || (wrap_angle(3.0 * PI) + PI).abs() < 1e-4);
        assert!((wrap_angle(0.5) - 0.5).abs() < 1e-6);
        assert!((wrap_angle(-0.5 - 2.0 * PI) + 0.5).abs() < 1e-4);
    }
}
