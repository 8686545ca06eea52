//! Consumption resolver
//!
//! A hole eats a consumable it overlaps once its radius reaches the
//! consumable's size threshold. Each consumable can be eaten exactly once:
//! the first consumer in resolution order (players by join order, then
//! consumables by spawn order) wins and everyone after it is rejected.

use smallvec::SmallVec;

use crate::game::events::{EffectEvent, EffectQueue};
use crate::game::state::{Consumable, EntityId, GameState, PeerId, PlayerId, PlayerState};
use crate::game::systems::spawner::SpawnState;
use crate::net::runtime::EntityRuntime;
use crate::util::vec2::Vec2;

/// Why a consumption attempt did nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeRejection {
    NotPlaying,
    UnknownPlayer,
    UnknownConsumable,
    /// The local peer does not own the consumable
    NoAuthority,
    AlreadyConsumed,
    /// Hole radius below the size threshold
    TooSmall,
}

/// A completed consumption
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Consumption {
    pub player_id: PlayerId,
    pub entity_id: EntityId,
    pub position: Vec2,
    pub score_value: u32,
    /// Area actually added (may be less than the growth value at the cap)
    pub area_gained: f32,
}

/// Trigger contract: the consumable's center lies inside the hole
#[inline]
pub fn overlaps(player: &PlayerState, consumable: &Consumable) -> bool {
    let radius = player.collision_radius();
    player.position.distance_sq_to(consumable.position) <= radius * radius
}

/// Run the consumption transaction for one (player, consumable) pair.
///
/// On success the consumable is flagged, the player's score and area grow,
/// the scheduler's population drops and an effect is queued. The entity
/// stays in the state until [`resolve_overlaps`] (or the caller) removes it.
pub fn try_consume(
    state: &mut GameState,
    player_id: PlayerId,
    entity_id: EntityId,
    authority: PeerId,
    max_area: f32,
    spawner: &mut SpawnState,
    effects: &mut EffectQueue,
) -> Result<Consumption, ConsumeRejection> {
    if !state.match_state.phase.is_playing() {
        return Err(ConsumeRejection::NotPlaying);
    }

    let radius = state
        .get_player(player_id)
        .ok_or(ConsumeRejection::UnknownPlayer)?
        .hole_radius();

    let consumable = state
        .consumables
        .iter_mut()
        .find(|c| c.id == entity_id)
        .ok_or(ConsumeRejection::UnknownConsumable)?;

    if !consumable.ownership.has_state_authority(authority) {
        return Err(ConsumeRejection::NoAuthority);
    }
    if consumable.is_consumed() {
        return Err(ConsumeRejection::AlreadyConsumed);
    }
    if !consumable.can_be_consumed_by(radius) {
        return Err(ConsumeRejection::TooSmall);
    }
    if !consumable.mark_consumed() {
        return Err(ConsumeRejection::AlreadyConsumed);
    }

    let position = consumable.position;
    let score_value = consumable.score_value;
    let growth_value = consumable.growth_value;

    let player = state
        .get_player_mut(player_id)
        .ok_or(ConsumeRejection::UnknownPlayer)?;
    player.add_score(score_value);
    let area_gained = player.grow(growth_value, max_area);

    spawner.on_object_consumed();
    effects.push(EffectEvent::ObjectConsumed {
        position,
        intensity: growth_value,
    });

    tracing::debug!(
        "Player {} consumed #{} (+{} score, radius {:.2})",
        player_id,
        entity_id,
        score_value,
        player.hole_radius()
    );

    Ok(Consumption {
        player_id,
        entity_id,
        position,
        score_value,
        area_gained,
    })
}

/// Resolve every overlap for this tick, then remove and despawn what was
/// eaten. Returns the consumptions in resolution order.
pub fn resolve_overlaps(
    state: &mut GameState,
    authority: PeerId,
    max_area: f32,
    spawner: &mut SpawnState,
    effects: &mut EffectQueue,
    runtime: &mut dyn EntityRuntime,
) -> SmallVec<[Consumption; 8]> {
    let mut consumed = SmallVec::new();
    if !state.match_state.phase.is_playing() {
        return consumed;
    }

    for i in 0..state.player_order().len() {
        let player_id = state.player_order()[i];

        for j in 0..state.consumables.len() {
            let candidate = {
                let Some(player) = state.get_player(player_id) else {
                    break;
                };
                let consumable = &state.consumables[j];
                overlaps(player, consumable) && consumable.can_be_consumed_by(player.hole_radius())
            };
            if !candidate {
                continue;
            }

            let entity_id = state.consumables[j].id;
            // Rejections are expected here (lost race, no authority) and ignored
            if let Ok(c) = try_consume(state, player_id, entity_id, authority, max_area, spawner, effects) {
                consumed.push(c);
            }
        }
    }

    for id in state.remove_consumed() {
        runtime.despawn(id);
    }

    consumed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SpawnConfig;
    use crate::game::constants::radius_to_area;
    use crate::game::state::{ConsumableTemplate, ConsumableTier, MatchPhase, Ownership};
    use crate::net::runtime::LocalRuntime;
    use uuid::Uuid;

    const MAX_AREA: f32 = 314.159_27;

    fn host() -> PeerId {
        Uuid::from_u128(1)
    }

    struct Fixture {
        state: GameState,
        spawner: SpawnState,
        effects: EffectQueue,
        runtime: LocalRuntime,
    }

    impl Fixture {
        fn new() -> Self {
            let mut state = GameState::new();
            state.match_state.phase = MatchPhase::Playing;
            Self {
                state,
                spawner: SpawnState::new(&SpawnConfig {
                    rng_seed: Some(1),
                    ..SpawnConfig::default()
                }),
                effects: EffectQueue::new(),
                runtime: LocalRuntime::new(64),
            }
        }

        fn add_player(&mut self, radius: f32, position: Vec2) -> PlayerId {
            let id = Uuid::new_v4();
            let index = self.state.next_spawn_index();
            self.state.add_player(PlayerState::new(
                id,
                "Eater",
                Ownership::avatar(host(), id),
                position,
                radius_to_area(radius),
                index,
            ));
            id
        }

        fn add_consumable(&mut self, threshold: f32, score: u32, growth: f32, position: Vec2) -> EntityId {
            let template = ConsumableTemplate::new("Crate", ConsumableTier::Medium, threshold, score, growth);
            let id = self.runtime.spawn_consumable(&template, position).unwrap();
            self.state.add_consumable(Consumable::new(
                id,
                &template,
                position,
                10.0,
                Ownership::authority_only(host()),
            ));
            id
        }

        fn resolve(&mut self) -> SmallVec<[Consumption; 8]> {
            resolve_overlaps(
                &mut self.state,
                host(),
                MAX_AREA,
                &mut self.spawner,
                &mut self.effects,
                &mut self.runtime,
            )
        }
    }

    #[test]
    fn test_too_small_never_consumes() {
        let mut f = Fixture::new();
        let player = f.add_player(2.0, Vec2::ZERO);
        let entity = f.add_consumable(3.0, 10, 0.5, Vec2::new(0.5, 0.0));

        assert!(f.resolve().is_empty());
        let c = f.state.get_consumable(entity).unwrap();
        assert!(!c.is_consumed());
        assert_eq!(f.state.get_player(player).unwrap().score(), 0);

        assert_eq!(
            try_consume(&mut f.state, player, entity, host(), MAX_AREA, &mut f.spawner, &mut f.effects),
            Err(ConsumeRejection::TooSmall)
        );
        assert!(f.effects.is_empty());
    }

    #[test]
    fn test_consume_transaction() {
        let mut f = Fixture::new();
        let player = f.add_player(4.0, Vec2::ZERO);
        let entity = f.add_consumable(3.0, 10, 0.5, Vec2::new(1.0, 1.0));
        let area_before = f.state.get_player(player).unwrap().hole_area();

        let result = f.resolve();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].entity_id, entity);

        let p = f.state.get_player(player).unwrap();
        assert_eq!(p.score(), 10);
        assert!((p.hole_area() - (area_before + 0.5)).abs() < 1e-4);
        assert!(f.state.get_consumable(entity).is_none());
        assert!(!f.runtime.is_live(entity));

        let effects = f.effects.drain();
        assert_eq!(effects.len(), 1);
        assert_eq!(
            effects[0],
            EffectEvent::ObjectConsumed {
                position: Vec2::new(1.0, 1.0),
                intensity: 0.5
            }
        );
    }

    #[test]
    fn test_growth_clamped_at_max_area() {
        let mut f = Fixture::new();
        let player = f.add_player(9.99, Vec2::ZERO);
        f.add_consumable(1.0, 1, 50.0, Vec2::ZERO);
        let result = f.resolve();
        assert_eq!(f.state.get_player(player).unwrap().hole_area(), MAX_AREA);
        assert!(result[0].area_gained < 50.0);
    }

    #[test]
    fn test_two_consumers_one_winner() {
        let mut f = Fixture::new();
        let first = f.add_player(4.0, Vec2::new(-0.5, 0.0));
        let second = f.add_player(4.0, Vec2::new(0.5, 0.0));
        let entity = f.add_consumable(1.0, 10, 0.5, Vec2::ZERO);

        let result = f.resolve();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].player_id, first);
        assert_eq!(f.state.get_player(first).unwrap().score(), 10);
        assert_eq!(f.state.get_player(second).unwrap().score(), 0);
        assert_eq!(f.effects.len(), 1);
        assert!(f.state.get_consumable(entity).is_none());
    }

    #[test]
    fn test_second_direct_attempt_rejected() {
        let mut f = Fixture::new();
        let a = f.add_player(4.0, Vec2::ZERO);
        let b = f.add_player(4.0, Vec2::ZERO);
        let entity = f.add_consumable(1.0, 10, 0.5, Vec2::ZERO);

        assert!(try_consume(&mut f.state, a, entity, host(), MAX_AREA, &mut f.spawner, &mut f.effects).is_ok());
        assert_eq!(
            try_consume(&mut f.state, b, entity, host(), MAX_AREA, &mut f.spawner, &mut f.effects),
            Err(ConsumeRejection::AlreadyConsumed)
        );
        assert_eq!(f.state.get_player(b).unwrap().score(), 0);
    }

    #[test]
    fn test_no_overlap_no_consume() {
        let mut f = Fixture::new();
        f.add_player(1.0, Vec2::ZERO);
        let entity = f.add_consumable(0.1, 1, 0.1, Vec2::new(5.0, 0.0));
        assert!(f.resolve().is_empty());
        assert!(f.state.get_consumable(entity).is_some());
    }

    #[test]
    fn test_overlap_boundary_inclusive() {
        let mut f = Fixture::new();
        let player = f.add_player(2.0, Vec2::ZERO);
        let p = f.state.get_player(player).unwrap().clone();
        let template = ConsumableTemplate::new("Edge", ConsumableTier::Small, 0.1, 1, 0.1);
        let inside = Consumable::new(1, &template, Vec2::new(p.hole_radius() * 0.999, 0.0), 0.0, Ownership::authority_only(host()));
        let outside = Consumable::new(2, &template, Vec2::new(p.hole_radius() * 1.01, 0.0), 0.0, Ownership::authority_only(host()));
        assert!(overlaps(&p, &inside));
        assert!(!overlaps(&p, &outside));
    }

    #[test]
    fn test_not_playing_rejected() {
        let mut f = Fixture::new();
        let player = f.add_player(4.0, Vec2::ZERO);
        let entity = f.add_consumable(1.0, 10, 0.5, Vec2::ZERO);
        f.state.match_state.phase = MatchPhase::Ended;

        assert!(f.resolve().is_empty());
        assert_eq!(
            try_consume(&mut f.state, player, entity, host(), MAX_AREA, &mut f.spawner, &mut f.effects),
            Err(ConsumeRejection::NotPlaying)
        );
    }

    #[test]
    fn test_unknown_ids_rejected() {
        let mut f = Fixture::new();
        let player = f.add_player(4.0, Vec2::ZERO);
        assert_eq!(
            try_consume(&mut f.state, Uuid::new_v4(), 1, host(), MAX_AREA, &mut f.spawner, &mut f.effects),
            Err(ConsumeRejection::UnknownPlayer)
        );
        assert_eq!(
            try_consume(&mut f.state, player, 999, host(), MAX_AREA, &mut f.spawner, &mut f.effects),
            Err(ConsumeRejection::UnknownConsumable)
        );
    }

    #[test]
    fn test_observer_cannot_consume() {
        let mut f = Fixture::new();
        let player = f.add_player(4.0, Vec2::ZERO);
        let entity = f.add_consumable(1.0, 10, 0.5, Vec2::ZERO);
        let observer = Uuid::from_u128(2);
        assert_eq!(
            try_consume(&mut f.state, player, entity, observer, MAX_AREA, &mut f.spawner, &mut f.effects),
            Err(ConsumeRejection::NoAuthority)
        );
        assert!(!f.state.get_consumable(entity).unwrap().is_consumed());
    }

    #[test]
    fn test_growth_enables_larger_consumable_same_pass() {
        let mut f = Fixture::new();
        let player = f.add_player(1.0, Vec2::ZERO);
        // Eating the first pushes the radius past the second's threshold
        f.add_consumable(0.5, 1, 2.0, Vec2::ZERO);
        f.add_consumable(1.2, 5, 0.5, Vec2::new(0.2, 0.0));

        let result = f.resolve();
        assert_eq!(result.len(), 2);
        assert_eq!(f.state.get_player(player).unwrap().score(), 6);
        assert!(f.state.consumables.is_empty());
    }

    #[test]
    fn test_consumption_decrements_population() {
        let mut f = Fixture::new();
        f.add_player(4.0, Vec2::ZERO);
        f.add_consumable(1.0, 1, 0.1, Vec2::ZERO);
        // Nothing was spawned by the scheduler: population stays floored
        f.resolve();
        assert_eq!(f.spawner.population(), 0);
    }
}
