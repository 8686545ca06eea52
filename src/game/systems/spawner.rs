//! Consumable spawn scheduler
//! Drops a random template at a random point of the spawn area every
//! interval while the match is playing, up to a population cap.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::SpawnConfig;
use crate::game::state::{Consumable, EntityId, GameState, Ownership, PeerId};
use crate::net::runtime::{EntityRuntime, SpawnError};
use crate::util::vec2::Vec2;

/// Result of one scheduler tick
#[derive(Debug, Clone, PartialEq)]
pub enum SpawnOutcome {
    /// Not playing, or the interval has not expired yet
    Idle,
    Spawned(EntityId),
    /// Interval expired with the population at its cap
    AtCapacity,
    /// Interval expired with nothing to spawn
    NoTemplates,
    /// The runtime refused; retried next interval
    Refused(SpawnError),
}

/// Scheduler state owned by one session
#[derive(Debug)]
pub struct SpawnState {
    population: usize,
    timer: f32,
    /// Set while the current Playing entry has been initialised
    active: bool,
    rng: StdRng,
}

impl SpawnState {
    pub fn new(config: &SpawnConfig) -> Self {
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            population: 0,
            timer: config.interval,
            active: false,
            rng,
        }
    }

    /// Live consumables credited to the scheduler
    #[inline]
    pub fn population(&self) -> usize {
        self.population
    }

    /// Seconds until the next spawn attempt
    #[inline]
    pub fn timer(&self) -> f32 {
        self.timer
    }

    /// Zero the population and rearm the interval
    pub fn reset(&mut self, config: &SpawnConfig) {
        self.population = 0;
        self.timer = config.interval;
    }

    /// Population bookkeeping for a consumption; never goes below zero
    pub fn on_object_consumed(&mut self) {
        self.population = self.population.saturating_sub(1);
    }

    fn random_position(&mut self, half_extents: Vec2) -> Vec2 {
        let hx = half_extents.x.max(0.0);
        let hy = half_extents.y.max(0.0);
        Vec2::new(self.rng.gen_range(-hx..=hx), self.rng.gen_range(-hy..=hy))
    }
}

/// Run the scheduler for one tick
pub fn update(
    spawner: &mut SpawnState,
    state: &mut GameState,
    config: &SpawnConfig,
    runtime: &mut dyn EntityRuntime,
    authority: PeerId,
    dt: f32,
) -> SpawnOutcome {
    if !state.match_state.phase.is_playing() {
        spawner.active = false;
        return SpawnOutcome::Idle;
    }

    if !spawner.active {
        spawner.reset(config);
        spawner.active = true;
    }

    spawner.timer -= dt.max(0.0);
    if spawner.timer > 0.0 {
        return SpawnOutcome::Idle;
    }
    spawner.timer = config.interval;

    if spawner.population >= config.max_population {
        return SpawnOutcome::AtCapacity;
    }
    if config.templates.is_empty() {
        return SpawnOutcome::NoTemplates;
    }

    let index = spawner.rng.gen_range(0..config.templates.len());
    let template = &config.templates[index];
    let position = spawner.random_position(config.area_half_extents);

    match runtime.spawn_consumable(template, position) {
        Ok(id) => {
            state.add_consumable(Consumable::new(
                id,
                template,
                position,
                config.height,
                Ownership::authority_only(authority),
            ));
            spawner.population += 1;
            tracing::debug!(
                "Spawned {} #{} at ({:.1}, {:.1}), population {}",
                template.name,
                id,
                position.x,
                position.y,
                spawner.population
            );
            SpawnOutcome::Spawned(id)
        }
        Err(e) => {
            tracing::debug!("Spawn of {} deferred: {}", template.name, e);
            SpawnOutcome::Refused(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::{ConsumableTemplate, ConsumableTier, MatchPhase};
    use crate::net::runtime::LocalRuntime;
    use uuid::Uuid;

    fn host() -> PeerId {
        Uuid::from_u128(1)
    }

    fn config() -> SpawnConfig {
        SpawnConfig {
            max_population: 3,
            interval: 1.0,
            area_half_extents: Vec2::new(20.0, 10.0),
            height: 10.0,
            templates: ConsumableTemplate::park_defaults(),
            rng_seed: Some(7),
            runtime_capacity: 64,
        }
    }

    fn playing_state() -> GameState {
        let mut state = GameState::new();
        state.match_state.phase = MatchPhase::Playing;
        state
    }

    /// Tick until the interval expires once
    fn run_interval(
        spawner: &mut SpawnState,
        state: &mut GameState,
        cfg: &SpawnConfig,
        runtime: &mut dyn EntityRuntime,
    ) -> SpawnOutcome {
        for _ in 0..1000 {
            let outcome = update(spawner, state, cfg, runtime, host(), 0.25);
            if outcome != SpawnOutcome::Idle {
                return outcome;
            }
        }
        SpawnOutcome::Idle
    }

    #[test]
    fn test_no_spawn_outside_playing() {
        let cfg = config();
        let mut spawner = SpawnState::new(&cfg);
        let mut runtime = LocalRuntime::new(64);
        for phase in [MatchPhase::Lobby, MatchPhase::Countdown, MatchPhase::Ended] {
            let mut state = GameState::new();
            state.match_state.phase = phase;
            for _ in 0..100 {
                assert_eq!(update(&mut spawner, &mut state, &cfg, &mut runtime, host(), 1.0), SpawnOutcome::Idle);
            }
            assert!(state.consumables.is_empty());
        }
    }

    #[test]
    fn test_spawns_on_interval() {
        let cfg = config();
        let mut spawner = SpawnState::new(&cfg);
        let mut state = playing_state();
        let mut runtime = LocalRuntime::new(64);

        // 1s interval at 0.25s ticks: the fourth tick spawns
        for _ in 0..3 {
            assert_eq!(update(&mut spawner, &mut state, &cfg, &mut runtime, host(), 0.25), SpawnOutcome::Idle);
        }
        assert!(matches!(
            update(&mut spawner, &mut state, &cfg, &mut runtime, host(), 0.25),
            SpawnOutcome::Spawned(_)
        ));
        assert_eq!(spawner.population(), 1);
        assert_eq!(state.consumables.len(), 1);
        assert_eq!(spawner.timer(), cfg.interval);

        let c = &state.consumables[0];
        assert!(c.position.x.abs() <= 20.0 && c.position.y.abs() <= 10.0);
        assert_eq!(c.height, 10.0);
        assert!(c.ownership.has_state_authority(host()));
        assert!(!c.is_consumed());
    }

    #[test]
    fn test_population_cap_respected() {
        let mut cfg = config();
        cfg.max_population = 50;
        let mut spawner = SpawnState::new(&cfg);
        let mut state = playing_state();
        let mut runtime = LocalRuntime::new(256);

        for _ in 0..50 {
            assert!(matches!(
                run_interval(&mut spawner, &mut state, &cfg, &mut runtime),
                SpawnOutcome::Spawned(_)
            ));
        }
        assert_eq!(spawner.population(), 50);

        assert_eq!(run_interval(&mut spawner, &mut state, &cfg, &mut runtime), SpawnOutcome::AtCapacity);
        assert_eq!(spawner.population(), 50);
        assert_eq!(state.consumables.len(), 50);
        assert_eq!(spawner.timer(), cfg.interval);
    }

    #[test]
    fn test_consumption_frees_a_slot() {
        let cfg = config();
        let mut spawner = SpawnState::new(&cfg);
        let mut state = playing_state();
        let mut runtime = LocalRuntime::new(64);
        for _ in 0..3 {
            run_interval(&mut spawner, &mut state, &cfg, &mut runtime);
        }
        assert_eq!(run_interval(&mut spawner, &mut state, &cfg, &mut runtime), SpawnOutcome::AtCapacity);

        spawner.on_object_consumed();
        assert_eq!(spawner.population(), 2);
        assert!(matches!(
            run_interval(&mut spawner, &mut state, &cfg, &mut runtime),
            SpawnOutcome::Spawned(_)
        ));
    }

    #[test]
    fn test_population_floor_at_zero() {
        let mut spawner = SpawnState::new(&config());
        spawner.on_object_consumed();
        spawner.on_object_consumed();
        assert_eq!(spawner.population(), 0);
    }

    #[test]
    fn test_refusal_does_not_count() {
        let cfg = config();
        let mut spawner = SpawnState::new(&cfg);
        let mut state = playing_state();
        let mut runtime = LocalRuntime::new(0);

        assert!(matches!(
            run_interval(&mut spawner, &mut state, &cfg, &mut runtime),
            SpawnOutcome::Refused(SpawnError::CapacityExceeded(0))
        ));
        assert_eq!(spawner.population(), 0);
        assert!(state.consumables.is_empty());
        assert_eq!(spawner.timer(), cfg.interval);
    }

    #[test]
    fn test_empty_templates_is_noop() {
        let mut cfg = config();
        cfg.templates.clear();
        let mut spawner = SpawnState::new(&cfg);
        let mut state = playing_state();
        let mut runtime = LocalRuntime::new(64);
        assert_eq!(run_interval(&mut spawner, &mut state, &cfg, &mut runtime), SpawnOutcome::NoTemplates);
        assert_eq!(spawner.population(), 0);
    }

    #[test]
    fn test_reset_once_per_playing_entry() {
        let cfg = config();
        let mut spawner = SpawnState::new(&cfg);
        let mut state = playing_state();
        let mut runtime = LocalRuntime::new(64);

        spawner.population = 2;
        spawner.timer = 0.1;

        // Entry: population and timer reset before this tick's countdown
        update(&mut spawner, &mut state, &cfg, &mut runtime, host(), 0.25);
        assert_eq!(spawner.population(), 0);
        assert!((spawner.timer() - 0.75).abs() < 1e-6);

        // Staying in Playing does not reset again
        update(&mut spawner, &mut state, &cfg, &mut runtime, host(), 0.25);
        assert!((spawner.timer() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_seeded_spawns_are_deterministic() {
        let cfg = config();
        let positions = |cfg: &SpawnConfig| {
            let mut spawner = SpawnState::new(cfg);
            let mut state = playing_state();
            let mut runtime = LocalRuntime::new(64);
            for _ in 0..3 {
                run_interval(&mut spawner, &mut state, cfg, &mut runtime);
            }
            state
                .consumables
                .iter()
                .map(|c| (c.template.clone(), c.position))
                .collect::<Vec<_>>()
        };
        assert_eq!(positions(&cfg), positions(&cfg));
    }

    #[test]
    fn test_single_template_always_chosen() {
        let mut cfg = config();
        cfg.templates = vec![ConsumableTemplate::new("Crate", ConsumableTier::Medium, 3.0, 10, 0.5)];
        let mut spawner = SpawnState::new(&cfg);
        let mut state = playing_state();
        let mut runtime = LocalRuntime::new(64);
        run_interval(&mut spawner, &mut state, &cfg, &mut runtime);
        assert_eq!(state.consumables[0].template, "Crate");
        assert_eq!(state.consumables[0].score_value, 10);
    }
}
