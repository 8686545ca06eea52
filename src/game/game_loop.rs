//! Authoritative tick orchestration
//!
//! A `GameLoop` owns one session's state and every collaborator the tick
//! needs. One tick runs, in order: input drain, phase controller, movement
//! (join order), consumption (join order x spawn order), spawn scheduler,
//! tick counter.

use hashbrown::HashMap;

use crate::config::GameConfig;
use crate::game::constants::physics::DT;
use crate::game::events::{EffectQueue, StampedEffect};
use crate::game::input_buffer::{InputBuffer, InputSender};
use crate::game::match_result::{self, MatchResult};
use crate::game::state::{EntityId, GameState, MatchPhase, Ownership, PeerId, PlayerId, PlayerState};
use crate::game::systems::consumption::{self, Consumption};
use crate::game::systems::match_phase::{self, PhaseTransition};
use crate::game::systems::movement;
use crate::game::systems::spawner::{self, SpawnOutcome, SpawnState};
use crate::net::protocol::{GameSnapshot, MoveInput};
use crate::net::runtime::{EntityRuntime, LocalRuntime, SpawnError};
use crate::util::vec2::Vec2;

/// Most ticks `update` will run to catch up on one call
const MAX_CATCH_UP_TICKS: u32 = 5;

/// Something that happened during a tick, for logging and metrics
#[derive(Debug, Clone)]
pub enum GameLoopEvent {
    PhaseChanged(PhaseTransition),
    ObjectConsumed(Consumption),
    ObjectSpawned(EntityId),
    SpawnDeferred(SpawnError),
    MatchFinished(MatchResult),
}

/// One session's simulation
pub struct GameLoop {
    state: GameState,
    config: GameConfig,
    /// Local peer; the only peer allowed to mutate owned entities
    authority: PeerId,
    spawner: SpawnState,
    effects: EffectQueue,
    input_buffer: InputBuffer,
    /// Highest input sequence applied per player
    last_sequence: HashMap<PlayerId, u64>,
    runtime: Box<dyn EntityRuntime>,
    tick_dt: f32,
    accumulator: f32,
}

impl GameLoop {
    /// Create a loop with an in-process entity runtime
    pub fn new(config: GameConfig, authority: PeerId) -> Self {
        let runtime = Box::new(LocalRuntime::new(config.spawn.runtime_capacity));
        Self::with_runtime(config, authority, runtime)
    }

    pub fn with_runtime(config: GameConfig, authority: PeerId, runtime: Box<dyn EntityRuntime>) -> Self {
        Self {
            state: GameState::new(),
            spawner: SpawnState::new(&config.spawn),
            config,
            authority,
            effects: EffectQueue::new(),
            input_buffer: InputBuffer::default(),
            last_sequence: HashMap::new(),
            runtime,
            tick_dt: DT,
            accumulator: 0.0,
        }
    }

    /// Override the fixed step (seconds per tick)
    pub fn set_tick_dt(&mut self, dt: f32) {
        if dt > 0.0 && dt.is_finite() {
            self.tick_dt = dt;
        }
    }

    pub fn tick_dt(&self) -> f32 {
        self.tick_dt
    }

    pub fn authority(&self) -> PeerId {
        self.authority
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut GameState {
        &mut self.state
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn phase(&self) -> MatchPhase {
        self.state.match_state.phase
    }

    /// Live consumables credited to the spawn scheduler
    pub fn spawn_population(&self) -> usize {
        self.spawner.population()
    }

    /// Entities currently allocated by the runtime
    pub fn runtime_live_count(&self) -> usize {
        self.runtime.live_count()
    }

    /// Spawn an avatar for a participant. The avatar's input authority is
    /// the participant itself; its state authority is this loop's peer.
    pub fn add_player(&mut self, id: PlayerId, name: &str) -> &PlayerState {
        let spawn_index = self.state.next_spawn_index();
        let position = self.config.arena.spawn_point(spawn_index);
        let player = PlayerState::new(
            id,
            name,
            Ownership::avatar(self.authority, id),
            position,
            self.config.hole.initial_area(),
            spawn_index,
        );
        tracing::debug!("Spawned avatar for {} at ({:.1}, {:.1})", player.display_name, position.x, position.y);
        self.state.add_player(player);
        &self.state.players[&id]
    }

    /// Destroy a participant's avatar. Nothing else is rolled back.
    pub fn remove_player(&mut self, id: PlayerId) -> Option<PlayerState> {
        self.last_sequence.remove(&id);
        self.state.remove_player(id)
    }

    /// Set lobby readiness. Ignored outside the Lobby phase.
    pub fn set_ready(&mut self, id: PlayerId, ready: bool) -> bool {
        if self.phase() != MatchPhase::Lobby {
            return false;
        }
        match self.state.get_player_mut(id) {
            Some(player) => {
                player.ready = ready;
                true
            }
            None => false,
        }
    }

    /// True when at least one player is present and all are ready
    pub fn all_ready(&self) -> bool {
        self.state.player_count() > 0 && self.state.players.values().all(|p| p.ready)
    }

    /// Lobby -> Countdown. No-op (false) from any other phase.
    pub fn request_start_countdown(&mut self) -> bool {
        match_phase::request_start_countdown(&mut self.state.match_state, &self.config.match_config, &mut self.effects)
    }

    /// Queue input from a connection. False on backpressure.
    pub fn queue_input(&self, peer_id: PeerId, input: MoveInput) -> bool {
        self.input_buffer.try_submit(peer_id, input)
    }

    /// Sender handle for a connection task
    pub fn input_sender(&self) -> InputSender {
        self.input_buffer.sender()
    }

    /// Inputs waiting for the next tick
    pub fn pending_inputs(&self) -> usize {
        self.input_buffer.pending_count()
    }

    /// Newest valid input per player for this tick
    fn collect_inputs(&mut self) -> HashMap<PlayerId, Vec2> {
        let mut latest: HashMap<PlayerId, MoveInput> = HashMap::new();

        for msg in self.input_buffer.drain() {
            let Some(player) = self.state.get_player(msg.peer_id) else {
                continue;
            };
            if !player.ownership.accepts_input_from(msg.peer_id) {
                continue;
            }
            if let Some(&applied) = self.last_sequence.get(&player.id) {
                if msg.input.sequence <= applied {
                    continue;
                }
            }
            match latest.get(&player.id) {
                Some(existing) if existing.sequence >= msg.input.sequence => {}
                _ => {
                    latest.insert(player.id, msg.input);
                }
            }
        }

        latest
            .into_iter()
            .map(|(id, input)| {
                self.last_sequence.insert(id, input.sequence);
                (id, movement::sanitize_direction(input.direction))
            })
            .collect()
    }

    /// Run exactly one authoritative tick
    pub fn tick(&mut self) -> Vec<GameLoopEvent> {
        let mut events = Vec::new();
        let dt = self.tick_dt;

        let directions = self.collect_inputs();

        if let Some(transition) =
            match_phase::update(&mut self.state.match_state, &self.config.match_config, dt, &mut self.effects)
        {
            if transition == PhaseTransition::MatchStarted {
                movement::reset_velocities(&mut self.state);
            }
            events.push(GameLoopEvent::PhaseChanged(transition));
        }

        movement::update(
            &mut self.state,
            &directions,
            self.authority,
            &self.config.movement,
            self.config.arena.half_extents,
            dt,
        );

        let consumed = consumption::resolve_overlaps(
            &mut self.state,
            self.authority,
            self.config.hole.max_area(),
            &mut self.spawner,
            &mut self.effects,
            self.runtime.as_mut(),
        );
        events.extend(consumed.into_iter().map(GameLoopEvent::ObjectConsumed));

        match spawner::update(
            &mut self.spawner,
            &mut self.state,
            &self.config.spawn,
            self.runtime.as_mut(),
            self.authority,
            dt,
        ) {
            SpawnOutcome::Spawned(id) => events.push(GameLoopEvent::ObjectSpawned(id)),
            SpawnOutcome::Refused(e) => events.push(GameLoopEvent::SpawnDeferred(e)),
            SpawnOutcome::Idle | SpawnOutcome::AtCapacity | SpawnOutcome::NoTemplates => {}
        }

        self.state.tick += 1;

        if events
            .iter()
            .any(|e| matches!(e, GameLoopEvent::PhaseChanged(PhaseTransition::MatchEnded)))
        {
            let result = match_result::determine_result(&self.state);
            if let Some(name) = &result.winner_name {
                tracing::info!("Winner: {} ({} points)", name, result.rankings[0].score);
            } else {
                tracing::info!("Match ended without a single winner");
            }
            events.push(GameLoopEvent::MatchFinished(result));
        }

        events
    }

    /// Advance by wall-clock `dt`, running as many fixed ticks as fit
    pub fn update(&mut self, dt: f32) -> Vec<GameLoopEvent> {
        if !(dt > 0.0) {
            return Vec::new();
        }
        self.accumulator += dt;

        let mut events = Vec::new();
        let mut ticks = 0;
        while self.accumulator >= self.tick_dt && ticks < MAX_CATCH_UP_TICKS {
            events.extend(self.tick());
            self.accumulator -= self.tick_dt;
            ticks += 1;
        }
        // Drop backlog we could not catch up on
        if ticks == MAX_CATCH_UP_TICKS {
            self.accumulator = self.accumulator.min(self.tick_dt);
        }
        events
    }

    /// Effects queued since the last drain
    pub fn drain_effects(&mut self) -> Vec<StampedEffect> {
        self.effects.drain_stamped(self.state.tick)
    }

    /// Replicated view of the current state
    pub fn snapshot(&self) -> GameSnapshot {
        GameSnapshot::from_game_state(&self.state)
    }

    /// Final standings once the match has ended
    pub fn result(&self) -> Option<MatchResult> {
        match_result::final_result(&self.state)
    }
}
