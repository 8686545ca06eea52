//! Game state definitions and structures
//!
//! Contains all entities (players, consumables) and the match state.
//! Fields that carry gameplay invariants (hole area, score, consumed flag)
//! are private and only change through their methods.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::constants::{area_to_radius, game};
use crate::util::vec2::Vec2;

/// Unique player identifier
pub type PlayerId = Uuid;

/// Network participant identifier (the host is a peer too)
pub type PeerId = Uuid;

/// Entity identifier for non-player entities
pub type EntityId = u64;

/// Who may mutate an entity, resolved once when the entity is created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ownership {
    /// The single peer allowed to write authoritative fields
    pub state_authority: PeerId,
    /// The peer whose input drives this entity, if any
    pub input_authority: Option<PeerId>,
}

impl Ownership {
    /// Entity simulated and driven by the session authority alone
    pub fn authority_only(authority: PeerId) -> Self {
        Self {
            state_authority: authority,
            input_authority: None,
        }
    }

    /// Player avatar: simulated by the authority, steered by its participant
    pub fn avatar(authority: PeerId, participant: PeerId) -> Self {
        Self {
            state_authority: authority,
            input_authority: Some(participant),
        }
    }

    #[inline]
    pub fn has_state_authority(&self, peer: PeerId) -> bool {
        self.state_authority == peer
    }

    #[inline]
    pub fn accepts_input_from(&self, peer: PeerId) -> bool {
        self.input_authority == Some(peer)
    }
}

/// Player state
///
/// `hole_area` is the only stored size; the radius is always derived from it
/// so growth stays area-additive regardless of consumption order.
#[derive(Debug, Clone)]
pub struct PlayerState {
    /// Player position on the ground plane
    pub position: Vec2,
    /// Smoothed velocity (never set straight from input)
    pub velocity: Vec2,
    /// Facing angle in radians
    pub rotation: f32,
    hole_area: f32,
    score: u64,
    /// Lobby readiness; ignored outside the Lobby phase
    pub ready: bool,
    pub id: PlayerId,
    pub display_name: String,
    pub ownership: Ownership,
    /// Join ordinal, used for spawn point selection
    pub spawn_index: usize,
}

impl PlayerState {
    pub fn new(
        id: PlayerId,
        display_name: &str,
        ownership: Ownership,
        position: Vec2,
        initial_area: f32,
        spawn_index: usize,
    ) -> Self {
        Self {
            position,
            velocity: Vec2::ZERO,
            rotation: 0.0,
            hole_area: initial_area.max(0.0),
            score: 0,
            ready: false,
            id,
            display_name: sanitize_name(display_name),
            ownership,
            spawn_index,
        }
    }

    #[inline]
    pub fn hole_area(&self) -> f32 {
        self.hole_area
    }

    /// Radius derived from area: sqrt(area / PI)
    #[inline]
    pub fn hole_radius(&self) -> f32 {
        area_to_radius(self.hole_area)
    }

    /// Radius of the trigger volume used for consumption overlap
    #[inline]
    pub fn collision_radius(&self) -> f32 {
        self.hole_radius()
    }

    #[inline]
    pub fn score(&self) -> u64 {
        self.score
    }

    /// Add area, clamped to `max_area`. Negative growth is ignored so the
    /// area never shrinks. Returns the area actually gained.
    pub fn grow(&mut self, growth: f32, max_area: f32) -> f32 {
        let before = self.hole_area;
        let target = (before + growth.max(0.0)).min(max_area);
        self.hole_area = target.max(before);
        self.hole_area - before
    }

    pub fn add_score(&mut self, points: u32) {
        self.score = self.score.saturating_add(points as u64);
    }

    /// Put the player back to spawn values for a fresh match
    pub fn reset_for_match(&mut self, position: Vec2, initial_area: f32) {
        self.position = position;
        self.velocity = Vec2::ZERO;
        self.rotation = 0.0;
        self.hole_area = initial_area.max(0.0);
        self.score = 0;
        self.ready = false;
    }
}

/// Trim and cap a display name; empty names become "Player"
pub fn sanitize_name(name: &str) -> String {
    let trimmed: String = name
        .trim()
        .chars()
        .filter(|c| !c.is_control())
        .take(game::MAX_NAME_LEN)
        .collect();
    if trimmed.is_empty() {
        "Player".to_string()
    } else {
        trimmed
    }
}

/// Consumable size categories
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ConsumableTier {
    Small,
    Medium,
    Large,
}

/// What a spawned consumable is worth and who can eat it
#[derive(Debug, Clone, PartialEq)]
pub struct ConsumableTemplate {
    pub name: String,
    pub tier: ConsumableTier,
    /// Minimum hole radius required to consume
    pub size_threshold: f32,
    /// Points awarded on consumption
    pub score_value: u32,
    /// Area added to the consumer's hole
    pub growth_value: f32,
}

impl ConsumableTemplate {
    pub fn new(name: &str, tier: ConsumableTier, size_threshold: f32, score_value: u32, growth_value: f32) -> Self {
        Self {
            name: name.to_string(),
            tier,
            size_threshold,
            score_value,
            growth_value,
        }
    }

    /// Park prop set, three per tier
    pub fn park_defaults() -> Vec<Self> {
        use ConsumableTier::*;
        vec![
            Self::new("Acorn", Small, 0.25, 1, 0.08),
            Self::new("Ball", Small, 0.28, 2, 0.10),
            Self::new("Bucket", Small, 0.35, 2, 0.14),
            Self::new("Bush", Medium, 0.55, 3, 0.30),
            Self::new("TrashBin", Medium, 0.75, 4, 0.50),
            Self::new("BirdHouse", Medium, 0.85, 4, 0.60),
            Self::new("Bench", Large, 1.10, 6, 0.80),
            Self::new("SwingSet", Large, 1.35, 8, 1.15),
            Self::new("TreeBig", Large, 1.55, 10, 1.55),
        ]
    }
}

/// A passive world object with a one-shot consumption transition
#[derive(Debug, Clone)]
pub struct Consumable {
    pub id: EntityId,
    pub template: String,
    pub tier: ConsumableTier,
    pub position: Vec2,
    /// Drop height at spawn; the physics engine owns it afterwards
    pub height: f32,
    pub size_threshold: f32,
    pub score_value: u32,
    pub growth_value: f32,
    pub ownership: Ownership,
    consumed: bool,
}

impl Consumable {
    pub fn new(id: EntityId, template: &ConsumableTemplate, position: Vec2, height: f32, ownership: Ownership) -> Self {
        Self {
            id,
            template: template.name.clone(),
            tier: template.tier,
            position,
            height,
            size_threshold: template.size_threshold,
            score_value: template.score_value,
            growth_value: template.growth_value,
            ownership,
            consumed: false,
        }
    }

    #[inline]
    pub fn is_consumed(&self) -> bool {
        self.consumed
    }

    /// Eligible when not yet consumed and the hole is big enough
    #[inline]
    pub fn can_be_consumed_by(&self, hole_radius: f32) -> bool {
        !self.consumed && hole_radius >= self.size_threshold
    }

    /// Flip the one-shot flag. Returns false if it was already set.
    pub fn mark_consumed(&mut self) -> bool {
        if self.consumed {
            return false;
        }
        self.consumed = true;
        true
    }
}

/// Match phase
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum MatchPhase {
    /// Waiting for the host to start
    #[default]
    Lobby,
    /// Countdown before match starts
    Countdown,
    /// Match in progress
    Playing,
    /// Match ended (terminal)
    Ended,
}

impl MatchPhase {
    /// Movement, consumption and spawning are all gated on this
    #[inline]
    pub fn is_playing(&self) -> bool {
        matches!(self, MatchPhase::Playing)
    }
}

/// Match state
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MatchState {
    pub phase: MatchPhase,
    /// Countdown seconds or playtime seconds depending on `phase`
    pub remaining_time: f32,
    /// Seconds spent in Playing so far
    pub elapsed_play_time: f32,
}

/// Complete authoritative game state for one session
#[derive(Debug, Clone, Default)]
pub struct GameState {
    pub tick: u64,
    pub match_state: MatchState,
    pub players: HashMap<PlayerId, PlayerState>,
    /// Join order; all per-tick player iteration follows it
    player_order: Vec<PlayerId>,
    /// Spawn order
    pub consumables: Vec<Consumable>,
    next_spawn_index: usize,
}

impl GameState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get player by ID - O(1) with HashMap
    pub fn get_player(&self, id: PlayerId) -> Option<&PlayerState> {
        self.players.get(&id)
    }

    /// Get mutable player by ID - O(1) with HashMap
    pub fn get_player_mut(&mut self, id: PlayerId) -> Option<&mut PlayerState> {
        self.players.get_mut(&id)
    }

    /// Player IDs in join order
    pub fn player_order(&self) -> &[PlayerId] {
        &self.player_order
    }

    /// Players in join order
    pub fn players_in_order(&self) -> impl Iterator<Item = &PlayerState> {
        self.player_order.iter().filter_map(|id| self.players.get(id))
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Hand out the next join ordinal
    pub fn next_spawn_index(&mut self) -> usize {
        let index = self.next_spawn_index;
        self.next_spawn_index += 1;
        index
    }

    /// Add a player to the game. Re-adding an existing ID replaces its state
    /// but keeps its place in the join order.
    pub fn add_player(&mut self, player: PlayerState) {
        if !self.players.contains_key(&player.id) {
            self.player_order.push(player.id);
        }
        self.players.insert(player.id, player);
    }

    /// Remove a player from the game
    pub fn remove_player(&mut self, id: PlayerId) -> Option<PlayerState> {
        let removed = self.players.remove(&id);
        if removed.is_some() {
            self.player_order.retain(|p| *p != id);
        }
        removed
    }

    pub fn add_consumable(&mut self, consumable: Consumable) {
        self.consumables.push(consumable);
    }

    pub fn get_consumable(&self, id: EntityId) -> Option<&Consumable> {
        self.consumables.iter().find(|c| c.id == id)
    }

    /// Drop every consumed entity, returning their IDs in spawn order
    pub fn remove_consumed(&mut self) -> Vec<EntityId> {
        let removed: Vec<EntityId> = self
            .consumables
            .iter()
            .filter(|c| c.is_consumed())
            .map(|c| c.id)
            .collect();
        if !removed.is_empty() {
            self.consumables.retain(|c| !c.is_consumed());
        }
        removed
    }

    /// Count of consumables still in the world (not yet consumed)
    pub fn live_consumable_count(&self) -> usize {
        self.consumables.iter().filter(|c| !c.is_consumed()).count()
    }
}
