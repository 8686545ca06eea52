//! Observer-side view of a session
//!
//! Observers never simulate. They apply whatever the authority replicates,
//! derive all gating from the replicated phase and keep an effect log that
//! tolerates redelivery.

use hashbrown::HashSet;
use std::collections::VecDeque;

use crate::game::events::{EffectEvent, StampedEffect};
use crate::game::state::{MatchPhase, PlayerId};
use crate::net::protocol::{GameSnapshot, PlayerSnapshot, ServerMessage};

/// Effects remembered for de-duplication
const EFFECT_HISTORY: usize = 256;

/// Read-only replicated state
#[derive(Debug, Default)]
pub struct ReplicaState {
    latest: Option<GameSnapshot>,
    seen_effects: HashSet<(u64, u32)>,
    seen_order: VecDeque<(u64, u32)>,
}

impl ReplicaState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a snapshot. Returns false (and keeps the current view) when it
    /// is older than what has already been applied.
    pub fn apply_snapshot(&mut self, snapshot: GameSnapshot) -> bool {
        if let Some(current) = &self.latest {
            if snapshot.tick < current.tick {
                return false;
            }
        }
        self.latest = Some(snapshot);
        true
    }

    /// Record an effect. Returns the effect the first time a stamp is seen,
    /// `None` for redelivered duplicates.
    pub fn apply_effect(&mut self, stamped: StampedEffect) -> Option<EffectEvent> {
        let key = (stamped.tick, stamped.sequence);
        if !self.seen_effects.insert(key) {
            return None;
        }
        self.seen_order.push_back(key);
        while self.seen_order.len() > EFFECT_HISTORY {
            if let Some(old) = self.seen_order.pop_front() {
                self.seen_effects.remove(&old);
            }
        }
        Some(stamped.effect)
    }

    /// Route a server message; returns a fresh effect if it carried one
    pub fn handle(&mut self, message: ServerMessage) -> Option<EffectEvent> {
        match message {
            ServerMessage::Snapshot(snapshot) => {
                self.apply_snapshot(snapshot);
                None
            }
            ServerMessage::Effect(stamped) => self.apply_effect(stamped),
            _ => None,
        }
    }

    pub fn tick(&self) -> Option<u64> {
        self.latest.as_ref().map(|s| s.tick)
    }

    pub fn phase(&self) -> MatchPhase {
        self.latest.as_ref().map(|s| s.match_phase).unwrap_or_default()
    }

    pub fn remaining_time(&self) -> f32 {
        self.latest.as_ref().map(|s| s.remaining_time).unwrap_or(0.0)
    }

    pub fn snapshot(&self) -> Option<&GameSnapshot> {
        self.latest.as_ref()
    }

    pub fn player(&self, id: PlayerId) -> Option<&PlayerSnapshot> {
        self.latest.as_ref()?.players.iter().find(|p| p.id == id)
    }

    /// Whether steering input is worth sending
    pub fn movement_allowed(&self) -> bool {
        self.phase().is_playing()
    }

    /// Whether the ready toggle is meaningful
    pub fn ready_toggle_allowed(&self) -> bool {
        self.phase() == MatchPhase::Lobby
    }

    /// Whether a countdown overlay should be shown
    pub fn countdown_visible(&self) -> bool {
        self.phase() == MatchPhase::Countdown
    }

    pub fn match_over(&self) -> bool {
        self.phase() == MatchPhase::Ended
    }
}
