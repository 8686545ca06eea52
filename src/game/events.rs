//! Presentation-only effects
//!
//! Systems push effects while they run; the session runner drains the queue
//! once per tick and fans the result out to observers. Nothing in the
//! simulation reads an effect back, so dropping or duplicating one never
//! changes authoritative state.

use serde::{Deserialize, Serialize};

use crate::util::vec2::Vec2;

/// Transient, fire-and-forget effect
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum EffectEvent {
    CountdownStarted,
    MatchStarted,
    MatchEnded,
    /// A consumable disappeared into a hole
    ObjectConsumed {
        position: Vec2,
        /// Visual scale hint; the consumed object's growth value
        intensity: f32,
    },
}

/// An effect stamped with the tick it happened on and its order within it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StampedEffect {
    pub tick: u64,
    pub sequence: u32,
    pub effect: EffectEvent,
}

/// Per-tick effect buffer
#[derive(Debug, Default)]
pub struct EffectQueue {
    pending: Vec<EffectEvent>,
    stamp_tick: u64,
    next_sequence: u32,
}

impl EffectQueue {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn push(&mut self, effect: EffectEvent) {
        self.pending.push(effect);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Take everything queued so far, in push order
    pub fn drain(&mut self) -> Vec<EffectEvent> {
        std::mem::take(&mut self.pending)
    }

    /// Take everything queued so far, stamped with `tick`. Sequence numbers
    /// keep counting across drains that share a tick, so a stamp is unique.
    pub fn drain_stamped(&mut self, tick: u64) -> Vec<StampedEffect> {
        if tick != self.stamp_tick {
            self.stamp_tick = tick;
            self.next_sequence = 0;
        }
        let mut stamped = Vec::with_capacity(self.pending.len());
        for effect in self.pending.drain(..) {
            stamped.push(StampedEffect {
                tick,
                sequence: self.next_sequence,
                effect,
            });
            self.next_sequence += 1;
        }
        stamped
    }
}
