//! Match phase controller
//!
//! Lobby -> Countdown -> Playing -> Ended, strictly forward. The only
//! externally triggered transition is Lobby -> Countdown; the others fire
//! when the phase timer runs out.

use crate::config::MatchConfig;
use crate::game::events::{EffectEvent, EffectQueue};
use crate::game::state::{MatchPhase, MatchState};

/// A phase change that happened during a call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseTransition {
    CountdownStarted,
    MatchStarted,
    MatchEnded,
}

impl PhaseTransition {
    /// Phase entered by this transition
    pub fn entered(&self) -> MatchPhase {
        match self {
            PhaseTransition::CountdownStarted => MatchPhase::Countdown,
            PhaseTransition::MatchStarted => MatchPhase::Playing,
            PhaseTransition::MatchEnded => MatchPhase::Ended,
        }
    }
}

/// Move from Lobby to Countdown. Any other phase is left untouched and
/// `false` is returned.
pub fn request_start_countdown(state: &mut MatchState, config: &MatchConfig, effects: &mut EffectQueue) -> bool {
    if state.phase != MatchPhase::Lobby {
        return false;
    }

    state.phase = MatchPhase::Countdown;
    state.remaining_time = config.countdown_duration.max(0.0);
    effects.push(EffectEvent::CountdownStarted);
    tracing::info!("Countdown started ({:.1}s)", state.remaining_time);
    true
}

/// Advance the phase timer by `dt`
pub fn update(
    state: &mut MatchState,
    config: &MatchConfig,
    dt: f32,
    effects: &mut EffectQueue,
) -> Option<PhaseTransition> {
    let dt = dt.max(0.0);

    match state.phase {
        MatchPhase::Lobby | MatchPhase::Ended => None,
        MatchPhase::Countdown => {
            state.remaining_time -= dt;
            if state.remaining_time > 0.0 {
                return None;
            }

            state.phase = MatchPhase::Playing;
            state.remaining_time = config.match_duration;
            state.elapsed_play_time = 0.0;
            effects.push(EffectEvent::MatchStarted);
            tracing::info!("Match started ({:.0}s)", config.match_duration);
            Some(PhaseTransition::MatchStarted)
        }
        MatchPhase::Playing => {
            state.elapsed_play_time += dt.min(state.remaining_time.max(0.0));
            state.remaining_time -= dt;
            if state.remaining_time > 0.0 {
                return None;
            }

            state.remaining_time = 0.0;
            state.phase = MatchPhase::Ended;
            effects.push(EffectEvent::MatchEnded);
            tracing::info!("Match ended after {:.1}s", state.elapsed_play_time);
            Some(PhaseTransition::MatchEnded)
        }
    }
}
