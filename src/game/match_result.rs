//! Match result and ranking system
//!
//! Computes final standings once a match has ended.

use std::cmp::Ordering;

use crate::game::state::{GameState, MatchPhase, PlayerId};

/// Match result information
#[derive(Debug, Clone)]
pub struct MatchResult {
    /// `None` when nobody played or the top two are tied on score and area
    pub winner_id: Option<PlayerId>,
    pub winner_name: Option<String>,
    pub rankings: Vec<PlayerRanking>,
    pub match_duration: f32,
    pub total_score: u64,
}

/// Player ranking in match results
#[derive(Debug, Clone)]
pub struct PlayerRanking {
    pub player_id: PlayerId,
    pub name: String,
    pub rank: u32,
    pub score: u64,
    pub final_area: f32,
    pub final_radius: f32,
}

fn compare(a: &PlayerRanking, b: &PlayerRanking) -> Ordering {
    b.score
        .cmp(&a.score)
        .then_with(|| b.final_area.partial_cmp(&a.final_area).unwrap_or(Ordering::Equal))
}

/// Determine match result from game state
///
/// Sorted by score (desc) then hole area (desc); equal entries keep join
/// order and share a rank.
pub fn determine_result(state: &GameState) -> MatchResult {
    let mut rankings: Vec<PlayerRanking> = state
        .players_in_order()
        .map(|p| PlayerRanking {
            player_id: p.id,
            name: p.display_name.clone(),
            rank: 0,
            score: p.score(),
            final_area: p.hole_area(),
            final_radius: p.hole_radius(),
        })
        .collect();

    // Stable sort keeps join order among ties
    rankings.sort_by(compare);

    for i in 0..rankings.len() {
        rankings[i].rank = if i > 0 && compare(&rankings[i - 1], &rankings[i]) == Ordering::Equal {
            rankings[i - 1].rank
        } else {
            (i + 1) as u32
        };
    }

    let total_score = rankings.iter().map(|r| r.score).sum();

    let tied_at_top = rankings.len() > 1 && rankings[1].rank == 1;
    let (winner_id, winner_name) = match rankings.first() {
        Some(first) if !tied_at_top => (Some(first.player_id), Some(first.name.clone())),
        _ => (None, None),
    };

    MatchResult {
        winner_id,
        winner_name,
        rankings,
        match_duration: state.match_state.elapsed_play_time,
        total_score,
    }
}

/// Results are only final once the match has ended
pub fn final_result(state: &GameState) -> Option<MatchResult> {
    (state.match_state.phase == MatchPhase::Ended).then(|| determine_result(state))
}
