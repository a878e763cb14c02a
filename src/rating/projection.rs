//! Read-side leaderboard projections over ledger states

use crate::types::{Mode, PlayerId, PlayerRatingState};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One row of a leaderboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub player_id: PlayerId,
    pub rating: f64,
    pub games_played: u64,
    pub win_rate: f64,
}

/// Games-weighted average of a player's non-Mega ratings
///
/// Returns `None` when the player has no games outside the Mega pool.
pub fn global_rating<'a, I>(states: I) -> Option<f64>
where
    I: IntoIterator<Item = &'a PlayerRatingState>,
{
    let (weighted, games) = states
        .into_iter()
        .filter(|s| !s.mode.is_mega() && s.games_played > 0)
        .fold((0.0, 0u64), |(weighted, games), s| {
            (weighted + s.rating * s.games_played as f64, games + s.games_played)
        });

    if games == 0 {
        None
    } else {
        Some(crate::utils::round_rating(weighted / games as f64))
    }
}

/// Global ratings of every player, highest first
pub fn global_leaderboard(states: &[PlayerRatingState]) -> Vec<LeaderboardEntry> {
    let mut per_player: BTreeMap<&str, Vec<&PlayerRatingState>> = BTreeMap::new();
    for state in states {
        per_player.entry(state.player_id.as_str()).or_default().push(state);
    }

    let rows = per_player.into_iter().filter_map(|(player_id, player_states)| {
        let rating = global_rating(player_states.iter().copied())?;
        let standard: Vec<&PlayerRatingState> = player_states
            .into_iter()
            .filter(|s| !s.mode.is_mega())
            .collect();
        let games_played: u64 = standard.iter().map(|s| s.games_played).sum();
        let victories: u64 = standard.iter().map(|s| u64::from(s.stats.victories)).sum();

        Some((
            player_id.to_string(),
            rating,
            games_played,
            victories as f64 / games_played.max(1) as f64,
        ))
    });

    rank(rows)
}

/// States of one mode, highest rating first
pub fn mode_leaderboard(states: &[PlayerRatingState], mode: Mode) -> Vec<LeaderboardEntry> {
    rank(
        states
            .iter()
            .filter(|s| s.mode == mode)
            .map(|s| (s.player_id.clone(), s.rating, s.games_played, s.win_rate())),
    )
}

fn rank<I>(rows: I) -> Vec<LeaderboardEntry>
where
    I: IntoIterator<Item = (PlayerId, f64, u64, f64)>,
{
    let mut rows: Vec<_> = rows.into_iter().collect();
    // Ties broken by player id for a stable order
    rows.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    rows.into_iter()
        .enumerate()
        .map(|(i, (player_id, rating, games_played, win_rate))| LeaderboardEntry {
            rank: i + 1,
            player_id,
            rating,
            games_played,
            win_rate,
        })
        .collect()
}
