//! Rating calculator trait and shared input/output types
//!
//! A calculator turns the rosters of a classified match, the players' current
//! ratings and their performance scores into per-player rating deltas. It is a
//! pure function of its inputs.

use crate::types::{MatchOutcome, PerformanceScore, PlayerId, RatingChange};
use serde::{Deserialize, Serialize};

/// A player as seen by the rating calculator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerRatingInput {
    pub player_id: PlayerId,
    /// Current rating (seeded if the player is new to the mode)
    pub rating: f64,
    pub performance: PerformanceScore,
}

/// A team roster with current ratings, in match team order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamRatingInput {
    pub name: String,
    pub players: Vec<PlayerRatingInput>,
}

impl TeamRatingInput {
    pub fn average_rating(&self) -> f64 {
        crate::utils::mean(self.players.iter().map(|p| p.rating)).unwrap_or(0.0)
    }
}

/// Team-level intermediate values, kept for logging and tests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamDelta {
    pub name: String,
    pub average_rating: f64,
    /// Average after team-size dampening
    pub adjusted_rating: f64,
    /// K-scaled mean surprisal against every other team
    pub delta: f64,
}

/// Result of a rating calculation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingCalculationResult {
    /// Rating changes for all players, in roster order
    pub changes: Vec<RatingChange>,
    /// Per-team values, in match team order
    pub team_deltas: Vec<TeamDelta>,
    /// Residual removed by the zero-sum correction (0.0 when none was needed)
    pub correction: f64,
}

impl RatingCalculationResult {
    /// Sum of all per-player deltas
    pub fn total_delta(&self) -> f64 {
        self.changes.iter().map(|c| c.delta).sum()
    }

    pub fn change_for(&self, player_id: &str) -> Option<&RatingChange> {
        self.changes.iter().find(|c| c.player_id == player_id)
    }
}

/// Trait for calculating rating changes after games
pub trait RatingCalculator: Send + Sync {
    /// Calculate rating deltas for every player of a match
    ///
    /// # Arguments
    /// * `teams` - Rosters with current ratings and performance scores
    /// * `outcome` - Winning team index (into `teams`) or tie
    /// * `k_factor` - Maximum swing for the rating pool of the match
    fn compute_deltas(
        &self,
        teams: &[TeamRatingInput],
        outcome: MatchOutcome,
        k_factor: f64,
    ) -> crate::error::Result<RatingCalculationResult>;

    /// Get current configuration as JSON
    fn config(&self) -> serde_json::Value;
}
