//! Multi-team Elo rating calculator
//!
//! Every team plays a round-robin of pairwise Elo comparisons against every
//! other team in the match. A team's delta is the K-scaled average surprisal of
//! those comparisons. Team deltas are split across players by performance
//! multiplier and a zero-sum correction removes the residual that pairwise
//! deltas leave behind with more than two teams, with ties, or once
//! multipliers are applied.

use crate::config::RatingConfig;
use crate::error::RatingError;
use crate::rating::calculator::{
    RatingCalculationResult, RatingCalculator, TeamDelta, TeamRatingInput,
};
use crate::types::{MatchOutcome, RatingChange};
use tracing::debug;

/// Classical Elo expected score of A against B
pub fn expected_score(rating_a: f64, rating_b: f64, divisor: f64) -> f64 {
    1.0 / (1.0 + 10f64.powf((rating_b - rating_a) / divisor))
}

/// Multi-team Elo calculator with team-size dampening and zero-sum correction
#[derive(Debug, Clone)]
pub struct MultiTeamEloCalculator {
    config: RatingConfig,
}

impl MultiTeamEloCalculator {
    /// Create a new calculator
    pub fn new(config: RatingConfig) -> crate::error::Result<Self> {
        config.validate()?;

        Ok(Self { config })
    }

    /// Team average pulled toward the reference rating; larger teams are pulled harder
    pub fn adjusted_team_rating(&self, team: &TeamRatingInput) -> f64 {
        let average = team.average_rating();
        let extra_players = team.players.len().saturating_sub(1) as f64;
        let dampening = 1.0 + self.config.team_size_dampening * extra_players;

        self.config.reference_rating + (average - self.config.reference_rating) / dampening
    }

    fn actual_score(outcome: MatchOutcome, team: usize, opponent: usize) -> f64 {
        match outcome {
            MatchOutcome::Winner(winner) if winner == team => 1.0,
            MatchOutcome::Winner(winner) if winner == opponent => 0.0,
            _ => 0.5,
        }
    }

    fn validate_input(
        teams: &[TeamRatingInput],
        outcome: MatchOutcome,
        k_factor: f64,
    ) -> crate::error::Result<()> {
        if teams.len() < 2 {
            return Err(RatingError::InvalidInput {
                reason: format!("A rated match needs at least two teams, got {}", teams.len()),
            }
            .into());
        }

        if let Some(team) = teams.iter().find(|t| t.players.is_empty()) {
            return Err(RatingError::InvalidInput {
                reason: format!("Team {} has no players", team.name),
            }
            .into());
        }

        if let MatchOutcome::Winner(index) = outcome {
            if index >= teams.len() {
                return Err(RatingError::InvalidInput {
                    reason: format!("Winner index {} is out of range", index),
                }
                .into());
            }
        }

        if !k_factor.is_finite() || k_factor <= 0.0 {
            return Err(RatingError::InvalidInput {
                reason: format!("K-factor must be positive, got {}", k_factor),
            }
            .into());
        }

        Ok(())
    }
}

impl RatingCalculator for MultiTeamEloCalculator {
    /// Gains are the team delta times the player's multiplier; losses are the
    /// team delta divided by it, so strong performers lose less.
    fn compute_deltas(
        &self,
        teams: &[TeamRatingInput],
        outcome: MatchOutcome,
        k_factor: f64,
    ) -> crate::error::Result<RatingCalculationResult> {
        Self::validate_input(teams, outcome, k_factor)?;

        let adjusted: Vec<f64> = teams.iter().map(|t| self.adjusted_team_rating(t)).collect();
        let opponents = (teams.len() - 1) as f64;

        // Round-robin of every unordered pair, accumulated from both sides
        let mut surprisal = vec![0.0; teams.len()];
        for i in 0..teams.len() {
            for j in (i + 1)..teams.len() {
                let expected = expected_score(adjusted[i], adjusted[j], self.config.divisor);
                let actual = Self::actual_score(outcome, i, j);

                surprisal[i] += actual - expected;
                surprisal[j] += (1.0 - actual) - (1.0 - expected);
            }
        }

        let team_deltas: Vec<TeamDelta> = teams
            .iter()
            .enumerate()
            .map(|(i, team)| TeamDelta {
                name: team.name.clone(),
                average_rating: team.average_rating(),
                adjusted_rating: adjusted[i],
                delta: k_factor * surprisal[i] / opponents,
            })
            .collect();

        // Winners gain in proportion to performance; losers lose in inverse proportion
        let mut changes: Vec<RatingChange> = Vec::new();
        for (team, team_delta) in teams.iter().zip(&team_deltas) {
            for player in &team.players {
                let multiplier = player.performance.normalized;
                let multiplier = if multiplier.is_finite() && multiplier > 0.0 {
                    multiplier
                } else {
                    1.0
                };

                let delta = if team_delta.delta >= 0.0 {
                    team_delta.delta * multiplier
                } else {
                    team_delta.delta / multiplier
                };

                changes.push(RatingChange {
                    player_id: player.player_id.clone(),
                    delta,
                    raw_score: player.performance.raw,
                    normalized_score: player.performance.normalized,
                });
            }
        }

        // Zero-sum correction
        let residual: f64 = changes.iter().map(|c| c.delta).sum();
        let mut correction = 0.0;
        if residual.abs() > self.config.zero_sum_tolerance {
            let magnitude: f64 = changes.iter().map(|c| c.delta.abs()).sum();
            if magnitude > 0.0 {
                for change in &mut changes {
                    change.delta -= residual * change.delta.abs() / magnitude;
                }
                correction = residual;
                debug!(
                    "Zero-sum correction redistributed {:.4} across {} players",
                    residual,
                    changes.len()
                );
            }
        }

        Ok(RatingCalculationResult {
            changes,
            team_deltas,
            correction,
        })
    }

    fn config(&self) -> serde_json::Value {
        serde_json::to_value(&self.config).unwrap_or(serde_json::Value::Null)
    }
}
