//! Per-player performance scoring
//!
//! Every participant gets a raw composite score built from bed breaks, relative
//! K/D, final kills and activity, each measured against a comparison group: the
//! player's teammates, or the rest of the lobby in solo formats. The normalized
//! score divides the raw score by the match average and becomes the player's
//! rating multiplier.

use crate::config::{PerformanceConfig, PerformanceWeights};
use crate::types::{ClassifiedMatch, CombatStats, Match, PerformanceScore, PlayerId};
use crate::utils::mean;
use std::collections::HashMap;

/// Computes performance scores for the participants of a classified match
#[derive(Debug, Clone, Default)]
pub struct PerformanceScorer {
    config: PerformanceConfig,
}

impl PerformanceScorer {
    pub fn new(config: PerformanceConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PerformanceConfig {
        &self.config
    }

    /// Score every participant of a match
    pub fn score(
        &self,
        record: &Match,
        classified: &ClassifiedMatch,
    ) -> HashMap<PlayerId, PerformanceScore> {
        let weights = self.config.weights_for(classified.mode);

        let mut raw_scores: Vec<(PlayerId, f64)> = Vec::with_capacity(record.participant_count());
        for team in &record.teams {
            for player in &team.players {
                let group: Vec<CombatStats> = if team.players.len() > 1 {
                    team.players
                        .iter()
                        .filter(|other| *other != player)
                        .map(|other| record.stats_for(other))
                        .collect()
                } else {
                    record
                        .participants()
                        .filter(|other| *other != player)
                        .map(|other| record.stats_for(other))
                        .collect()
                };

                let raw = Self::raw_score(weights, &record.stats_for(player), &group);
                raw_scores.push((player.clone(), raw));
            }
        }

        let match_average = mean(raw_scores.iter().map(|(_, raw)| *raw)).unwrap_or(1.0);

        raw_scores
            .into_iter()
            .map(|(player, raw)| {
                let normalized = Self::normalize(weights, raw, match_average);
                (player, PerformanceScore { raw, normalized })
            })
            .collect()
    }

    /// Clamped composite score of one player against a comparison group
    pub fn raw_score(
        weights: &PerformanceWeights,
        stats: &CombatStats,
        group: &[CombatStats],
    ) -> f64 {
        let bed_ratio = Self::contribution_ratio(
            weights,
            stats.bed_breaks,
            group.iter().map(|s| s.bed_breaks),
        );
        let final_ratio = Self::contribution_ratio(
            weights,
            stats.final_kills,
            group.iter().map(|s| s.final_kills),
        );

        let bed =
            weights.bed_weight * stats.bed_breaks as f64 + weights.bed_ratio_weight * bed_ratio;
        let kd = weights.kd_weight * Self::relative_kd(weights, stats, group);
        let finals = weights.final_weight * stats.final_kills.min(weights.final_kill_cap) as f64
            + weights.final_ratio_weight * final_ratio;

        let group_actions = mean(group.iter().map(|s| s.actions() as f64)).unwrap_or(0.0);
        let activity = weights.activity_weight * (stats.actions() as f64 - group_actions).max(0.0);

        (weights.base + bed + kd + finals + activity).clamp(weights.score_min, weights.score_max)
    }

    /// Raw score relative to the match average, clamped to the multiplier range
    pub fn normalize(weights: &PerformanceWeights, raw: f64, match_average: f64) -> f64 {
        let relative = if match_average > 0.0 {
            raw / match_average
        } else {
            1.0
        };
        relative.clamp(weights.multiplier_min, weights.multiplier_max)
    }

    fn contribution_ratio<I>(weights: &PerformanceWeights, value: u32, group: I) -> f64
    where
        I: IntoIterator<Item = u32>,
    {
        if value == 0 {
            return 0.0;
        }

        match mean(group.into_iter().map(f64::from)) {
            Some(average) if average > 0.0 => (value as f64 / average).min(weights.ratio_cap),
            // Nobody else contributed: reward without dividing by zero
            _ => weights.unique_contribution_bonus,
        }
    }

    fn relative_kd(
        weights: &PerformanceWeights,
        stats: &CombatStats,
        group: &[CombatStats],
    ) -> f64 {
        let own = stats.kd_ratio();
        let average = mean(group.iter().map(CombatStats::kd_ratio)).unwrap_or(0.0);

        let ratio = if average > 0.0 {
            own / average
        } else if own > 0.0 {
            weights.kd_ratio_max
        } else {
            1.0
        };

        ratio.clamp(weights.kd_ratio_min, weights.kd_ratio_max)
    }
}
