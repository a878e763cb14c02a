//! Performance scoring configuration
//!
//! Mega lobbies are much larger than the standard formats, so they get their own
//! constant set. A single scoring run always uses exactly one of the two sets.

use crate::error::RatingError;
use crate::types::Mode;
use serde::{Deserialize, Serialize};

/// Weights, caps and clamps for one family of modes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceWeights {
    /// Constant part of every raw score
    pub base: f64,
    /// Weight per bed broken
    pub bed_weight: f64,
    /// Weight of the bed-break ratio against the comparison group
    pub bed_ratio_weight: f64,
    /// Weight of the clamped relative K/D
    pub kd_weight: f64,
    pub kd_ratio_min: f64,
    pub kd_ratio_max: f64,
    /// Weight per final kill, up to `final_kill_cap`
    pub final_weight: f64,
    pub final_kill_cap: u32,
    /// Weight of the final-kill ratio against the comparison group
    pub final_ratio_weight: f64,
    /// Weight per action above the comparison group's average
    pub activity_weight: f64,
    /// Ceiling for bed-break and final-kill ratios
    pub ratio_cap: f64,
    /// Ratio used when the player is the only one in the group with a contribution
    pub unique_contribution_bonus: f64,
    pub score_min: f64,
    pub score_max: f64,
    pub multiplier_min: f64,
    pub multiplier_max: f64,
}

impl PerformanceWeights {
    /// Constants for Solo, Duo, Trio and Fours
    pub fn standard() -> Self {
        Self {
            base: 0.5,
            bed_weight: 0.15,
            bed_ratio_weight: 0.2,
            kd_weight: 0.35,
            kd_ratio_min: 0.5,
            kd_ratio_max: 2.5,
            final_weight: 0.1,
            final_kill_cap: 5,
            final_ratio_weight: 0.15,
            activity_weight: 0.02,
            ratio_cap: 2.0,
            unique_contribution_bonus: 1.5,
            score_min: 0.2,
            score_max: 4.0,
            multiplier_min: 0.5,
            multiplier_max: 1.5,
        }
    }

    /// Constants for Mega
    pub fn mega() -> Self {
        Self {
            base: 0.6,
            bed_weight: 0.08,
            bed_ratio_weight: 0.1,
            kd_weight: 0.3,
            kd_ratio_min: 0.6,
            kd_ratio_max: 2.0,
            final_weight: 0.06,
            final_kill_cap: 8,
            final_ratio_weight: 0.1,
            activity_weight: 0.01,
            ratio_cap: 1.75,
            unique_contribution_bonus: 1.25,
            score_min: 0.25,
            score_max: 3.0,
            multiplier_min: 0.75,
            multiplier_max: 1.25,
        }
    }

    pub fn validate(&self) -> crate::error::Result<()> {
        let weights = [
            self.base,
            self.bed_weight,
            self.bed_ratio_weight,
            self.kd_weight,
            self.final_weight,
            self.final_ratio_weight,
            self.activity_weight,
        ];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(config_error("Performance weights must be finite and non-negative"));
        }
        if self.kd_ratio_min <= 0.0 || self.kd_ratio_min > self.kd_ratio_max {
            return Err(config_error("K/D ratio range is invalid"));
        }
        if self.ratio_cap <= 0.0 || self.unique_contribution_bonus <= 0.0 {
            return Err(config_error(
                "Ratio cap and unique contribution bonus must be positive",
            ));
        }
        // Normalization divides by the match average, so scores must stay positive
        if self.score_min <= 0.0 || self.score_min > self.score_max {
            return Err(config_error("Performance score range is invalid"));
        }
        if self.multiplier_min <= 0.0 || self.multiplier_min > self.multiplier_max {
            return Err(config_error("Performance multiplier range is invalid"));
        }
        Ok(())
    }
}

fn config_error(message: &str) -> anyhow::Error {
    RatingError::ConfigurationError {
        message: message.to_string(),
    }
    .into()
}

/// Both constant sets used by the performance scorer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    pub standard: PerformanceWeights,
    pub mega: PerformanceWeights,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            standard: PerformanceWeights::standard(),
            mega: PerformanceWeights::mega(),
        }
    }
}

impl PerformanceConfig {
    /// Select the constant set for a mode
    pub fn weights_for(&self, mode: Mode) -> &PerformanceWeights {
        if mode.is_mega() {
            &self.mega
        } else {
            &self.standard
        }
    }

    pub fn validate(&self) -> crate::error::Result<()> {
        self.standard.validate()?;
        self.mega.validate()
    }
}
