//! Rating engine configuration

use crate::types::Mode;
use serde::{Deserialize, Serialize};

/// Parameters of the multi-team Elo engine and the rating ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RatingConfig {
    /// Seed rating for players without a state in a mode
    pub initial_rating: f64,
    /// Seed rating for legacy top players
    pub legacy_initial_rating: f64,
    /// K-factor for the standard modes
    pub k_factor: f64,
    /// K-factor for the Mega pool
    pub mega_k_factor: f64,
    /// Divisor `D` of the expected-score curve
    pub divisor: f64,
    /// Rating that large teams' averages are pulled toward
    pub reference_rating: f64,
    /// Per-extra-player strength of the team-size dampening
    pub team_size_dampening: f64,
    /// Residual above which the zero-sum correction runs
    pub zero_sum_tolerance: f64,
    /// Accept a live match whose timestamp equals the last applied one
    pub allow_equal_timestamps: bool,
}

impl Default for RatingConfig {
    fn default() -> Self {
        Self {
            initial_rating: 1200.0,
            legacy_initial_rating: 1500.0,
            k_factor: 40.0,
            mega_k_factor: 32.0,
            divisor: 400.0,
            reference_rating: 1200.0,
            team_size_dampening: 0.05,
            zero_sum_tolerance: 1e-6,
            allow_equal_timestamps: false,
        }
    }
}

impl RatingConfig {
    /// K-factor of the rating pool a mode belongs to
    pub fn k_factor_for(&self, mode: Mode) -> f64 {
        if mode.is_mega() {
            self.mega_k_factor
        } else {
            self.k_factor
        }
    }

    pub fn validate(&self) -> crate::error::Result<()> {
        let checks = [
            (self.k_factor > 0.0, "K-factor must be positive"),
            (self.mega_k_factor > 0.0, "Mega K-factor must be positive"),
            (self.divisor > 0.0, "Divisor must be positive"),
            (self.initial_rating.is_finite(), "Initial rating must be finite"),
            (
                self.legacy_initial_rating.is_finite(),
                "Legacy initial rating must be finite",
            ),
            (
                self.reference_rating.is_finite(),
                "Reference rating must be finite",
            ),
            (
                self.team_size_dampening >= 0.0,
                "Team size dampening must be non-negative",
            ),
            (
                self.zero_sum_tolerance > 0.0,
                "Zero-sum tolerance must be positive",
            ),
        ];

        for (ok, message) in checks {
            if !ok {
                return Err(crate::error::RatingError::ConfigurationError {
                    message: message.to_string(),
                }
                .into());
            }
        }

        Ok(())
    }
}
