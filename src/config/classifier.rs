//! Match classification configuration

use serde::{Deserialize, Serialize};

/// Thresholds used to decide whether a match may affect ratings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Lobby prefixes (case-insensitive) of staff, test and unknown lobbies
    pub blocked_lobby_prefixes: Vec<String>,
    /// Shortest duration of a real game
    pub min_duration_seconds: u64,
    /// Participants required, in multiples of the mode's team size
    pub min_full_teams: usize,
    /// Deaths expected per rostered player; a team with no bed breaks and
    /// fewer total deaths than this times its roster size left early
    pub disconnect_min_deaths_per_player: u32,
    /// Winner values meaning the game ended in a tie
    pub tie_markers: Vec<String>,
    /// Winner values meaning the source flagged the game as invalid
    pub invalid_markers: Vec<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            blocked_lobby_prefixes: vec![
                "staff".to_string(),
                "test".to_string(),
                "unknown".to_string(),
            ],
            min_duration_seconds: 120,
            min_full_teams: 2,
            disconnect_min_deaths_per_player: 1,
            tie_markers: vec!["tie".to_string(), "draw".to_string()],
            invalid_markers: vec!["invalid".to_string(), "none".to_string()],
        }
    }
}

impl ClassifierConfig {
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.min_full_teams < 2 {
            return Err(crate::error::RatingError::ConfigurationError {
                message: "A rated match needs at least two full teams".to_string(),
            }
            .into());
        }
        if self.tie_markers.iter().any(|m| m.trim().is_empty()) {
            return Err(crate::error::RatingError::ConfigurationError {
                message: "Tie markers cannot be empty".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(ClassifierConfig::default().validate().is_ok());
    }

    #[test]
    fn test_single_team_threshold_rejected() {
        let config = ClassifierConfig {
            min_full_teams: 1,
            ..ClassifierConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
