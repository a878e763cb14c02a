//! Match validation and classification
//!
//! Decides whether a completed match may affect ratings, which rating pool it
//! belongs to, and who won. Classification is pure: the same record always
//! yields the same answer and nothing is mutated.

use crate::config::ClassifierConfig;
use crate::types::{ClassifiedMatch, Match, MatchOutcome, Mode};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

/// Why a match was excluded from rating
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvalidReason {
    MissingWinner,
    MarkedInvalid { marker: String },
    MissingLobby,
    BlockedLobby { lobby: String },
    MissingDuration,
    TooShort { duration_seconds: u64 },
    TooFewTeams { teams: usize },
    EmptyTeam { team: String },
    DuplicateTeamName { team: String },
    TooFewParticipants { participants: usize, required: usize },
    DuplicateParticipant { player_id: String },
    MissingStats { player_id: String },
    UnknownWinner { winner: String },
    LikelyDisconnect { team: String },
}

impl InvalidReason {
    /// Short label used for metrics
    pub fn label(&self) -> &'static str {
        match self {
            InvalidReason::MissingWinner => "missing_winner",
            InvalidReason::MarkedInvalid { .. } => "marked_invalid",
            InvalidReason::MissingLobby => "missing_lobby",
            InvalidReason::BlockedLobby { .. } => "blocked_lobby",
            InvalidReason::MissingDuration => "missing_duration",
            InvalidReason::TooShort { .. } => "too_short",
            InvalidReason::TooFewTeams { .. } => "too_few_teams",
            InvalidReason::EmptyTeam { .. } => "empty_team",
            InvalidReason::DuplicateTeamName { .. } => "duplicate_team_name",
            InvalidReason::TooFewParticipants { .. } => "too_few_participants",
            InvalidReason::DuplicateParticipant { .. } => "duplicate_participant",
            InvalidReason::MissingStats { .. } => "missing_stats",
            InvalidReason::UnknownWinner { .. } => "unknown_winner",
            InvalidReason::LikelyDisconnect { .. } => "likely_disconnect",
        }
    }
}

impl std::fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvalidReason::MissingWinner => write!(f, "winner is missing"),
            InvalidReason::MarkedInvalid { marker } => {
                write!(f, "source marked the match invalid ({})", marker)
            }
            InvalidReason::MissingLobby => write!(f, "lobby is missing"),
            InvalidReason::BlockedLobby { lobby } => write!(f, "lobby {} is not rated", lobby),
            InvalidReason::MissingDuration => write!(f, "duration is missing"),
            InvalidReason::TooShort { duration_seconds } => {
                write!(f, "match lasted only {}s", duration_seconds)
            }
            InvalidReason::TooFewTeams { teams } => write!(f, "only {} team(s)", teams),
            InvalidReason::EmptyTeam { team } => write!(f, "team {} has no players", team),
            InvalidReason::DuplicateTeamName { team } => {
                write!(f, "team name {} is used twice", team)
            }
            InvalidReason::TooFewParticipants {
                participants,
                required,
            } => write!(f, "{} participants, {} required", participants, required),
            InvalidReason::DuplicateParticipant { player_id } => {
                write!(f, "player {} appears on more than one roster", player_id)
            }
            InvalidReason::MissingStats { player_id } => {
                write!(f, "no stats recorded for player {}", player_id)
            }
            InvalidReason::UnknownWinner { winner } => {
                write!(f, "winner {} matches no team", winner)
            }
            InvalidReason::LikelyDisconnect { team } => {
                write!(f, "team {} looks like it disconnected", team)
            }
        }
    }
}

/// Validates matches and derives their mode and outcome
#[derive(Debug, Clone, Default)]
pub struct MatchClassifier {
    config: ClassifierConfig,
}

impl MatchClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Classify a match, or explain why it cannot be rated
    pub fn classify(&self, record: &Match) -> Result<ClassifiedMatch, InvalidReason> {
        let winner = record
            .winner
            .as_deref()
            .map(str::trim)
            .filter(|w| !w.is_empty())
            .ok_or(InvalidReason::MissingWinner)?;

        if Self::is_marker(&self.config.invalid_markers, winner) {
            return Err(InvalidReason::MarkedInvalid {
                marker: winner.to_string(),
            });
        }

        self.check_lobby(record)?;
        self.check_rosters(record)?;

        let mode = Self::derive_mode(record)?;
        if let Some(declared) = record.declared_mode {
            if declared != mode {
                debug!(
                    "Match {} declared {} but its rosters say {}",
                    record.id, declared, mode
                );
            }
        }

        self.check_activity(record, mode)?;

        let outcome = self.resolve_outcome(record, winner)?;
        self.check_disconnects(record)?;

        Ok(ClassifiedMatch { mode, outcome })
    }

    fn is_marker(markers: &[String], value: &str) -> bool {
        markers.iter().any(|m| m.eq_ignore_ascii_case(value))
    }

    fn check_lobby(&self, record: &Match) -> Result<(), InvalidReason> {
        let lobby = record
            .lobby
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .ok_or(InvalidReason::MissingLobby)?;

        let lowered = lobby.to_ascii_lowercase();
        let blocked = self
            .config
            .blocked_lobby_prefixes
            .iter()
            .any(|prefix| lowered.starts_with(&prefix.to_ascii_lowercase()));

        if blocked {
            return Err(InvalidReason::BlockedLobby {
                lobby: lobby.to_string(),
            });
        }
        Ok(())
    }

    fn check_rosters(&self, record: &Match) -> Result<(), InvalidReason> {
        if record.teams.len() < 2 {
            return Err(InvalidReason::TooFewTeams {
                teams: record.teams.len(),
            });
        }

        let mut names = HashSet::new();
        let mut seen = HashSet::new();
        for team in &record.teams {
            if team.players.is_empty() {
                return Err(InvalidReason::EmptyTeam {
                    team: team.name.clone(),
                });
            }
            if !names.insert(team.name.to_ascii_lowercase()) {
                return Err(InvalidReason::DuplicateTeamName {
                    team: team.name.clone(),
                });
            }
            for player in &team.players {
                if !seen.insert(player.as_str()) {
                    return Err(InvalidReason::DuplicateParticipant {
                        player_id: player.clone(),
                    });
                }
                if !record.stats.contains_key(player) {
                    return Err(InvalidReason::MissingStats {
                        player_id: player.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    fn derive_mode(record: &Match) -> Result<Mode, InvalidReason> {
        let largest = record
            .teams
            .iter()
            .map(|team| team.players.len())
            .max()
            .unwrap_or(0);

        Mode::from_team_size(largest).ok_or(InvalidReason::TooFewTeams {
            teams: record.teams.len(),
        })
    }

    fn check_activity(&self, record: &Match, mode: Mode) -> Result<(), InvalidReason> {
        let duration = record
            .duration_seconds
            .ok_or(InvalidReason::MissingDuration)?;
        if duration < self.config.min_duration_seconds {
            return Err(InvalidReason::TooShort {
                duration_seconds: duration,
            });
        }

        let participants = record.participant_count();
        let required = mode.team_size() * self.config.min_full_teams;
        if participants < required {
            return Err(InvalidReason::TooFewParticipants {
                participants,
                required,
            });
        }
        Ok(())
    }

    fn resolve_outcome(&self, record: &Match, winner: &str) -> Result<MatchOutcome, InvalidReason> {
        if Self::is_marker(&self.config.tie_markers, winner) {
            return Ok(MatchOutcome::Tie);
        }

        // Exact name first; team names are unique case-insensitively
        // so the fallback is unambiguous
        let index = record
            .teams
            .iter()
            .position(|team| team.name == winner)
            .or_else(|| {
                record
                    .teams
                    .iter()
                    .position(|team| team.name.eq_ignore_ascii_case(winner))
            })
            .ok_or_else(|| InvalidReason::UnknownWinner {
                winner: winner.to_string(),
            })?;

        Ok(MatchOutcome::Winner(index))
    }

    fn check_disconnects(&self, record: &Match) -> Result<(), InvalidReason> {
        for team in &record.teams {
            let totals = record.team_totals(team);
            let roster = u32::try_from(team.players.len()).unwrap_or(u32::MAX);
            let min_deaths = self
                .config
                .disconnect_min_deaths_per_player
                .saturating_mul(roster);
            if totals.bed_breaks == 0 && totals.deaths < min_deaths {
                return Err(InvalidReason::LikelyDisconnect {
                    team: team.name.clone(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CombatStats, Team};
    use chrono::{TimeZone, Utc};
    use std::collections::HashMap;

    fn create_test_match(teams: Vec<(&str, Vec<&str>)>, winner: Option<&str>) -> Match {
        let mut stats = HashMap::new();
        let teams = teams
            .into_iter()
            .map(|(name, players)| {
                for player in &players {
                    stats.insert(player.to_string(), CombatStats::new(3, 2, 1, 1));
                }
                Team::new(name, players.into_iter().map(String::from).collect())
            })
            .collect();

        Match {
            id: "match-1".to_string(),
            declared_mode: None,
            timestamp: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            winner: winner.map(String::from),
            lobby: Some("mini42A".to_string()),
            duration_seconds: Some(900),
            teams,
            stats,
        }
    }

    fn duo_match() -> Match {
        create_test_match(
            vec![("Red", vec!["a", "b"]), ("Yellow", vec!["c", "d"])],
            Some("Red"),
        )
    }

    #[test]
    fn test_classify_valid_duo() {
        let classifier = MatchClassifier::default();
        let classified = classifier.classify(&duo_match()).unwrap();

        assert_eq!(classified.mode, Mode::Duo);
        assert_eq!(classified.outcome, MatchOutcome::Winner(0));
    }

    #[test]
    fn test_mode_ignores_declared_mode() {
        let classifier = MatchClassifier::default();
        let mut record = duo_match();
        record.declared_mode = Some(Mode::Mega);

        assert_eq!(classifier.classify(&record).unwrap().mode, Mode::Duo);
    }

    #[test]
    fn test_winner_matching_is_case_insensitive() {
        let classifier = MatchClassifier::default();
        let mut record = duo_match();
        record.winner = Some("yellow".to_string());

        assert_eq!(
            classifier.classify(&record).unwrap().outcome,
            MatchOutcome::Winner(1)
        );
    }

    #[test]
    fn test_tie_marker() {
        let classifier = MatchClassifier::default();
        let mut record = duo_match();
        record.winner = Some("TIE".to_string());

        assert_eq!(
            classifier.classify(&record).unwrap().outcome,
            MatchOutcome::Tie
        );
    }

    #[test]
    fn test_missing_or_invalid_winner() {
        let classifier = MatchClassifier::default();

        let mut record = duo_match();
        record.winner = None;
        assert_eq!(
            classifier.classify(&record),
            Err(InvalidReason::MissingWinner)
        );

        record.winner = Some("   ".to_string());
        assert_eq!(
            classifier.classify(&record),
            Err(InvalidReason::MissingWinner)
        );

        record.winner = Some("invalid".to_string());
        assert!(matches!(
            classifier.classify(&record),
            Err(InvalidReason::MarkedInvalid { .. })
        ));

        record.winner = Some("Blue".to_string());
        assert!(matches!(
            classifier.classify(&record),
            Err(InvalidReason::UnknownWinner { .. })
        ));
    }

    #[test]
    fn test_blocked_lobbies() {
        let classifier = MatchClassifier::default();
        let mut record = duo_match();

        record.lobby = Some("STAFF_lobby_1".to_string());
        assert!(matches!(
            classifier.classify(&record),
            Err(InvalidReason::BlockedLobby { .. })
        ));

        record.lobby = Some("unknown".to_string());
        assert!(matches!(
            classifier.classify(&record),
            Err(InvalidReason::BlockedLobby { .. })
        ));

        record.lobby = None;
        assert_eq!(classifier.classify(&record), Err(InvalidReason::MissingLobby));
    }

    #[test]
    fn test_activity_check() {
        let classifier = MatchClassifier::default();

        let mut record = duo_match();
        record.duration_seconds = Some(45);
        assert_eq!(
            classifier.classify(&record),
            Err(InvalidReason::TooShort {
                duration_seconds: 45
            })
        );

        record.duration_seconds = None;
        assert_eq!(
            classifier.classify(&record),
            Err(InvalidReason::MissingDuration)
        );

        // One player left before the game started
        let record = create_test_match(
            vec![("Red", vec!["a", "b"]), ("Yellow", vec!["c"])],
            Some("Red"),
        );
        assert_eq!(
            classifier.classify(&record),
            Err(InvalidReason::TooFewParticipants {
                participants: 3,
                required: 4
            })
        );
    }

    #[test]
    fn test_structural_rejections() {
        let classifier = MatchClassifier::default();

        let record = create_test_match(vec![("Red", vec!["a"])], Some("Red"));
        assert_eq!(
            classifier.classify(&record),
            Err(InvalidReason::TooFewTeams { teams: 1 })
        );

        let record = create_test_match(
            vec![("Red", vec!["a", "b"]), ("Yellow", vec!["b", "c"])],
            Some("Red"),
        );
        assert!(matches!(
            classifier.classify(&record),
            Err(InvalidReason::DuplicateParticipant { .. })
        ));

        let record = create_test_match(
            vec![("Red", vec!["a", "b"]), ("red", vec!["c", "d"])],
            Some("Red"),
        );
        assert!(matches!(
            classifier.classify(&record),
            Err(InvalidReason::DuplicateTeamName { .. })
        ));

        let mut record = duo_match();
        record.stats.remove("c");
        assert_eq!(
            classifier.classify(&record),
            Err(InvalidReason::MissingStats {
                player_id: "c".to_string()
            })
        );
    }

    #[test]
    fn test_likely_disconnect() {
        let classifier = MatchClassifier::default();
        let mut record = duo_match();
        // Yellow never broke a bed and barely died: they left early
        record
            .stats
            .insert("c".to_string(), CombatStats::new(0, 1, 0, 0));
        record
            .stats
            .insert("d".to_string(), CombatStats::new(0, 0, 0, 0));

        assert_eq!(
            classifier.classify(&record),
            Err(InvalidReason::LikelyDisconnect {
                team: "Yellow".to_string()
            })
        );
    }

    #[test]
    fn test_solo_loser_killed_once_is_rated() {
        let classifier = MatchClassifier::default();
        let mut record =
            create_test_match(vec![("Red", vec!["a"]), ("Blue", vec!["b"])], Some("Red"));
        // Final-killed on the first death without reaching a bed
        record
            .stats
            .insert("b".to_string(), CombatStats::new(0, 1, 0, 0));

        assert_eq!(classifier.classify(&record).unwrap().mode, Mode::Solo);

        record
            .stats
            .insert("b".to_string(), CombatStats::new(0, 0, 0, 0));
        assert_eq!(
            classifier.classify(&record),
            Err(InvalidReason::LikelyDisconnect {
                team: "Blue".to_string()
            })
        );
    }

    #[test]
    fn test_mega_mode_from_large_rosters() {
        let classifier = MatchClassifier::default();
        let red: Vec<String> = (0..8).map(|i| format!("r{}", i)).collect();
        let blue: Vec<String> = (0..8).map(|i| format!("b{}", i)).collect();
        let record = create_test_match(
            vec![
                ("Red", red.iter().map(String::as_str).collect()),
                ("Blue", blue.iter().map(String::as_str).collect()),
            ],
            Some("Blue"),
        );

        let classified = classifier.classify(&record).unwrap();
        assert_eq!(classified.mode, Mode::Mega);
        assert_eq!(classified.outcome, MatchOutcome::Winner(1));
    }

    #[test]
    fn test_reason_labels_are_distinct() {
        let reasons = vec![
            InvalidReason::MissingWinner,
            InvalidReason::MissingLobby,
            InvalidReason::MissingDuration,
            InvalidReason::TooFewTeams { teams: 1 },
            InvalidReason::LikelyDisconnect {
                team: "Red".to_string(),
            },
        ];
        let labels: HashSet<&str> = reasons.iter().map(|r| r.label()).collect();
        assert_eq!(labels.len(), reasons.len());
    }
}
