//! Common types used throughout the rating service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

/// Unique identifier for players
pub type PlayerId = String;

/// Unique identifier for matches
pub type MatchId = String;

/// Team-size format. Every mode is an independent rating pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Mode {
    Solo,
    Duo,
    Trio,
    Fours,
    Mega,
}

impl Mode {
    /// All modes, in team-size order
    pub const ALL: [Mode; 5] = [Mode::Solo, Mode::Duo, Mode::Trio, Mode::Fours, Mode::Mega];

    /// Nominal roster size for the mode. Mega rosters hold at least this many players.
    pub fn team_size(self) -> usize {
        match self {
            Mode::Solo => 1,
            Mode::Duo => 2,
            Mode::Trio => 3,
            Mode::Fours => 4,
            Mode::Mega => 5,
        }
    }

    /// Derive the mode from the largest roster in a match
    pub fn from_team_size(size: usize) -> Option<Mode> {
        match size {
            0 => None,
            1 => Some(Mode::Solo),
            2 => Some(Mode::Duo),
            3 => Some(Mode::Trio),
            4 => Some(Mode::Fours),
            _ => Some(Mode::Mega),
        }
    }

    pub fn is_mega(self) -> bool {
        self == Mode::Mega
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Solo => write!(f, "Solo"),
            Mode::Duo => write!(f, "Duo"),
            Mode::Trio => write!(f, "Trio"),
            Mode::Fours => write!(f, "Fours"),
            Mode::Mega => write!(f, "Mega"),
        }
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "solo" | "solos" => Ok(Mode::Solo),
            "duo" | "duos" | "doubles" => Ok(Mode::Duo),
            "trio" | "trios" | "threes" => Ok(Mode::Trio),
            "fours" | "quads" => Ok(Mode::Fours),
            "mega" => Ok(Mode::Mega),
            other => Err(format!("unknown mode: {}", other)),
        }
    }
}

/// Raw combat counters. Embedded by value in per-match stats and cumulative stats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatStats {
    pub kills: u32,
    pub deaths: u32,
    pub bed_breaks: u32,
    pub final_kills: u32,
}

impl CombatStats {
    pub fn new(kills: u32, deaths: u32, bed_breaks: u32, final_kills: u32) -> Self {
        Self {
            kills,
            deaths,
            bed_breaks,
            final_kills,
        }
    }

    /// Kills per death, with deaths floored at one
    pub fn kd_ratio(&self) -> f64 {
        self.kills as f64 / self.deaths.max(1) as f64
    }

    /// Total number of recorded actions
    pub fn actions(&self) -> u64 {
        [self.kills, self.deaths, self.bed_breaks, self.final_kills]
            .iter()
            .map(|&count| u64::from(count))
            .sum()
    }

    pub fn accumulate(&mut self, other: &CombatStats) {
        self.kills = self.kills.saturating_add(other.kills);
        self.deaths = self.deaths.saturating_add(other.deaths);
        self.bed_breaks = self.bed_breaks.saturating_add(other.bed_breaks);
        self.final_kills = self.final_kills.saturating_add(other.final_kills);
    }
}

/// Cumulative per-mode statistics for a player
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailedStats {
    pub victories: u32,
    pub combat: CombatStats,
}

/// A team roster within a match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub name: String,
    pub players: Vec<PlayerId>,
}

impl Team {
    pub fn new(name: impl Into<String>, players: Vec<PlayerId>) -> Self {
        Self {
            name: name.into(),
            players,
        }
    }
}

/// A completed match as received from the match source
#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    pub id: MatchId,
    /// Mode reported by the source; the classifier derives its own
    pub declared_mode: Option<Mode>,
    pub timestamp: DateTime<Utc>,
    /// Winning team name, a tie marker, or an invalid marker
    pub winner: Option<String>,
    pub lobby: Option<String>,
    pub duration_seconds: Option<u64>,
    pub teams: Vec<Team>,
    pub stats: HashMap<PlayerId, CombatStats>,
}

impl Match {
    /// Iterate over every participant in roster order
    pub fn participants(&self) -> impl Iterator<Item = &PlayerId> {
        self.teams.iter().flat_map(|team| team.players.iter())
    }

    pub fn participant_count(&self) -> usize {
        self.teams.iter().map(|team| team.players.len()).sum()
    }

    /// Stats for a participant, zeroed if the record has none
    pub fn stats_for(&self, player_id: &str) -> CombatStats {
        self.stats.get(player_id).copied().unwrap_or_default()
    }

    /// Summed stats for one team
    pub fn team_totals(&self, team: &Team) -> CombatStats {
        let mut totals = CombatStats::default();
        for player in &team.players {
            totals.accumulate(&self.stats_for(player));
        }
        totals
    }
}

/// Result of a match from the rating engine's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchOutcome {
    /// Index into `Match::teams` of the winning team
    Winner(usize),
    Tie,
}

impl MatchOutcome {
    pub fn is_tie(&self) -> bool {
        matches!(self, MatchOutcome::Tie)
    }

    pub fn is_winner(&self, team_index: usize) -> bool {
        matches!(self, MatchOutcome::Winner(index) if *index == team_index)
    }
}

/// A match that passed classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedMatch {
    pub mode: Mode,
    pub outcome: MatchOutcome,
}

/// Performance of one player in one match
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceScore {
    /// Clamped composite score
    pub raw: f64,
    /// Raw score relative to the match average, clamped to the multiplier range
    pub normalized: f64,
}

impl Default for PerformanceScore {
    fn default() -> Self {
        Self {
            raw: 1.0,
            normalized: 1.0,
        }
    }
}

/// Rating change information for a player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingChange {
    pub player_id: PlayerId,
    pub delta: f64,
    pub raw_score: f64,
    pub normalized_score: f64,
}

/// Key of a rating pool entry
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RatingKey {
    pub player_id: PlayerId,
    pub mode: Mode,
}

impl RatingKey {
    pub fn new(player_id: impl Into<PlayerId>, mode: Mode) -> Self {
        Self {
            player_id: player_id.into(),
            mode,
        }
    }
}

/// Persistent rating state of a player in one mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerRatingState {
    pub player_id: PlayerId,
    pub mode: Mode,
    pub rating: f64,
    pub games_played: u64,
    pub raw_score_sum: f64,
    pub normalized_score_sum: f64,
    pub stats: DetailedStats,
    pub last_match_at: Option<DateTime<Utc>>,
}

impl PlayerRatingState {
    /// Create a fresh state seeded with the given rating
    pub fn new(player_id: impl Into<PlayerId>, mode: Mode, seed_rating: f64) -> Self {
        Self {
            player_id: player_id.into(),
            mode,
            rating: crate::utils::round_rating(seed_rating),
            games_played: 0,
            raw_score_sum: 0.0,
            normalized_score_sum: 0.0,
            stats: DetailedStats::default(),
            last_match_at: None,
        }
    }

    pub fn key(&self) -> RatingKey {
        RatingKey::new(self.player_id.clone(), self.mode)
    }

    pub fn win_rate(&self) -> f64 {
        if self.games_played == 0 {
            return 0.0;
        }
        self.stats.victories as f64 / self.games_played as f64
    }
}

/// Immutable record of one rating adjustment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingHistoryEntry {
    pub match_id: MatchId,
    pub mode: Mode,
    pub timestamp: DateTime<Utc>,
    pub rating_before: f64,
    pub rating_after: f64,
    pub won: bool,
    pub tie: bool,
}

/// Before/after ratings reported by a ledger apply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedRating {
    pub player_id: PlayerId,
    pub previous_rating: f64,
    pub new_rating: f64,
}
