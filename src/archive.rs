//! Match archive and rating state files
//!
//! Match records arrive as JSON, either as one array or as one record per
//! line. Field names are snake_case; the camelCase names used by the game
//! server's exports are accepted as aliases. Everything except the id and the
//! timestamp is optional: absent values end up empty and the classifier turns
//! them into rejections.

use crate::error::RatingError;
use crate::rating::index::ProcessedMatchIndex;
use crate::rating::storage::LedgerSnapshot;
use crate::types::{CombatStats, Match, Mode, PlayerId, Team};
use anyhow::Context;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use tracing::{debug, info, warn};

/// Event time as either epoch milliseconds or an RFC 3339 string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordTimestamp {
    Millis(i64),
    Text(DateTime<Utc>),
}

impl RecordTimestamp {
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            RecordTimestamp::Millis(millis) => Utc.timestamp_millis_opt(*millis).single(),
            RecordTimestamp::Text(datetime) => Some(*datetime),
        }
    }
}

/// Per-player stats as exported
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsRecord {
    pub kills: u32,
    pub deaths: u32,
    #[serde(alias = "bedBreaks", alias = "beds_broken", alias = "bedsBroken")]
    pub bed_breaks: u32,
    #[serde(alias = "finalKills")]
    pub final_kills: u32,
}

impl From<StatsRecord> for CombatStats {
    fn from(record: StatsRecord) -> Self {
        CombatStats::new(record.kills, record.deaths, record.bed_breaks, record.final_kills)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TeamRecord {
    pub name: String,
    pub players: Vec<PlayerId>,
}

/// One completed match as exported by the game server
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchRecord {
    #[serde(alias = "matchId", alias = "match_id")]
    pub id: Option<String>,
    #[serde(alias = "gameMode")]
    pub mode: Option<String>,
    #[serde(alias = "endedAt", alias = "time")]
    pub timestamp: Option<RecordTimestamp>,
    pub winner: Option<String>,
    #[serde(alias = "lobbyId", alias = "lobby_id")]
    pub lobby: Option<String>,
    #[serde(alias = "durationSeconds", alias = "duration")]
    pub duration_seconds: Option<u64>,
    pub teams: Vec<TeamRecord>,
    #[serde(alias = "playerStats", alias = "player_stats")]
    pub stats: HashMap<PlayerId, StatsRecord>,
}

impl TryFrom<MatchRecord> for Match {
    type Error = RatingError;

    fn try_from(record: MatchRecord) -> Result<Self, Self::Error> {
        let id = record
            .id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| RatingError::ArchiveError {
                message: "Match record has no id".to_string(),
            })?;

        let timestamp = record
            .timestamp
            .as_ref()
            .and_then(RecordTimestamp::to_datetime)
            .ok_or_else(|| RatingError::ArchiveError {
                message: format!("Match {} has no usable timestamp", id),
            })?;

        let declared_mode = record.mode.as_deref().and_then(|mode| match mode.parse::<Mode>() {
            Ok(mode) => Some(mode),
            Err(e) => {
                debug!("Match {}: ignoring declared mode: {}", id, e);
                None
            }
        });

        Ok(Match {
            id,
            declared_mode,
            timestamp,
            winner: record.winner,
            lobby: record.lobby,
            duration_seconds: record.duration_seconds,
            teams: record
                .teams
                .into_iter()
                .map(|team| Team::new(team.name, team.players))
                .collect(),
            stats: record
                .stats
                .into_iter()
                .map(|(player, stats)| (player, stats.into()))
                .collect(),
        })
    }
}

/// Parse match records from JSON text
///
/// Accepts a JSON array or one record per line. Records that do not decode,
/// or lack an id or timestamp, are skipped with a warning.
pub fn parse_archive(contents: &str) -> crate::error::Result<Vec<Match>> {
    let trimmed = contents.trim_start();
    let values: Vec<(usize, serde_json::Value)> = if trimmed.starts_with('[') {
        let values: Vec<serde_json::Value> =
            serde_json::from_str(trimmed).context("Failed to parse match archive")?;
        values.into_iter().enumerate().collect()
    } else {
        trimmed
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .filter_map(|(i, line)| match serde_json::from_str(line) {
                Ok(value) => Some((i, value)),
                Err(e) => {
                    warn!("Skipping malformed line {}: {}", i + 1, e);
                    None
                }
            })
            .collect()
    };

    let total = values.len();
    let mut matches = Vec::with_capacity(total);
    for (position, value) in values {
        let record = match serde_json::from_value::<MatchRecord>(value) {
            Ok(record) => record,
            Err(e) => {
                warn!("Skipping match record {}: {}", position + 1, e);
                continue;
            }
        };
        match Match::try_from(record) {
            Ok(m) => matches.push(m),
            Err(e) => warn!("Skipping match record: {}", e),
        }
    }

    if matches.len() < total {
        warn!("Skipped {} of {} match records", total - matches.len(), total);
    }

    Ok(matches)
}

/// Load a match archive from disk
pub fn load_archive(path: &Path) -> crate::error::Result<Vec<Match>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read match archive {}", path.display()))?;
    let matches = parse_archive(&contents)?;
    info!("Loaded {} matches from {}", matches.len(), path.display());
    Ok(matches)
}

/// Display names and the legacy top-player set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerDirectory {
    pub names: BTreeMap<PlayerId, String>,
    #[serde(alias = "legacyPlayers")]
    pub legacy_players: BTreeSet<PlayerId>,
}

impl PlayerDirectory {
    pub fn load(path: &Path) -> crate::error::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read player directory {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse player directory {}", path.display()))
    }

    /// Display name, falling back to the id
    pub fn display_name<'a>(&'a self, player_id: &'a str) -> &'a str {
        self.names
            .get(player_id)
            .map(String::as_str)
            .unwrap_or(player_id)
    }
}

/// Persisted rating state: ledger plus the processed-match index
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    #[serde(flatten)]
    pub ledger: LedgerSnapshot,
    #[serde(default)]
    pub index: ProcessedMatchIndex,
}

impl StateSnapshot {
    pub fn load(path: &Path) -> crate::error::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read rating state {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse rating state {}", path.display()))
    }

    /// Load a state file, or start empty if it does not exist yet
    pub fn load_or_default(path: &Path) -> crate::error::Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            info!("No rating state at {}, starting empty", path.display());
            Ok(Self::default())
        }
    }

    /// Write the state through a temporary file so a crash never leaves a torn file
    pub fn save(&self, path: &Path) -> crate::error::Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize rating state")?;

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)
            .with_context(|| format!("Failed to write rating state {}", tmp.display()))?;
        std::fs::rename(&tmp, path)
            .with_context(|| format!("Failed to replace rating state {}", path.display()))?;

        debug!(
            "Saved {} states and {} processed matches to {}",
            self.ledger.states.len(),
            self.index.len(),
            path.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CAMEL_CASE_RECORD: &str = r#"{
        "matchId": "g-100",
        "gameMode": "doubles",
        "endedAt": 1700000000000,
        "winner": "Red",
        "lobbyId": "mini4",
        "durationSeconds": 812,
        "teams": [
            {"name": "Red", "players": ["a", "b"]},
            {"name": "Blue", "players": ["c", "d"]}
        ],
        "playerStats": {
            "a": {"kills": 4, "deaths": 1, "bedBreaks": 1, "finalKills": 2},
            "b": {"kills": 1, "deaths": 2},
            "c": {"kills": 2, "deaths": 3, "bedBreaks": 1},
            "d": {"kills": 0, "deaths": 4}
        }
    }"#;

    #[test]
    fn test_camel_case_record() {
        let record: MatchRecord = serde_json::from_str(CAMEL_CASE_RECORD).unwrap();
        let m = Match::try_from(record).unwrap();

        assert_eq!(m.id, "g-100");
        assert_eq!(m.declared_mode, Some(Mode::Duo));
        assert_eq!(m.timestamp, Utc.timestamp_opt(1_700_000_000, 0).unwrap());
        assert_eq!(m.duration_seconds, Some(812));
        assert_eq!(m.teams.len(), 2);
        assert_eq!(m.stats_for("a"), CombatStats::new(4, 1, 1, 2));
        assert_eq!(m.stats_for("b").bed_breaks, 0);
    }

    #[test]
    fn test_missing_fields_become_empty() {
        let record: MatchRecord =
            serde_json::from_str(r#"{"id": "m1", "timestamp": "2024-03-01T12:00:00Z"}"#).unwrap();
        let m = Match::try_from(record).unwrap();

        assert!(m.winner.is_none());
        assert!(m.lobby.is_none());
        assert!(m.teams.is_empty());
        assert!(m.declared_mode.is_none());
    }

    #[test]
    fn test_record_without_id_or_timestamp_is_rejected() {
        let no_id: MatchRecord = serde_json::from_str(r#"{"timestamp": 1000}"#).unwrap();
        assert!(Match::try_from(no_id).is_err());

        let no_time: MatchRecord = serde_json::from_str(r#"{"id": "m1"}"#).unwrap();
        assert!(Match::try_from(no_time).is_err());
    }

    #[test]
    fn test_parse_json_lines_and_array() {
        let lines = format!(
            "{}\n\n{}\n",
            r#"{"id": "m1", "timestamp": 1000}"#, r#"{"id": "m2", "timestamp": 2000}"#
        );
        assert_eq!(parse_archive(&lines).unwrap().len(), 2);

        let array = r#"[{"id": "m1", "timestamp": 1000}, {"timestamp": 5}]"#;
        let matches = parse_archive(array).unwrap();
        assert_eq!(matches.len(), 1);

        assert!(parse_archive("[{not json").is_err());
        assert!(parse_archive("{not json").unwrap().is_empty());
    }

    #[test]
    fn test_badly_typed_record_is_skipped() {
        let lines = [
            r#"{"id": "m1", "timestamp": 1000}"#,
            r#"{"id": "m2", "timestamp": 2000, "stats": {"a": {"kills": -1}}}"#,
            r#"{"id": "m3", "timestamp": 3000, "teams": "Red"}"#,
            r#"{"id": "m4", "timestamp": 4000}"#,
        ]
        .join("\n");
        let ids: Vec<String> = parse_archive(&lines)
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, vec!["m1", "m4"]);

        let array = r#"[
            {"id": "m1", "timestamp": 1000},
            {"id": "m2", "timestamp": 2000, "stats": {"a": {"deaths": "three"}}},
            {"id": "m3", "timestamp": 3000}
        ]"#;
        assert_eq!(parse_archive(array).unwrap().len(), 2);
    }

    #[test]
    fn test_player_directory() {
        let directory: PlayerDirectory =
            serde_json::from_str(r#"{"names": {"a": "Alice"}, "legacyPlayers": ["a"]}"#).unwrap();

        assert_eq!(directory.display_name("a"), "Alice");
        assert_eq!(directory.display_name("zed"), "zed");
        assert!(directory.legacy_players.contains("a"));
    }

    #[test]
    fn test_state_snapshot_save_and_load() {
        let dir = std::env::temp_dir().join(format!("bedwars-rating-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("state.json");

        let mut snapshot = StateSnapshot::default();
        snapshot
            .ledger
            .states
            .push(crate::types::PlayerRatingState::new("a", Mode::Solo, 1200.0));
        snapshot
            .index
            .record("m1", Mode::Solo, Utc.timestamp_opt(1000, 0).unwrap());

        snapshot.save(&path).unwrap();
        let loaded = StateSnapshot::load(&path).unwrap();
        assert_eq!(loaded, snapshot);

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert!(json.get("states").is_some());
        assert!(json.get("history").is_some());
        assert!(json.get("index").is_some());

        assert_eq!(
            StateSnapshot::load_or_default(&dir.join("missing.json")).unwrap(),
            StateSnapshot::default()
        );
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
