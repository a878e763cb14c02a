//! Test fixtures and match builders for integration testing

#![allow(dead_code)]

use bedwars_rating::types::{CombatStats, Match, Mode, Team};
use chrono::{TimeZone, Utc};
use std::collections::HashMap;

/// Builder for match records with sensible valid defaults
#[derive(Debug, Clone)]
pub struct MatchBuilder {
    record: Match,
}

impl MatchBuilder {
    pub fn new(id: &str, seconds: i64) -> Self {
        Self {
            record: Match {
                id: id.to_string(),
                declared_mode: None,
                timestamp: Utc.timestamp_opt(seconds, 0).unwrap(),
                winner: None,
                lobby: Some("mini1".to_string()),
                duration_seconds: Some(900),
                teams: Vec::new(),
                stats: HashMap::new(),
            },
        }
    }

    /// Add a team; every player gets the given stats
    pub fn team(mut self, name: &str, players: &[(&str, CombatStats)]) -> Self {
        for (player, stats) in players {
            self.record.stats.insert(player.to_string(), *stats);
        }
        self.record.teams.push(Team::new(
            name,
            players.iter().map(|(p, _)| p.to_string()).collect(),
        ));
        self
    }

    pub fn winner(mut self, winner: &str) -> Self {
        self.record.winner = Some(winner.to_string());
        self
    }

    pub fn lobby(mut self, lobby: &str) -> Self {
        self.record.lobby = Some(lobby.to_string());
        self
    }

    pub fn duration(mut self, seconds: u64) -> Self {
        self.record.duration_seconds = Some(seconds);
        self
    }

    pub fn declared(mut self, mode: Mode) -> Self {
        self.record.declared_mode = Some(mode);
        self
    }

    pub fn build(self) -> Match {
        self.record
    }
}

/// Solid stats that never trip the disconnect check
pub fn stats(kills: u32, deaths: u32, bed_breaks: u32, final_kills: u32) -> CombatStats {
    CombatStats::new(kills, deaths, bed_breaks, final_kills)
}

/// Two-team duo match between fixed rosters
pub fn duo_match(id: &str, seconds: i64, winner: &str) -> Match {
    MatchBuilder::new(id, seconds)
        .team(
            "Red",
            &[("red_1", stats(5, 2, 1, 2)), ("red_2", stats(3, 3, 0, 1))],
        )
        .team(
            "Yellow",
            &[("yellow_1", stats(2, 3, 1, 1)), ("yellow_2", stats(1, 4, 0, 0))],
        )
        .winner(winner)
        .declared(Mode::Duo)
        .build()
}

/// Deterministic archive across several modes and a rotating player pool
///
/// Some entries are deliberately invalid (staff lobby, too short) or repeat an
/// earlier id.
pub fn generate_archive(count: usize) -> Vec<Match> {
    let pool: Vec<String> = (0..24).map(|i| format!("player_{:02}", i)).collect();
    let team_names = ["Red", "Blue", "Green", "Yellow"];
    let mut archive = Vec::with_capacity(count);

    for i in 0..count {
        let team_size = 1 + i % 4;
        let team_count = 2 + (i / 4) % 3;
        let offset = (i * 7) % pool.len();

        let mut builder = MatchBuilder::new(&format!("match_{:05}", i), 10_000 + (i as i64) * 60);
        let mut cursor = offset;
        for (t, team_name) in team_names.iter().take(team_count).enumerate() {
            let players: Vec<(&str, CombatStats)> = (0..team_size)
                .map(|p| {
                    let player = pool[cursor % pool.len()].as_str();
                    cursor += 1;
                    let k = ((i + t * 3 + p * 5) % 9) as u32;
                    (player, stats(k, 1 + (k + 2) % 5, ((i + t) % 2) as u32 + 1, k / 3))
                })
                .collect();
            builder = builder.team(team_name, &players);
        }

        let winner = if i % 17 == 0 {
            "tie".to_string()
        } else {
            team_names[(i / 3) % team_count].to_string()
        };
        builder = builder.winner(&winner);

        if i % 13 == 5 {
            builder = builder.lobby("test-server");
        }
        if i % 19 == 7 {
            builder = builder.duration(45);
        }

        archive.push(builder.build());
    }

    // Replayed duplicates of early ids
    if count > 10 {
        let mut duplicate = archive[3].clone();
        duplicate.timestamp = archive[count - 1].timestamp;
        archive.push(duplicate);
    }

    archive
}
