//! Historical replay
//!
//! Rebuilds every rating from a match archive. The archive is sorted once by
//! (timestamp, id) and replayed front to back for the configured number of
//! passes. Each pass starts from an empty ledger; from the second pass on,
//! seeds are pulled toward the previous pass's final ratings. Modes are
//! separate rating pools, so a pass replays each mode on its own ledger,
//! optionally in parallel, and merges the results.

use crate::config::AppConfig;
use crate::metrics::MetricsCollector;
use crate::rating::classifier::MatchClassifier;
use crate::rating::index::ProcessedMatchIndex;
use crate::rating::processor::{ApplyOutcome, MatchProcessor, OrderingPolicy};
use crate::rating::seed::RatingSeeder;
use crate::rating::storage::{InMemoryRatingStorage, LedgerSnapshot, RatingStorage};
use crate::types::{Match, Mode, PlayerId};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

/// Counters for one replay pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PassSummary {
    pub pass: u32,
    pub applied: usize,
    pub duplicates: usize,
    pub invalid: usize,
    /// Invalid matches per rejection label
    pub rejections: BTreeMap<String, usize>,
    /// Applied matches per mode
    pub per_mode: BTreeMap<Mode, usize>,
}

/// Final ledger and index of a replay, plus per-pass counters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayOutput {
    pub ledger: LedgerSnapshot,
    pub index: ProcessedMatchIndex,
    pub passes: Vec<PassSummary>,
}

impl ReplayOutput {
    pub fn last_pass(&self) -> Option<&PassSummary> {
        self.passes.last()
    }
}

struct ModeResult {
    mode: Mode,
    ledger: LedgerSnapshot,
    index: ProcessedMatchIndex,
    applied: usize,
}

/// Drives a full rebuild of the ledger from an archive
pub struct ReplayDriver {
    config: AppConfig,
    legacy_players: Vec<PlayerId>,
    metrics: Option<Arc<MetricsCollector>>,
}

impl ReplayDriver {
    pub fn new(config: AppConfig) -> crate::error::Result<Self> {
        crate::config::validate_config(&config)?;

        Ok(Self {
            config,
            legacy_players: Vec::new(),
            metrics: None,
        })
    }

    pub fn with_legacy_players(mut self, players: impl IntoIterator<Item = PlayerId>) -> Self {
        self.legacy_players.extend(players);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Sort an archive into replay order
    pub fn sort_archive(matches: &mut [Match]) {
        matches.sort_by(|a, b| (a.timestamp, &a.id).cmp(&(b.timestamp, &b.id)));
    }

    /// Replay an archive for every configured pass
    pub fn run(&self, mut matches: Vec<Match>) -> crate::error::Result<ReplayOutput> {
        Self::sort_archive(&mut matches);

        let passes = self.config.replay.passes.max(1);
        info!(
            "🔁 Replaying {} matches over {} pass(es)",
            matches.len(),
            passes
        );

        let mut seeder = self.base_seeder();
        let mut summaries = Vec::with_capacity(passes as usize);
        let mut result = None;

        for pass in 1..=passes {
            let timer = self.metrics.as_ref().map(|m| m.start_timer());

            let (ledger, index, summary) = self.run_pass(pass, &matches, &seeder)?;

            if let (Some(metrics), Some(timer)) = (&self.metrics, timer) {
                metrics.record_replay_pass(timer.stop());
            }
            info!(
                "Pass {}: {} applied, {} invalid, {} duplicates, {} rated players",
                pass,
                summary.applied,
                summary.invalid,
                summary.duplicates,
                ledger.states.len()
            );

            seeder = self
                .base_seeder()
                .with_carryover(&ledger.states, self.config.replay.carryover_weight);
            summaries.push(summary);
            result = Some((ledger, index));
        }

        let (ledger, index) = result.unwrap_or_default();

        if let Some(metrics) = &self.metrics {
            for mode in Mode::ALL {
                let count = ledger.states.iter().filter(|s| s.mode == mode).count();
                metrics.set_rated_players(mode, count);
            }
        }

        Ok(ReplayOutput {
            ledger,
            index,
            passes: summaries,
        })
    }

    fn base_seeder(&self) -> RatingSeeder {
        RatingSeeder::new(&self.config.rating)
            .with_legacy_players(self.legacy_players.iter().cloned())
    }

    fn run_pass(
        &self,
        pass: u32,
        matches: &[Match],
        seeder: &RatingSeeder,
    ) -> crate::error::Result<(LedgerSnapshot, ProcessedMatchIndex, PassSummary)> {
        let classifier = MatchClassifier::new(self.config.classifier.clone());
        let mut summary = PassSummary {
            pass,
            ..PassSummary::default()
        };

        // Mirror the live guard: duplicates are checked before classification,
        // and only valid matches claim their id.
        let mut seen: HashSet<&str> = HashSet::new();
        let mut groups: BTreeMap<Mode, Vec<&Match>> = BTreeMap::new();
        for record in matches {
            if seen.contains(record.id.as_str()) {
                summary.duplicates += 1;
                continue;
            }
            match classifier.classify(record) {
                Ok(classified) => {
                    seen.insert(record.id.as_str());
                    groups.entry(classified.mode).or_default().push(record);
                }
                Err(reason) => {
                    debug!("Pass {}: match {} rejected: {}", pass, record.id, reason);
                    summary.invalid += 1;
                    *summary.rejections.entry(reason.label().to_string()).or_default() += 1;
                }
            }
        }

        let results: Vec<ModeResult> = if self.config.replay.parallel_modes {
            groups
                .into_par_iter()
                .map(|(mode, records)| self.replay_mode(mode, &records, seeder))
                .collect::<crate::error::Result<Vec<_>>>()?
        } else {
            groups
                .into_iter()
                .map(|(mode, records)| self.replay_mode(mode, &records, seeder))
                .collect::<crate::error::Result<Vec<_>>>()?
        };

        let mut index = ProcessedMatchIndex::new();
        let mut ledgers = Vec::with_capacity(results.len());
        for result in results {
            summary.applied += result.applied;
            summary.per_mode.insert(result.mode, result.applied);
            index.merge(result.index);
            ledgers.push(result.ledger);
        }

        Ok((LedgerSnapshot::merge(ledgers), index, summary))
    }

    fn replay_mode(
        &self,
        mode: Mode,
        records: &[&Match],
        seeder: &RatingSeeder,
    ) -> crate::error::Result<ModeResult> {
        let storage = Arc::new(InMemoryRatingStorage::new());
        let mut processor = MatchProcessor::new(self.config.clone(), storage.clone())?
            .with_seeder(seeder.clone())
            .with_policy(OrderingPolicy::Ignore);
        if let Some(metrics) = &self.metrics {
            processor = processor.with_metrics(metrics.clone());
        }

        let mut applied = 0;
        for record in records {
            if let ApplyOutcome::Applied(_) = processor.process(record)? {
                applied += 1;
            }
        }

        debug!("Replayed {} {} matches", applied, mode);

        Ok(ModeResult {
            mode,
            ledger: storage.snapshot()?,
            index: processor.index_snapshot()?,
            applied,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CombatStats, Team};
    use chrono::{TimeZone, Utc};
    use std::collections::HashMap;

    fn create_duo_match(id: &str, seconds: i64, players: [&str; 4], winner: &str) -> Match {
        let mut stats = HashMap::new();
        for (i, player) in players.iter().enumerate() {
            stats.insert(
                player.to_string(),
                CombatStats::new(2 + i as u32, 2, (i % 2) as u32, 1),
            );
        }

        Match {
            id: id.to_string(),
            declared_mode: None,
            timestamp: Utc.timestamp_opt(seconds, 0).unwrap(),
            winner: Some(winner.to_string()),
            lobby: Some("mini3".to_string()),
            duration_seconds: Some(700),
            teams: vec![
                Team::new("Red", vec![players[0].to_string(), players[1].to_string()]),
                Team::new("Blue", vec![players[2].to_string(), players[3].to_string()]),
            ],
            stats,
        }
    }

    fn create_solo_match(id: &str, seconds: i64, players: [&str; 2], winner: &str) -> Match {
        let mut stats = HashMap::new();
        stats.insert(players[0].to_string(), CombatStats::new(3, 1, 1, 1));
        stats.insert(players[1].to_string(), CombatStats::new(1, 3, 1, 0));

        Match {
            id: id.to_string(),
            declared_mode: None,
            timestamp: Utc.timestamp_opt(seconds, 0).unwrap(),
            winner: Some(winner.to_string()),
            lobby: Some("solo7".to_string()),
            duration_seconds: Some(400),
            teams: vec![
                Team::new("Red", vec![players[0].to_string()]),
                Team::new("Blue", vec![players[1].to_string()]),
            ],
            stats,
        }
    }

    fn create_archive() -> Vec<Match> {
        vec![
            create_duo_match("d2", 2000, ["a", "b", "c", "d"], "Blue"),
            create_solo_match("s1", 1500, ["a", "c"], "Red"),
            create_duo_match("d1", 1000, ["a", "b", "c", "d"], "Red"),
            create_duo_match("d3", 3000, ["a", "c", "b", "d"], "Red"),
            create_solo_match("s2", 2500, ["b", "d"], "Blue"),
        ]
    }

    fn config(passes: u32, parallel: bool) -> AppConfig {
        let mut config = AppConfig::default();
        config.replay.passes = passes;
        config.replay.parallel_modes = parallel;
        config
    }

    #[test]
    fn test_sort_archive() {
        let mut archive = create_archive();
        archive.push(create_solo_match("s0", 1000, ["x", "y"], "Red"));
        ReplayDriver::sort_archive(&mut archive);

        let ids: Vec<&str> = archive.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["d1", "s0", "s1", "d2", "s2", "d3"]);
    }

    #[test]
    fn test_single_pass_replay() {
        let driver = ReplayDriver::new(config(1, false)).unwrap();
        let output = driver.run(create_archive()).unwrap();

        let summary = output.last_pass().unwrap();
        assert_eq!(summary.applied, 5);
        assert_eq!(summary.per_mode[&Mode::Duo], 3);
        assert_eq!(summary.per_mode[&Mode::Solo], 2);
        assert_eq!(output.index.len(), 5);
        assert_eq!(output.index.latest_for(Mode::Duo), Some(Utc.timestamp_opt(3000, 0).unwrap()));

        let a_duo = output.ledger.state("a", Mode::Duo).unwrap();
        assert_eq!(a_duo.games_played, 3);
        assert_eq!(output.ledger.state("a", Mode::Solo).unwrap().games_played, 1);
    }

    #[test]
    fn test_duplicates_and_invalid_are_counted() {
        let mut archive = create_archive();
        archive.push(create_duo_match("d1", 4000, ["a", "b", "c", "d"], "Blue"));
        let mut staff = create_solo_match("s9", 5000, ["a", "b"], "Red");
        staff.lobby = Some("Staff-1".to_string());
        archive.push(staff);

        let driver = ReplayDriver::new(config(1, true)).unwrap();
        let output = driver.run(archive).unwrap();

        let summary = output.last_pass().unwrap();
        assert_eq!(summary.applied, 5);
        assert_eq!(summary.duplicates, 1);
        assert_eq!(summary.invalid, 1);
        assert_eq!(summary.rejections["blocked_lobby"], 1);
    }

    #[test]
    fn test_parallel_equals_sequential() {
        let sequential = ReplayDriver::new(config(2, false))
            .unwrap()
            .run(create_archive())
            .unwrap();
        let parallel = ReplayDriver::new(config(2, true))
            .unwrap()
            .run(create_archive())
            .unwrap();

        assert_eq!(sequential, parallel);
    }

    #[test]
    fn test_second_pass_starts_from_carryover() {
        let output = ReplayDriver::new(config(2, false))
            .unwrap()
            .run(create_archive())
            .unwrap();

        assert_eq!(output.passes.len(), 2);
        let first_match = output
            .ledger
            .history
            .iter()
            .find(|h| h.player_id == "a" && h.mode == Mode::Solo)
            .unwrap();
        // Pass two seeds "a" above the default after winning its solo game
        assert!(first_match.entries[0].rating_before > 1200.0);
    }
}
