//! Incremental match application
//!
//! [`MatchProcessor`] runs one match through the whole pipeline: duplicate
//! check, classification, ordering check, performance scoring, rating deltas
//! and the ledger apply. The processed-match index lock is held from the
//! duplicate check until the match is recorded, so exactly one writer is in
//! flight at a time.

use crate::config::AppConfig;
use crate::error::RatingError;
use crate::metrics::MetricsCollector;
use crate::rating::calculator::{PlayerRatingInput, RatingCalculator, TeamRatingInput};
use crate::rating::classifier::{InvalidReason, MatchClassifier};
use crate::rating::elo::MultiTeamEloCalculator;
use crate::rating::index::ProcessedMatchIndex;
use crate::rating::performance::PerformanceScorer;
use crate::rating::seed::RatingSeeder;
use crate::rating::storage::{LedgerEntry, LedgerUpdate, RatingStorage};
use crate::types::{
    AppliedRating, Match, MatchId, MatchOutcome, Mode, PlayerRatingState, RatingChange, RatingKey,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// Whether a match older than the latest applied one in its mode is refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderingPolicy {
    /// Live ingestion: timestamps must move forward per mode
    Enforce,
    /// Replay: the caller has already sorted the archive
    Ignore,
}

/// Everything that happened to the ledger for one applied match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchReport {
    pub match_id: MatchId,
    pub mode: Mode,
    pub outcome: MatchOutcome,
    pub changes: Vec<RatingChange>,
    pub applied: Vec<AppliedRating>,
    /// Residual removed by the zero-sum correction
    pub correction: f64,
}

/// Result of submitting a match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ApplyOutcome {
    Applied(MatchReport),
    AlreadyApplied,
    OutOfOrder {
        latest: DateTime<Utc>,
        received: DateTime<Utc>,
    },
    Invalid(InvalidReason),
}

impl ApplyOutcome {
    /// Short label used for metrics and logs
    pub fn label(&self) -> &'static str {
        match self {
            ApplyOutcome::Applied(_) => "applied",
            ApplyOutcome::AlreadyApplied => "already_applied",
            ApplyOutcome::OutOfOrder { .. } => "out_of_order",
            ApplyOutcome::Invalid(_) => "invalid",
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, ApplyOutcome::Applied(_))
    }

    pub fn report(&self) -> Option<&MatchReport> {
        match self {
            ApplyOutcome::Applied(report) => Some(report),
            _ => None,
        }
    }
}

/// Applies matches to a rating ledger exactly once and in order
pub struct MatchProcessor {
    config: AppConfig,
    classifier: MatchClassifier,
    scorer: PerformanceScorer,
    calculator: Arc<dyn RatingCalculator>,
    storage: Arc<dyn RatingStorage>,
    seeder: RatingSeeder,
    index: Mutex<ProcessedMatchIndex>,
    policy: OrderingPolicy,
    metrics: Option<Arc<MetricsCollector>>,
}

impl MatchProcessor {
    /// Create a processor with the Elo engine and an empty index
    pub fn new(config: AppConfig, storage: Arc<dyn RatingStorage>) -> crate::error::Result<Self> {
        crate::config::validate_config(&config)?;

        let calculator = Arc::new(MultiTeamEloCalculator::new(config.rating.clone())?);

        Ok(Self {
            classifier: MatchClassifier::new(config.classifier.clone()),
            scorer: PerformanceScorer::new(config.performance.clone()),
            seeder: RatingSeeder::new(&config.rating),
            calculator,
            storage,
            index: Mutex::new(ProcessedMatchIndex::new()),
            policy: OrderingPolicy::Enforce,
            metrics: None,
            config,
        })
    }

    pub fn with_index(mut self, index: ProcessedMatchIndex) -> Self {
        self.index = Mutex::new(index);
        self
    }

    pub fn with_seeder(mut self, seeder: RatingSeeder) -> Self {
        self.seeder = seeder;
        self
    }

    pub fn with_policy(mut self, policy: OrderingPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn storage(&self) -> Arc<dyn RatingStorage> {
        self.storage.clone()
    }

    fn lock_index(&self) -> crate::error::Result<MutexGuard<'_, ProcessedMatchIndex>> {
        self.index.lock().map_err(|_| {
            RatingError::InternalError {
                message: "Failed to acquire processed match index lock".to_string(),
            }
            .into()
        })
    }

    /// Copy of the processed-match index
    pub fn index_snapshot(&self) -> crate::error::Result<ProcessedMatchIndex> {
        Ok(self.lock_index()?.clone())
    }

    /// Current state of a player in a mode
    pub fn state(
        &self,
        player_id: &str,
        mode: Mode,
    ) -> crate::error::Result<Option<PlayerRatingState>> {
        self.storage.get_state(&RatingKey::new(player_id, mode))
    }

    /// Submit one match
    ///
    /// Rejections come back as [`ApplyOutcome`] values. An error means the
    /// ledger could not be updated; the match is then not recorded and can be
    /// submitted again.
    pub fn process(&self, record: &Match) -> crate::error::Result<ApplyOutcome> {
        let mut index = self.lock_index()?;

        let outcome = self.process_locked(&mut index, record);
        if let (Some(metrics), Ok(outcome)) = (&self.metrics, &outcome) {
            metrics.record_outcome(outcome.label());
        }
        outcome
    }

    fn process_locked(
        &self,
        index: &mut ProcessedMatchIndex,
        record: &Match,
    ) -> crate::error::Result<ApplyOutcome> {
        if index.contains(&record.id) {
            debug!("Match {} already applied, skipping", record.id);
            return Ok(ApplyOutcome::AlreadyApplied);
        }

        let classified = match self.classifier.classify(record) {
            Ok(classified) => classified,
            Err(reason) => {
                debug!("Match {} rejected: {}", record.id, reason);
                if let Some(metrics) = &self.metrics {
                    metrics.record_rejection(reason.label());
                }
                return Ok(ApplyOutcome::Invalid(reason));
            }
        };

        if self.policy == OrderingPolicy::Enforce {
            if let Some(latest) = index.latest_for(classified.mode) {
                if index.is_out_of_order(
                    classified.mode,
                    record.timestamp,
                    self.config.rating.allow_equal_timestamps,
                ) {
                    warn!(
                        "Match {} at {} is not after the latest {} match at {}",
                        record.id, record.timestamp, classified.mode, latest
                    );
                    return Ok(ApplyOutcome::OutOfOrder {
                        latest,
                        received: record.timestamp,
                    });
                }
            }
        }

        let timer = self.metrics.as_ref().map(|m| m.start_timer());

        let scores = self.scorer.score(record, &classified);

        let keys: Vec<RatingKey> = record
            .participants()
            .map(|p| RatingKey::new(p.clone(), classified.mode))
            .collect();
        let states = self.storage.get_states(&keys)?;

        let teams: Vec<TeamRatingInput> = record
            .teams
            .iter()
            .map(|team| TeamRatingInput {
                name: team.name.clone(),
                players: team
                    .players
                    .iter()
                    .map(|player| PlayerRatingInput {
                        player_id: player.clone(),
                        rating: states
                            .get(&RatingKey::new(player.clone(), classified.mode))
                            .map(|s| s.rating)
                            .unwrap_or_else(|| self.seeder.seed_for(player, classified.mode)),
                        performance: scores.get(player).copied().unwrap_or_default(),
                    })
                    .collect(),
            })
            .collect();

        let result = self.calculator.compute_deltas(
            &teams,
            classified.outcome,
            self.config.rating.k_factor_for(classified.mode),
        )?;

        if let (Some(metrics), Some(timer)) = (&self.metrics, timer) {
            metrics.record_rating_calculation(timer.stop(), result.correction != 0.0);
        }

        let mut entries = Vec::with_capacity(result.changes.len());
        for (team_index, team) in record.teams.iter().enumerate() {
            for player in &team.players {
                let change = result.change_for(player).cloned().ok_or_else(|| {
                    RatingError::InternalError {
                        message: format!("No rating change computed for {}", player),
                    }
                })?;
                entries.push(LedgerEntry {
                    player_id: player.clone(),
                    seed_rating: self.seeder.seed_for(player, classified.mode),
                    change,
                    stats: record.stats_for(player),
                    won: classified.outcome.is_winner(team_index),
                });
            }
        }

        let update = LedgerUpdate {
            match_id: record.id.clone(),
            mode: classified.mode,
            timestamp: record.timestamp,
            tie: classified.outcome.is_tie(),
            entries,
        };

        let applied = match self.storage.apply_match(&update) {
            Ok(applied) => applied,
            Err(e) => {
                warn!("Failed to apply match {}: {}", record.id, e);
                if let Some(metrics) = &self.metrics {
                    metrics.record_storage_failure();
                }
                return Err(e);
            }
        };

        index.record(record.id.clone(), classified.mode, record.timestamp);

        if let Some(metrics) = &self.metrics {
            metrics.record_applied(classified.mode, result.changes.iter().map(|c| c.delta));
        }

        info!(
            "Applied {} match {} ({} players, correction {:.6})",
            classified.mode,
            record.id,
            applied.len(),
            result.correction
        );

        Ok(ApplyOutcome::Applied(MatchReport {
            match_id: record.id.clone(),
            mode: classified.mode,
            outcome: classified.outcome,
            changes: result.changes,
            applied,
            correction: result.correction,
        }))
    }

    /// Drop the history entries of a match
    ///
    /// Later ratings are not recomputed and the match stays in the index, so
    /// it cannot be applied a second time.
    pub fn purge_match_history(&self, match_id: &str) -> crate::error::Result<usize> {
        let _index = self.lock_index()?;
        let removed = self.storage.remove_match_history(match_id)?;
        info!("Removed {} history entries of match {}", removed, match_id);
        Ok(removed)
    }
}
