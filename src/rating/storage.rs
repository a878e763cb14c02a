//! Rating ledger interface and implementations
//!
//! The ledger holds per-player, per-mode rating state and rating history. A
//! match is applied as one unit: every participant's new state is staged first
//! and committed under a single write lock, so readers never observe a
//! half-applied match.

use crate::error::RatingError;
use crate::types::{
    AppliedRating, CombatStats, MatchId, Mode, PlayerId, PlayerRatingState, RatingChange,
    RatingHistoryEntry, RatingKey,
};
use crate::utils::round_rating;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

/// One player's part of a ledger update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub player_id: PlayerId,
    /// Rating used if the player has no state in this mode yet
    pub seed_rating: f64,
    pub change: RatingChange,
    pub stats: CombatStats,
    pub won: bool,
}

/// All rating changes produced by one match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerUpdate {
    pub match_id: MatchId,
    pub mode: Mode,
    pub timestamp: DateTime<Utc>,
    pub tie: bool,
    pub entries: Vec<LedgerEntry>,
}

/// Rating history of one player in one mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerHistory {
    pub player_id: PlayerId,
    pub mode: Mode,
    pub entries: Vec<RatingHistoryEntry>,
}

/// Serializable copy of the whole ledger
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub states: Vec<PlayerRatingState>,
    pub history: Vec<PlayerHistory>,
}

impl LedgerSnapshot {
    /// Combine snapshots of disjoint rating pools
    pub fn merge(snapshots: impl IntoIterator<Item = LedgerSnapshot>) -> Self {
        let mut merged = LedgerSnapshot::default();
        for snapshot in snapshots {
            merged.states.extend(snapshot.states);
            merged.history.extend(snapshot.history);
        }
        merged.states.sort_by(|a, b| a.key().cmp(&b.key()));
        merged
            .history
            .sort_by(|a, b| (&a.player_id, a.mode).cmp(&(&b.player_id, b.mode)));
        merged
    }

    pub fn state(&self, player_id: &str, mode: Mode) -> Option<&PlayerRatingState> {
        self.states
            .iter()
            .find(|s| s.player_id == player_id && s.mode == mode)
    }
}

/// Trait for rating ledger operations
pub trait RatingStorage: Send + Sync {
    /// Get a player's state in one mode
    fn get_state(&self, key: &RatingKey) -> crate::error::Result<Option<PlayerRatingState>>;

    /// Get states for multiple players, from one consistent view
    fn get_states(
        &self,
        keys: &[RatingKey],
    ) -> crate::error::Result<HashMap<RatingKey, PlayerRatingState>>;

    /// Apply every change of a match atomically
    fn apply_match(&self, update: &LedgerUpdate) -> crate::error::Result<Vec<AppliedRating>>;

    /// Rating history of a player in one mode, oldest first
    fn get_history(&self, key: &RatingKey) -> crate::error::Result<Vec<RatingHistoryEntry>>;

    /// Remove every history entry tagged with a match id; ratings are left as they are
    fn remove_match_history(&self, match_id: &str) -> crate::error::Result<usize>;

    /// Get all states (for projections and persistence)
    fn get_all_states(&self) -> crate::error::Result<Vec<PlayerRatingState>>;

    /// Get total number of rated (player, mode) entries
    fn get_player_count(&self) -> crate::error::Result<usize>;

    /// Copy states and history from one consistent view
    fn snapshot(&self) -> crate::error::Result<LedgerSnapshot>;
}

#[derive(Debug, Default)]
struct LedgerData {
    states: HashMap<RatingKey, PlayerRatingState>,
    history: HashMap<RatingKey, Vec<RatingHistoryEntry>>,
}

impl LedgerData {
    /// Compute new states and history entries without touching the ledger
    fn stage(
        &self,
        update: &LedgerUpdate,
    ) -> crate::error::Result<Vec<(PlayerRatingState, RatingHistoryEntry)>> {
        if update.entries.is_empty() {
            return Err(RatingError::InvalidInput {
                reason: format!("Match {} has no rating changes", update.match_id),
            }
            .into());
        }

        let mut seen = HashSet::new();
        let mut staged = Vec::with_capacity(update.entries.len());

        for entry in &update.entries {
            if !seen.insert(entry.player_id.as_str()) {
                return Err(RatingError::InvalidInput {
                    reason: format!(
                        "Player {} appears twice in match {}",
                        entry.player_id, update.match_id
                    ),
                }
                .into());
            }
            if !entry.change.delta.is_finite() || !entry.seed_rating.is_finite() {
                return Err(RatingError::InvalidInput {
                    reason: format!(
                        "Non-finite rating change for {} in match {}",
                        entry.player_id, update.match_id
                    ),
                }
                .into());
            }

            let key = RatingKey::new(entry.player_id.clone(), update.mode);
            let mut state = self.states.get(&key).cloned().unwrap_or_else(|| {
                PlayerRatingState::new(entry.player_id.clone(), update.mode, entry.seed_rating)
            });

            let rating_before = state.rating;
            state.rating = round_rating(rating_before + entry.change.delta);
            state.games_played += 1;
            state.raw_score_sum += entry.change.raw_score;
            state.normalized_score_sum += entry.change.normalized_score;
            state.stats.combat.accumulate(&entry.stats);
            if entry.won {
                state.stats.victories += 1;
            }
            state.last_match_at = Some(update.timestamp);

            let history = RatingHistoryEntry {
                match_id: update.match_id.clone(),
                mode: update.mode,
                timestamp: update.timestamp,
                rating_before,
                rating_after: state.rating,
                won: entry.won,
                tie: update.tie,
            };

            staged.push((state, history));
        }

        Ok(staged)
    }

    fn commit(
        &mut self,
        staged: Vec<(PlayerRatingState, RatingHistoryEntry)>,
    ) -> Vec<AppliedRating> {
        staged
            .into_iter()
            .map(|(state, history)| {
                let key = state.key();
                let applied = AppliedRating {
                    player_id: state.player_id.clone(),
                    previous_rating: history.rating_before,
                    new_rating: state.rating,
                };
                self.history.entry(key.clone()).or_default().push(history);
                self.states.insert(key, state);
                applied
            })
            .collect()
    }

    fn snapshot(&self) -> LedgerSnapshot {
        let mut states: Vec<PlayerRatingState> = self.states.values().cloned().collect();
        states.sort_by(|a, b| a.key().cmp(&b.key()));

        let mut history: Vec<PlayerHistory> = self
            .history
            .iter()
            .map(|(key, entries)| PlayerHistory {
                player_id: key.player_id.clone(),
                mode: key.mode,
                entries: entries.clone(),
            })
            .collect();
        history.sort_by(|a, b| (&a.player_id, a.mode).cmp(&(&b.player_id, b.mode)));

        LedgerSnapshot { states, history }
    }
}

/// In-memory rating ledger
#[derive(Debug, Default)]
pub struct InMemoryRatingStorage {
    data: RwLock<LedgerData>,
}

impl InMemoryRatingStorage {
    /// Create a new empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a ledger from a snapshot
    pub fn from_snapshot(snapshot: LedgerSnapshot) -> Self {
        let mut data = LedgerData::default();
        for state in snapshot.states {
            data.states.insert(state.key(), state);
        }
        for player_history in snapshot.history {
            data.history.insert(
                RatingKey::new(player_history.player_id, player_history.mode),
                player_history.entries,
            );
        }

        Self {
            data: RwLock::new(data),
        }
    }

    fn read(&self) -> crate::error::Result<std::sync::RwLockReadGuard<'_, LedgerData>> {
        self.data.read().map_err(|_| {
            RatingError::InternalError {
                message: "Failed to acquire ledger read lock".to_string(),
            }
            .into()
        })
    }

    fn write(&self) -> crate::error::Result<std::sync::RwLockWriteGuard<'_, LedgerData>> {
        self.data.write().map_err(|_| {
            RatingError::InternalError {
                message: "Failed to acquire ledger write lock".to_string(),
            }
            .into()
        })
    }
}

impl RatingStorage for InMemoryRatingStorage {
    fn get_state(&self, key: &RatingKey) -> crate::error::Result<Option<PlayerRatingState>> {
        Ok(self.read()?.states.get(key).cloned())
    }

    fn get_states(
        &self,
        keys: &[RatingKey],
    ) -> crate::error::Result<HashMap<RatingKey, PlayerRatingState>> {
        let data = self.read()?;

        let mut result = HashMap::new();
        for key in keys {
            if let Some(state) = data.states.get(key) {
                result.insert(key.clone(), state.clone());
            }
        }

        Ok(result)
    }

    fn apply_match(&self, update: &LedgerUpdate) -> crate::error::Result<Vec<AppliedRating>> {
        let mut data = self.write()?;

        let staged = data.stage(update)?;
        Ok(data.commit(staged))
    }

    fn get_history(&self, key: &RatingKey) -> crate::error::Result<Vec<RatingHistoryEntry>> {
        Ok(self.read()?.history.get(key).cloned().unwrap_or_default())
    }

    fn remove_match_history(&self, match_id: &str) -> crate::error::Result<usize> {
        let mut data = self.write()?;

        let mut removed = 0;
        for entries in data.history.values_mut() {
            let before = entries.len();
            entries.retain(|entry| entry.match_id != match_id);
            removed += before - entries.len();
        }

        Ok(removed)
    }

    fn get_all_states(&self) -> crate::error::Result<Vec<PlayerRatingState>> {
        Ok(self.read()?.states.values().cloned().collect())
    }

    fn get_player_count(&self) -> crate::error::Result<usize> {
        Ok(self.read()?.states.len())
    }

    fn snapshot(&self) -> crate::error::Result<LedgerSnapshot> {
        Ok(self.read()?.snapshot())
    }
}

/// Mock rating ledger for testing, with failure injection
#[derive(Debug, Default)]
pub struct MockRatingStorage {
    inner: InMemoryRatingStorage,
    fail_applies: RwLock<bool>,
    apply_calls: RwLock<Vec<MatchId>>,
}

impl MockRatingStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent apply fail until reset
    pub fn set_fail_applies(&self, fail: bool) {
        if let Ok(mut flag) = self.fail_applies.write() {
            *flag = fail;
        }
    }

    /// Get the match ids of all apply calls made (for testing)
    pub fn get_apply_calls(&self) -> Vec<MatchId> {
        self.apply_calls
            .read()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }
}

impl RatingStorage for MockRatingStorage {
    fn get_state(&self, key: &RatingKey) -> crate::error::Result<Option<PlayerRatingState>> {
        self.inner.get_state(key)
    }

    fn get_states(
        &self,
        keys: &[RatingKey],
    ) -> crate::error::Result<HashMap<RatingKey, PlayerRatingState>> {
        self.inner.get_states(keys)
    }

    fn apply_match(&self, update: &LedgerUpdate) -> crate::error::Result<Vec<AppliedRating>> {
        // Record the call for testing
        if let Ok(mut calls) = self.apply_calls.write() {
            calls.push(update.match_id.clone());
        }

        let failing = self.fail_applies.read().map(|flag| *flag).unwrap_or(false);
        if failing {
            return Err(RatingError::StorageError {
                message: format!("Injected failure while applying {}", update.match_id),
            }
            .into());
        }

        self.inner.apply_match(update)
    }

    fn get_history(&self, key: &RatingKey) -> crate::error::Result<Vec<RatingHistoryEntry>> {
        self.inner.get_history(key)
    }

    fn remove_match_history(&self, match_id: &str) -> crate::error::Result<usize> {
        self.inner.remove_match_history(match_id)
    }

    fn get_all_states(&self) -> crate::error::Result<Vec<PlayerRatingState>> {
        self.inner.get_all_states()
    }

    fn get_player_count(&self) -> crate::error::Result<usize> {
        self.inner.get_player_count()
    }

    fn snapshot(&self) -> crate::error::Result<LedgerSnapshot> {
        self.inner.snapshot()
    }
}
