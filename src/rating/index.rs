//! Processed match index
//!
//! Remembers which match ids have been applied and the latest applied
//! timestamp per rating pool, for idempotence and ordering checks.

use crate::types::{MatchId, Mode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessedMatchIndex {
    applied: BTreeSet<MatchId>,
    latest: BTreeMap<Mode, DateTime<Utc>>,
}

impl ProcessedMatchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, match_id: &str) -> bool {
        self.applied.contains(match_id)
    }

    /// Latest applied timestamp in a mode, if any match was applied there
    pub fn latest_for(&self, mode: Mode) -> Option<DateTime<Utc>> {
        self.latest.get(&mode).copied()
    }

    /// Whether a match at `timestamp` would move the mode's stream backwards
    pub fn is_out_of_order(&self, mode: Mode, timestamp: DateTime<Utc>, allow_equal: bool) -> bool {
        match self.latest_for(mode) {
            Some(latest) if allow_equal => timestamp < latest,
            Some(latest) => timestamp <= latest,
            None => false,
        }
    }

    /// Mark a match as applied
    pub fn record(&mut self, match_id: impl Into<MatchId>, mode: Mode, timestamp: DateTime<Utc>) {
        self.applied.insert(match_id.into());
        let latest = self.latest.entry(mode).or_insert(timestamp);
        if timestamp > *latest {
            *latest = timestamp;
        }
    }

    pub fn len(&self) -> usize {
        self.applied.len()
    }

    pub fn is_empty(&self) -> bool {
        self.applied.is_empty()
    }

    /// Combine indexes of disjoint rating pools
    pub fn merge(&mut self, other: ProcessedMatchIndex) {
        self.applied.extend(other.applied);
        for (mode, timestamp) in other.latest {
            let latest = self.latest.entry(mode).or_insert(timestamp);
            if timestamp > *latest {
                *latest = timestamp;
            }
        }
    }
}
