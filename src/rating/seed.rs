//! Initial rating selection for players entering a mode

use crate::config::RatingConfig;
use crate::types::{Mode, PlayerId, PlayerRatingState, RatingKey};
use crate::utils::round_rating;
use std::collections::{HashMap, HashSet};

/// Decides the rating a player starts from in a mode they have not played yet
#[derive(Debug, Clone)]
pub struct RatingSeeder {
    initial_rating: f64,
    legacy_initial_rating: f64,
    legacy_players: HashSet<PlayerId>,
    carryover: HashMap<RatingKey, f64>,
}

impl RatingSeeder {
    pub fn new(config: &RatingConfig) -> Self {
        Self {
            initial_rating: config.initial_rating,
            legacy_initial_rating: config.legacy_initial_rating,
            legacy_players: HashSet::new(),
            carryover: HashMap::new(),
        }
    }

    /// Players who start from the legacy seed
    pub fn with_legacy_players<I>(mut self, players: I) -> Self
    where
        I: IntoIterator<Item = PlayerId>,
    {
        self.legacy_players.extend(players);
        self
    }

    /// Seed the next replay pass from the final states of the previous one
    ///
    /// Each (player, mode) starts from its base seed moved `weight` of the way
    /// towards the rating it finished the previous pass with.
    pub fn with_carryover<'a, I>(mut self, states: I, weight: f64) -> Self
    where
        I: IntoIterator<Item = &'a PlayerRatingState>,
    {
        for state in states {
            let base = self.base_seed(&state.player_id);
            self.carryover
                .insert(state.key(), base + weight * (state.rating - base));
        }
        self
    }

    pub fn is_legacy(&self, player_id: &str) -> bool {
        self.legacy_players.contains(player_id)
    }

    fn base_seed(&self, player_id: &str) -> f64 {
        if self.is_legacy(player_id) {
            self.legacy_initial_rating
        } else {
            self.initial_rating
        }
    }

    /// Rating for a player with no state in `mode`
    ///
    /// Rounded the same way the ledger stores ratings.
    pub fn seed_for(&self, player_id: &str, mode: Mode) -> f64 {
        let seed = self
            .carryover
            .get(&RatingKey::new(player_id, mode))
            .copied()
            .unwrap_or_else(|| self.base_seed(player_id));
        round_rating(seed)
    }
}

impl Default for RatingSeeder {
    fn default() -> Self {
        Self::new(&RatingConfig::default())
    }
}
