//! Rating engine
//!
//! Match classification, performance scoring, the multi-team Elo engine, the
//! rating ledger and the incremental and replay application paths.

pub mod calculator;
pub mod classifier;
pub mod elo;
pub mod index;
pub mod performance;
pub mod processor;
pub mod projection;
pub mod replay;
pub mod seed;
pub mod storage;

// Re-export commonly used types
pub use calculator::{RatingCalculationResult, RatingCalculator};
pub use classifier::{InvalidReason, MatchClassifier};
pub use elo::MultiTeamEloCalculator;
pub use index::ProcessedMatchIndex;
pub use performance::PerformanceScorer;
pub use processor::{ApplyOutcome, MatchProcessor, MatchReport, OrderingPolicy};
pub use projection::{global_leaderboard, global_rating, mode_leaderboard, LeaderboardEntry};
pub use replay::{PassSummary, ReplayDriver, ReplayOutput};
pub use seed::RatingSeeder;
pub use storage::{InMemoryRatingStorage, LedgerSnapshot, LedgerUpdate, RatingStorage};
