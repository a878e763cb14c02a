//! Bed Wars rating engine
//!
//! This crate rates players of a team-based game from completed match
//! records: match classification, performance scoring, a zero-sum multi-team
//! Elo engine, an atomic rating ledger, and both a historical replay path and
//! a live incremental path with the same semantics.

pub mod archive;
pub mod config;
pub mod error;
pub mod metrics;
pub mod rating;
pub mod service;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{RatingError, Result};
pub use types::*;

// Re-export key components
pub use rating::{ApplyOutcome, MatchProcessor, RatingStorage, ReplayDriver};
pub use service::{LiveRatingHandle, LiveRatingService};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
