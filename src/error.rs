//! Error types for the rating service
//!
//! Rejected matches (duplicates, stale timestamps, invalid records) are not errors;
//! they are reported through [`crate::rating::ApplyOutcome`]. The types here cover
//! genuine failures: bad configuration, storage faults and broken invariants.

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for specific rating scenarios
#[derive(Debug, thiserror::Error)]
pub enum RatingError {
    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Invalid rating input: {reason}")]
    InvalidInput { reason: String },

    #[error("Rating storage failure: {message}")]
    StorageError { message: String },

    #[error("Archive error: {message}")]
    ArchiveError { message: String },

    #[error("Internal service error: {message}")]
    InternalError { message: String },
}
