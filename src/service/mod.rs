//! Service layer for the live rating path
//!
//! The live path serializes every ledger write through one actor task.

pub mod live;

pub use live::{LiveRatingHandle, LiveRatingService, ServiceError};
