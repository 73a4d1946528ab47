//! Sync engine for fetching and storing mail
//!
//! Provides idempotent sync passes that can be safely retried.

mod engine;
mod fetch;
mod report;

pub use engine::SyncEngine;
pub use report::{SkippedMessage, SyncError, SyncMode, SyncReport};
