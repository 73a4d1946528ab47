//! Sync pass results and errors

use serde::Serialize;

use crate::models::{HistoryCursor, MessageId, SyncedMessage};
use crate::provider::ProviderError;

/// Which strategy a pass used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    /// No cursor existed; seeded from the recency window
    Backfill,
    /// Caught up from the stored cursor
    Incremental,
}

/// A message the pass could not fetch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedMessage {
    pub id: MessageId,
    pub reason: String,
    /// The message was deleted upstream; it will not be retried
    pub deleted: bool,
}

impl SkippedMessage {
    pub(crate) fn new(id: &MessageId, error: &ProviderError) -> Self {
        Self {
            id: id.clone(),
            reason: error.to_string(),
            deleted: error.is_not_found(),
        }
    }
}

/// Summary of one sync pass
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub mode: SyncMode,
    /// Messages inserted by the backfill listing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seeded: Option<usize>,
    /// Messages inserted from history deltas
    pub added: usize,
    /// The inserted delta messages (incremental passes only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<SyncedMessage>>,
    /// Deltas not persisted because the mailbox itself sent them
    #[serde(skip_serializing_if = "is_zero")]
    pub outbound: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkippedMessage>,
    /// Cursor recorded at the end of the pass, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<HistoryCursor>,
    pub duration_ms: u64,
}

fn is_zero(n: &usize) -> bool {
    *n == 0
}

impl SyncReport {
    pub(crate) fn new(mode: SyncMode) -> Self {
        Self {
            mode,
            seeded: None,
            added: 0,
            messages: None,
            outbound: 0,
            skipped: Vec::new(),
            cursor: None,
            duration_ms: 0,
        }
    }
}

/// Errors that abort a sync pass
///
/// A failed pass never advances the cursor.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Another pass for this mailbox is in flight
    #[error("a sync pass is already running")]
    AlreadyRunning,

    /// The bulk list or history call failed
    #[error("failed to list {what}: {source}")]
    List {
        what: &'static str,
        #[source]
        source: ProviderError,
    },

    #[error("store error: {0:#}")]
    Store(anyhow::Error),
}

impl From<anyhow::Error> for SyncError {
    fn from(e: anyhow::Error) -> Self {
        SyncError::Store(e)
    }
}
