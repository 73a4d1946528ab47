//! Mail provider contract
//!
//! The sync engine reads the remote mailbox only through [`MailProvider`],
//! so tests can substitute a scripted fake for the Gmail client.

use chrono::{DateTime, Utc};

use crate::models::{EmailAddress, HistoryCursor, MessageId, ThreadId};

/// Errors reported by a mail provider
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The message was deleted between listing and fetching
    #[error("message {0} not found")]
    NotFound(MessageId),

    /// The start cursor is too old for the provider to answer from
    #[error("history cursor expired or invalid")]
    HistoryExpired,

    #[error("provider returned HTTP {0}")]
    Status(u16),

    #[error("request failed: {0}")]
    Transport(String),

    #[error("failed to decode provider response: {0}")]
    Decode(String),
}

impl ProviderError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ProviderError::NotFound(_))
    }
}

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Reference to a message (just ID and thread ID)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRef {
    pub id: MessageId,
    pub thread_id: ThreadId,
}

impl MessageRef {
    pub fn new(id: impl Into<String>, thread_id: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(id),
            thread_id: ThreadId::new(thread_id),
        }
    }
}

/// A "message added" history event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryDelta {
    pub id: MessageId,
    pub thread_id: ThreadId,
    /// Position of this event in the mailbox history
    pub history_cursor: HistoryCursor,
}

impl HistoryDelta {
    pub fn new(id: impl Into<String>, thread_id: impl Into<String>, cursor: u64) -> Self {
        Self {
            id: MessageId::new(id),
            thread_id: ThreadId::new(thread_id),
            history_cursor: HistoryCursor::new(cursor),
        }
    }
}

/// Metadata extracted from a fetched message
///
/// Every field already carries its fallback value; see
/// [`crate::gmail::extract_metadata`].
#[derive(Debug, Clone, PartialEq)]
pub struct MessageMetadata {
    pub from: EmailAddress,
    pub subject: String,
    pub date: DateTime<Utc>,
    pub snippet: String,
    pub history_cursor: Option<HistoryCursor>,
}

/// Read access to a remote mailbox
pub trait MailProvider: Send + Sync {
    /// List up to `max_results` message references received within the last
    /// `window_days` days, newest first
    fn list_recent(&self, window_days: u32, max_results: usize) -> ProviderResult<Vec<MessageRef>>;

    /// Fetch metadata for one message
    ///
    /// Fails with [`ProviderError::NotFound`] if the message no longer exists.
    fn get_metadata(&self, id: &MessageId) -> ProviderResult<MessageMetadata>;

    /// List about `max_results` "message added" events after `cursor`,
    /// oldest first
    ///
    /// Events that share a history position are returned together or not
    /// at all, so the result may exceed `max_results`. Otherwise a cursor
    /// taken from the last event could skip the rest of its position.
    /// An empty list is a valid answer when nothing happened since `cursor`.
    fn list_history_since(
        &self,
        cursor: HistoryCursor,
        max_results: usize,
    ) -> ProviderResult<Vec<HistoryDelta>>;
}
