//! Storage trait definitions

use crate::models::{HistoryCursor, MessageId, SentEmail, SyncedMessage};
use anyhow::Result;

/// Filter for listing synchronized messages
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageFilter {
    /// Keep messages whose sender name or address contains this text
    /// (ASCII case-insensitive)
    pub from: Option<String>,
    /// Drop messages whose sender address equals this address
    /// (ASCII case-insensitive)
    pub exclude_from: Option<String>,
}

impl MessageFilter {
    /// Filter on sender text; empty input means no filter
    pub fn from_sender(from: Option<&str>) -> Self {
        Self {
            from: non_empty(from),
            exclude_from: None,
        }
    }

    /// Received mail only: everything not sent by `mailbox`
    pub fn inbound(mailbox: &str) -> Self {
        Self {
            from: None,
            exclude_from: non_empty(Some(mailbox)),
        }
    }

    /// Whether a message passes this filter
    ///
    /// Backends that can't push the filter into a query use this directly.
    pub fn matches(&self, message: &SyncedMessage) -> bool {
        if let Some(needle) = &self.from {
            let needle = needle.to_ascii_lowercase();
            let in_email = message.from.email.to_ascii_lowercase().contains(&needle);
            let in_name = message
                .from
                .name
                .as_ref()
                .is_some_and(|n| n.to_ascii_lowercase().contains(&needle));
            if !in_email && !in_name {
                return false;
            }
        }

        if let Some(mailbox) = &self.exclude_from
            && message.from.email.eq_ignore_ascii_case(mailbox)
        {
            return false;
        }

        true
    }
}

fn non_empty(s: Option<&str>) -> Option<String> {
    s.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Trait for mail storage operations
///
/// Covers the three durable tables the service owns: synchronized
/// messages, history cursors, and the sent log. Every insert on the sync
/// path is idempotent: a duplicate key is a silent no-op, never an error.
pub trait MailStore: Send + Sync {
    // === Messages ===

    /// Insert a message unless one with the same ID exists
    ///
    /// Returns `true` if the row was inserted, `false` on conflict.
    fn insert_message_ignore_conflict(&self, message: &SyncedMessage) -> Result<bool>;

    /// Get a message by ID
    fn get_message(&self, id: &MessageId) -> Result<Option<SyncedMessage>>;

    /// Check if a message exists
    fn has_message(&self, id: &MessageId) -> Result<bool>;

    /// List messages matching `filter`, ordered by received_at descending
    fn list_messages(
        &self,
        filter: &MessageFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<SyncedMessage>>;

    /// Count messages matching `filter`
    fn count_messages(&self, filter: &MessageFilter) -> Result<usize>;

    // === Cursors ===

    /// Record a history cursor unless the same value is already recorded
    ///
    /// Returns `true` if the row was inserted, `false` on conflict.
    fn insert_cursor_ignore_conflict(&self, cursor: HistoryCursor) -> Result<bool>;

    /// Highest recorded cursor, `None` if the mailbox was never synchronized
    fn max_cursor(&self) -> Result<Option<HistoryCursor>>;

    // === Sent log ===

    /// Append a delivered email and return it with its assigned ID
    fn record_sent(&self, email: SentEmail) -> Result<SentEmail>;

    /// List delivered emails, ordered by sent_at descending
    fn list_sent(&self, limit: usize, offset: usize) -> Result<Vec<SentEmail>>;

    /// Count delivered emails
    fn count_sent(&self) -> Result<usize>;
}
