//! In-memory storage implementation
//!
//! Used for tests and ephemeral runs. Nothing survives a restart.

use anyhow::{Result, anyhow};
use std::collections::{BTreeSet, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{MailStore, MessageFilter};
use crate::models::{HistoryCursor, MessageId, SentEmail, SyncedMessage};

/// In-memory implementation of MailStore
///
/// Uses collections protected by RwLocks for thread-safe access.
pub struct InMemoryMailStore {
    messages: RwLock<HashMap<String, SyncedMessage>>,
    cursors: RwLock<BTreeSet<HistoryCursor>>,
    sent: RwLock<Vec<SentEmail>>,
}

impl InMemoryMailStore {
    /// Create a new empty in-memory store
    pub fn new() -> Self {
        Self {
            messages: RwLock::new(HashMap::new()),
            cursors: RwLock::new(BTreeSet::new()),
            sent: RwLock::new(Vec::new()),
        }
    }

    /// All recorded cursors, ascending
    pub fn cursors(&self) -> Result<Vec<HistoryCursor>> {
        Ok(read(&self.cursors)?.iter().copied().collect())
    }

    /// Number of stored messages
    pub fn message_count(&self) -> Result<usize> {
        Ok(read(&self.messages)?.len())
    }
}

impl Default for InMemoryMailStore {
    fn default() -> Self {
        Self::new()
    }
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>> {
    lock.read().map_err(|_| anyhow!("in-memory store lock poisoned"))
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>> {
    lock.write().map_err(|_| anyhow!("in-memory store lock poisoned"))
}

impl MailStore for InMemoryMailStore {
    fn insert_message_ignore_conflict(&self, message: &SyncedMessage) -> Result<bool> {
        let mut messages = write(&self.messages)?;
        if messages.contains_key(message.id.as_str()) {
            return Ok(false);
        }
        messages.insert(message.id.0.clone(), message.clone());
        Ok(true)
    }

    fn get_message(&self, id: &MessageId) -> Result<Option<SyncedMessage>> {
        Ok(read(&self.messages)?.get(id.as_str()).cloned())
    }

    fn has_message(&self, id: &MessageId) -> Result<bool> {
        Ok(read(&self.messages)?.contains_key(id.as_str()))
    }

    fn list_messages(
        &self,
        filter: &MessageFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<SyncedMessage>> {
        let messages = read(&self.messages)?;
        let mut matching: Vec<&SyncedMessage> =
            messages.values().filter(|m| filter.matches(m)).collect();

        // Newest first; ID breaks ties so paging is stable
        matching.sort_by(|a, b| {
            b.received_at
                .cmp(&a.received_at)
                .then_with(|| a.id.0.cmp(&b.id.0))
        });

        Ok(matching
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    fn count_messages(&self, filter: &MessageFilter) -> Result<usize> {
        Ok(read(&self.messages)?
            .values()
            .filter(|m| filter.matches(m))
            .count())
    }

    fn insert_cursor_ignore_conflict(&self, cursor: HistoryCursor) -> Result<bool> {
        Ok(write(&self.cursors)?.insert(cursor))
    }

    fn max_cursor(&self) -> Result<Option<HistoryCursor>> {
        Ok(read(&self.cursors)?.last().copied())
    }

    fn record_sent(&self, mut email: SentEmail) -> Result<SentEmail> {
        let mut sent = write(&self.sent)?;
        email.id = sent.len() as i64 + 1;
        sent.push(email.clone());
        Ok(email)
    }

    fn list_sent(&self, limit: usize, offset: usize) -> Result<Vec<SentEmail>> {
        let sent = read(&self.sent)?;
        let mut entries: Vec<&SentEmail> = sent.iter().collect();
        entries.sort_by(|a, b| b.sent_at.cmp(&a.sent_at).then_with(|| b.id.cmp(&a.id)));
        Ok(entries
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    fn count_sent(&self) -> Result<usize> {
        Ok(read(&self.sent)?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EmailAddress, ThreadId};
    use chrono::{Duration, TimeZone, Utc};

    fn make_test_message(id: &str, from: &str, age_hours: i64) -> SyncedMessage {
        let base = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        SyncedMessage::builder(MessageId::new(id), ThreadId::new(format!("t-{}", id)))
            .from(EmailAddress::parse(from))
            .subject(format!("Subject {}", id))
            .received_at(base - Duration::hours(age_hours))
            .build()
    }

    #[test]
    fn test_insert_ignores_duplicates() {
        let store = InMemoryMailStore::new();
        let original = make_test_message("m1", "a@example.com", 1);
        let mut duplicate = original.clone();
        duplicate.subject = "Changed".to_string();

        assert!(store.insert_message_ignore_conflict(&original).unwrap());
        assert!(!store.insert_message_ignore_conflict(&duplicate).unwrap());

        let stored = store.get_message(&MessageId::new("m1")).unwrap().unwrap();
        assert_eq!(stored.subject, "Subject m1");
        assert_eq!(store.message_count().unwrap(), 1);
    }

    #[test]
    fn test_list_messages_newest_first() {
        let store = InMemoryMailStore::new();
        for (id, age) in [("old", 5), ("new", 1), ("mid", 3)] {
            store
                .insert_message_ignore_conflict(&make_test_message(id, "a@example.com", age))
                .unwrap();
        }

        let ids: Vec<String> = store
            .list_messages(&MessageFilter::default(), 10, 0)
            .unwrap()
            .into_iter()
            .map(|m| m.id.0)
            .collect();
        assert_eq!(ids, vec!["new", "mid", "old"]);

        let page = store.list_messages(&MessageFilter::default(), 1, 1).unwrap();
        assert_eq!(page[0].id.as_str(), "mid");
    }

    #[test]
    fn test_cursor_max() {
        let store = InMemoryMailStore::new();
        assert_eq!(store.max_cursor().unwrap(), None);

        assert!(store.insert_cursor_ignore_conflict(HistoryCursor(10)).unwrap());
        assert!(store.insert_cursor_ignore_conflict(HistoryCursor(12)).unwrap());
        assert!(!store.insert_cursor_ignore_conflict(HistoryCursor(10)).unwrap());

        assert_eq!(store.max_cursor().unwrap(), Some(HistoryCursor(12)));
        assert_eq!(store.cursors().unwrap().len(), 2);
    }

    #[test]
    fn test_sent_log_assigns_ids() {
        let store = InMemoryMailStore::new();
        let first = store
            .record_sent(SentEmail::new(None, "a@example.com", "s", "m"))
            .unwrap();
        let second = store
            .record_sent(SentEmail::new(None, "b@example.com", "s", "m"))
            .unwrap();

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(store.count_sent().unwrap(), 2);
    }
}
