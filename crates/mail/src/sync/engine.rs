//! Inbox sync engine
//!
//! Reconciles the remote mailbox with the local store. A pass either
//! backfills a recent window (no cursor yet) or replays history deltas
//! since the stored cursor. All writes are insert-or-ignore and the cursor
//! is written last, so an aborted pass can simply be run again.

use log::{debug, info, warn};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, TryLockError};
use std::time::Instant;

use super::fetch::fetch_metadata;
use super::report::{SkippedMessage, SyncError, SyncMode, SyncReport};
use crate::config::SyncConfig;
use crate::models::{HistoryCursor, MessageId, SyncedMessage, ThreadId};
use crate::provider::{MailProvider, MessageMetadata};
use crate::storage::MailStore;

/// Orchestrates sync passes for one mailbox
///
/// Collaborators are injected so tests can swap in fakes. At most one pass
/// runs at a time; a concurrent call fails with [`SyncError::AlreadyRunning`].
pub struct SyncEngine {
    provider: Arc<dyn MailProvider>,
    store: Arc<dyn MailStore>,
    config: SyncConfig,
    pass_lock: Mutex<()>,
}

/// What replaying a batch of history deltas produced
#[derive(Debug, Default)]
struct DeltaOutcome {
    added: Vec<SyncedMessage>,
    outbound: usize,
    skipped: Vec<SkippedMessage>,
    /// Token of the last delta that no longer needs processing
    frontier: Option<HistoryCursor>,
}

impl SyncEngine {
    pub fn new(
        provider: Arc<dyn MailProvider>,
        store: Arc<dyn MailStore>,
        config: SyncConfig,
    ) -> Self {
        Self {
            provider,
            store,
            config,
            pass_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Run one sync pass
    ///
    /// This operation is idempotent: running it again with no new remote
    /// mail leaves both stores unchanged.
    pub fn sync(&self) -> Result<SyncReport, SyncError> {
        let _pass = match self.pass_lock.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => return Err(SyncError::AlreadyRunning),
            // A panicked pass left nothing in memory worth distrusting
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        };

        let start = Instant::now();
        let previous = self.store.max_cursor()?;

        let mut report = match previous {
            None => self.backfill(previous)?,
            Some(cursor) => self.incremental(cursor)?,
        };

        report.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            "[SYNC] {:?} pass done in {}ms: seeded={:?} added={} outbound={} skipped={} cursor={:?}",
            report.mode,
            report.duration_ms,
            report.seeded,
            report.added,
            report.outbound,
            report.skipped.len(),
            report.cursor.map(HistoryCursor::value),
        );
        Ok(report)
    }

    /// Seed the store from the recency window
    fn backfill(&self, previous: Option<HistoryCursor>) -> Result<SyncReport, SyncError> {
        let refs = self
            .provider
            .list_recent(self.config.recency_window_days, self.config.page_size)
            .map_err(|source| SyncError::List {
                what: "recent messages",
                source,
            })?;

        info!(
            "[SYNC] Backfill: {} messages in the last {} days",
            refs.len(),
            self.config.recency_window_days
        );

        let ids: Vec<MessageId> = refs.iter().map(|r| r.id.clone()).collect();
        let fetched = fetch_metadata(&*self.provider, &ids, self.config.fetch_concurrency);

        let mut report = SyncReport::new(SyncMode::Backfill);
        let mut seeded = 0;
        let mut highest: Option<HistoryCursor> = None;

        for (msg_ref, result) in refs.into_iter().zip(fetched) {
            match result {
                Ok(metadata) => {
                    let message = to_synced_message(msg_ref.id, msg_ref.thread_id, metadata, None);
                    if self.store.insert_message_ignore_conflict(&message)? {
                        seeded += 1;
                    }
                    // Already-present rows count too: they are durable
                    highest = highest.max(message.history_cursor);
                }
                Err(e) => {
                    warn!("[SYNC] Skipping message {}: {}", msg_ref.id, e);
                    report.skipped.push(SkippedMessage::new(&msg_ref.id, &e));
                }
            }
        }

        // Catch anything that landed while the window was being listed.
        // Only meaningful with a prior cursor.
        let catch_up = match previous {
            Some(cursor) => self.replay_history(cursor)?,
            None => DeltaOutcome::default(),
        };

        report.seeded = Some(seeded);
        report.added = catch_up.added.len();
        report.outbound = catch_up.outbound;
        report.skipped.extend(catch_up.skipped);
        report.cursor = self.advance_cursor(highest.max(catch_up.frontier))?;
        Ok(report)
    }

    /// Replay history deltas since `cursor`
    fn incremental(&self, cursor: HistoryCursor) -> Result<SyncReport, SyncError> {
        debug!("[SYNC] Incremental from cursor {}", cursor);
        let outcome = self.replay_history(cursor)?;

        let mut report = SyncReport::new(SyncMode::Incremental);
        report.added = outcome.added.len();
        report.outbound = outcome.outbound;
        report.skipped = outcome.skipped;
        report.cursor = self.advance_cursor(outcome.frontier)?;
        report.messages = Some(outcome.added);
        Ok(report)
    }

    /// Fetch and persist "message added" deltas after `since`
    ///
    /// Deltas are walked in provider order. The frontier is the token of
    /// the last delta in that order (not the largest token) whose outcome is
    /// final: persisted, sent by the mailbox itself, or deleted upstream. A
    /// transient fetch failure pins the frontier before that delta so the
    /// message is seen again next pass.
    fn replay_history(&self, since: HistoryCursor) -> Result<DeltaOutcome, SyncError> {
        let deltas = self
            .provider
            .list_history_since(since, self.config.page_size)
            .map_err(|source| SyncError::List {
                what: "history",
                source,
            })?;

        let mut outcome = DeltaOutcome::default();
        if deltas.is_empty() {
            debug!("[SYNC] No history since {}", since);
            return Ok(outcome);
        }

        let mut seen = HashSet::new();
        let unique_ids: Vec<MessageId> = deltas
            .iter()
            .filter(|d| seen.insert(d.id.clone()))
            .map(|d| d.id.clone())
            .collect();

        let fetched = fetch_metadata(&*self.provider, &unique_ids, self.config.fetch_concurrency);
        let mut results: HashMap<MessageId, _> = unique_ids.into_iter().zip(fetched).collect();

        let mailbox = self.config.mailbox_address.as_str();
        let mut settled: HashMap<MessageId, bool> = HashMap::new();
        let mut pinned = false;

        for delta in deltas {
            let is_settled = match settled.get(&delta.id) {
                Some(&done) => done,
                None => {
                    let done = match results.remove(&delta.id) {
                        Some(Ok(metadata)) => {
                            let message = to_synced_message(
                                delta.id.clone(),
                                delta.thread_id.clone(),
                                metadata,
                                Some(delta.history_cursor),
                            );
                            if message.is_from(mailbox) {
                                debug!("[SYNC] {} was sent by this mailbox, not storing", delta.id);
                                outcome.outbound += 1;
                            } else if self.store.insert_message_ignore_conflict(&message)? {
                                outcome.added.push(message);
                            }
                            true
                        }
                        Some(Err(e)) => {
                            warn!("[SYNC] Skipping message {}: {}", delta.id, e);
                            outcome.skipped.push(SkippedMessage::new(&delta.id, &e));
                            e.is_not_found()
                        }
                        None => true,
                    };
                    settled.insert(delta.id.clone(), done);
                    done
                }
            };

            if !is_settled {
                pinned = true;
            }
            if !pinned {
                outcome.frontier = Some(delta.history_cursor);
            }
        }

        Ok(outcome)
    }

    /// Record `candidate` as the new cursor, if there is one
    fn advance_cursor(
        &self,
        candidate: Option<HistoryCursor>,
    ) -> Result<Option<HistoryCursor>, SyncError> {
        let Some(cursor) = candidate else {
            return Ok(None);
        };
        if !self.store.insert_cursor_ignore_conflict(cursor)? {
            debug!("[SYNC] Cursor {} already recorded", cursor);
        }
        Ok(Some(cursor))
    }
}

fn to_synced_message(
    id: MessageId,
    thread_id: ThreadId,
    metadata: MessageMetadata,
    fallback_cursor: Option<HistoryCursor>,
) -> SyncedMessage {
    SyncedMessage::builder(id, thread_id)
        .history_cursor(metadata.history_cursor.or(fallback_cursor))
        .from(metadata.from)
        .subject(metadata.subject)
        .received_at(metadata.date)
        .snippet(metadata.snippet)
        .build()
}
