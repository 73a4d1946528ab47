//! Mail crate - Business logic for the Courier mail backend
//!
//! This crate provides:
//! - Domain models (SyncedMessage, EmailAddress, HistoryCursor, SentEmail)
//! - The `MailProvider` contract and a Gmail REST implementation
//! - Storage trait abstractions with in-memory and SQLite backends
//! - An idempotent inbox sync engine (backfill and incremental)
//! - Paginated queries for the HTTP layer
//! - SMTP delivery with a sent log
//!
//! Everything here is synchronous; async callers should run it on a
//! blocking thread.

pub mod config;
pub mod gmail;
pub mod models;
pub mod provider;
pub mod query;
pub mod send;
pub mod storage;
pub mod sync;

pub use config::{GmailCredentials, SmtpConfig, SyncConfig};
pub use gmail::GmailClient;
pub use models::{EmailAddress, HistoryCursor, MessageId, SentEmail, SyncedMessage, ThreadId};
pub use provider::{
    HistoryDelta, MailProvider, MessageMetadata, MessageRef, ProviderError, ProviderResult,
};
pub use query::{MessagePage, PageRequest, SentPage, list_messages, list_sent};
pub use send::{
    BulkRecipient, BulkReport, BulkRequest, MailSender, OutgoingEmail, SendError, SendRequest,
    SmtpSender, send_bulk, send_one,
};
pub use storage::{InMemoryMailStore, MailStore, MessageFilter, SqliteMailStore};
pub use sync::{SkippedMessage, SyncEngine, SyncError, SyncMode, SyncReport};
