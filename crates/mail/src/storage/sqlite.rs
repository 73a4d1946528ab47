//! SQLite-based mail storage

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use rusqlite_migration::{M, Migrations};

use super::traits::{MailStore, MessageFilter};
use crate::models::{EmailAddress, HistoryCursor, MessageId, SentEmail, SyncedMessage, ThreadId};

/// Database migrations
///
/// Each migration is applied in order. The user_version pragma tracks which
/// migrations have been applied.
fn migrations() -> Migrations<'static> {
    Migrations::new(vec![
        // Migration 1: Initial schema
        M::up(
            r#"
            -- Synchronized messages (append-only)
            CREATE TABLE messages (
                id TEXT PRIMARY KEY,
                thread_id TEXT NOT NULL,
                history_cursor INTEGER,
                from_name TEXT,
                from_email TEXT NOT NULL,
                subject TEXT NOT NULL,
                snippet TEXT NOT NULL,
                received_at INTEGER NOT NULL  -- unix millis
            );

            CREATE INDEX idx_messages_received_at ON messages(received_at DESC);

            -- One row per cursor value observed; MAX(value) is the resume point
            CREATE TABLE history_cursors (
                value INTEGER PRIMARY KEY,
                recorded_at TEXT NOT NULL
            );

            -- Mail delivered by this service
            CREATE TABLE sent_emails (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT,
                email TEXT NOT NULL,
                subject TEXT NOT NULL,
                message TEXT NOT NULL,
                batch TEXT,
                sent_at INTEGER NOT NULL  -- unix millis
            );

            CREATE INDEX idx_sent_emails_sent_at ON sent_emails(sent_at DESC);
            "#,
        ),
    ])
}

/// Sender filter shared by list and count queries
///
/// ?1 = `from` needle, ?2 = excluded mailbox; NULL disables either clause.
const FILTER_CLAUSE: &str = "(?1 IS NULL
        OR instr(LOWER(from_email), LOWER(?1)) > 0
        OR instr(LOWER(COALESCE(from_name, '')), LOWER(?1)) > 0)
    AND (?2 IS NULL OR LOWER(from_email) <> LOWER(?2))";

/// SQLite-based mail storage
pub struct SqliteMailStore {
    conn: Mutex<Connection>,
}

impl SqliteMailStore {
    /// Open (or create) the database at `db_path` and run migrations
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(db_path.as_ref())
            .with_context(|| format!("Failed to open database at {:?}", db_path.as_ref()))?;

        // WAL lets the feed endpoints read while a sync pass writes
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            "#,
        )?;

        migrations()
            .to_latest(&mut conn)
            .context("Failed to run database migrations")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("SQLite connection lock poisoned"))
    }
}

fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

fn from_millis(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .unwrap_or_else(Utc::now)
}

/// Bind a row count for LIMIT/OFFSET
///
/// SQLite reads a negative OFFSET as 0, so out-of-range values saturate.
fn count_to_sql(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

fn cursor_to_sql(cursor: HistoryCursor) -> Result<i64> {
    i64::try_from(cursor.value())
        .with_context(|| format!("History cursor {} does not fit in SQLite INTEGER", cursor))
}

/// Map a `messages` row selected with [`MESSAGE_COLUMNS`]
fn message_from_row(row: &Row<'_>) -> rusqlite::Result<SyncedMessage> {
    let history_cursor: Option<i64> = row.get(2)?;
    let received_at: i64 = row.get(7)?;

    Ok(SyncedMessage {
        id: MessageId::new(row.get::<_, String>(0)?),
        thread_id: ThreadId::new(row.get::<_, String>(1)?),
        history_cursor: history_cursor
            .and_then(|v| u64::try_from(v).ok())
            .map(HistoryCursor::new),
        from: EmailAddress {
            name: row.get(3)?,
            email: row.get(4)?,
        },
        subject: row.get(5)?,
        snippet: row.get(6)?,
        received_at: from_millis(received_at),
    })
}

const MESSAGE_COLUMNS: &str =
    "id, thread_id, history_cursor, from_name, from_email, subject, snippet, received_at";

fn sent_from_row(row: &Row<'_>) -> rusqlite::Result<SentEmail> {
    let sent_at: i64 = row.get(6)?;
    Ok(SentEmail {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        subject: row.get(3)?,
        message: row.get(4)?,
        batch: row.get(5)?,
        sent_at: from_millis(sent_at),
    })
}

impl MailStore for SqliteMailStore {
    fn insert_message_ignore_conflict(&self, message: &SyncedMessage) -> Result<bool> {
        let history_cursor = message.history_cursor.map(cursor_to_sql).transpose()?;
        let conn = self.conn()?;

        let inserted = conn.execute(
            "INSERT INTO messages
             (id, thread_id, history_cursor, from_name, from_email, subject, snippet, received_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO NOTHING",
            params![
                message.id.as_str(),
                message.thread_id.as_str(),
                history_cursor,
                message.from.name,
                message.from.email,
                message.subject,
                message.snippet,
                to_millis(message.received_at),
            ],
        )?;

        Ok(inserted > 0)
    }

    fn get_message(&self, id: &MessageId) -> Result<Option<SyncedMessage>> {
        let conn = self.conn()?;
        let message = conn
            .query_row(
                &format!("SELECT {} FROM messages WHERE id = ?", MESSAGE_COLUMNS),
                [id.as_str()],
                message_from_row,
            )
            .optional()?;
        Ok(message)
    }

    fn has_message(&self, id: &MessageId) -> Result<bool> {
        let conn = self.conn()?;
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM messages WHERE id = ?)",
            [id.as_str()],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn list_messages(
        &self,
        filter: &MessageFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<SyncedMessage>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM messages
             WHERE {}
             ORDER BY received_at DESC, id ASC
             LIMIT ?3 OFFSET ?4",
            MESSAGE_COLUMNS, FILTER_CLAUSE
        ))?;

        let messages = stmt
            .query_map(
                params![
                    filter.from,
                    filter.exclude_from,
                    count_to_sql(limit),
                    count_to_sql(offset)
                ],
                message_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(messages)
    }

    fn count_messages(&self, filter: &MessageFilter) -> Result<usize> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM messages WHERE {}", FILTER_CLAUSE),
            params![filter.from, filter.exclude_from],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn insert_cursor_ignore_conflict(&self, cursor: HistoryCursor) -> Result<bool> {
        let value = cursor_to_sql(cursor)?;
        let conn = self.conn()?;
        let inserted = conn.execute(
            "INSERT INTO history_cursors (value, recorded_at) VALUES (?, ?)
             ON CONFLICT(value) DO NOTHING",
            params![value, Utc::now().to_rfc3339()],
        )?;
        Ok(inserted > 0)
    }

    fn max_cursor(&self) -> Result<Option<HistoryCursor>> {
        let conn = self.conn()?;
        let max: Option<i64> =
            conn.query_row("SELECT MAX(value) FROM history_cursors", [], |row| row.get(0))?;

        max.map(|v| {
            u64::try_from(v)
                .map(HistoryCursor::new)
                .with_context(|| format!("Stored history cursor {} is negative", v))
        })
        .transpose()
    }

    fn record_sent(&self, mut email: SentEmail) -> Result<SentEmail> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO sent_emails (name, email, subject, message, batch, sent_at)
             VALUES (?, ?, ?, ?, ?, ?)",
            params![
                email.name,
                email.email,
                email.subject,
                email.message,
                email.batch,
                to_millis(email.sent_at),
            ],
        )?;
        email.id = conn.last_insert_rowid();
        Ok(email)
    }

    fn list_sent(&self, limit: usize, offset: usize) -> Result<Vec<SentEmail>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, email, subject, message, batch, sent_at
             FROM sent_emails
             ORDER BY sent_at DESC, id DESC
             LIMIT ? OFFSET ?",
        )?;

        let entries = stmt
            .query_map(params![count_to_sql(limit), count_to_sql(offset)], sent_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(entries)
    }

    fn count_sent(&self) -> Result<usize> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM sent_emails", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
