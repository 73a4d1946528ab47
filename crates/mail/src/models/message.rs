//! Message model representing a synchronized mailbox message

use super::HistoryCursor;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier for a message (provider-assigned message ID)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for MessageId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique identifier for a thread (provider-assigned thread ID)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThreadId(pub String);

impl ThreadId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ThreadId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// An email address with optional display name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailAddress {
    /// Display name (e.g., "John Doe")
    pub name: Option<String>,
    /// Email address (e.g., "john@example.com")
    pub email: String,
}

impl EmailAddress {
    /// Create a new email address with just the email
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            name: None,
            email: email.into(),
        }
    }

    /// Create a new email address with a display name
    pub fn with_name(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            email: email.into(),
        }
    }

    /// Parse an email address from a header value like "John Doe <john@example.com>"
    pub fn parse(s: &str) -> Self {
        let s = s.trim();

        if let Some(angle_start) = s.rfind('<')
            && let Some(angle_end) = s.rfind('>')
            && angle_start < angle_end
        {
            let name = s[..angle_start].trim().trim_matches('"').trim();
            let email = s[angle_start + 1..angle_end].trim();
            return Self {
                name: if name.is_empty() {
                    None
                } else {
                    Some(name.to_string())
                },
                email: email.to_string(),
            };
        }

        Self {
            name: None,
            email: s.to_string(),
        }
    }

    /// Whether this address is `address`, ignoring ASCII case
    ///
    /// An empty address never matches anything.
    pub fn is(&self, address: &str) -> bool {
        let address = address.trim();
        !address.is_empty() && self.email.eq_ignore_ascii_case(address)
    }

    /// Format the email address for display
    pub fn display(&self) -> String {
        match &self.name {
            Some(name) => format!("{} <{}>", name, self.email),
            None => self.email.clone(),
        }
    }
}

/// A message synchronized from the remote mailbox
///
/// Rows are append-only: once stored, a message is never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncedMessage {
    /// Provider message ID (primary key)
    pub id: MessageId,
    /// Provider thread ID
    pub thread_id: ThreadId,
    /// History token reported by the provider when the message was fetched
    pub history_cursor: Option<HistoryCursor>,
    /// Sender
    pub from: EmailAddress,
    /// Subject line (empty when the header is missing)
    pub subject: String,
    /// When the message was received
    pub received_at: DateTime<Utc>,
    /// Short plain text preview
    pub snippet: String,
}

impl SyncedMessage {
    /// Create a new message builder
    pub fn builder(id: MessageId, thread_id: ThreadId) -> SyncedMessageBuilder {
        SyncedMessageBuilder::new(id, thread_id)
    }

    /// Whether this message was sent by `mailbox` itself
    pub fn is_from(&self, mailbox: &str) -> bool {
        self.from.is(mailbox)
    }
}

/// Builder for creating SyncedMessage instances
pub struct SyncedMessageBuilder {
    id: MessageId,
    thread_id: ThreadId,
    history_cursor: Option<HistoryCursor>,
    from: EmailAddress,
    subject: String,
    received_at: Option<DateTime<Utc>>,
    snippet: String,
}

impl SyncedMessageBuilder {
    fn new(id: MessageId, thread_id: ThreadId) -> Self {
        Self {
            id,
            thread_id,
            history_cursor: None,
            from: EmailAddress::default(),
            subject: String::new(),
            received_at: None,
            snippet: String::new(),
        }
    }

    pub fn history_cursor(mut self, cursor: Option<HistoryCursor>) -> Self {
        self.history_cursor = cursor;
        self
    }

    pub fn from(mut self, from: EmailAddress) -> Self {
        self.from = from;
        self
    }

    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    pub fn received_at(mut self, received_at: DateTime<Utc>) -> Self {
        self.received_at = Some(received_at);
        self
    }

    pub fn snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = snippet.into();
        self
    }

    pub fn build(self) -> SyncedMessage {
        SyncedMessage {
            id: self.id,
            thread_id: self.thread_id,
            history_cursor: self.history_cursor,
            from: self.from,
            subject: self.subject,
            received_at: self.received_at.unwrap_or_else(Utc::now),
            snippet: self.snippet,
        }
    }
}
