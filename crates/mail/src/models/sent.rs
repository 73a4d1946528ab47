//! Sent log entries for mail delivered by this service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An email this service delivered over SMTP
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentEmail {
    /// Store-assigned identifier (0 until recorded)
    pub id: i64,
    /// Recipient display name
    pub name: Option<String>,
    /// Recipient address
    pub email: String,
    pub subject: String,
    pub message: String,
    /// Label of the bulk run this email was part of
    pub batch: Option<String>,
    pub sent_at: DateTime<Utc>,
}

impl SentEmail {
    /// Create an unrecorded entry stamped with the current time
    pub fn new(
        name: Option<String>,
        email: impl Into<String>,
        subject: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: 0,
            name,
            email: email.into(),
            subject: subject.into(),
            message: message.into(),
            batch: None,
            sent_at: Utc::now(),
        }
    }

    pub fn with_batch(mut self, batch: Option<String>) -> Self {
        self.batch = batch;
        self
    }
}
