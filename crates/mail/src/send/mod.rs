//! Outgoing mail
//!
//! Single and bulk delivery through a [`MailSender`], with every delivered
//! email recorded in the store's sent log.

mod smtp;

pub use smtp::SmtpSender;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::models::SentEmail;
use crate::storage::MailStore;

/// A plain text email to deliver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    /// Recipient display name
    pub name: Option<String>,
    /// Recipient address
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Trait for mail delivery backends
pub trait MailSender: Send + Sync {
    fn send(&self, email: &OutgoingEmail) -> anyhow::Result<()>;
}

/// A single-recipient send request
#[derive(Debug, Clone, Deserialize)]
pub struct SendRequest {
    #[serde(default)]
    pub name: Option<String>,
    pub email: String,
    pub subject: String,
    pub message: String,
}

/// One row of a bulk send
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BulkRecipient {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: String,
    /// Overrides the common subject when non-empty
    #[serde(default)]
    pub subject: Option<String>,
    /// Overrides the common message when non-empty
    #[serde(default)]
    pub message: Option<String>,
}

/// A bulk send request
#[derive(Debug, Clone, Deserialize)]
pub struct BulkRequest {
    pub subject: String,
    pub message: String,
    /// Label stored with every sent-log row of this run
    #[serde(default)]
    pub batch: Option<String>,
    pub recipients: Vec<BulkRecipient>,
}

/// Outcome of a bulk send
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BulkReport {
    pub sent: usize,
    /// Addresses that could not be delivered or recorded
    pub failed: Vec<String>,
    /// Rows without an address
    pub skipped: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error("{0}")]
    InvalidBulkRequest(String),

    #[error("delivery failed: {0:#}")]
    Delivery(anyhow::Error),
}

/// Deliver one email and record it in the sent log
///
/// Once delivery succeeds the call succeeds. If the sent log cannot be
/// written the failure is logged and the returned entry keeps id 0, so a
/// caller retrying on error never delivers twice.
pub fn send_one(
    sender: &dyn MailSender,
    store: &dyn MailStore,
    request: SendRequest,
) -> Result<SentEmail, SendError> {
    let to = request.email.trim();
    if to.is_empty() {
        return Err(SendError::InvalidRequest("Recipient email is required".into()));
    }

    let email = OutgoingEmail {
        name: non_empty(request.name),
        to: to.to_string(),
        subject: request.subject,
        body: request.message,
    };
    sender.send(&email).map_err(SendError::Delivery)?;
    info!("[SEND] Delivered to {}", email.to);

    let entry = SentEmail::new(email.name, email.to, email.subject, email.body);
    match store.record_sent(entry.clone()) {
        Ok(recorded) => Ok(recorded),
        Err(e) => {
            warn!("[SEND] Sent to {} but could not record it: {:#}", entry.email, e);
            Ok(entry)
        }
    }
}

/// Deliver the same message to many recipients
///
/// One recipient failing never stops the run; its address is collected in
/// [`BulkReport::failed`] instead.
pub fn send_bulk(
    sender: &dyn MailSender,
    store: &dyn MailStore,
    request: BulkRequest,
) -> Result<BulkReport, SendError> {
    if request.subject.trim().is_empty() || request.message.trim().is_empty() {
        return Err(SendError::InvalidBulkRequest(
            "Subject and message are required".into(),
        ));
    }

    let mut report = BulkReport::default();

    for recipient in request.recipients {
        let to = recipient.email.trim();
        if to.is_empty() {
            report.skipped += 1;
            continue;
        }

        let email = OutgoingEmail {
            name: non_empty(recipient.name),
            to: to.to_string(),
            subject: non_empty(recipient.subject).unwrap_or_else(|| request.subject.clone()),
            body: non_empty(recipient.message).unwrap_or_else(|| request.message.clone()),
        };

        if let Err(e) = sender.send(&email) {
            warn!("[SEND] Failed to send to {}: {:#}", email.to, e);
            report.failed.push(email.to);
            continue;
        }

        let entry = SentEmail::new(email.name, email.to.clone(), email.subject, email.body)
            .with_batch(request.batch.clone());
        match store.record_sent(entry) {
            Ok(_) => report.sent += 1,
            Err(e) => {
                warn!("[SEND] Sent to {} but could not record it: {:#}", email.to, e);
                report.failed.push(email.to);
            }
        }
    }

    info!(
        "[SEND] Bulk run done: sent={} failed={} skipped={}",
        report.sent,
        report.failed.len(),
        report.skipped
    );
    Ok(report)
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|s| !s.trim().is_empty())
}
