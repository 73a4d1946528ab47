//! Configuration for mail services
//!
//! Credentials are loaded from (in order of priority):
//! 1. JSON file in the Courier config directory
//! 2. Runtime environment variables (fallback)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Gmail token filename in the Courier config directory
const GMAIL_TOKEN_FILE: &str = "gmail-token.json";

/// SMTP settings filename in the Courier config directory
const SMTP_FILE: &str = "smtp.json";

/// Settings for the sync engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// The synchronized mailbox's own address; mail from it is outbound
    pub mailbox_address: String,
    /// How far back a first-run backfill reaches
    pub recency_window_days: u32,
    /// Maximum messages or history events requested per pass
    pub page_size: usize,
    /// Concurrent metadata fetches within a pass
    pub fetch_concurrency: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            mailbox_address: String::new(),
            recency_window_days: 30,
            page_size: 100,
            fetch_concurrency: 4,
        }
    }
}

impl SyncConfig {
    pub fn new(mailbox_address: impl Into<String>) -> Self {
        Self {
            mailbox_address: mailbox_address.into(),
            ..Self::default()
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_fetch_concurrency(mut self, fetch_concurrency: usize) -> Self {
        self.fetch_concurrency = fetch_concurrency;
        self
    }

    pub fn with_recency_window_days(mut self, days: u32) -> Self {
        self.recency_window_days = days;
        self
    }
}

/// OAuth access token for the Gmail API
///
/// The token is obtained out of band; this crate never refreshes it.
#[derive(Debug, Clone, Deserialize)]
pub struct GmailCredentials {
    pub access_token: String,
}

impl GmailCredentials {
    /// Load credentials using the following priority:
    /// 1. JSON file (~/.config/courier/gmail-token.json)
    /// 2. Runtime environment variable GMAIL_ACCESS_TOKEN
    pub fn load() -> Result<Self> {
        if config::config_exists(GMAIL_TOKEN_FILE) {
            return config::load_json(GMAIL_TOKEN_FILE);
        }
        Self::from_env()
    }

    /// Load credentials from a specific JSON file
    ///
    /// Accepts any token file with an `access_token` field, such as the
    /// token JSON written by Google's OAuth client libraries.
    pub fn from_file(path: &Path) -> Result<Self> {
        config::load_json_file(path)
    }

    /// Parse credentials from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse Gmail token JSON")
    }

    /// Load credentials from environment variables
    pub fn from_env() -> Result<Self> {
        let access_token = std::env::var("GMAIL_ACCESS_TOKEN")
            .context("GMAIL_ACCESS_TOKEN environment variable not set")?;
        Ok(Self { access_token })
    }

    /// Get the default token file path (~/.config/courier/gmail-token.json)
    pub fn default_token_path() -> Option<PathBuf> {
        config::config_path(GMAIL_TOKEN_FILE)
    }
}

/// SMTP relay settings for outgoing mail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmtpConfig {
    #[serde(default = "default_smtp_host")]
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Envelope sender; defaults to `username`
    #[serde(default)]
    pub from: Option<String>,
}

fn default_smtp_host() -> String {
    "smtp.gmail.com".to_string()
}

fn default_smtp_port() -> u16 {
    465
}

impl SmtpConfig {
    /// Load SMTP settings using the following priority:
    /// 1. JSON file (~/.config/courier/smtp.json)
    /// 2. Runtime environment variables SMTP_USER / SMTP_PASS
    ///    (with optional SMTP_HOST, SMTP_PORT)
    pub fn load() -> Result<Self> {
        if config::config_exists(SMTP_FILE) {
            return config::load_json(SMTP_FILE);
        }
        Self::from_env()
    }

    /// Load SMTP settings from environment variables
    pub fn from_env() -> Result<Self> {
        let username =
            std::env::var("SMTP_USER").context("SMTP_USER environment variable not set")?;
        let password =
            std::env::var("SMTP_PASS").context("SMTP_PASS environment variable not set")?;
        let host = std::env::var("SMTP_HOST").unwrap_or_else(|_| default_smtp_host());
        let port = match std::env::var("SMTP_PORT") {
            Ok(raw) => raw
                .parse()
                .with_context(|| format!("SMTP_PORT is not a valid port: {}", raw))?,
            Err(_) => default_smtp_port(),
        };

        Ok(Self {
            host,
            port,
            username,
            password,
            from: None,
        })
    }

    /// The address mail is sent from
    pub fn sender_address(&self) -> &str {
        self.from.as_deref().unwrap_or(&self.username)
    }
}
