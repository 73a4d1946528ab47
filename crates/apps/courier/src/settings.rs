//! Server settings
//!
//! Loaded from `courier.json` in the config directory when present, then
//! overridden by environment variables.

use anyhow::{Context, Result};
use mail::SyncConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Settings filename in the Courier config directory
const SETTINGS_FILE: &str = "courier.json";

/// Database filename used when no path is configured
const DEFAULT_DATABASE_FILE: &str = "courier.db";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CourierConfig {
    /// Address the HTTP server binds to
    pub bind: String,
    pub port: u16,
    /// SQLite database file; defaults to the data directory
    pub database_path: Option<PathBuf>,
    /// Seconds between scheduled sync passes; 0 disables the schedule
    pub sync_interval_secs: u64,
    pub sync: SyncConfig,
}

impl Default for CourierConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 3001,
            database_path: None,
            sync_interval_secs: 300,
            sync: SyncConfig::default(),
        }
    }
}

impl CourierConfig {
    /// Load settings from `courier.json` (if any), then the environment
    pub fn load() -> Result<Self> {
        let mut settings: Self = config::load_json_if_exists(SETTINGS_FILE)?.unwrap_or_default();
        settings.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(settings)
    }

    /// Override fields from `lookup` (normally the process environment)
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(bind) = lookup("COURIER_BIND") {
            self.bind = bind;
        }
        if let Some(port) = parse_var(&lookup, "PORT")? {
            self.port = port;
        }
        if let Some(path) = lookup("DATABASE_PATH") {
            self.database_path = Some(PathBuf::from(path));
        }
        if let Some(mailbox) = lookup("MAILBOX_ADDRESS") {
            self.sync.mailbox_address = mailbox;
        }
        if let Some(days) = parse_var(&lookup, "SYNC_WINDOW_DAYS")? {
            self.sync.recency_window_days = days;
        }
        if let Some(page_size) = parse_var(&lookup, "SYNC_PAGE_SIZE")? {
            self.sync.page_size = page_size;
        }
        if let Some(concurrency) = parse_var(&lookup, "SYNC_FETCH_CONCURRENCY")? {
            self.sync.fetch_concurrency = concurrency;
        }
        if let Some(secs) = parse_var(&lookup, "SYNC_INTERVAL_SECS")? {
            self.sync_interval_secs = secs;
        }
        Ok(())
    }

    /// Resolve the database file location
    pub fn database_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.database_path {
            return Ok(path.clone());
        }
        config::data_dir()
            .map(|dir| dir.join(DEFAULT_DATABASE_FILE))
            .context("Could not determine data directory; set DATABASE_PATH")
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("{} has an invalid value: {}", key, raw)),
        None => Ok(None),
    }
}
