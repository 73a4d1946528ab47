//! Courier - Gmail inbox sync and SMTP mail backend
//!
//! Serves the HTTP API and runs scheduled sync passes.

use std::sync::Arc;
use std::time::Duration;

use log::{error, info, warn};
use mail::{
    GmailClient, GmailCredentials, MailSender, MailStore, SmtpConfig, SmtpSender, SqliteMailStore,
    SyncEngine,
};

mod scheduler;
mod server;
mod settings;

use server::AppState;
use settings::CourierConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    // Bootstrap config directory
    if let Err(e) = config::init() {
        error!("Failed to initialize config directory: {}", e);
    }

    let settings = CourierConfig::load()?;

    let db_path = settings.database_path()?;
    info!("Opening database at {}", db_path.display());
    let store: Arc<dyn MailStore> = Arc::new(SqliteMailStore::new(&db_path)?);

    if settings.sync.mailbox_address.is_empty() {
        warn!("MAILBOX_ADDRESS is not set; sent mail will not be told apart from received mail");
    }

    let engine = match GmailCredentials::load() {
        Ok(creds) => {
            info!("Gmail client initialized");
            let provider = Arc::new(GmailClient::new(creds.access_token));
            Some(Arc::new(SyncEngine::new(
                provider,
                store.clone(),
                settings.sync.clone(),
            )))
        }
        Err(e) => {
            warn!("Gmail credentials not found, sync disabled: {:#}", e);
            if let Some(path) = GmailCredentials::default_token_path() {
                warn!(
                    "To enable sync, place a token file at {} or set GMAIL_ACCESS_TOKEN",
                    path.display()
                );
            }
            None
        }
    };

    let sender: Option<Arc<dyn MailSender>> = match SmtpConfig::load().and_then(|c| SmtpSender::new(&c)) {
        Ok(sender) => Some(Arc::new(sender)),
        Err(e) => {
            warn!("SMTP not configured, sending disabled: {:#}", e);
            None
        }
    };

    if let Some(engine) = &engine
        && settings.sync_interval_secs > 0
    {
        scheduler::spawn(
            engine.clone(),
            Duration::from_secs(settings.sync_interval_secs),
        );
    }

    let state = AppState {
        engine,
        store,
        sender,
        mailbox_address: settings.sync.mailbox_address.clone(),
    };

    server::serve(&settings, state).await
}
