//! SMTP delivery via lettre

use anyhow::{Context, Result};
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, Message, SmtpTransport, Transport};
use log::debug;

use super::{MailSender, OutgoingEmail};
use crate::config::SmtpConfig;

/// Submission port that upgrades a plain connection with STARTTLS
const STARTTLS_PORT: u16 = 587;

/// Sends mail through an authenticated SMTP relay
///
/// Port 587 uses STARTTLS; any other port uses implicit TLS.
pub struct SmtpSender {
    transport: SmtpTransport,
    from: Mailbox,
}

impl SmtpSender {
    pub fn new(config: &SmtpConfig) -> Result<Self> {
        let builder = if config.port == STARTTLS_PORT {
            SmtpTransport::starttls_relay(&config.host)
        } else {
            SmtpTransport::relay(&config.host)
        }
        .with_context(|| format!("Failed to build SMTP relay for {}", config.host))?;

        let transport = builder
            .port(config.port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build();

        let from = parse_address(config.sender_address())
            .map(|address| Mailbox::new(None, address))
            .context("Invalid SMTP sender address")?;

        Ok(Self { transport, from })
    }

    fn build_message(&self, email: &OutgoingEmail) -> Result<Message> {
        let to = Mailbox::new(email.name.clone(), parse_address(&email.to)?);

        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(email.subject.as_str())
            .header(ContentType::TEXT_PLAIN)
            .body(email.body.clone())
            .context("Failed to build message")
    }
}

impl MailSender for SmtpSender {
    fn send(&self, email: &OutgoingEmail) -> Result<()> {
        let message = self.build_message(email)?;
        let response = self
            .transport
            .send(&message)
            .with_context(|| format!("SMTP delivery to {} failed", email.to))?;
        debug!("[SMTP] {} accepted ({})", email.to, response.code());
        Ok(())
    }
}

fn parse_address(raw: &str) -> Result<Address> {
    raw.trim()
        .parse::<Address>()
        .with_context(|| format!("Invalid email address: {}", raw))
}
