//! Outgoing mail.
//!
//! `Mailer` is the seam: SMTP in production, a log-only mailer when no relay is
//! configured, and an in-memory mailer that tests inspect.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::MailConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub to: Vec<String>,
    pub subject: String,
    pub text_body: String,
    pub html_body: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: OutgoingMail) -> Result<()>;
}

/// Picks SMTP when a server is configured, otherwise the log mailer.
pub fn from_config(config: &MailConfig) -> Result<Arc<dyn Mailer>> {
    match config.server.as_deref() {
        Some(host) => Ok(Arc::new(SmtpMailer::new(host, config)?)),
        None => {
            info!("MAIL_SERVER not set; outgoing mail will only be logged");
            Ok(Arc::new(LogMailer::new(&config.sender)))
        }
    }
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    sender: Mailbox,
}

impl SmtpMailer {
    pub fn new(host: &str, config: &MailConfig) -> Result<Self> {
        let builder = if config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                .with_context(|| format!("Invalid SMTP relay: {host}"))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
        };

        let builder = builder.port(config.port);
        let builder = match (&config.username, &config.password) {
            (Some(user), Some(pass)) => {
                builder.credentials(Credentials::new(user.clone(), pass.clone()))
            }
            _ => builder,
        };

        let sender = config
            .sender
            .parse::<Mailbox>()
            .with_context(|| format!("Invalid mail sender: {}", config.sender))?;

        Ok(Self {
            transport: builder.build(),
            sender,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<()> {
        let mut builder = Message::builder()
            .from(self.sender.clone())
            .subject(mail.subject.clone());

        for to in &mail.to {
            let mailbox = to
                .parse::<Mailbox>()
                .with_context(|| format!("Invalid recipient: {to}"))?;
            builder = builder.to(mailbox);
        }

        let message = builder
            .multipart(MultiPart::alternative_plain_html(
                mail.text_body,
                mail.html_body,
            ))
            .context("Failed to build email")?;

        self.transport
            .send(message)
            .await
            .context("SMTP delivery failed")?;

        info!(subject = %mail.subject, recipients = mail.to.len(), "Mail sent");
        Ok(())
    }
}

pub struct LogMailer {
    sender: String,
}

impl LogMailer {
    #[must_use]
    pub fn new(sender: &str) -> Self {
        Self {
            sender: sender.to_string(),
        }
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<()> {
        info!(
            from = %self.sender,
            to = %mail.to.join(", "),
            subject = %mail.subject,
            "Mail delivery disabled, logging message"
        );
        debug!("{}", mail.text_body);
        Ok(())
    }
}

/// Keeps every message in memory.
#[derive(Default)]
pub struct MemoryMailer {
    sent: Mutex<Vec<OutgoingMail>>,
}

impl MemoryMailer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<()> {
        self.sent.lock().await.push(mail);
        Ok(())
    }
}
