//! Out-of-band alerting
//!
//! The CAPTCHA gate and the batch runner notify a human through this
//! capability. Delivery failures are the caller's problem to log, never to
//! escalate; a broken relay must not stall a paused browser.

use async_smtp::{EmailAddress, Envelope, SendableEmail, SmtpClient, SmtpTransport};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::BufStream;
use tokio::net::TcpStream;
use tracing::{debug, info};

/// Alert delivery errors
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Invalid alert address '{0}'")]
    Address(String),

    #[error("Connection to relay failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("SMTP failure: {0}")]
    Smtp(String),
}

/// Fire-and-forget notification capability.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_alert(&self, subject: &str, body: &str) -> Result<(), NotifyError>;
}

/// SMTP relay settings for alert mail
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SmtpConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub from: String,
    pub recipients: Vec<String>,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: "localhost".to_string(),
            port: 25,
            from: String::new(),
            recipients: vec![],
        }
    }
}

/// Sends alerts through a plain SMTP relay.
pub struct SmtpNotifier {
    config: SmtpConfig,
}

impl SmtpNotifier {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }

    fn build_message(&self, subject: &str, body: &str) -> String {
        format!(
            "From: {}\r\nTo: {}\r\nSubject: {}\r\n\r\n{}",
            self.config.from,
            self.config.recipients.join(", "),
            subject,
            body
        )
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send_alert(&self, subject: &str, body: &str) -> Result<(), NotifyError> {
        info!(
            "Sending alert '{}' to {} recipient(s)",
            subject,
            self.config.recipients.len()
        );

        let from: EmailAddress = self
            .config
            .from
            .parse()
            .map_err(|_| NotifyError::Address(self.config.from.clone()))?;

        let mut recipients = Vec::with_capacity(self.config.recipients.len());
        for recipient in &self.config.recipients {
            let address: EmailAddress = recipient
                .parse()
                .map_err(|_| NotifyError::Address(recipient.clone()))?;
            recipients.push(address);
        }

        let envelope = Envelope::new(Some(from), recipients)
            .map_err(|e| NotifyError::Smtp(e.to_string()))?;
        let email = SendableEmail::new(envelope, self.build_message(subject, body));

        let stream = TcpStream::connect((self.config.host.as_str(), self.config.port)).await?;
        let stream = BufStream::new(stream);

        let client = SmtpClient::new();
        let mut transport = SmtpTransport::new(client, stream)
            .await
            .map_err(|e| NotifyError::Smtp(e.to_string()))?;
        transport
            .send(email)
            .await
            .map_err(|e| NotifyError::Smtp(e.to_string()))?;

        info!("Alert sent");
        Ok(())
    }
}

/// Notifier used when alerting is disabled. Logs and drops.
pub struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn send_alert(&self, subject: &str, _body: &str) -> Result<(), NotifyError> {
        debug!("Alerting disabled, dropping alert '{}'", subject);
        Ok(())
    }
}
