//! SMTP delivery via [`lettre`].

use std::time::Duration;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::{Credentials as SmtpCredentials, Mechanism};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{debug, info};

use super::{render_html, subject, Notifier};
use crate::config::{Config, Credentials};
use crate::error::{ConfigError, DeliveryError};
use crate::order::DigestBatch;

/// Port on which the relay expects TLS from the first byte.
const IMPLICIT_TLS_PORT: u16 = 465;

/// Mails the digest to one recipient through one authenticated relay.
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
    timeout: Duration,
}

impl SmtpNotifier {
    /// Build the transport from config.  Nothing is sent and no connection
    /// is opened yet, but addresses and relay host are validated here.
    pub fn new(config: &Config, credentials: Credentials) -> Result<Self, ConfigError> {
        let from = parse_mailbox(&config.from_email)?;
        let to = parse_mailbox(&config.to_email)?;

        let relay_err = |source| ConfigError::Relay {
            host: config.smtp_server.clone(),
            source,
        };
        let builder = if config.smtp_port == IMPLICIT_TLS_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_server)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_server)
        }
        .map_err(relay_err)?;

        let timeout = config.send_timeout();
        let transport = builder
            .port(config.smtp_port)
            .credentials(SmtpCredentials::new(
                credentials.username,
                credentials.password,
            ))
            .authentication(vec![Mechanism::Plain])
            .timeout(Some(timeout))
            .build();

        debug!(
            host = %config.smtp_server,
            port = config.smtp_port,
            "SMTP transport configured"
        );
        Ok(Self {
            transport,
            from,
            to,
            timeout,
        })
    }

    fn build_message(&self, batch: &DigestBatch) -> Result<Message, DeliveryError> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(subject(batch))
            .header(ContentType::TEXT_HTML)
            .body(render_html(batch))?;
        Ok(message)
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(&self, batch: &DigestBatch) -> Result<(), DeliveryError> {
        if batch.is_empty() {
            debug!("empty batch, nothing to send");
            return Ok(());
        }
        let message = self.build_message(batch)?;

        match tokio::time::timeout(self.timeout, self.transport.send(message)).await {
            Ok(Ok(response)) => {
                info!(
                    to = %self.to,
                    items = batch.len(),
                    code = %response.code(),
                    "digest sent"
                );
                Ok(())
            }
            // The transport's per-command timeout and this guard share a
            // duration; whichever fires first is the same failure.
            Ok(Err(e)) if e.is_timeout() => Err(DeliveryError::Timeout(self.timeout)),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(DeliveryError::Timeout(self.timeout)),
        }
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, ConfigError> {
    address.parse().map_err(|source| ConfigError::Address {
        address: address.to_string(),
        source,
    })
}
