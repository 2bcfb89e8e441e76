//! SMTP transport over STARTTLS

use crate::error::DeliveryError;
use crate::services::mailer::message::OutgoingEmail;
use crate::services::mailer::{MailTransport, SmtpCredentials};
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;
use tracing::debug;

/// Per-connection timeout
pub const SMTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Reply codes that mean the server refused our login
const AUTH_REPLY_CODES: [&str; 3] = ["530", "534", "535"];

#[derive(Debug, Clone)]
pub struct SmtpMailTransport {
    host: String,
    port: u16,
}

impl SmtpMailTransport {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

#[async_trait]
impl MailTransport for SmtpMailTransport {
    async fn send(
        &self,
        credentials: &SmtpCredentials,
        email: &OutgoingEmail,
    ) -> Result<(), DeliveryError> {
        let message = build_message(email)?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.host)
            .map_err(|e| DeliveryError::SmtpTransient(e.to_string()))?
            .port(self.port)
            .credentials(Credentials::new(
                credentials.user.clone(),
                credentials.password.clone(),
            ))
            .timeout(Some(SMTP_TIMEOUT))
            .build();

        debug!(host = %self.host, port = self.port, "Connecting to SMTP server {}:{}", self.host, self.port);

        transport.send(message).await.map_err(|e| {
            let code = e.status().map(|c| c.to_string());
            classify_smtp_failure(code.as_deref(), &e.to_string())
        })?;
        Ok(())
    }
}

/// Login refusals are permanent; everything else may succeed on retry
pub fn classify_smtp_failure(code: Option<&str>, text: &str) -> DeliveryError {
    let auth_code = code.is_some_and(|c| AUTH_REPLY_CODES.contains(&c));
    let auth_text = text.to_ascii_lowercase().contains("authentication");
    if auth_code || auth_text {
        DeliveryError::AuthenticationFailed(text.to_string())
    } else {
        DeliveryError::SmtpTransient(text.to_string())
    }
}

fn build_message(email: &OutgoingEmail) -> Result<Message, DeliveryError> {
    let invalid = |e: &dyn std::fmt::Display| DeliveryError::InvalidMessage(e.to_string());

    let from: Mailbox = email.from.parse().map_err(|e| invalid(&e))?;
    let mut builder = Message::builder().from(from).subject(email.subject.clone());
    for recipient in &email.to {
        let to: Mailbox = recipient.parse().map_err(|e| invalid(&e))?;
        builder = builder.to(to);
    }

    let body = SinglePart::html(email.html_body.clone());
    let message = match &email.attachment {
        Some(attachment) => {
            let content_type = ContentType::parse(&attachment.content_type).map_err(|e| invalid(&e))?;
            let part = Attachment::new(attachment.filename.clone())
                .body(attachment.content.clone(), content_type);
            builder.multipart(MultiPart::mixed().singlepart(body).singlepart(part))
        }
        None => builder.singlepart(body),
    };
    message.map_err(|e| invalid(&e))
}
