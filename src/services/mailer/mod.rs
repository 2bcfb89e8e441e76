//! Email delivery of the daily report and failure alerts

pub mod delivery;
pub mod message;
pub mod smtp;

use crate::error::{DeliveryError, PhaseError};
use crate::models::{AnalysisStats, RankedOption};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::path::Path;

pub use delivery::EmailDelivery;
pub use message::{EmailAttachment, OutgoingEmail};
pub use smtp::SmtpMailTransport;

/// Login for the outgoing mail server
#[derive(Clone, PartialEq)]
pub struct SmtpCredentials {
    pub user: String,
    pub password: String,
}

impl std::fmt::Debug for SmtpCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpCredentials")
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

/// Sends one fully built email. Retrying is the caller's concern.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(
        &self,
        credentials: &SmtpCredentials,
        email: &OutgoingEmail,
    ) -> Result<(), DeliveryError>;
}

#[async_trait]
pub trait ReportDeliverer: Send + Sync {
    async fn deliver(
        &self,
        report: &Path,
        date: NaiveDate,
        rows: &[RankedOption],
        stats: &AnalysisStats,
    ) -> Result<(), PhaseError>;
}

/// Best-effort alert channel. Implementations log their own failures and
/// never return them.
#[async_trait]
pub trait FailureNotifier: Send + Sync {
    async fn notify_failure(&self, message: &str);
}
