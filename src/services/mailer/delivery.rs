//! Report email and failure alert, with retry on transient SMTP errors

use crate::config::EmailSettings;
use crate::core::retry::RetryPolicy;
use crate::error::{DeliveryError, PhaseError};
use crate::models::{AnalysisStats, RankedOption};
use crate::services::mailer::message::{
    failure_body, failure_subject, render_subject, report_body, EmailAttachment, OutgoingEmail,
};
use crate::services::mailer::{FailureNotifier, MailTransport, ReportDeliverer, SmtpCredentials};
use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Attachments above this size risk being rejected by the provider
const LARGE_ATTACHMENT_BYTES: usize = 20 * 1024 * 1024;

pub struct EmailDelivery {
    settings: EmailSettings,
    transport: Arc<dyn MailTransport>,
    report_policy: RetryPolicy,
    alert_policy: RetryPolicy,
    log_file: PathBuf,
}

impl EmailDelivery {
    pub fn new(settings: EmailSettings, transport: Arc<dyn MailTransport>) -> Self {
        Self {
            settings,
            transport,
            report_policy: RetryPolicy::delivery(),
            alert_policy: RetryPolicy::alert(),
            log_file: PathBuf::from("logs/execution.log"),
        }
    }

    pub fn with_fast_retry(mut self, fast: bool) -> Self {
        self.report_policy = self.report_policy.with_fast_retry(fast);
        self.alert_policy = self.alert_policy.with_fast_retry(fast);
        self
    }

    /// Log file named in failure alerts
    pub fn with_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = path.into();
        self
    }

    /// Sender login, password and at least one recipient
    pub fn credentials(&self) -> Result<SmtpCredentials, DeliveryError> {
        let user = self.settings.smtp_user.trim();
        if user.is_empty() || user.starts_with('$') {
            return Err(DeliveryError::MissingCredentials(
                "email.smtp_user is not configured".to_string(),
            ));
        }
        let password = self.settings.resolved_password().ok_or_else(|| {
            DeliveryError::MissingCredentials(
                "GMAIL_APP_PASSWORD is not set and email.smtp_pass is empty".to_string(),
            )
        })?;
        if self.settings.recipients.is_empty() {
            return Err(DeliveryError::MissingCredentials(
                "email.recipients is empty".to_string(),
            ));
        }
        Ok(SmtpCredentials {
            user: user.to_string(),
            password,
        })
    }

    pub async fn send_report(
        &self,
        report: &Path,
        date: NaiveDate,
        rows: &[RankedOption],
        stats: &AnalysisStats,
    ) -> Result<(), DeliveryError> {
        let credentials = self.credentials()?;

        let content = tokio::fs::read(report).await.map_err(|e| {
            DeliveryError::InvalidMessage(format!("report {}: {}", report.display(), e))
        })?;
        if content.is_empty() {
            return Err(DeliveryError::InvalidMessage(format!(
                "report {} is empty",
                report.display()
            )));
        }
        if content.len() > LARGE_ATTACHMENT_BYTES {
            warn!(
                bytes = content.len(),
                "Large attachment ({:.2} MB); the provider may reject it",
                content.len() as f64 / 1024.0 / 1024.0
            );
        }

        let filename = report
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("report_{}.html", date.format("%Y-%m-%d")));

        let email = OutgoingEmail {
            from: credentials.user.clone(),
            to: self.settings.recipients.clone(),
            subject: render_subject(&self.settings.subject_template, date),
            html_body: report_body(date, rows, stats, Local::now()),
            attachment: Some(EmailAttachment {
                filename,
                content_type: "text/html; charset=utf-8".to_string(),
                content,
            }),
        };

        info!(
            recipients = %email.to.join(", "),
            subject = %email.subject,
            "Sending report to {}",
            email.to.join(", ")
        );
        self.send_with_retry(&self.report_policy, &credentials, &email)
            .await
    }

    async fn send_with_retry(
        &self,
        policy: &RetryPolicy,
        credentials: &SmtpCredentials,
        email: &OutgoingEmail,
    ) -> Result<(), DeliveryError> {
        let mut state = policy.start();
        let mut last_error: Option<DeliveryError> = None;

        while let Some(attempt) = state.begin_attempt() {
            info!(
                attempt,
                max_attempts = state.max_attempts(),
                "Attempt {}/{}: sending email",
                attempt,
                state.max_attempts()
            );

            match self.transport.send(credentials, email).await {
                Ok(()) => {
                    info!(attempt, "Email sent to {}", email.to.join(", "));
                    return Ok(());
                }
                Err(err) => {
                    error!(attempt, kind = ?err.kind(), error = %err, "Email attempt {} failed: {}", attempt, err);
                    if !err.kind().is_retryable() {
                        return Err(err);
                    }
                    last_error = Some(err);

                    if policy.should_retry(attempt) {
                        let nominal = policy.delay_for(attempt);
                        warn!(
                            attempt,
                            wait_secs = nominal.as_secs_f64(),
                            "Waiting {}s before retrying",
                            nominal.as_secs_f64()
                        );
                        state.record_wait(nominal);
                        tokio::time::sleep(policy.wait_for(attempt)).await;
                    }
                }
            }
        }

        Err(DeliveryError::Exhausted {
            attempts: state.attempts(),
            last: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "none".to_string()),
        })
    }
}

#[async_trait]
impl ReportDeliverer for EmailDelivery {
    async fn deliver(
        &self,
        report: &Path,
        date: NaiveDate,
        rows: &[RankedOption],
        stats: &AnalysisStats,
    ) -> Result<(), PhaseError> {
        self.send_report(report, date, rows, stats)
            .await
            .map_err(PhaseError::from)
    }
}

#[async_trait]
impl FailureNotifier for EmailDelivery {
    async fn notify_failure(&self, message: &str) {
        let credentials = match self.credentials() {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "Incomplete email credentials, failure alert not sent: {}", e);
                return;
            }
        };

        let now = Local::now();
        let email = OutgoingEmail {
            from: credentials.user.clone(),
            to: self.settings.recipients.clone(),
            subject: failure_subject(now),
            html_body: failure_body(message, now, &self.log_file.display().to_string()),
            attachment: None,
        };

        info!("Sending failure alert");
        match self
            .send_with_retry(&self.alert_policy, &credentials, &email)
            .await
        {
            Ok(()) => info!("Failure alert sent"),
            Err(e) => error!(error = %e, "Could not send failure alert: {}", e),
        }
    }
}
