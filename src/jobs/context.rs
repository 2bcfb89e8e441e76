//! Run context and collaborator wiring for the daily report workflow

use crate::analysis::{Analyzer, OptionsAnalyzer};
use crate::config::Settings;
use crate::core::process::ExternalProcessRunner;
use crate::logging::LOG_FILE_PREFIX;
use crate::report::{HtmlReportRenderer, ReportRenderer};
use crate::services::fetch::FetchStage;
use crate::services::mailer::{
    EmailDelivery, FailureNotifier, ReportDeliverer, SmtpMailTransport,
};
use crate::services::market_data::MarketDataFetcher;
use chrono::{DateTime, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Switches set on the command line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunFlags {
    /// Fetch again even when the artifact exists
    pub force: bool,
    /// Never send the report email
    pub no_email: bool,
    /// Near-zero backoff waits, for diagnostics and tests
    pub fast_retry: bool,
    pub verbose: bool,
}

/// Immutable description of one invocation
#[derive(Debug, Clone)]
pub struct RunContext {
    date: NaiveDate,
    settings: Arc<Settings>,
    flags: RunFlags,
    started_at: DateTime<Local>,
}

impl RunContext {
    pub fn new(date: NaiveDate, settings: Arc<Settings>, flags: RunFlags) -> Self {
        Self {
            date,
            settings,
            flags,
            started_at: Local::now(),
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// `YYYY-MM-DD`, the key for locks and artifacts
    pub fn date_key(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn flags(&self) -> RunFlags {
        self.flags
    }

    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }
}

/// Collaborators the phase handlers call into.
///
/// Every seam is a trait object so the workflow can run against fakes.
#[derive(Clone)]
pub struct JobContext {
    pub fetcher: Arc<dyn MarketDataFetcher>,
    pub analyzer: Arc<dyn Analyzer>,
    pub renderer: Arc<dyn ReportRenderer>,
    pub deliverer: Arc<dyn ReportDeliverer>,
    pub notifier: Arc<dyn FailureNotifier>,
}

impl JobContext {
    pub fn new(
        fetcher: Arc<dyn MarketDataFetcher>,
        analyzer: Arc<dyn Analyzer>,
        renderer: Arc<dyn ReportRenderer>,
        deliverer: Arc<dyn ReportDeliverer>,
        notifier: Arc<dyn FailureNotifier>,
    ) -> Self {
        Self {
            fetcher,
            analyzer,
            renderer,
            deliverer,
            notifier,
        }
    }

    /// Real implementations: external fetch command, CSV analyzer, HTML
    /// renderer and SMTP email
    pub fn production(settings: &Settings, flags: RunFlags) -> Self {
        let fetcher = FetchStage::new(
            settings.fetch.clone(),
            settings.paths.processed_dir.clone(),
            Arc::new(ExternalProcessRunner::new()),
        )
        .with_fast_retry(flags.fast_retry);

        let renderer =
            HtmlReportRenderer::new(settings.paths.reports_dir.clone(), settings.report.title.clone());

        let transport = SmtpMailTransport::new(settings.email.smtp_host.clone(), settings.email.smtp_port);
        let email = Arc::new(
            EmailDelivery::new(settings.email.clone(), Arc::new(transport))
                .with_fast_retry(flags.fast_retry)
                .with_log_file(settings.paths.logs_dir.join(LOG_FILE_PREFIX)),
        );

        Self {
            fetcher: Arc::new(fetcher),
            analyzer: Arc::new(OptionsAnalyzer::new()),
            renderer: Arc::new(renderer),
            deliverer: email.clone(),
            notifier: email,
        }
    }
}
