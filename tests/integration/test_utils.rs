//! Shared fakes for the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::NaiveDate;
use optrix::analysis::Analyzer;
use optrix::config::{FilterSettings, Settings};
use optrix::core::process::{CommandOutput, CommandRunner, CommandSpec};
use optrix::error::{DeliveryError, FetchError, PhaseError, ProcessError};
use optrix::jobs::context::{JobContext, RunContext, RunFlags};
use optrix::jobs::types::{AnalysisOutput, FetchedArtifact, RenderedReport};
use optrix::models::{AnalysisStats, RankedOption};
use optrix::report::ReportRenderer;
use optrix::services::mailer::{
    FailureNotifier, MailTransport, OutgoingEmail, ReportDeliverer, SmtpCredentials,
};
use optrix::services::market_data::MarketDataFetcher;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

pub const SAMPLE_CSV: &str = "\
trade_date,symbol,underlying,option_type,maturity_date,strike_price,qtdneg,quatot,voltot,preult,premed
2024-01-10,PETRK250,PETR4,CALL,2024-11-18,25.0,3,1000,500000.0,1.52,1.50
2024-01-10,VALEF240,VALE3,CALL,2024-06-17,24.0,4,2000,450000.0,2.35,2.30
2024-01-10,BBASK245,BBAS3,CALL,2024-11-18,24.5,2,1500,400000.0,3.15,3.10
2024-01-10,ITUBK230,ITUB4,CALL,2024-11-18,23.0,5,3000,350000.0,1.85,1.80
2024-01-10,MGLUV235,MGLU3,PUT,2024-10-21,23.5,3,1200,300000.0,0.92,0.90
2024-01-10,B3SAK240,B3SA3,CALL,2024-11-18,24.0,1,800,250000.0,2.10,2.05
2024-01-10,WDOK235,WDOH,PUT,2024-11-18,23.5,4,1600,200000.0,1.30,1.25
2024-01-10,SUZBL230,SUZB3,CALL,2024-12-16,23.0,2,900,150000.0,1.70,1.65
2024-01-10,VIAJ245,VIIA3,PUT,2024-10-21,24.5,5,2500,125000.0,0.55,0.52
2024-01-10,RADLM240,RADL3,CALL,2024-01-15,24.0,6,3500,100000.0,0.30,0.29
";

pub fn trade_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 10).expect("valid date")
}

/// Settings rooted in a temporary directory, with fast defaults
pub fn test_settings(root: &Path) -> Settings {
    let mut settings = Settings::default();
    settings.paths.processed_dir = root.join("processed");
    settings.paths.raw_dir = root.join("raw");
    settings.paths.reports_dir = root.join("reports");
    settings.paths.logs_dir = root.join("logs");
    settings.fetch.command = "fetch-data".to_string();
    settings.fetch.args = vec!["--date={date}".to_string(), "--output={output}".to_string()];
    settings.fetch.retry_interval_minutes = 5.0 / 60.0;
    settings.report.min_bytes = 16;
    settings.email.smtp_user = "reports@example.com".to_string();
    settings.email.smtp_pass = "app-password".to_string();
    settings.email.recipients = vec!["desk@example.com".to_string()];
    settings
}

pub fn test_context(settings: Settings, flags: RunFlags) -> RunContext {
    RunContext::new(trade_date(), Arc::new(settings), flags)
}

pub fn temp_root() -> TempDir {
    tempfile::tempdir().expect("create temp dir")
}

pub fn ranked(symbol: &str, avg_ticket: f64) -> RankedOption {
    RankedOption {
        symbol: symbol.to_string(),
        underlying: "PETR4".to_string(),
        option_type: "CALL".to_string(),
        maturity_date: None,
        strike_price: Some(25.0),
        premed: Some(1.5),
        preult: Some(1.52),
        voltot: avg_ticket * 2.0,
        qtdneg: 2,
        quatot: Some(1000),
        avg_ticket,
        day_share_pct: 1.0,
    }
}

pub fn analysis_with_rows(rows: Vec<RankedOption>) -> AnalysisOutput {
    let stats = AnalysisStats {
        total_options: 100,
        total_volume: 10_000_000.0,
        after_filters: rows.len(),
        ..AnalysisStats::default()
    };
    AnalysisOutput { rows, stats }
}

// ---------------------------------------------------------------------------
// Command runner
// ---------------------------------------------------------------------------

/// What the scripted runner does on one invocation
#[derive(Debug, Clone)]
pub enum Step {
    /// Write `content` to the `--output=` path and exit 0
    Succeed(String),
    /// Exit 0 without writing anything
    SucceedWithoutArtifact,
    /// Write a partial file, then exit with `code`
    PartialThenExit(i32),
    Exit(i32),
    NotFound,
    Timeout,
}

/// [`CommandRunner`] that replays a script and records every call
pub struct ScriptedRunner {
    steps: Mutex<VecDeque<Step>>,
    calls: Mutex<Vec<CommandSpec>>,
}

impl ScriptedRunner {
    pub fn new(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().expect("calls lock").clone()
    }
}

fn output_arg(spec: &CommandSpec) -> Option<PathBuf> {
    spec.args
        .iter()
        .find_map(|a| a.strip_prefix("--output=").map(PathBuf::from))
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, ProcessError> {
        self.calls.lock().expect("calls lock").push(spec.clone());
        let step = self
            .steps
            .lock()
            .expect("steps lock")
            .pop_front()
            .unwrap_or(Step::Exit(1));

        let exit = |code: i32| CommandOutput {
            exit_code: Some(code),
            stdout: Vec::new(),
            stderr: Vec::new(),
        };

        match step {
            Step::Succeed(content) => {
                let output = output_arg(spec).expect("--output argument");
                std::fs::write(output, content).expect("write artifact");
                Ok(exit(0))
            }
            Step::SucceedWithoutArtifact => Ok(exit(0)),
            Step::PartialThenExit(code) => {
                let output = output_arg(spec).expect("--output argument");
                std::fs::write(output, "trade_date,sym").expect("write partial artifact");
                Ok(exit(code))
            }
            Step::Exit(code) => Ok(exit(code)),
            Step::NotFound => Err(ProcessError::CommandNotFound {
                program: spec.program.clone(),
            }),
            Step::Timeout => Err(ProcessError::Timeout {
                program: spec.program.clone(),
                timeout: spec.timeout,
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Phase collaborators
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub enum FetchBehavior {
    Succeed(PathBuf),
    Fail,
    /// Never completes; used to exercise interrupts
    Hang,
}

pub struct StubFetcher {
    behavior: FetchBehavior,
    pub calls: AtomicUsize,
}

impl StubFetcher {
    pub fn new(behavior: FetchBehavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl MarketDataFetcher for StubFetcher {
    async fn fetch(&self, date: NaiveDate, _force: bool) -> Result<FetchedArtifact, PhaseError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            FetchBehavior::Succeed(path) => Ok(FetchedArtifact {
                path: path.clone(),
                bytes: 128,
                reused: false,
                attempts: 1,
            }),
            FetchBehavior::Fail => Err(FetchError::Exhausted {
                date: date.to_string(),
                attempts: 3,
                last: "fetch command `fetch-data` exited with code 1".to_string(),
            }
            .into()),
            FetchBehavior::Hang => {
                std::future::pending::<()>().await;
                unreachable!()
            }
        }
    }
}

pub struct StubAnalyzer {
    output: AnalysisOutput,
    pub seen: Mutex<Vec<(PathBuf, FilterSettings)>>,
}

impl StubAnalyzer {
    pub fn new(output: AnalysisOutput) -> Arc<Self> {
        Arc::new(Self {
            output,
            seen: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl Analyzer for StubAnalyzer {
    async fn analyze(
        &self,
        path: &Path,
        filters: &FilterSettings,
    ) -> Result<AnalysisOutput, PhaseError> {
        self.seen
            .lock()
            .expect("seen lock")
            .push((path.to_path_buf(), filters.clone()));
        Ok(self.output.clone())
    }
}

/// Writes a report of fixed size into a directory
pub struct StubRenderer {
    dir: PathBuf,
    size: usize,
    pub calls: AtomicUsize,
}

impl StubRenderer {
    pub fn new(dir: &Path, size: usize) -> Arc<Self> {
        Arc::new(Self {
            dir: dir.to_path_buf(),
            size,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl ReportRenderer for StubRenderer {
    async fn render(
        &self,
        _rows: &[RankedOption],
        date: NaiveDate,
        _stats: &AnalysisStats,
    ) -> Result<RenderedReport, PhaseError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::fs::create_dir_all(&self.dir).expect("create report dir");
        let path = self.dir.join(format!("report_{}.html", date));
        std::fs::write(&path, "x".repeat(self.size)).expect("write report");
        Ok(RenderedReport {
            path,
            bytes: self.size as u64,
        })
    }
}

#[derive(Default)]
pub struct RecordingDeliverer {
    pub deliveries: Mutex<Vec<(PathBuf, usize)>>,
    pub fail: bool,
}

impl RecordingDeliverer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            deliveries: Mutex::new(Vec::new()),
            fail: true,
        })
    }

    pub fn count(&self) -> usize {
        self.deliveries.lock().expect("deliveries lock").len()
    }
}

#[async_trait]
impl ReportDeliverer for RecordingDeliverer {
    async fn deliver(
        &self,
        report: &Path,
        _date: NaiveDate,
        rows: &[RankedOption],
        _stats: &AnalysisStats,
    ) -> Result<(), PhaseError> {
        self.deliveries
            .lock()
            .expect("deliveries lock")
            .push((report.to_path_buf(), rows.len()));
        if self.fail {
            return Err(DeliveryError::AuthenticationFailed("535 bad credentials".to_string()).into());
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().expect("messages lock").clone()
    }
}

#[async_trait]
impl FailureNotifier for RecordingNotifier {
    async fn notify_failure(&self, message: &str) {
        self.messages
            .lock()
            .expect("messages lock")
            .push(message.to_string());
    }
}

pub struct PanickingNotifier;

#[async_trait]
impl FailureNotifier for PanickingNotifier {
    async fn notify_failure(&self, _message: &str) {
        panic!("notifier exploded");
    }
}

/// Signals `started` when called, then never finishes
#[derive(Default)]
pub struct HangingNotifier {
    pub started: Arc<tokio::sync::Notify>,
}

#[async_trait]
impl FailureNotifier for HangingNotifier {
    async fn notify_failure(&self, _message: &str) {
        self.started.notify_one();
        std::future::pending::<()>().await;
    }
}

pub fn job_context(
    fetcher: Arc<dyn MarketDataFetcher>,
    analyzer: Arc<dyn Analyzer>,
    renderer: Arc<dyn ReportRenderer>,
    deliverer: Arc<dyn ReportDeliverer>,
    notifier: Arc<dyn FailureNotifier>,
) -> JobContext {
    JobContext::new(fetcher, analyzer, renderer, deliverer, notifier)
}

// ---------------------------------------------------------------------------
// Mail transport
// ---------------------------------------------------------------------------

/// Replays a list of send results; succeeds once the list runs out
pub struct ScriptedTransport {
    results: Mutex<VecDeque<Result<(), DeliveryError>>>,
    pub sent: Mutex<Vec<OutgoingEmail>>,
}

impl ScriptedTransport {
    pub fn new(results: Vec<Result<(), DeliveryError>>) -> Arc<Self> {
        Arc::new(Self {
            results: Mutex::new(results.into()),
            sent: Mutex::new(Vec::new()),
        })
    }

    pub fn attempts(&self) -> usize {
        self.sent.lock().expect("sent lock").len()
    }

    pub fn last(&self) -> Option<OutgoingEmail> {
        self.sent.lock().expect("sent lock").last().cloned()
    }
}

#[async_trait]
impl MailTransport for ScriptedTransport {
    async fn send(
        &self,
        _credentials: &SmtpCredentials,
        email: &OutgoingEmail,
    ) -> Result<(), DeliveryError> {
        self.sent.lock().expect("sent lock").push(email.clone());
        self.results
            .lock()
            .expect("results lock")
            .pop_front()
            .unwrap_or(Ok(()))
    }
}

/// Generous upper bound for tests that must not actually wait on backoff
pub const FAST_TEST_BUDGET: Duration = Duration::from_secs(5);
