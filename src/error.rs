//! Error taxonomy for the daily report pipeline
//!
//! Each layer raises its own error type; [`PhaseError`] is what the workflow
//! sees. [`ErrorKind`] is the flat classification written to logs and to the
//! run record.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Flat classification of every failure the pipeline can report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    LockHeld,
    CommandNotFound,
    Timeout,
    NonZeroExit,
    MissingArtifact,
    FetchExhausted,
    SchemaInvalid,
    RenderFailed,
    AuthenticationFailed,
    SmtpTransient,
    DeliveryExhausted,
    MissingCredentials,
    InvalidMessage,
    Config,
    Io,
    Unexpected,
}

impl ErrorKind {
    /// Whether a stage may spend another attempt on this kind of failure
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::NonZeroExit | Self::MissingArtifact | Self::SmtpTransient | Self::Io
        )
    }
}

fn hours(duration: &Duration) -> f64 {
    duration.as_secs_f64() / 3600.0
}

#[derive(Debug, Error)]
pub enum LockError {
    #[error(
        "lock {} is held (age {:.1}h, ttl {:.1}h); another run may be active or failed recently. \
         If no run is active, delete the lock file",
        .path.display(), hours(.age), hours(.ttl)
    )]
    Held {
        path: PathBuf,
        age: Duration,
        ttl: Duration,
    },
    #[error("could not acquire lock {} after {attempts} stale evictions", .path.display())]
    Contended { path: PathBuf, attempts: u32 },
    #[error("lock file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl LockError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Held { .. } | Self::Contended { .. } => ErrorKind::LockHeld,
            Self::Io { .. } => ErrorKind::Io,
        }
    }
}

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("command not found: {program}")]
    CommandNotFound { program: String },
    #[error("command `{program}` timed out after {}s", .timeout.as_secs())]
    Timeout { program: String, timeout: Duration },
    #[error("failed to run `{program}`: {source}")]
    Io {
        program: String,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error(
        "fetch command not found: {program}. Check that it is installed and on PATH, \
         or configure fetch.command"
    )]
    CommandNotFound { program: String },
    #[error("fetch command `{program}` timed out after {}s", .timeout.as_secs())]
    Timeout { program: String, timeout: Duration },
    #[error("fetch command `{program}` exited with code {}", .code.map(|c| c.to_string()).unwrap_or_else(|| "none (killed by signal)".to_string()))]
    NonZeroExit { program: String, code: Option<i32> },
    #[error("fetch finished but artifact {} is missing or empty", .path.display())]
    MissingArtifact { path: PathBuf },
    #[error("failed to run fetch command `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("artifact {}: {source}", .path.display())]
    Artifact {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(
        "market data fetch for {date} failed after {attempts} attempts (last error: {last}).\n\
         Possible causes:\n  \
         - upstream data not yet published (try again later)\n  \
         - {date} is a holiday or weekend (check the exchange calendar)\n  \
         - connectivity problem (check the network)\n  \
         - remote-side or fetch script error (check the log above)"
    )]
    Exhausted {
        date: String,
        attempts: u32,
        last: String,
    },
}

impl FetchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::CommandNotFound { .. } => ErrorKind::CommandNotFound,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::NonZeroExit { .. } => ErrorKind::NonZeroExit,
            Self::MissingArtifact { .. } => ErrorKind::MissingArtifact,
            Self::Spawn { .. } | Self::Artifact { .. } => ErrorKind::Io,
            Self::Exhausted { .. } => ErrorKind::FetchExhausted,
        }
    }
}

impl From<ProcessError> for FetchError {
    fn from(err: ProcessError) -> Self {
        match err {
            ProcessError::CommandNotFound { program } => Self::CommandNotFound { program },
            ProcessError::Timeout { program, timeout } => Self::Timeout { program, timeout },
            ProcessError::Io { program, source } => Self::Spawn { program, source },
        }
    }
}

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("invalid dataset schema: {0}")]
    SchemaInvalid(String),
    #[error("dataset {} not found; run the fetch phase first", .path.display())]
    NotFound { path: PathBuf },
    #[error("failed to read dataset {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

impl AnalysisError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::SchemaInvalid(_) => ErrorKind::SchemaInvalid,
            Self::NotFound { .. } => ErrorKind::MissingArtifact,
            Self::Read { .. } => ErrorKind::SchemaInvalid,
        }
    }
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to write report {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("report {} is too small ({bytes} bytes, expected at least {min}); check the log above", .path.display())]
    TooSmall { path: PathBuf, bytes: u64, min: u64 },
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("SMTP authentication failed: {0}. Check smtp_user and GMAIL_APP_PASSWORD")]
    AuthenticationFailed(String),
    #[error("SMTP error: {0}")]
    SmtpTransient(String),
    #[error("missing email credentials: {0}")]
    MissingCredentials(String),
    #[error("invalid email message: {0}")]
    InvalidMessage(String),
    #[error("email delivery failed after {attempts} attempts (last error: {last})")]
    Exhausted { attempts: u32, last: String },
}

impl DeliveryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AuthenticationFailed(_) => ErrorKind::AuthenticationFailed,
            Self::SmtpTransient(_) => ErrorKind::SmtpTransient,
            Self::MissingCredentials(_) => ErrorKind::MissingCredentials,
            Self::InvalidMessage(_) => ErrorKind::InvalidMessage,
            Self::Exhausted { .. } => ErrorKind::DeliveryExhausted,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file not found: {}; copy config/settings.toml and adjust it", .path.display())]
    NotFound { path: PathBuf },
    #[error("failed to read configuration {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse configuration {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum CalendarError {
    #[error("no business day found within {days} days of {reference}")]
    NoBusinessDay { reference: NaiveDate, days: u32 },
}

/// Failure of a single pipeline phase, as seen by the workflow
#[derive(Debug, Error)]
pub enum PhaseError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
    #[error("unexpected failure: {0}")]
    Unexpected(String),
}

impl PhaseError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Fetch(e) => e.kind(),
            Self::Analysis(e) => e.kind(),
            Self::Render(_) => ErrorKind::RenderFailed,
            Self::Delivery(e) => e.kind(),
            Self::Unexpected(_) => ErrorKind::Unexpected,
        }
    }

    /// Classified failures are "known"; everything else is logged as unexpected
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unexpected(_))
    }
}
