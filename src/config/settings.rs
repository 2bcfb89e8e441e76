//! Typed run configuration loaded from TOML

use crate::config::env::{expand_value, get_smtp_password};
use crate::error::ConfigError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Largest accepted `fetch.max_attempts`
pub const MAX_FETCH_ATTEMPTS: u32 = 20;

/// Largest accepted `fetch.retry_interval_minutes` (one day)
pub const MAX_RETRY_INTERVAL_MINUTES: f64 = 1440.0;

/// Largest accepted `lock.ttl_hours` (one week)
pub const MAX_LOCK_TTL_HOURS: f64 = 168.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub paths: PathSettings,
    pub fetch: FetchSettings,
    pub lock: LockSettings,
    pub filters: FilterSettings,
    pub report: ReportSettings,
    pub email: EmailSettings,
    pub calendar: CalendarSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    /// Fetch artifacts and date locks
    pub processed_dir: PathBuf,
    /// Scratch space for the fetch command
    pub raw_dir: PathBuf,
    pub reports_dir: PathBuf,
    pub logs_dir: PathBuf,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            processed_dir: PathBuf::from("data/processed"),
            raw_dir: PathBuf::from("data/raw"),
            reports_dir: PathBuf::from("output/reports"),
            logs_dir: PathBuf::from("logs"),
        }
    }
}

impl PathSettings {
    pub fn all(&self) -> [&Path; 4] {
        [
            self.logs_dir.as_path(),
            self.reports_dir.as_path(),
            self.processed_dir.as_path(),
            self.raw_dir.as_path(),
        ]
    }
}

/// External download command. `{date}` and `{output}` in `args` are
/// replaced with the business date and the artifact path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchSettings {
    pub command: String,
    pub args: Vec<String>,
    pub dataset: String,
    pub extension: String,
    pub timeout_secs: u64,
    pub max_attempts: u32,
    pub retry_interval_minutes: f64,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            command: "Rscript".to_string(),
            args: vec![
                "scripts/download_b3_data.R".to_string(),
                "--date={date}".to_string(),
                "--output={output}".to_string(),
            ],
            dataset: "cotahist".to_string(),
            extension: "csv".to_string(),
            timeout_secs: 600,
            max_attempts: 3,
            retry_interval_minutes: 5.0,
        }
    }
}

impl FetchSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Base backoff interval
    pub fn retry_base(&self) -> Duration {
        let minutes = self.retry_interval_minutes.clamp(0.0, MAX_RETRY_INTERVAL_MINUTES);
        Duration::try_from_secs_f64(minutes * 60.0).unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockSettings {
    pub ttl_hours: f64,
}

impl Default for LockSettings {
    fn default() -> Self {
        Self { ttl_hours: 24.0 }
    }
}

impl LockSettings {
    pub fn ttl(&self) -> Duration {
        let hours = self.ttl_hours.clamp(0.0, MAX_LOCK_TTL_HOURS);
        Duration::try_from_secs_f64(hours * 3600.0).unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSettings {
    /// Keep rows with at most this many trades
    pub max_operations: i64,
    /// Keep rows with at least this financial volume (BRL)
    pub min_financial_volume: f64,
    pub top_n: usize,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            max_operations: 5,
            min_financial_volume: 100_000.0,
            top_n: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportSettings {
    /// Rendered reports smaller than this are treated as broken
    pub min_bytes: u64,
    pub title: String,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            min_bytes: 1024,
            title: "Relatório Diário - Grandes Operações de Opções B3".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailSettings {
    pub enabled: bool,
    pub send_failure_alerts: bool,
    pub send_empty_report: bool,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_user: String,
    pub smtp_pass: String,
    pub recipients: Vec<String>,
    /// `{trade_date}` is replaced with the date as dd/mm/YYYY
    pub subject_template: String,
}

impl Default for EmailSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            send_failure_alerts: true,
            send_empty_report: true,
            smtp_host: "smtp.gmail.com".to_string(),
            smtp_port: 587,
            smtp_user: String::new(),
            smtp_pass: String::new(),
            recipients: Vec::new(),
            subject_template: "Relatório B3 Opções - {trade_date}".to_string(),
        }
    }
}

impl EmailSettings {
    /// Password with `GMAIL_APP_PASSWORD` taking precedence over `smtp_pass`
    pub fn resolved_password(&self) -> Option<String> {
        get_smtp_password().or_else(|| {
            let pass = self.smtp_pass.trim();
            (!pass.is_empty() && !pass.starts_with('$')).then(|| pass.to_string())
        })
    }
}

/// Exchange holidays on top of the national calendar
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarSettings {
    pub holidays: Vec<NaiveDate>,
}

impl Settings {
    /// Load, expand environment variables and validate
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            });
        }
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = Self::from_toml_str(&raw).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;
        debug!(path = %path.display(), "Configuration loaded from {}", path.display());
        Ok(settings)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let parse_err = |source| ConfigError::Parse {
            path: PathBuf::new(),
            source,
        };
        let value: toml::Value = toml::from_str(raw).map_err(parse_err)?;
        let settings: Settings = expand_value(value).try_into().map_err(parse_err)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        if self.fetch.command.trim().is_empty() {
            return invalid("fetch.command must not be empty");
        }
        if self.fetch.dataset.trim().is_empty() {
            return invalid("fetch.dataset must not be empty");
        }
        if self.fetch.max_attempts < 1 {
            return invalid("fetch.max_attempts must be at least 1");
        }
        if self.fetch.max_attempts > MAX_FETCH_ATTEMPTS {
            return invalid("fetch.max_attempts must be at most 20");
        }
        if self.fetch.timeout_secs == 0 {
            return invalid("fetch.timeout_secs must be positive");
        }
        if !self.fetch.retry_interval_minutes.is_finite() || self.fetch.retry_interval_minutes < 0.0 {
            return invalid("fetch.retry_interval_minutes must be a non-negative number");
        }
        if self.fetch.retry_interval_minutes > MAX_RETRY_INTERVAL_MINUTES {
            return invalid("fetch.retry_interval_minutes must be at most 1440");
        }
        if !self.lock.ttl_hours.is_finite() || self.lock.ttl_hours <= 0.0 {
            return invalid("lock.ttl_hours must be positive");
        }
        if self.lock.ttl_hours > MAX_LOCK_TTL_HOURS {
            return invalid("lock.ttl_hours must be at most 168");
        }
        if self.filters.top_n < 1 {
            return invalid("filters.top_n must be at least 1");
        }
        if !self.filters.min_financial_volume.is_finite() {
            return invalid("filters.min_financial_volume must be a number");
        }
        if self.email.enabled && self.email.smtp_host.trim().is_empty() {
            return invalid("email.smtp_host must be set when email is enabled");
        }
        Ok(())
    }
}
