//! Market data fetch stage: runs the external download command with retry
//!
//! The artifact for a date is `<processed>/<dataset>_<YYYY-MM-DD>.<ext>`.
//! While an invocation may be writing it, `<artifact>.partial` exists; an
//! artifact found next to that marker is never trusted.

use crate::config::FetchSettings;
use crate::core::process::{CommandRunner, CommandSpec};
use crate::core::retry::{RetryPolicy, RetryState};
use crate::error::{FetchError, PhaseError};
use crate::jobs::types::FetchedArtifact;
use crate::services::market_data::MarketDataFetcher;
use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Result of one stage invocation, with the bookkeeping tests and logs need
#[derive(Debug)]
pub struct FetchReport {
    pub result: Result<FetchedArtifact, FetchError>,
    pub retry: RetryState,
    /// Times the external command was actually started
    pub invocations: u32,
}

pub struct FetchStage {
    settings: FetchSettings,
    processed_dir: PathBuf,
    runner: Arc<dyn CommandRunner>,
    policy: RetryPolicy,
}

impl FetchStage {
    pub fn new(
        settings: FetchSettings,
        processed_dir: impl Into<PathBuf>,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        let policy = RetryPolicy::fetch(settings.max_attempts, settings.retry_base());
        Self {
            settings,
            processed_dir: processed_dir.into(),
            runner,
            policy,
        }
    }

    /// Replace real backoff sleeps with a near-zero wait
    pub fn with_fast_retry(mut self, fast: bool) -> Self {
        self.policy = self.policy.with_fast_retry(fast);
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn artifact_path(&self, date: NaiveDate) -> PathBuf {
        self.processed_dir.join(format!(
            "{}_{}.{}",
            self.settings.dataset,
            date.format("%Y-%m-%d"),
            self.settings.extension
        ))
    }

    /// Command line for `date`, with placeholders filled in
    pub fn command_for(&self, date: NaiveDate, output: &Path) -> CommandSpec {
        let date_str = date.format("%Y-%m-%d").to_string();
        let output_str = output.display().to_string();
        let args = self
            .settings
            .args
            .iter()
            .map(|arg| arg.replace("{date}", &date_str).replace("{output}", &output_str))
            .collect();
        CommandSpec::new(
            resolve_program(&self.settings.command),
            args,
            self.settings.timeout(),
        )
    }

    /// Run the stage for `date`
    pub async fn execute(&self, date: NaiveDate, force: bool) -> FetchReport {
        let mut retry = self.policy.start();
        let mut invocations = 0;
        let result = self
            .execute_inner(date, force, &mut retry, &mut invocations)
            .await;
        FetchReport {
            result,
            retry,
            invocations,
        }
    }

    async fn execute_inner(
        &self,
        date: NaiveDate,
        force: bool,
        retry: &mut RetryState,
        invocations: &mut u32,
    ) -> Result<FetchedArtifact, FetchError> {
        let artifact = self.artifact_path(date);
        let marker = partial_marker(&artifact);

        fs::create_dir_all(&self.processed_dir).map_err(|source| FetchError::Artifact {
            path: self.processed_dir.clone(),
            source,
        })?;

        if marker.exists() {
            warn!(
                path = %artifact.display(),
                "Previous fetch for {} was interrupted mid-write, discarding its output",
                date
            );
        } else if !force {
            if let Some(bytes) = artifact_size(&artifact) {
                info!(
                    path = %artifact.display(),
                    bytes,
                    "Artifact already present: {} ({} bytes), skipping fetch. Use --force to fetch again",
                    artifact.display(),
                    bytes
                );
                return Ok(FetchedArtifact {
                    path: artifact,
                    bytes,
                    reused: true,
                    attempts: 0,
                });
            }
        }

        // Whatever is on disk now is stale, partial or empty
        discard(&artifact, &marker)?;

        let spec = self.command_for(date, &artifact);
        info!(
            program = %spec.program,
            "Fetch command: {} {}",
            spec.program,
            spec.args.join(" ")
        );

        let mut last_error: Option<FetchError> = None;

        while let Some(attempt) = retry.begin_attempt() {
            info!(
                date = %date,
                attempt,
                max_attempts = retry.max_attempts(),
                "Attempt {}/{}: fetching market data for {}",
                attempt,
                retry.max_attempts(),
                date
            );

            let outcome = match fs::write(&marker, Local::now().to_rfc3339()) {
                Ok(()) => {
                    *invocations += 1;
                    self.attempt(&spec, &artifact).await
                }
                Err(source) => Err(FetchError::Artifact {
                    path: marker.clone(),
                    source,
                }),
            };

            match outcome {
                Ok(bytes) => {
                    remove_if_exists(&marker).map_err(|source| FetchError::Artifact {
                        path: marker.clone(),
                        source,
                    })?;
                    info!(
                        date = %date,
                        attempt,
                        path = %artifact.display(),
                        bytes,
                        "Fetch succeeded: {} ({:.2} MB)",
                        artifact.display(),
                        bytes as f64 / 1024.0 / 1024.0
                    );
                    return Ok(FetchedArtifact {
                        path: artifact,
                        bytes,
                        reused: false,
                        attempts: attempt,
                    });
                }
                Err(err) => {
                    if let Err(e) = discard(&artifact, &marker) {
                        warn!(error = %e, "Failed to discard partial fetch output");
                    }
                    error!(
                        date = %date,
                        attempt,
                        kind = ?err.kind(),
                        error = %err,
                        "Attempt {} failed: {}",
                        attempt,
                        err
                    );

                    if !err.kind().is_retryable() {
                        return Err(err);
                    }
                    last_error = Some(err);

                    if self.policy.should_retry(attempt) {
                        let nominal = self.policy.delay_for(attempt);
                        warn!(
                            date = %date,
                            attempt,
                            wait_secs = nominal.as_secs_f64(),
                            "Waiting {:.1} minutes before the next attempt (base {}s x {}^{})",
                            nominal.as_secs_f64() / 60.0,
                            self.policy.base().as_secs_f64(),
                            self.policy.multiplier(),
                            attempt - 1
                        );
                        retry.record_wait(nominal);
                        tokio::time::sleep(self.policy.wait_for(attempt)).await;
                    }
                }
            }
        }

        Err(FetchError::Exhausted {
            date: date.format("%Y-%m-%d").to_string(),
            attempts: retry.attempts(),
            last: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "none".to_string()),
        })
    }

    /// One invocation; success means exit 0 and a non-empty artifact
    async fn attempt(&self, spec: &CommandSpec, artifact: &Path) -> Result<u64, FetchError> {
        let output = self.runner.run(spec).await?;

        if !output.success() {
            return Err(FetchError::NonZeroExit {
                program: spec.program.clone(),
                code: output.exit_code,
            });
        }

        artifact_size(artifact).ok_or_else(|| FetchError::MissingArtifact {
            path: artifact.to_path_buf(),
        })
    }
}

#[async_trait]
impl MarketDataFetcher for FetchStage {
    async fn fetch(&self, date: NaiveDate, force: bool) -> Result<FetchedArtifact, PhaseError> {
        let report = self.execute(date, force).await;
        debug!(
            date = %date,
            attempts = report.retry.attempts(),
            invocations = report.invocations,
            waits = ?report.retry.waits(),
            "Fetch stage finished"
        );
        report.result.map_err(PhaseError::from)
    }
}

/// `<artifact>.partial`
pub fn partial_marker(artifact: &Path) -> PathBuf {
    let mut name = artifact.as_os_str().to_os_string();
    name.push(".partial");
    PathBuf::from(name)
}

/// Size of a usable artifact: present, a regular file and non-empty
fn artifact_size(path: &Path) -> Option<u64> {
    fs::metadata(path)
        .ok()
        .filter(|meta| meta.is_file() && meta.len() > 0)
        .map(|meta| meta.len())
}

fn discard(artifact: &Path, marker: &Path) -> Result<(), FetchError> {
    for path in [artifact, marker] {
        remove_if_exists(path).map_err(|source| FetchError::Artifact {
            path: path.to_path_buf(),
            source,
        })?;
    }
    Ok(())
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Fall back to the bare program name (resolved via `PATH`) when the
/// configured path cannot work on this host.
pub fn resolve_program(configured: &str) -> String {
    let bare = || {
        let name = configured
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(configured);
        name.strip_suffix(".exe").unwrap_or(name).to_string()
    };

    if !cfg!(windows) && configured.contains('\\') {
        let fallback = bare();
        warn!(
            configured = %configured,
            "Configured command looks like a Windows path; using {} from PATH",
            fallback
        );
        return fallback;
    }

    let path = Path::new(configured);
    if path.is_absolute() && !path.exists() {
        let fallback = bare();
        warn!(
            configured = %configured,
            "Configured command {} not found; using {} from PATH",
            configured,
            fallback
        );
        return fallback;
    }

    configured.to_string()
}
