//! Report runtime: runs the phase pipeline for one business date under the
//! date lock, handles interrupt and failure notification, and records the
//! outcome.

use crate::core::lock::DateLock;
use crate::error::{ErrorKind, PhaseError};
use crate::jobs::context::{JobContext, RunContext};
use crate::jobs::types::{RunOutcome, RunState, RunStatus};
use crate::jobs::workflow::{run_pipeline, PipelineResult, RunRecorder};
use chrono::Local;
use futures_util::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Orchestrates a single daily run
pub struct ReportRuntime {
    job: JobContext,
}

/// How the guarded section ended
enum Completion {
    Finished(PipelineResult),
    Interrupted,
}

impl ReportRuntime {
    pub fn new(job: JobContext) -> Self {
        Self { job }
    }

    /// Run until completion or Ctrl-C
    pub async fn run(&self, ctx: &RunContext) -> RunOutcome {
        self.run_until(ctx, ctrl_c()).await
    }

    /// Run until completion or until `interrupt` resolves
    pub async fn run_until<F>(&self, ctx: &RunContext, interrupt: F) -> RunOutcome
    where
        F: Future<Output = ()>,
    {
        let settings = ctx.settings();
        let date_key = ctx.date_key();
        let flags = ctx.flags();

        info!(
            date = %date_key,
            pid = std::process::id(),
            force = flags.force,
            no_email = flags.no_email,
            fast_retry = flags.fast_retry,
            "Run started for {} ({})",
            ctx.date().format("%d/%m/%Y"),
            ctx.date().format("%A")
        );

        let mut recorder = RunRecorder::new();

        let lock = match DateLock::acquire(&settings.paths.processed_dir, &date_key, settings.lock.ttl()) {
            Ok(lock) => lock,
            Err(e) => {
                error!(date = %date_key, kind = ?e.kind(), error = %e, "Could not acquire run lock: {}", e);
                recorder.enter(RunState::Done);
                // The run record for this date belongs to whoever holds the lock
                return self.finish(ctx, recorder, RunStatus::Failed, Some((e.kind(), e.to_string())), None);
            }
        };
        recorder.enter(RunState::LockAcquired);

        // Stays armed through the failure alert
        tokio::pin!(interrupt);

        let completion = {
            let pipeline = run_pipeline(&self.job, ctx, &mut recorder);
            tokio::select! {
                result = pipeline => Completion::Finished(result),
                _ = &mut interrupt => Completion::Interrupted,
            }
        };

        lock.release();

        let outcome = match completion {
            Completion::Interrupted => {
                warn!(date = %date_key, "Run interrupted by user (Ctrl-C)");
                recorder.enter(RunState::Interrupted);
                recorder.enter(RunState::Done);
                self.finish(ctx, recorder, RunStatus::Interrupted, None, None)
            }
            Completion::Finished(PipelineResult::Completed { rows }) => {
                recorder.enter(RunState::Done);
                if rows == 0 {
                    info!(date = %date_key, "Run completed with no qualifying rows");
                }
                self.finish(ctx, recorder, RunStatus::Succeeded, None, Some(rows))
            }
            Completion::Finished(PipelineResult::Failed { phase, error }) => {
                if error.is_known() {
                    error!(phase = %phase, kind = ?error.kind(), "Known phase failure in {}: {}", phase, error);
                } else {
                    error!(phase = %phase, "Unexpected failure in {}: {}", phase, error);
                }
                recorder.enter(RunState::Failed);

                let failure = Some((error.kind(), error.to_string()));
                let mut interrupted = false;
                if settings.email.send_failure_alerts {
                    tokio::select! {
                        _ = self.notify(&error) => {}
                        _ = &mut interrupt => interrupted = true,
                    }
                    recorder.enter(RunState::NotifyAttempted);
                }

                if interrupted {
                    warn!(date = %date_key, "Run interrupted by user (Ctrl-C) during failure alert");
                    recorder.enter(RunState::Interrupted);
                    recorder.enter(RunState::Done);
                    self.finish(ctx, recorder, RunStatus::Interrupted, failure, None)
                } else {
                    recorder.enter(RunState::Done);
                    self.finish(ctx, recorder, RunStatus::Failed, failure, None)
                }
            }
        };

        persist_outcome(&settings.paths.logs_dir, &outcome);
        outcome
    }

    /// Best-effort alert; a failing or panicking notifier is logged and ignored
    async fn notify(&self, error: &PhaseError) {
        info!("Attempting to send failure alert");
        let message = error.to_string();
        let notification = AssertUnwindSafe(self.job.notifier.notify_failure(&message)).catch_unwind();
        if notification.await.is_err() {
            error!("Failure notifier panicked; original failure stands");
        }
    }

    fn finish(
        &self,
        ctx: &RunContext,
        recorder: RunRecorder,
        status: RunStatus,
        failure: Option<(ErrorKind, String)>,
        rows: Option<usize>,
    ) -> RunOutcome {
        let finished_at = Local::now();
        let duration = (finished_at - ctx.started_at()).num_milliseconds() as f64 / 1000.0;
        let (states, phases) = recorder.into_parts();
        let (error_kind, error) = match failure {
            Some((kind, message)) => (Some(kind), Some(message)),
            None => (None, None),
        };

        info!(
            date = %ctx.date_key(),
            status = ?status,
            exit_code = status.exit_code(),
            duration_secs = duration,
            "Run finished: {:?} in {:.1}s",
            status,
            duration
        );

        RunOutcome {
            date: ctx.date(),
            status,
            exit_code: status.exit_code(),
            error_kind,
            error,
            states,
            phases,
            rows,
            started_at: ctx.started_at(),
            finished_at,
        }
    }
}

/// `<logs>/runs/run_<YYYY-MM-DD>.json`
pub fn outcome_path(logs_dir: &Path, outcome: &RunOutcome) -> PathBuf {
    logs_dir
        .join("runs")
        .join(format!("run_{}.json", outcome.date.format("%Y-%m-%d")))
}

fn persist_outcome(logs_dir: &Path, outcome: &RunOutcome) {
    let path = outcome_path(logs_dir, outcome);
    let result = path
        .parent()
        .map(std::fs::create_dir_all)
        .transpose()
        .map_err(|e| e.to_string())
        .and_then(|_| serde_json::to_vec_pretty(outcome).map_err(|e| e.to_string()))
        .and_then(|json| std::fs::write(&path, json).map_err(|e| e.to_string()));

    if let Err(e) = result {
        warn!(path = %path.display(), error = %e, "Failed to write run record");
    }
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Could not listen for Ctrl-C; interrupt handling disabled");
        std::future::pending::<()>().await;
    }
}
