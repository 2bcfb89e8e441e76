//! Ordered phase pipeline for the daily report
//!
//! The workflow is: fetch → analyze → render → deliver. One loop walks
//! [`PIPELINE`] and stops at the first failure; outputs of earlier phases
//! are carried in [`PipelineData`].

use crate::error::PhaseError;
use crate::jobs::context::{JobContext, RunContext};
use crate::jobs::handlers;
use crate::jobs::types::{
    AnalysisOutput, FetchedArtifact, Phase, PhaseOutcome, PhaseStatus, RenderedReport, RunState,
};
use std::time::Instant;
use tracing::{error, info};

/// Execution order
pub const PIPELINE: [Phase; 4] = Phase::ALL;

/// Outputs produced so far
#[derive(Debug, Default)]
pub struct PipelineData {
    pub artifact: Option<FetchedArtifact>,
    pub analysis: Option<AnalysisOutput>,
    pub report: Option<RenderedReport>,
}

/// State trail and per-phase outcomes. Lives outside the pipeline future so
/// it survives an interrupt.
#[derive(Debug, Default)]
pub struct RunRecorder {
    states: Vec<RunState>,
    phases: Vec<PhaseOutcome>,
}

impl RunRecorder {
    pub fn new() -> Self {
        Self {
            states: vec![RunState::Init],
            phases: Vec::new(),
        }
    }

    pub fn enter(&mut self, state: RunState) {
        self.states.push(state);
    }

    pub fn record(&mut self, outcome: PhaseOutcome) {
        self.phases.push(outcome);
    }

    pub fn states(&self) -> &[RunState] {
        &self.states
    }

    pub fn phases(&self) -> &[PhaseOutcome] {
        &self.phases
    }

    pub fn into_parts(self) -> (Vec<RunState>, Vec<PhaseOutcome>) {
        (self.states, self.phases)
    }
}

/// How the pipeline ended
#[derive(Debug)]
pub enum PipelineResult {
    Completed { rows: usize },
    Failed { phase: Phase, error: PhaseError },
}

/// Run every phase in order, halting at the first failure
pub async fn run_pipeline(
    job: &JobContext,
    run: &RunContext,
    recorder: &mut RunRecorder,
) -> PipelineResult {
    let mut data = PipelineData::default();

    for phase in PIPELINE {
        if phase == Phase::Deliver {
            let skip = data
                .analysis
                .as_ref()
                .and_then(|analysis| handlers::delivery_skip_reason(run, analysis));
            if let Some(reason) = skip {
                info!(
                    phase = %phase,
                    reason = %reason,
                    "[PHASE {}/{}] {} skipped: {}",
                    phase.number(),
                    PIPELINE.len(),
                    phase,
                    reason
                );
                recorder.enter(RunState::Skipped);
                recorder.record(PhaseOutcome {
                    phase,
                    status: PhaseStatus::Skipped { reason },
                    duration_ms: 0,
                });
                continue;
            }
        }

        recorder.enter(phase.state());
        info!(
            phase = %phase,
            date = %run.date(),
            "[PHASE {}/{}] {}",
            phase.number(),
            PIPELINE.len(),
            phase
        );

        let started = Instant::now();
        let result = run_phase(phase, job, run, &mut data).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(artifact) => recorder.record(PhaseOutcome {
                phase,
                status: PhaseStatus::Succeeded { artifact },
                duration_ms,
            }),
            Err(err) => {
                error!(
                    phase = %phase,
                    kind = ?err.kind(),
                    error = %err,
                    "[PHASE {}/{}] {} failed: {}",
                    phase.number(),
                    PIPELINE.len(),
                    phase,
                    err
                );
                recorder.record(PhaseOutcome {
                    phase,
                    status: PhaseStatus::Failed {
                        kind: err.kind(),
                        message: err.to_string(),
                    },
                    duration_ms,
                });
                return PipelineResult::Failed { phase, error: err };
            }
        }
    }

    let rows = data.analysis.as_ref().map(|a| a.rows.len()).unwrap_or(0);
    PipelineResult::Completed { rows }
}

/// Dispatch one phase; returns the artifact path it produced, if any
async fn run_phase(
    phase: Phase,
    job: &JobContext,
    run: &RunContext,
    data: &mut PipelineData,
) -> Result<Option<std::path::PathBuf>, PhaseError> {
    match phase {
        Phase::Fetch => {
            let artifact = handlers::handle_fetch(job, run).await?;
            let path = artifact.path.clone();
            data.artifact = Some(artifact);
            Ok(Some(path))
        }
        Phase::Analyze => {
            let artifact = data.artifact.as_ref().ok_or_else(|| missing_input(phase))?;
            let analysis = handlers::handle_analyze(job, run, artifact).await?;
            data.analysis = Some(analysis);
            Ok(None)
        }
        Phase::Render => {
            let analysis = data.analysis.as_ref().ok_or_else(|| missing_input(phase))?;
            let report = handlers::handle_render(job, run, analysis).await?;
            let path = report.path.clone();
            data.report = Some(report);
            Ok(Some(path))
        }
        Phase::Deliver => {
            let report = data.report.as_ref().ok_or_else(|| missing_input(phase))?;
            let analysis = data.analysis.as_ref().ok_or_else(|| missing_input(phase))?;
            handlers::handle_deliver(job, run, report, analysis).await?;
            Ok(None)
        }
    }
}

fn missing_input(phase: Phase) -> PhaseError {
    PhaseError::Unexpected(format!("{} phase started without its input", phase))
}
