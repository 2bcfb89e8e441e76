//! Phase and run types for the daily report workflow

use crate::error::ErrorKind;
use crate::models::{AnalysisStats, RankedOption};
use chrono::{DateTime, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Pipeline phases, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Fetch,
    Analyze,
    Render,
    Deliver,
}

impl Phase {
    pub const ALL: [Phase; 4] = [Phase::Fetch, Phase::Analyze, Phase::Render, Phase::Deliver];

    pub fn name(&self) -> &'static str {
        match self {
            Phase::Fetch => "fetch",
            Phase::Analyze => "analyze",
            Phase::Render => "render",
            Phase::Deliver => "deliver",
        }
    }

    /// 1-based position in the pipeline
    pub fn number(&self) -> usize {
        match self {
            Phase::Fetch => 1,
            Phase::Analyze => 2,
            Phase::Render => 3,
            Phase::Deliver => 4,
        }
    }

    pub fn state(&self) -> RunState {
        match self {
            Phase::Fetch => RunState::PhaseFetch,
            Phase::Analyze => RunState::PhaseAnalyze,
            Phase::Render => RunState::PhaseRender,
            Phase::Deliver => RunState::PhaseDeliver,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PhaseStatus {
    Succeeded { artifact: Option<PathBuf> },
    Skipped { reason: String },
    Failed { kind: ErrorKind, message: String },
}

impl PhaseStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, PhaseStatus::Failed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseOutcome {
    pub phase: Phase,
    #[serde(flatten)]
    pub status: PhaseStatus,
    pub duration_ms: u64,
}

/// States a run moves through; the full trail is kept in [`RunOutcome`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    Init,
    LockAcquired,
    PhaseFetch,
    PhaseAnalyze,
    PhaseRender,
    PhaseDeliver,
    Skipped,
    Failed,
    NotifyAttempted,
    Interrupted,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Succeeded,
    Failed,
    Interrupted,
}

impl RunStatus {
    pub fn exit_code(&self) -> u8 {
        match self {
            RunStatus::Succeeded => 0,
            RunStatus::Failed => 1,
            RunStatus::Interrupted => 130,
        }
    }
}

/// Record of one invocation, persisted as JSON next to the logs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    pub date: NaiveDate,
    pub status: RunStatus,
    pub exit_code: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub states: Vec<RunState>,
    pub phases: Vec<PhaseOutcome>,
    /// Selected rows; zero means a soft success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<usize>,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Succeeded
    }

    pub fn phase(&self, phase: Phase) -> Option<&PhaseOutcome> {
        self.phases.iter().find(|p| p.phase == phase)
    }
}

/// Output of the fetch phase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchedArtifact {
    pub path: PathBuf,
    pub bytes: u64,
    /// Existing artifact reused without invoking the command
    pub reused: bool,
    pub attempts: u32,
}

/// Output of the analyze phase
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisOutput {
    pub rows: Vec<RankedOption>,
    pub stats: AnalysisStats,
}

impl AnalysisOutput {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Output of the render phase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedReport {
    pub path: PathBuf,
    pub bytes: u64,
}
