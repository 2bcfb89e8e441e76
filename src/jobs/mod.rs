//! Daily report workflow: phase types, run context, handlers and pipeline

pub mod context;
pub mod handlers;
pub mod types;
pub mod workflow;

pub use context::{JobContext, RunContext, RunFlags};
pub use types::{Phase, PhaseOutcome, PhaseStatus, RunOutcome, RunState, RunStatus};
pub use workflow::{run_pipeline, PipelineResult, RunRecorder, PIPELINE};
