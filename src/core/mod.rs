//! Core application primitives (lock, retry, process runner, orchestrator)

pub mod bootstrap;
pub mod lock;
pub mod process;
pub mod retry;
pub mod runtime;

pub use lock::DateLock;
pub use process::{CommandOutput, CommandRunner, CommandSpec, ExternalProcessRunner};
pub use retry::{RetryPolicy, RetryState};
pub use runtime::ReportRuntime;
