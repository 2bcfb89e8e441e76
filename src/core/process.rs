//! External command execution with a hard timeout
//!
//! Output is forwarded to `tracing` line by line while the child runs, so a
//! long download is visible in the execution log before it finishes.

use crate::error::ProcessError;
use async_trait::async_trait;
use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// What to run
#[derive(Debug, Clone, PartialEq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub timeout: Duration,
    pub working_dir: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
            working_dir: None,
        }
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}

/// Captured result of a finished command
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandOutput {
    /// `None` when the child was terminated by a signal
    pub exit_code: Option<i32>,
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Runs an external command to completion or timeout.
///
/// Implementations never interpret the exit code; that is the caller's job.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, ProcessError>;
}

#[derive(Debug, Clone, Copy)]
enum OutputStream {
    Stdout,
    Stderr,
}

/// [`CommandRunner`] backed by `tokio::process`
#[derive(Debug, Default, Clone)]
pub struct ExternalProcessRunner;

impl ExternalProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for ExternalProcessRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, ProcessError> {
        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &spec.working_dir {
            command.current_dir(dir);
        }

        debug!(
            program = %spec.program,
            args = ?spec.args,
            timeout_secs = spec.timeout.as_secs(),
            "Spawning {}",
            spec.program
        );

        let mut child = command.spawn().map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                ProcessError::CommandNotFound {
                    program: spec.program.clone(),
                }
            } else {
                ProcessError::Io {
                    program: spec.program.clone(),
                    source,
                }
            }
        })?;

        let mut stdout_task = child
            .stdout
            .take()
            .map(|out| spawn_forwarder(out, &spec.program, OutputStream::Stdout));
        let mut stderr_task = child
            .stderr
            .take()
            .map(|err| spawn_forwarder(err, &spec.program, OutputStream::Stderr));

        // Deadline includes EOF on both pipes, which a background
        // grandchild can hold open after the child exits
        let finished = tokio::time::timeout(spec.timeout, async {
            let status = child.wait().await?;
            let stdout = collect(stdout_task.as_mut()).await;
            let stderr = collect(stderr_task.as_mut()).await;
            Ok::<_, io::Error>((status, stdout, stderr))
        })
        .await;

        match finished {
            Ok(Ok((status, stdout, stderr))) => {
                debug!(
                    program = %spec.program,
                    exit_code = ?status.code(),
                    "{} exited with {:?}",
                    spec.program,
                    status.code()
                );
                Ok(CommandOutput {
                    exit_code: status.code(),
                    stdout,
                    stderr,
                })
            }
            Ok(Err(source)) => {
                abort(stdout_task);
                abort(stderr_task);
                Err(ProcessError::Io {
                    program: spec.program.clone(),
                    source,
                })
            }
            Err(_) => {
                match child.try_wait() {
                    Ok(Some(status)) => warn!(
                        program = %spec.program,
                        exit_code = ?status.code(),
                        "{} exited but its output stayed open past the timeout",
                        spec.program
                    ),
                    _ => {
                        if let Err(e) = child.start_kill() {
                            warn!(program = %spec.program, error = %e, "Failed to kill timed out command");
                        }
                        // Reap so no zombie is left behind
                        let _ = child.wait().await;
                    }
                }
                abort(stdout_task);
                abort(stderr_task);
                Err(ProcessError::Timeout {
                    program: spec.program.clone(),
                    timeout: spec.timeout,
                })
            }
        }
    }
}

fn spawn_forwarder<R>(reader: R, program: &str, stream: OutputStream) -> JoinHandle<Vec<String>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let label = program_label(program);
    tokio::spawn(forward_lines(reader, label, stream))
}

/// Log every line as it arrives and keep a copy. Invalid UTF-8 is replaced,
/// never fatal.
async fn forward_lines<R>(reader: R, label: String, stream: OutputStream) -> Vec<String>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut captured = Vec::new();
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf)
                    .trim_end_matches(['\r', '\n'])
                    .to_string();
                match stream {
                    OutputStream::Stdout => info!(source = %label, "[{}] {}", label, line),
                    OutputStream::Stderr => {
                        if !line.trim().is_empty() {
                            warn!(source = %label, "[{} stderr] {}", label, line);
                        }
                    }
                }
                captured.push(line);
            }
            Err(e) => {
                debug!(source = %label, error = %e, "Stopped reading {:?} of {}", stream, label);
                break;
            }
        }
    }

    captured
}

async fn collect(task: Option<&mut JoinHandle<Vec<String>>>) -> Vec<String> {
    match task {
        Some(handle) => handle.await.unwrap_or_default(),
        None => Vec::new(),
    }
}

fn abort(task: Option<JoinHandle<Vec<String>>>) {
    if let Some(handle) = task {
        handle.abort();
    }
}

/// Short name for log prefixes: `/usr/bin/Rscript` -> `Rscript`
fn program_label(program: &str) -> String {
    program
        .rsplit(['/', '\\'])
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or(program)
        .to_string()
}
