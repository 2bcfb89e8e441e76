//! External process runner against real shell commands

use optrix::core::process::{CommandRunner, CommandSpec, ExternalProcessRunner};
use optrix::error::ProcessError;
use std::time::{Duration, Instant};

fn sh(script: &str, timeout: Duration) -> CommandSpec {
    CommandSpec::new("sh", vec!["-c".to_string(), script.to_string()], timeout)
}

#[cfg(unix)]
#[tokio::test]
async fn captures_output_and_exit_code() {
    let runner = ExternalProcessRunner::new();
    let output = runner
        .run(&sh("echo downloading; echo 'warning: slow' >&2; exit 3", Duration::from_secs(10)))
        .await
        .expect("command runs");

    assert_eq!(output.exit_code, Some(3));
    assert!(!output.success());
    assert_eq!(output.stdout, vec!["downloading"]);
    assert_eq!(output.stderr, vec!["warning: slow"]);
}

#[cfg(unix)]
#[tokio::test]
async fn zero_exit_is_success() {
    let runner = ExternalProcessRunner::new();
    let output = runner
        .run(&sh("true", Duration::from_secs(10)))
        .await
        .expect("command runs");
    assert!(output.success());
}

#[cfg(unix)]
#[tokio::test]
async fn runs_in_the_configured_working_directory() {
    let dir = tempfile::tempdir().expect("temp dir");
    let runner = ExternalProcessRunner::new();
    let output = runner
        .run(&sh("echo ok > marker.txt", Duration::from_secs(10)).with_working_dir(dir.path()))
        .await
        .expect("command runs");

    assert!(output.success());
    assert!(dir.path().join("marker.txt").exists());
}

#[tokio::test]
async fn missing_program_is_command_not_found() {
    let runner = ExternalProcessRunner::new();
    let spec = CommandSpec::new(
        "optrix-no-such-program-xyz",
        Vec::new(),
        Duration::from_secs(5),
    );

    let err = runner.run(&spec).await.expect_err("program does not exist");
    assert!(matches!(err, ProcessError::CommandNotFound { .. }));
}

#[cfg(unix)]
#[tokio::test]
async fn slow_command_is_killed_at_the_timeout() {
    let runner = ExternalProcessRunner::new();
    let started = Instant::now();

    let err = runner
        .run(&sh("exec sleep 30", Duration::from_millis(300)))
        .await
        .expect_err("command must time out");

    assert!(matches!(err, ProcessError::Timeout { .. }));
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[cfg(unix)]
#[tokio::test]
async fn background_child_holding_output_does_not_outlive_the_timeout() {
    let runner = ExternalProcessRunner::new();
    let started = Instant::now();

    let err = runner
        .run(&sh("sleep 30 & echo started", Duration::from_millis(300)))
        .await
        .expect_err("open output pipes must not extend the timeout");

    assert!(matches!(err, ProcessError::Timeout { .. }));
    assert!(started.elapsed() < Duration::from_secs(10));
}
