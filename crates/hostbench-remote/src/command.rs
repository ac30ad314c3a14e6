//! Local process execution with an attempt-scoped timeout
//!
//! Every remote command is ultimately a local `ssh`/`scp` client process.
//! This module runs one, captures its output and kills it if the timeout
//! expires.

use crate::error::ExecError;
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, warn};

/// Result of one command execution
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    /// Exit code of the command (-1 if terminated by a signal)
    pub exit_code: i32,
    /// Standard output
    pub stdout: String,
    /// Standard error
    pub stderr: String,
    /// Execution duration in milliseconds
    pub duration_ms: u64,
}

impl CommandOutput {
    /// Create a successful output with the given stdout
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.into(),
            ..Default::default()
        }
    }

    /// Create a failed output with the given exit code and stderr
    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stderr: stderr.into(),
            ..Default::default()
        }
    }

    /// Check if the command succeeded (exit code 0)
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Turn a non-zero exit of `command` into `ExecError::NonZeroExit`
    pub fn into_checked(self, command: &str) -> Result<Self, ExecError> {
        if self.success() {
            Ok(self)
        } else {
            Err(ExecError::NonZeroExit {
                command: command.to_string(),
                code: self.exit_code,
                stderr: self.stderr,
            })
        }
    }
}

/// Configuration for command execution
#[derive(Debug, Clone)]
pub struct CommandConfig {
    /// Command timeout (kills process if exceeded)
    pub timeout: Duration,
    /// Time to wait for output readers to drain after the process exits
    pub stream_flush_timeout: Duration,
}

impl CommandConfig {
    /// Create with custom timeout, default stream flush timeout
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            stream_flush_timeout: Duration::from_secs(5),
        }
    }
}

/// Run a local program and capture its output.
///
/// # Returns
/// * `Ok(output)` when the process ran to completion, whatever its exit code
/// * `Err(ExecError::Spawn)` if the program could not be started
/// * `Err(ExecError::Timeout)` if the timeout expired (the process is killed)
pub async fn run_local(
    program: &str,
    args: &[String],
    display_text: &str,
    config: &CommandConfig,
) -> Result<CommandOutput, ExecError> {
    debug!(
        program = %program,
        command = %display_text,
        timeout_secs = config.timeout.as_secs(),
        "Running command"
    );

    let started = Instant::now();
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| ExecError::Spawn {
            program: program.to_string(),
            source,
        })?;

    let stdout_handle = child.stdout.take().map(|s| tokio::spawn(read_all(s)));
    let stderr_handle = child.stderr.take().map(|s| tokio::spawn(read_all(s)));

    let status = match tokio::time::timeout(config.timeout, child.wait()).await {
        Ok(Ok(status)) => status,
        Ok(Err(e)) => {
            return Err(ExecError::Spawn {
                program: program.to_string(),
                source: e,
            });
        }
        Err(_) => {
            warn!(
                command = %display_text,
                timeout_secs = config.timeout.as_secs(),
                "Command timed out, killing process"
            );
            if let Err(e) = child.kill().await {
                warn!(error = %e, "Failed to kill timed-out process");
            }
            return Err(ExecError::Timeout {
                command: display_text.to_string(),
                timeout: config.timeout,
            });
        }
    };

    let stdout = collect(stdout_handle, config.stream_flush_timeout).await;
    let stderr = collect(stderr_handle, config.stream_flush_timeout).await;

    Ok(CommandOutput {
        exit_code: status.code().unwrap_or(-1),
        stdout,
        stderr,
        duration_ms: started.elapsed().as_millis() as u64,
    })
}

async fn read_all<R: AsyncRead + Unpin>(mut reader: R) -> String {
    let mut buf = Vec::new();
    if let Err(e) = reader.read_to_end(&mut buf).await {
        debug!(error = %e, "Output stream closed with error");
    }
    String::from_utf8_lossy(&buf).into_owned()
}

async fn collect(handle: Option<tokio::task::JoinHandle<String>>, flush: Duration) -> String {
    let Some(handle) = handle else {
        return String::new();
    };
    match tokio::time::timeout(flush, handle).await {
        Ok(Ok(text)) => text,
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> Vec<String> {
        vec!["-c".to_string(), script.to_string()]
    }

    #[tokio::test]
    async fn test_run_local_captures_output() {
        let config = CommandConfig::with_timeout(Duration::from_secs(10));
        let out = run_local("sh", &sh("echo hello; echo oops 1>&2"), "echo", &config)
            .await
            .unwrap();
        assert!(out.success());
        assert_eq!(out.stdout.trim(), "hello");
        assert_eq!(out.stderr.trim(), "oops");
    }

    #[tokio::test]
    async fn test_run_local_reports_exit_code() {
        let config = CommandConfig::with_timeout(Duration::from_secs(10));
        let out = run_local("sh", &sh("exit 3"), "exit 3", &config).await.unwrap();
        assert!(!out.success());
        assert_eq!(out.exit_code, 3);
    }

    #[test]
    fn test_into_checked_maps_non_zero_exit() {
        assert_eq!(CommandOutput::ok("up").into_checked("uptime").unwrap().stdout, "up");

        let err = CommandOutput::failed(2, "no such file")
            .into_checked("cat /tmp/x")
            .unwrap_err();
        match err {
            ExecError::NonZeroExit { command, code, stderr } => {
                assert_eq!(command, "cat /tmp/x");
                assert_eq!(code, 2);
                assert_eq!(stderr, "no such file");
            }
            other => panic!("expected non-zero exit, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_run_local_times_out() {
        let config = CommandConfig::with_timeout(Duration::from_millis(200));
        let err = run_local("sh", &sh("sleep 5"), "sleep 5", &config)
            .await
            .unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn test_timeout_names_display_text() {
        let config = CommandConfig::with_timeout(Duration::from_millis(100));
        let err = run_local("sh", &sh("sleep 5"), "ssh vm-1 'sleep 5'", &config)
            .await
            .unwrap_err();
        match err {
            ExecError::Timeout { command, .. } => assert_eq!(command, "ssh vm-1 'sleep 5'"),
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_run_local_spawn_failure() {
        let config = CommandConfig::with_timeout(Duration::from_secs(1));
        let err = run_local("this-command-does-not-exist-12345", &[], "missing", &config)
            .await
            .unwrap_err();
        assert!(matches!(err, ExecError::Spawn { .. }));
    }
}
