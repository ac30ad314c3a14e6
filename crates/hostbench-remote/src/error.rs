//! Command execution errors

use std::time::Duration;
use thiserror::Error;

/// Failure of a single remote command invocation
#[derive(Debug, Error)]
pub enum ExecError {
    /// The local client process (ssh, scp) could not be started
    #[error("Failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The command did not finish within its attempt-scoped timeout
    #[error("Command timed out after {}s: {command}", .timeout.as_secs())]
    Timeout { command: String, timeout: Duration },

    /// The command ran but reported failure through its exit status
    #[error("Command exited with status {code}: {command}{}", stderr_suffix(.stderr))]
    NonZeroExit {
        command: String,
        code: i32,
        stderr: String,
    },

    /// The transport to the host failed (connection refused, reset, ...)
    #[error("Transport error on {host}: {message}")]
    Transport { host: String, message: String },

    /// Cancellation was requested between attempts
    #[error("Cancelled before running: {command}")]
    Cancelled { command: String },
}

impl ExecError {
    /// Whether another attempt could succeed.
    ///
    /// Cancellation and local spawn failures are final; everything the remote
    /// side reports is worth retrying.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Cancelled { .. } | Self::Spawn { .. })
    }

    /// Check if this is a timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Check if this is a cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

fn stderr_suffix(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        let line = trimmed.lines().last().unwrap_or(trimmed);
        format!(" ({line})")
    }
}
