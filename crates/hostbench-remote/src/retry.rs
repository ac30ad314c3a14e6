//! Bounded retries for remote commands
//!
//! `RetryingExecutor` runs an operation up to `RetryPolicy::max_attempts`
//! times, sleeping `poll_interval` between attempts. Earlier failures are
//! swallowed (optionally logged); the final attempt's error is returned
//! unchanged. Cancellation is honoured between attempts, never mid-attempt.

use crate::command::CommandOutput;
use crate::error::ExecError;
use crate::host::RemoteHost;
use backon::{ConstantBuilder, Retryable as _};
use hostbench_common::defaults::DEFAULT_POLL_INTERVAL_SECS;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// An error the retry loop can classify
pub trait Retryable: std::fmt::Display {
    /// Whether another attempt could succeed
    fn is_retryable(&self) -> bool;

    /// The error reported when cancellation stops the loop
    fn cancelled(label: &str) -> Self;
}

impl Retryable for ExecError {
    fn is_retryable(&self) -> bool {
        ExecError::is_retryable(self)
    }

    fn cancelled(label: &str) -> Self {
        ExecError::Cancelled {
            command: label.to_string(),
        }
    }
}

/// Retry policy for one logical operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum attempts including the first try (at least 1)
    max_attempts: u32,
    /// Delay between attempts
    pub poll_interval: Duration,
    /// Log every failed attempt at warn level instead of debug
    pub log_errors: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            log_errors: true,
        }
    }
}

impl RetryPolicy {
    /// Policy with `max_attempts` attempts (clamped to at least 1)
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Default::default()
        }
    }

    /// A single attempt with no logging of the failure
    pub fn once() -> Self {
        Self {
            log_errors: false,
            ..Self::new(1)
        }
    }

    /// Set the delay between attempts
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Set whether failed attempts are logged
    pub fn with_log_errors(mut self, log_errors: bool) -> Self {
        self.log_errors = log_errors;
        self
    }

    /// Maximum number of invocations this policy allows
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Executes remote commands under a `RetryPolicy`
#[derive(Debug, Clone, Default)]
pub struct RetryingExecutor {
    cancel: CancellationToken,
}

impl RetryingExecutor {
    /// Create an executor that stops retrying once `cancel` fires
    pub fn new(cancel: CancellationToken) -> Self {
        Self { cancel }
    }

    /// The cancellation token shared with other poll loops
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Run `command` on `host`, treating a non-zero exit as a failed attempt.
    ///
    /// # Returns
    /// * `Ok(output)` from the first successful attempt
    /// * `Err` from the last attempt, unchanged, when every attempt failed
    pub async fn execute<H: RemoteHost>(
        &self,
        host: &H,
        command: &str,
        policy: &RetryPolicy,
        timeout: Option<Duration>,
    ) -> Result<CommandOutput, ExecError> {
        let label = format!("{}: {}", host.identity().name, command);
        self.retry(&label, policy, || host.run_checked(command, timeout))
            .await
    }

    /// Run an arbitrary fallible operation under `policy`.
    ///
    /// The operation may fail with any error that knows whether it is worth
    /// another attempt, so a command and the parsing of its output can be
    /// retried as one unit.
    pub async fn retry<F, Fut, T, E>(
        &self,
        label: &str,
        policy: &RetryPolicy,
        mut op: F,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable,
    {
        let max_attempts = policy.max_attempts();
        let backoff = ConstantBuilder::default()
            .with_delay(policy.poll_interval)
            .with_max_times(max_attempts as usize - 1);

        // A cancel during the delay cuts it short; the next attempt then
        // sees the token and stops without running the operation.
        let cancel = self.cancel.clone();
        let sleeper = move |delay: Duration| {
            let cancel = cancel.clone();
            async move {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = cancel.cancelled() => {}
                }
            }
        };

        let mut attempt = 0u32;
        let attempt_once = || {
            let next = (!self.cancel.is_cancelled()).then(&mut op);
            async move {
                match next {
                    Some(fut) => fut.await,
                    None => Err(E::cancelled(label)),
                }
            }
        };

        attempt_once
            .retry(backoff)
            .sleep(sleeper)
            .when(|err: &E| err.is_retryable())
            .notify(|err: &E, delay: Duration| {
                attempt += 1;
                if policy.log_errors {
                    warn!(operation = %label, attempt, max_attempts, error = %err, delay = ?delay, "Attempt failed, retrying");
                } else {
                    debug!(operation = %label, attempt, max_attempts, error = %err, delay = ?delay, "Attempt failed, retrying");
                }
            })
            .await
    }
}
