//! Waiting for a host to come up, with cancellation support.
//!
//! A readiness check runs on a fixed poll interval until it succeeds. There
//! is no attempt ceiling; a caller-supplied `max_wait` bounds the total time
//! instead, and cancellation is honoured between checks.

use backon::{BackoffBuilder, ConstantBuilder};
use hostbench_common::defaults::default_poll_interval_secs;
use hostbench_remote::ExecError;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Boot wait settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, garde::Validate)]
#[serde(deny_unknown_fields)]
pub struct BootWaitConfig {
    /// Delay between checks in seconds
    #[serde(default = "default_poll_interval_secs")]
    #[garde(range(min = 1))]
    pub poll_interval_secs: u64,

    /// Give up after this many seconds (waits forever when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[garde(range(min = 1))]
    pub max_wait_secs: Option<u64>,
}

impl Default for BootWaitConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            max_wait_secs: None,
        }
    }
}

impl BootWaitConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn max_wait(&self) -> Option<Duration> {
        self.max_wait_secs.map(Duration::from_secs)
    }
}

/// Run `check` until it succeeds.
///
/// # Returns
/// * `Ok(attempts)` once a check succeeds
/// * `Err(ExecError::Timeout)` when `max_wait` elapses first
/// * `Err(ExecError::Cancelled)` when `cancel` fires between checks
/// * the check's own error when it is not retryable
pub async fn wait_until_ready<F, Fut>(
    config: &BootWaitConfig,
    cancel: &CancellationToken,
    mut check: F,
    resource_name: &str,
) -> Result<u32, ExecError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), ExecError>>,
{
    let start = Instant::now();
    let mut attempts = 0u32;
    let poll_interval = config.poll_interval();
    let mut delays = ConstantBuilder::default().with_delay(poll_interval).build();

    loop {
        attempts += 1;

        if cancel.is_cancelled() {
            return Err(ExecError::Cancelled {
                command: format!("wait for {resource_name}"),
            });
        }

        if let Some(max_wait) = config.max_wait() {
            if start.elapsed() >= max_wait {
                return Err(ExecError::Timeout {
                    command: format!("wait for {resource_name} ({attempts} checks)"),
                    timeout: max_wait,
                });
            }
        }

        match check().await {
            Ok(()) => {
                debug!(resource = %resource_name, attempts, "Resource ready");
                return Ok(attempts);
            }
            Err(e) if e.is_retryable() => {
                let delay = delays.next().unwrap_or(poll_interval);
                debug!(
                    resource = %resource_name,
                    attempt = attempts,
                    delay_ms = delay.as_millis(),
                    error = %e,
                    "Resource not ready, retrying"
                );

                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = cancel.cancelled() => {
                        return Err(ExecError::Cancelled {
                            command: format!("wait for {resource_name}"),
                        });
                    }
                }
            }
            Err(e) => return Err(e),
        }
    }
}
