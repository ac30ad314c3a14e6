//! Benchmark lifecycle controller
//!
//! `BenchmarkController` drives one suite over a fixed host set through
//! `Idle -> Prepared -> Running* -> CleanedUp`. It owns the transient
//! per-host state that prepare records and cleanup reads back, and it decides
//! what a failed combination means for the rest of the run.

pub mod results;
pub mod state;

pub use results::{CombinationFailure, JsonFileSink, ResultSink, RunReport, SummarySink};
pub use state::{TransientState, TransientStates};

use crate::emulator::EmulatorConfig;
use crate::error::{BenchError, CleanupError, ConfigError};
use crate::suite::{BenchmarkSuite, SuiteContext};
use crate::wait::BootWaitConfig;
use hostbench_common::{LifecycleState, RunParameters};
use hostbench_remote::{RemoteHost, RetryPolicy, RetryingExecutor};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// How the controller treats hosts and failures
#[derive(Debug, Clone, Default)]
pub struct ControllerOptions {
    /// Policy for each benchmark combination
    pub retry: RetryPolicy,
    pub boot_wait: BootWaitConfig,
    /// Set when the benchmark runs inside emulated guests
    pub emulator: Option<EmulatorConfig>,
    /// Skip the remaining combinations after the first failure
    pub stop_on_first_error: bool,
}

impl ControllerOptions {
    pub fn new(retry: RetryPolicy) -> Self {
        Self {
            retry,
            ..Default::default()
        }
    }

    pub fn with_emulator(mut self, emulator: EmulatorConfig) -> Self {
        self.emulator = Some(emulator);
        self
    }

    pub fn with_boot_wait(mut self, boot_wait: BootWaitConfig) -> Self {
        self.boot_wait = boot_wait;
        self
    }

    pub fn with_stop_on_first_error(mut self, stop: bool) -> Self {
        self.stop_on_first_error = stop;
        self
    }
}

/// Prepare / run / cleanup for one suite over one host set
pub struct BenchmarkController<H, S> {
    hosts: Vec<H>,
    suite: S,
    params: RunParameters,
    options: ControllerOptions,
    executor: RetryingExecutor,
    state: LifecycleState,
    transient: TransientStates,
}

impl<H: RemoteHost, S: BenchmarkSuite> BenchmarkController<H, S> {
    pub fn new(
        hosts: Vec<H>,
        suite: S,
        params: RunParameters,
        options: ControllerOptions,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            hosts,
            suite,
            params,
            options,
            executor: RetryingExecutor::new(cancel),
            state: LifecycleState::Idle,
            transient: TransientStates::new(),
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn hosts(&self) -> &[H] {
        &self.hosts
    }

    pub fn suite(&self) -> &S {
        &self.suite
    }

    /// Transient per-host state recorded by prepare
    pub fn transient(&self) -> &TransientStates {
        &self.transient
    }

    fn invalid(&self, operation: &'static str) -> BenchError {
        BenchError::InvalidState {
            operation,
            state: self.state,
        }
    }

    /// Validate the host set, boot emulated guests, then run the suite's
    /// one-time setup.
    ///
    /// Nothing runs remotely when the host count is wrong or an emulated
    /// host has no guest NIC. After a failure part of the setup may have
    /// happened; `cleanup` undoes whatever was recorded.
    pub async fn prepare(&mut self) -> Result<(), BenchError> {
        if !self.state.can_prepare() {
            return Err(self.invalid("prepare"));
        }
        if self.hosts.len() != self.suite.arity() {
            return Err(ConfigError::HostCount {
                suite: self.suite.name().to_string(),
                expected: self.suite.arity(),
                found: self.hosts.len(),
            }
            .into());
        }
        if let Some(emulator) = &self.options.emulator {
            for host in &self.hosts {
                emulator.guest(host.identity())?;
            }
        }

        let Self {
            hosts,
            suite,
            params,
            options,
            executor,
            transient,
            ..
        } = self;
        let (hosts, executor, params) = (hosts.as_slice(), &*executor, &*params);

        info!(suite = suite.name(), hosts = hosts.len(), "Preparing benchmark");

        if let Some(emulator) = &options.emulator {
            let boot_policy = RetryPolicy::once();
            for host in hosts.iter() {
                emulator.boot(host, executor, &boot_policy).await?;
                transient.mark_booted(host.identity().id());
            }
            for host in hosts.iter() {
                emulator.wait_for_boot(host, executor, &options.boot_wait).await?;
            }
        }

        let ctx = SuiteContext {
            hosts,
            executor,
            retry: &options.retry,
            emulator: options.emulator.as_ref(),
            params,
        };
        suite.prepare(&ctx, transient).await?;

        self.state = LifecycleState::Prepared;
        info!(suite = self.suite.name(), "Benchmark prepared");
        Ok(())
    }

    /// Run every planned combination in order.
    ///
    /// A failed combination is recorded and the run moves on (or stops, with
    /// `stop_on_first_error`). Configuration problems and lifecycle misuse
    /// abort the run. Cancellation stops it: the samples collected so far are
    /// kept and every combination not yet finished is recorded as cancelled.
    /// A run that produced no samples at all is an error.
    pub async fn run(&mut self) -> Result<RunReport, BenchError> {
        if !self.state.can_run() {
            return Err(self.invalid("run"));
        }
        self.state = LifecycleState::Running;

        let identities: Vec<_> = self.hosts.iter().map(|h| h.identity()).collect();
        let plan = self.suite.plan(&self.params, &identities);
        info!(suite = self.suite.name(), combinations = plan.len(), "Starting run");

        let ctx = SuiteContext {
            hosts: &self.hosts,
            executor: &self.executor,
            retry: &self.options.retry,
            emulator: self.options.emulator.as_ref(),
            params: &self.params,
        };

        let mut report = RunReport::default();
        let mut cancelled_at = None;
        for (index, combination) in plan.iter().enumerate() {
            if self.executor.cancel_token().is_cancelled() {
                cancelled_at = Some(index);
                break;
            }
            info!(
                combination = %combination.label,
                progress = %format!("{}/{}", index + 1, plan.len()),
                "Running combination"
            );

            match self.suite.run_one(&ctx, &self.transient, combination).await {
                Ok(samples) => report.samples.extend(samples),
                Err(BenchError::Cancelled) => {
                    cancelled_at = Some(index);
                    break;
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(combination = %combination.label, error = %e, "Combination failed");
                    report.failures.push(CombinationFailure::new(&combination.label, &e));
                    if self.options.stop_on_first_error {
                        warn!("Stopping after first failure");
                        break;
                    }
                }
            }
        }

        if let Some(index) = cancelled_at {
            let remaining = &plan[index..];
            warn!(
                completed = index,
                remaining = remaining.len(),
                "Run cancelled"
            );
            report.failures.extend(
                remaining
                    .iter()
                    .map(|c| CombinationFailure::new(&c.label, &BenchError::Cancelled)),
            );
            if report.samples.is_empty() {
                return Err(BenchError::Cancelled);
            }
        }

        if report.samples.is_empty() {
            return Err(BenchError::NoSamples {
                failures: report.failures.len(),
            });
        }

        info!(
            samples = report.samples.len(),
            failures = report.failures.len(),
            "Run finished"
        );
        Ok(report)
    }

    /// Best-effort teardown from any state. Failures are logged and
    /// returned, never raised; a second call does nothing.
    pub async fn cleanup(&mut self) -> Vec<CleanupError> {
        if self.state.is_terminal() {
            return Vec::new();
        }

        let Self {
            hosts,
            suite,
            params,
            options,
            executor,
            transient,
            ..
        } = self;
        let (hosts, executor, params) = (hosts.as_slice(), &*executor, &*params);

        let ctx = SuiteContext {
            hosts,
            executor,
            retry: &options.retry,
            emulator: options.emulator.as_ref(),
            params,
        };
        let mut errors = suite.cleanup(&ctx, transient).await;

        if let Some(emulator) = &options.emulator {
            for host in hosts.iter() {
                if transient.is_booted(host.identity().id()) {
                    errors.extend(emulator.shutdown(host).await);
                }
            }
        }

        for e in &errors {
            warn!(host = %e.host, step = %e.step, error = %e.source, "Cleanup step failed");
        }
        if errors.is_empty() {
            info!(suite = suite.name(), "Cleanup complete");
        } else {
            error!(suite = suite.name(), failed = errors.len(), "Cleanup finished with errors");
        }

        transient.clear();
        self.state = LifecycleState::CleanedUp;
        errors
    }
}
