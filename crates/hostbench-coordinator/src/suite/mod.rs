//! Benchmark suites
//!
//! A suite knows its host arity, how to set up its hosts, which
//! combinations to run and how to turn one combination into samples. The
//! lifecycle controller drives it; suites never track lifecycle state.

pub mod iperf;
pub mod scp;
pub mod speccpu;

use crate::emulator::EmulatorConfig;
use crate::error::{BenchError, CleanupError, ConfigError, ParseError};
use crate::orchestrator::state::TransientStates;
use crate::pairs::HostPair;
use hostbench_common::{Protocol, RunParameters, Sample};
use hostbench_remote::{CommandOutput, ExecError, Host, RemoteHost, RetryPolicy, Retryable, RetryingExecutor};
use thiserror::Error;

pub use iperf::IperfSuite;
pub use scp::ScpSuite;
pub use speccpu::SpecCpuSuite;

/// One unit of work in a run
#[derive(Debug, Clone, PartialEq)]
pub struct Combination {
    pub protocol: Protocol,
    /// Stream, thread or copy count
    pub threads: u32,
    /// Sender/receiver assignment; `None` for single-host suites
    pub pair: Option<HostPair>,
    /// Human-readable name used in logs and failure records
    pub label: String,
}

/// Everything a suite needs to reach its hosts
pub struct SuiteContext<'a, H> {
    pub hosts: &'a [H],
    pub executor: &'a RetryingExecutor,
    /// Policy for benchmark combinations
    pub retry: &'a RetryPolicy,
    pub emulator: Option<&'a EmulatorConfig>,
    pub params: &'a RunParameters,
}

impl<H: RemoteHost> SuiteContext<'_, H> {
    /// Wrap `command` so it runs where the benchmark runs: inside the
    /// emulated guest when there is one, otherwise on the host itself.
    pub fn endpoint_command(&self, host: &H, command: &str) -> Result<String, ConfigError> {
        match self.emulator {
            Some(emulator) => Ok(emulator.guest(host.identity())?.command(command)),
            None => Ok(command.to_string()),
        }
    }

    /// Run a setup command once on the benchmark endpoint
    pub async fn setup(&self, host: &H, command: &str, step: &str) -> Result<CommandOutput, BenchError> {
        let wrapped = self.endpoint_command(host, command)?;
        self.executor
            .execute(host, &wrapped, &RetryPolicy::new(1), None)
            .await
            .map_err(|e| BenchError::execution(format!("{step} on {}", host.identity().name), e))
    }
}

/// Failure of one attempt at a combination: running the tool or reading
/// its output. Both are retried under the combination's policy.
#[derive(Debug, Error)]
pub enum AttemptError {
    #[error(transparent)]
    Exec(#[from] ExecError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl Retryable for AttemptError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Exec(e) => e.is_retryable(),
            Self::Parse(_) => true,
        }
    }

    fn cancelled(label: &str) -> Self {
        Self::Exec(ExecError::Cancelled {
            command: label.to_string(),
        })
    }
}

impl AttemptError {
    /// Attach the combination label
    pub fn into_bench(self, combination: &str) -> BenchError {
        match self {
            Self::Exec(e) => BenchError::execution(combination, e),
            Self::Parse(e) => BenchError::parse(combination, e),
        }
    }
}

/// A tool-driven benchmark
#[allow(async_fn_in_trait)] // Used through generics only
pub trait BenchmarkSuite {
    /// Short name used in logs and reports
    fn name(&self) -> &'static str;

    /// Exact number of hosts the suite needs
    fn arity(&self) -> usize;

    /// One-time remote setup; handles go into `state`
    async fn prepare<H: RemoteHost>(
        &self,
        ctx: &SuiteContext<'_, H>,
        state: &mut TransientStates,
    ) -> Result<(), BenchError>;

    /// Combinations to run, in execution order
    fn plan(&self, params: &RunParameters, hosts: &[&Host]) -> Vec<Combination>;

    /// Run one combination and build its samples
    async fn run_one<H: RemoteHost>(
        &self,
        ctx: &SuiteContext<'_, H>,
        state: &TransientStates,
        combination: &Combination,
    ) -> Result<Vec<Sample>, BenchError>;

    /// Best-effort teardown of what `prepare` started
    async fn cleanup<H: RemoteHost>(
        &self,
        ctx: &SuiteContext<'_, H>,
        state: &mut TransientStates,
    ) -> Vec<CleanupError>;
}
