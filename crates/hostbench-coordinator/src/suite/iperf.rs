//! iperf network throughput (TCP and UDP)
//!
//! Prepare stages iperf on both hosts and starts one long-lived server per
//! protocol, recording its pid. Each combination runs a client on the sender
//! against the receiver's server. Cleanup kills the recorded servers.

use super::{AttemptError, BenchmarkSuite, Combination, SuiteContext};
use crate::config::IperfConfig;
use crate::error::{BenchError, CleanupError, ConfigError};
use crate::orchestrator::state::TransientStates;
use crate::pairs::HostPairSelector;
use crate::parser::{IperfReport, parse_iperf, parse_pid};
use crate::sample_builder::SampleBuilder;
use hostbench_common::defaults::{DEFAULT_TCP_BUFFER_SIZE, DEFAULT_UDP_BUFFER_SIZE};
use hostbench_common::{AddressingMode, Protocol, RunParameters, Sample};
use hostbench_remote::shell::quote;
use hostbench_remote::{Host, RemoteHost, RetryPolicy, command_timeout};
use std::time::Duration;
use tracing::{info, warn};

/// Host directory pre-staged artifacts are fetched into
const STAGING_DIR: &str = "/tmp/hostbench";

/// iperf client/server benchmark between two hosts
#[derive(Debug, Clone)]
pub struct IperfSuite {
    config: IperfConfig,
}

impl IperfSuite {
    pub fn new(config: IperfConfig) -> Self {
        Self { config }
    }

    fn port(&self, protocol: Protocol) -> u16 {
        match protocol {
            Protocol::Udp => self.config.udp_port,
            _ => self.config.tcp_port,
        }
    }

    fn bandwidth(&self, protocol: Protocol) -> Option<f64> {
        match protocol {
            Protocol::Udp => self.config.udp_bandwidth_mbits,
            _ => self.config.tcp_bandwidth_mbits,
        }
    }

    /// Environment assignment placed before the binary inside emulated guests
    fn env_prefix(&self, emulated: bool) -> String {
        match (&self.config.library_path, emulated) {
            (Some(path), true) => format!("LD_LIBRARY_PATH={} ", quote(path)),
            _ => String::new(),
        }
    }

    /// The guest binary when emulated, the installed package otherwise
    fn binary(&self, emulated: bool) -> &str {
        if emulated { &self.config.guest_binary } else { &self.config.package }
    }

    /// Start a server in the background and print its pid
    pub fn server_command(&self, protocol: Protocol, emulated: bool) -> String {
        let udp = if protocol == Protocol::Udp { " --udp" } else { "" };
        format!(
            "{}nohup {} --server{udp} --port {} > /dev/null 2>&1 & echo $!",
            self.env_prefix(emulated),
            self.binary(emulated),
            self.port(protocol)
        )
    }

    /// Client run against `address`
    pub fn client_command(
        &self,
        protocol: Protocol,
        address: &str,
        threads: u32,
        runtime: Duration,
        emulated: bool,
    ) -> String {
        let udp = if protocol == Protocol::Udp { " --udp" } else { "" };
        let mut cmd = format!(
            "{}{}{udp} --client {address} --port {} --format m --time {} --parallel {threads}",
            self.env_prefix(emulated),
            self.binary(emulated),
            self.port(protocol),
            runtime.as_secs()
        );
        if let Some(bandwidth) = self.bandwidth(protocol) {
            cmd.push_str(&format!(" --bandwidth {bandwidth}M"));
        }
        cmd
    }

    async fn stage<H: RemoteHost>(&self, ctx: &SuiteContext<'_, H>, host: &H) -> Result<(), BenchError> {
        let name = &host.identity().name;
        let Some(emulator) = ctx.emulator else {
            return host
                .install_package(&self.config.package)
                .await
                .map_err(|e| BenchError::execution(format!("install iperf on {name}"), e));
        };

        let staged = host
            .fetch_artifact(&self.config.artifact, STAGING_DIR)
            .await
            .map_err(|e| BenchError::execution(format!("fetch iperf artifact on {name}"), e))?;
        let copy = emulator.guest(host.identity())?.copy_to(&staged, &self.config.guest_binary);
        ctx.executor
            .execute(host, &copy, &RetryPolicy::new(1), None)
            .await
            .map_err(|e| BenchError::execution(format!("copy iperf into {name} guest"), e))?;
        ctx.setup(host, &format!("chmod +x {}", quote(&self.config.guest_binary)), "chmod iperf")
            .await?;
        Ok(())
    }
}

impl BenchmarkSuite for IperfSuite {
    fn name(&self) -> &'static str {
        "iperf"
    }

    fn arity(&self) -> usize {
        2
    }

    async fn prepare<H: RemoteHost>(
        &self,
        ctx: &SuiteContext<'_, H>,
        state: &mut TransientStates,
    ) -> Result<(), BenchError> {
        let emulated = ctx.emulator.is_some();
        let external = ctx.params.addressing.contains(&AddressingMode::External);

        for host in ctx.hosts {
            let name = host.identity().name.clone();
            self.stage(ctx, host).await?;

            for &protocol in &ctx.params.protocols {
                let port = self.port(protocol);
                if external {
                    host.allow_port(port)
                        .await
                        .map_err(|e| BenchError::execution(format!("open port {port} on {name}"), e))?;
                }

                let step = format!("start {protocol} server");
                let output = ctx.setup(host, &self.server_command(protocol, emulated), &step).await?;
                let pid = parse_pid(&output.stdout).map_err(|e| BenchError::parse(format!("{step} on {name}"), e))?;

                info!(host = %name, %protocol, port, pid, "iperf server started");
                state.set_server_pid(host.identity().id(), protocol, pid);
            }
        }
        Ok(())
    }

    fn plan(&self, params: &RunParameters, hosts: &[&Host]) -> Vec<Combination> {
        let pairs = HostPairSelector::new(params.addressing.clone())
            .with_directions(params.directions.clone())
            .pairs(hosts);

        let mut combinations = Vec::new();
        for &protocol in &params.protocols {
            for &threads in &params.thread_counts {
                for pair in &pairs {
                    combinations.push(Combination {
                        protocol,
                        threads,
                        label: format!(
                            "{protocol} x{threads} {} -> {} ({})",
                            hosts[pair.sender].name, hosts[pair.receiver].name, pair.mode
                        ),
                        pair: Some(pair.clone()),
                    });
                }
            }
        }
        combinations
    }

    async fn run_one<H: RemoteHost>(
        &self,
        ctx: &SuiteContext<'_, H>,
        state: &TransientStates,
        combination: &Combination,
    ) -> Result<Vec<Sample>, BenchError> {
        let pair = combination
            .pair
            .as_ref()
            .ok_or_else(|| ConfigError::Validation(format!("{} has no host pair", combination.label)))?;
        let (protocol, threads) = (combination.protocol, combination.threads);
        let sender = &ctx.hosts[pair.sender];
        let receiver = &ctx.hosts[pair.receiver];

        if state.server_pid(receiver.identity().id(), protocol).is_none() {
            return Err(BenchError::MissingServer {
                host: receiver.identity().name.clone(),
                protocol,
            });
        }

        let client = self.client_command(protocol, &pair.address, threads, ctx.params.runtime, ctx.emulator.is_some());
        let command = &ctx.endpoint_command(sender, &client)?;
        let timeout = command_timeout(
            ctx.params.runtime,
            threads,
            self.config.timeout_buffer_secs.map(Duration::from_secs),
        );

        let result: Result<IperfReport, AttemptError> = ctx
            .executor
            .retry(&combination.label, ctx.retry, || async move {
                let output = sender.run_checked(command, Some(timeout)).await?;
                Ok(parse_iperf(protocol, &output.stdout, threads)?)
            })
            .await;
        let report = result.map_err(|e| e.into_bench(&combination.label))?;

        if report.throughput.is_estimate() {
            warn!(
                combination = %combination.label,
                "No [SUM] line; throughput is a per-stream estimate and may overstate the aggregate"
            );
        }

        let buffer_size = match protocol {
            Protocol::Udp => DEFAULT_UDP_BUFFER_SIZE,
            _ => DEFAULT_TCP_BUFFER_SIZE,
        };
        let mut extraction = report.metadata();
        extraction.insert("buffer_size".into(), buffer_size.into());

        let metric = match protocol {
            Protocol::Udp => "UDP Throughput",
            _ => "Throughput",
        };
        let sample = SampleBuilder::for_pair(sender.identity(), receiver.identity(), pair.mode)
            .with("sending_thread_count", threads)
            .with("runtime_in_seconds", ctx.params.runtime.as_secs())
            .build(metric, report.throughput.total(), "Mbits/sec", extraction);

        info!(combination = %combination.label, value = sample.value(), unit = %sample.unit(), "Sample recorded");
        Ok(vec![sample])
    }

    async fn cleanup<H: RemoteHost>(
        &self,
        ctx: &SuiteContext<'_, H>,
        state: &mut TransientStates,
    ) -> Vec<CleanupError> {
        let mut errors = Vec::new();
        for host in ctx.hosts {
            let name = &host.identity().name;
            for protocol in [Protocol::Tcp, Protocol::Udp] {
                let Some(pid) = state.take_server_pid(host.identity().id(), protocol) else {
                    continue;
                };
                let command = match ctx.endpoint_command(host, &format!("kill -9 {pid}")) {
                    Ok(command) => command,
                    Err(e) => {
                        warn!(host = %name, error = %e, "Cannot reach server to stop it");
                        continue;
                    }
                };
                if let Err(source) = host.run_checked(&command, None).await {
                    errors.push(CleanupError {
                        host: name.clone(),
                        step: format!("stop {protocol} server (pid {pid})"),
                        source,
                    });
                }
            }
        }
        errors
    }
}
