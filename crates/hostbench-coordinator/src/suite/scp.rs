//! Timed file copy between two hosts
//!
//! The sender creates a fixed-size payload and copies it to the receiver
//! under the shell's `time` builtin. Throughput is payload size over the
//! wall-clock time; a copy whose timing cannot be read is recorded as an
//! unmeasured zero.

use super::{BenchmarkSuite, Combination, SuiteContext};
use crate::config::ScpConfig;
use crate::error::{BenchError, CleanupError, ConfigError};
use crate::orchestrator::state::TransientStates;
use crate::pairs::{HostPair, HostPairSelector};
use crate::parser::parse_timed_copy;
use crate::sample_builder::SampleBuilder;
use hostbench_common::{AddressingMode, MEASURED_KEY, Metadata, Protocol, RunParameters, Sample};
use hostbench_remote::shell::quote;
use hostbench_remote::{Host, RemoteHost};
use std::time::Duration;
use tracing::{info, warn};

/// Timed copy suite
#[derive(Debug, Clone)]
pub struct ScpSuite {
    config: ScpConfig,
    dual_external_addresses: bool,
}

impl ScpSuite {
    /// `dual_external_addresses` must be set for external-address copies
    pub fn new(config: ScpConfig, dual_external_addresses: bool) -> Self {
        Self {
            config,
            dual_external_addresses,
        }
    }

    /// Command that writes the payload on the sender
    pub fn payload_command(&self, emulated: bool) -> String {
        let path = quote(&self.config.source_path);
        if emulated {
            format!("mkfile {}m {path}", self.config.payload_mib)
        } else {
            format!("fallocate -l {} {path}", self.config.payload_bytes())
        }
    }

    /// Timed copy of the payload to `user@address`
    pub fn copy_command(&self, user: &str, address: &str, options: &[String], identity: Option<&str>) -> String {
        let mut args: Vec<String> = options.iter().map(|o| format!("-o {}", quote(o))).collect();
        if let Some(identity) = identity {
            args.push(format!("-i {identity}"));
        }
        format!(
            "( time scp -P {} -pr {} {} {user}@{address}:{} ) 2>&1",
            self.config.port,
            args.join(" "),
            quote(&self.config.source_path),
            quote(&self.config.dest_dir)
        )
    }

    /// Where the payload lands on the receiver
    fn copied_path(&self) -> String {
        let name = self
            .config
            .source_path
            .rsplit('/')
            .next()
            .unwrap_or(&self.config.source_path);
        format!("{}/{name}", self.config.dest_dir.trim_end_matches('/'))
    }

    fn transfer<H: RemoteHost>(&self, ctx: &SuiteContext<'_, H>, pair: &HostPair) -> String {
        let receiver = ctx.hosts[pair.receiver].identity();
        match ctx.emulator {
            Some(emulator) => self.copy_command(
                &emulator.guest_user,
                &pair.address,
                &emulator.ssh_options,
                Some(&emulator.guest_to_guest_identity_file),
            ),
            None => self.copy_command(
                &receiver.ssh.user,
                &pair.address,
                &self.config.ssh_options,
                self.config.identity_file.as_deref(),
            ),
        }
    }
}

impl BenchmarkSuite for ScpSuite {
    fn name(&self) -> &'static str {
        "scp"
    }

    fn arity(&self) -> usize {
        2
    }

    async fn prepare<H: RemoteHost>(
        &self,
        ctx: &SuiteContext<'_, H>,
        _state: &mut TransientStates,
    ) -> Result<(), BenchError> {
        let mkdir = format!("mkdir -p {}", quote(&self.config.dest_dir));
        for host in ctx.hosts {
            ctx.setup(host, &mkdir, "create download directory").await?;
        }
        Ok(())
    }

    fn plan(&self, params: &RunParameters, hosts: &[&Host]) -> Vec<Combination> {
        let dual_external = self.dual_external_addresses;
        let pairs = HostPairSelector::new(params.addressing.clone())
            .with_directions(params.directions.clone())
            .with_feasibility(move |_, _, mode| mode == AddressingMode::Internal || dual_external)
            .pairs(hosts);

        pairs
            .into_iter()
            .map(|pair| Combination {
                protocol: Protocol::Copy,
                threads: 1,
                label: format!(
                    "copy {} -> {} ({})",
                    hosts[pair.sender].name, hosts[pair.receiver].name, pair.mode
                ),
                pair: Some(pair),
            })
            .collect()
    }

    async fn run_one<H: RemoteHost>(
        &self,
        ctx: &SuiteContext<'_, H>,
        _state: &TransientStates,
        combination: &Combination,
    ) -> Result<Vec<Sample>, BenchError> {
        let pair = combination
            .pair
            .as_ref()
            .ok_or_else(|| ConfigError::Validation(format!("{} has no host pair", combination.label)))?;
        let sender = &ctx.hosts[pair.sender];
        let receiver = &ctx.hosts[pair.receiver];

        ctx.setup(sender, &self.payload_command(ctx.emulator.is_some()), "create payload")
            .await?;

        let command = ctx.endpoint_command(sender, &self.transfer(ctx, pair))?;
        let timeout = Duration::from_secs(self.config.timeout_secs);
        let output = ctx
            .executor
            .execute(sender, &command, ctx.retry, Some(timeout))
            .await
            .map_err(|e| BenchError::execution(&combination.label, e))?;

        let transfer = parse_timed_copy(&output.stdout, self.config.payload_bytes());
        if !transfer.measured() {
            warn!(
                combination = %combination.label,
                "Copy finished without a usable timing line; recording an unmeasured zero"
            );
        }

        let mut extraction = Metadata::new();
        extraction.insert("file_size".into(), transfer.payload_bytes.into());
        extraction.insert(MEASURED_KEY.into(), transfer.measured().into());

        let sample = SampleBuilder::for_pair(sender.identity(), receiver.identity(), pair.mode).build(
            "Throughput",
            transfer.throughput,
            "MBytes/sec",
            extraction,
        );
        info!(combination = %combination.label, value = sample.value(), unit = %sample.unit(), "Sample recorded");
        Ok(vec![sample])
    }

    async fn cleanup<H: RemoteHost>(
        &self,
        ctx: &SuiteContext<'_, H>,
        _state: &mut TransientStates,
    ) -> Vec<CleanupError> {
        let remove = format!(
            "rm -f {} {}",
            quote(&self.config.source_path),
            quote(&self.copied_path())
        );
        let mut errors = Vec::new();
        for host in ctx.hosts {
            let name = &host.identity().name;
            let command = match ctx.endpoint_command(host, &remove) {
                Ok(command) => command,
                Err(e) => {
                    warn!(host = %name, error = %e, "Cannot reach endpoint to remove payload");
                    continue;
                }
            };
            if let Err(source) = host.run_checked(&command, None).await {
                errors.push(CleanupError {
                    host: name.clone(),
                    step: "remove payload".to_string(),
                    source,
                });
            }
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emulator::EmulatorConfig;
    use hostbench_common::Direction;
    use hostbench_remote::{RetryPolicy, RetryingExecutor};
    use hostbench_test_utils::{ScriptedHost, test_host};

    fn suite(dual_external: bool) -> ScpSuite {
        ScpSuite::new(serde_json::from_str("{}").unwrap(), dual_external)
    }

    fn params(addressing: Vec<AddressingMode>) -> RunParameters {
        RunParameters {
            protocols: vec![Protocol::Copy],
            thread_counts: vec![1],
            directions: Direction::BOTH.to_vec(),
            addressing,
            runtime: Duration::from_secs(0),
        }
    }

    #[test]
    fn test_payload_command() {
        assert_eq!(
            suite(false).payload_command(false),
            "fallocate -l 536870912 '/tmp/hostbench_scp_payload'"
        );
        assert_eq!(suite(false).payload_command(true), "mkfile 512m '/tmp/hostbench_scp_payload'");
    }

    #[test]
    fn test_copy_command() {
        let cmd = suite(false).copy_command("bench", "10.0.0.2", &["BatchMode=yes".to_string()], Some("~/.ssh/id"));
        assert_eq!(
            cmd,
            "( time scp -P 22 -pr -o 'BatchMode=yes' -i ~/.ssh/id '/tmp/hostbench_scp_payload' \
             bench@10.0.0.2:'/tmp/hostbench_downloads' ) 2>&1"
        );
    }

    #[test]
    fn test_external_copies_need_dual_addresses() {
        let a = test_host("vm-1", "10.0.0.1");
        let mut b = test_host("vm-2", "10.0.0.2");
        b.external_ip = Some("203.0.113.2".into());
        let mut a_ext = a.clone();
        a_ext.external_ip = Some("203.0.113.1".into());
        let both = params(vec![AddressingMode::External, AddressingMode::Internal]);

        let plan = suite(false).plan(&both, &[&a_ext, &b]);
        assert!(plan.iter().all(|c| c.pair.as_ref().unwrap().mode == AddressingMode::Internal));
        assert_eq!(plan.len(), 2);

        let plan = suite(true).plan(&both, &[&a_ext, &b]);
        assert_eq!(plan.len(), 4);
        assert_eq!(plan[0].label, "copy vm-1 -> vm-2 (external)");
    }

    #[test]
    fn test_emulated_copy_uses_guest_side_key() {
        let emulator: EmulatorConfig = serde_json::from_str(
            r#"{
                "config_path": "/opt/emulator/BENCH-4U.cfg",
                "placeholder_mac": "0a:c6:4a:7d:f0:6c",
                "launcher": "/opt/emulator/run.sh",
                "guest_identity_file": "~/.ssh/guest_rsa"
            }"#,
        )
        .unwrap();
        let hosts = vec![
            ScriptedHost::new("vm-1", "10.0.0.1").with_guest("0a:00:00:00:00:01", "10.0.1.1"),
            ScriptedHost::new("vm-2", "10.0.0.2").with_guest("0a:00:00:00:00:02", "10.0.1.2"),
        ];
        let executor = RetryingExecutor::default();
        let retry = RetryPolicy::new(1);
        let run = params(vec![AddressingMode::Internal]);
        let pair = HostPair {
            sender: 0,
            receiver: 1,
            direction: Direction::Forward,
            mode: AddressingMode::Internal,
            address: "10.0.1.2".into(),
        };
        let mut ctx = SuiteContext {
            hosts: &hosts,
            executor: &executor,
            retry: &retry,
            emulator: Some(&emulator),
            params: &run,
        };

        let cmd = suite(false).transfer(&ctx, &pair);
        assert!(cmd.contains("-i /.ssh/id_rsa "));
        assert!(cmd.contains("root@10.0.1.2:"));
        assert!(!cmd.contains("guest_rsa"));

        ctx.emulator = None;
        let cmd = suite(false).transfer(&ctx, &pair);
        assert!(cmd.contains("bench@10.0.1.2:"));
        assert!(!cmd.contains("id_rsa"));
    }

    #[test]
    fn test_copied_path() {
        assert_eq!(suite(false).copied_path(), "/tmp/hostbench_downloads/hostbench_scp_payload");
    }
}
