//! Benchmark configuration
//!
//! One JSON document describes the host inventory, addressing, retry and
//! boot-wait settings, an optional emulator and exactly one suite section.
//! It is loaded once; `RunParameters` and `RetryPolicy` are derived from it
//! and passed down explicitly.

use crate::emulator::EmulatorConfig;
use crate::error::ConfigError;
use crate::suite::speccpu::SubsetSelection;
use crate::wait::BootWaitConfig;
use garde::Validate;
use hostbench_common::defaults::{
    default_iperf_runtime_secs, default_iperf_tcp_port, default_iperf_udp_port, default_poll_interval_secs,
    default_scp_payload_mib, default_scp_timeout_secs, default_spec_run_timeout_secs, default_ssh_port,
    default_thread_counts, DEFAULT_IPERF_RETRIES, DEFAULT_SCP_RETRIES,
};
use hostbench_common::{AddressingMode, CpuSuiteVersion, Direction, Protocol, RunParameters, RuntimeMetric};
use hostbench_remote::{Host, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

fn default_true() -> bool {
    true
}

fn default_iperf_protocols() -> Vec<Protocol> {
    vec![Protocol::Tcp]
}

fn default_iperf_package() -> String {
    "iperf".to_string()
}

fn default_iperf_artifact() -> String {
    "iperf2.solaris".to_string()
}

fn default_iperf_guest_binary() -> String {
    "/iperf".to_string()
}

fn default_scp_source_path() -> String {
    "/tmp/hostbench_scp_payload".to_string()
}

fn default_scp_dest_dir() -> String {
    "/tmp/hostbench_downloads".to_string()
}

fn default_scp_ssh_options() -> Vec<String> {
    vec![
        "StrictHostKeyChecking=no".to_string(),
        "UserKnownHostsFile=/dev/null".to_string(),
        "BatchMode=yes".to_string(),
    ]
}

fn default_spec_subset() -> String {
    "int".to_string()
}

/// Which receiver addresses to exercise
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AddressingPreference {
    #[default]
    Internal,
    External,
    Both,
}

/// Addressing settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddressingConfig {
    #[serde(default)]
    pub mode: AddressingPreference,

    /// Guests carry a public address of their own (required for external copies)
    #[serde(default)]
    pub dual_external_addresses: bool,
}

impl AddressingConfig {
    /// Modes in the order they are exercised
    pub fn modes(&self) -> Vec<AddressingMode> {
        match self.mode {
            AddressingPreference::Internal => vec![AddressingMode::Internal],
            AddressingPreference::External => vec![AddressingMode::External],
            AddressingPreference::Both => vec![AddressingMode::External, AddressingMode::Internal],
        }
    }
}

/// Retry overrides for benchmark combinations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, garde::Validate)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    /// Attempts per combination (suite default when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[garde(range(min = 1))]
    pub max_attempts: Option<u32>,

    /// Seconds between attempts
    #[serde(default = "default_poll_interval_secs")]
    #[garde(skip)]
    pub poll_interval_secs: u64,

    /// Log every failed attempt at warn level
    #[serde(default = "default_true")]
    #[garde(skip)]
    pub log_errors: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: None,
            poll_interval_secs: default_poll_interval_secs(),
            log_errors: true,
        }
    }
}

impl RetryConfig {
    /// Policy for one combination, falling back to the suite's attempt count
    pub fn policy(&self, suite_default: u32) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts.unwrap_or(suite_default))
            .with_poll_interval(Duration::from_secs(self.poll_interval_secs))
            .with_log_errors(self.log_errors)
    }
}

/// iperf network throughput suite
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, garde::Validate)]
#[serde(deny_unknown_fields)]
pub struct IperfConfig {
    /// TCP, UDP or both
    #[serde(default = "default_iperf_protocols")]
    #[garde(length(min = 1))]
    pub protocols: Vec<Protocol>,

    /// Parallel stream counts; each value is one run per direction
    #[serde(default = "default_thread_counts")]
    #[garde(length(min = 1), inner(range(min = 1)))]
    pub thread_counts: Vec<u32>,

    /// Seconds each client runs
    #[serde(default = "default_iperf_runtime_secs")]
    #[garde(range(min = 1))]
    pub runtime_secs: u64,

    /// Seconds allowed on top of the runtime (default: 30 + stream count)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[garde(range(min = 1))]
    pub timeout_buffer_secs: Option<u64>,

    #[serde(default = "default_iperf_tcp_port")]
    #[garde(range(min = 1))]
    pub tcp_port: u16,

    #[serde(default = "default_iperf_udp_port")]
    #[garde(range(min = 1))]
    pub udp_port: u16,

    /// Per-stream TCP bandwidth target in Mbits/sec
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[garde(skip)]
    pub tcp_bandwidth_mbits: Option<f64>,

    /// Per-stream UDP bandwidth target in Mbits/sec
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[garde(skip)]
    pub udp_bandwidth_mbits: Option<f64>,

    /// Package installed on hosts that run iperf directly
    #[serde(default = "default_iperf_package")]
    #[garde(length(min = 1))]
    pub package: String,

    /// Pre-staged binary copied into emulated guests
    #[serde(default = "default_iperf_artifact")]
    #[garde(length(min = 1))]
    pub artifact: String,

    /// Path of the binary inside emulated guests
    #[serde(default = "default_iperf_guest_binary")]
    #[garde(length(min = 1))]
    pub guest_binary: String,

    /// `LD_LIBRARY_PATH` for the binary inside emulated guests
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[garde(skip)]
    pub library_path: Option<String>,
}

/// Timed file copy suite
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, garde::Validate)]
#[serde(deny_unknown_fields)]
pub struct ScpConfig {
    /// Payload size in MiB
    #[serde(default = "default_scp_payload_mib")]
    #[garde(range(min = 1))]
    pub payload_mib: u64,

    /// Seconds allowed for one copy
    #[serde(default = "default_scp_timeout_secs")]
    #[garde(range(min = 1))]
    pub timeout_secs: u64,

    /// Port the receiver's sshd listens on
    #[serde(default = "default_ssh_port")]
    #[garde(range(min = 1))]
    pub port: u16,

    /// Payload location on the sender
    #[serde(default = "default_scp_source_path")]
    #[garde(length(min = 1))]
    pub source_path: String,

    /// Directory the payload is copied into on the receiver
    #[serde(default = "default_scp_dest_dir")]
    #[garde(length(min = 1))]
    pub dest_dir: String,

    /// Key the sender uses to reach the receiver
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[garde(skip)]
    pub identity_file: Option<String>,

    /// `-o` options for the copy when hosts are not emulated
    #[serde(default = "default_scp_ssh_options")]
    #[garde(skip)]
    pub ssh_options: Vec<String>,
}

impl ScpConfig {
    pub fn payload_bytes(&self) -> u64 {
        self.payload_mib.saturating_mul(1024 * 1024)
    }
}

/// SPEC CPU suite
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, garde::Validate)]
#[serde(deny_unknown_fields)]
pub struct SpecCpuConfig {
    #[garde(skip)]
    pub version: CpuSuiteVersion,

    /// `int`, `fp`, `all` or a single benchmark name
    #[serde(default = "default_spec_subset")]
    #[garde(length(min = 1))]
    pub subset: String,

    /// `speed` or `rate` (version default when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[garde(skip)]
    pub runtime_metric: Option<RuntimeMetric>,

    /// Copies for rate runs (online CPU count when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[garde(range(min = 1))]
    pub copies: Option<u32>,

    /// Install directory (version default when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[garde(skip)]
    pub spec_dir: Option<String>,

    /// runspec `--config` (version default when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[garde(skip)]
    pub runspec_config: Option<String>,

    /// Seconds allowed for the whole runspec invocation
    #[serde(default = "default_spec_run_timeout_secs")]
    #[garde(range(min = 1))]
    pub run_timeout_secs: u64,
}

impl SpecCpuConfig {
    pub fn runtime_metric(&self) -> RuntimeMetric {
        self.runtime_metric.unwrap_or(match self.version {
            CpuSuiteVersion::Cpu2000 => RuntimeMetric::Speed,
            CpuSuiteVersion::Cpu2006 => RuntimeMetric::Rate,
        })
    }

    pub fn spec_dir(&self) -> String {
        self.spec_dir.clone().unwrap_or_else(|| match self.version {
            CpuSuiteVersion::Cpu2000 => "/export/home/cpu2000".to_string(),
            CpuSuiteVersion::Cpu2006 => "/export/home/cpu2006".to_string(),
        })
    }

    pub fn runspec_config(&self) -> String {
        self.runspec_config.clone().unwrap_or_else(|| match self.version {
            CpuSuiteVersion::Cpu2000 => "solaris-sparc-sun_studio-starter".to_string(),
            CpuSuiteVersion::Cpu2006 => "ssp".to_string(),
        })
    }
}

/// The suite section present in a config
#[derive(Debug, Clone, Copy)]
pub enum SuiteConfig<'a> {
    Iperf(&'a IperfConfig),
    Scp(&'a ScpConfig),
    SpecCpu(&'a SpecCpuConfig),
}

impl SuiteConfig<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Iperf(_) => "iperf",
            Self::Scp(_) => "scp",
            Self::SpecCpu(_) => "speccpu",
        }
    }
}

/// Command-line overrides applied on top of the file
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    /// Tool runtime in seconds
    pub runtime_secs: Option<u64>,
    /// Thread counts
    pub thread_counts: Option<Vec<u32>>,
    pub stop_on_first_error: bool,
}

/// Complete benchmark configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, garde::Validate)]
#[serde(deny_unknown_fields)]
pub struct BenchConfig {
    /// Host inventory, in set order
    #[garde(length(min = 1), dive)]
    pub hosts: Vec<Host>,

    #[serde(default)]
    #[garde(skip)]
    pub addressing: AddressingConfig,

    #[serde(default)]
    #[garde(dive)]
    pub retry: RetryConfig,

    #[serde(default)]
    #[garde(dive)]
    pub boot_wait: BootWaitConfig,

    /// Present when the benchmark runs inside emulated guests
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[garde(dive)]
    pub emulator: Option<EmulatorConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[garde(dive)]
    pub iperf: Option<IperfConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[garde(dive)]
    pub scp: Option<ScpConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[garde(dive)]
    pub speccpu: Option<SpecCpuConfig>,

    /// Abort the remaining combinations after the first failure
    #[serde(default)]
    #[garde(skip)]
    pub stop_on_first_error: bool,
}

impl BenchConfig {
    /// Load and validate a configuration file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::io(path.display().to_string(), e))?;
        Self::from_json(&content)
    }

    /// Parse and validate a configuration document
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(content)?;
        config.check()?;
        Ok(config)
    }

    /// Field-level and cross-field validation
    pub fn check(&self) -> Result<(), ConfigError> {
        self.validate()?;

        let mut names = HashSet::new();
        for host in &self.hosts {
            if !names.insert(host.name.as_str()) {
                return Err(ConfigError::DuplicateHost(host.name.clone()));
            }
        }

        if self.emulator.is_some() {
            if let Some(host) = self.hosts.iter().find(|h| h.guest.is_none()) {
                return Err(ConfigError::MissingGuestNic(host.name.clone()));
            }
        }

        match self.suite()? {
            SuiteConfig::Iperf(iperf) => {
                if let Some(p) = iperf.protocols.iter().find(|p| !p.is_iperf()) {
                    return Err(ConfigError::UnsupportedProtocol {
                        suite: "iperf".to_string(),
                        protocol: p.to_string(),
                    });
                }
            }
            SuiteConfig::Scp(_) => {}
            SuiteConfig::SpecCpu(spec) => {
                SubsetSelection::resolve(spec.version, &spec.subset)?;
            }
        }
        Ok(())
    }

    /// The single suite section in this config
    pub fn suite(&self) -> Result<SuiteConfig<'_>, ConfigError> {
        let sections = [
            self.iperf.as_ref().map(SuiteConfig::Iperf),
            self.scp.as_ref().map(SuiteConfig::Scp),
            self.speccpu.as_ref().map(SuiteConfig::SpecCpu),
        ];
        let mut present = sections.into_iter().flatten();
        let suite = present.next().ok_or(ConfigError::MissingSuite)?;
        if present.next().is_some() {
            return Err(ConfigError::MultipleSuites);
        }
        Ok(suite)
    }

    /// Apply command-line overrides and re-validate
    pub fn apply_overrides(&mut self, overrides: &CliOverrides) -> Result<(), ConfigError> {
        if let Some(iperf) = &mut self.iperf {
            if let Some(runtime) = overrides.runtime_secs {
                iperf.runtime_secs = runtime;
            }
            if let Some(threads) = &overrides.thread_counts {
                if threads.is_empty() {
                    return Err(ConfigError::EmptyThreadCounts);
                }
                if threads.contains(&0) {
                    return Err(ConfigError::InvalidThreadCount);
                }
                iperf.thread_counts = threads.clone();
            }
        }
        if let Some(spec) = &mut self.speccpu {
            if let Some(copies) = overrides.thread_counts.as_ref().and_then(|t| t.first()) {
                spec.copies = Some(*copies);
            }
        }
        self.stop_on_first_error |= overrides.stop_on_first_error;
        self.check()
    }

    /// Combinations to exercise, built once and passed down
    pub fn run_parameters(&self) -> Result<RunParameters, ConfigError> {
        let params = match self.suite()? {
            SuiteConfig::Iperf(iperf) => RunParameters {
                protocols: iperf.protocols.clone(),
                thread_counts: iperf.thread_counts.clone(),
                directions: Direction::BOTH.to_vec(),
                addressing: self.addressing.modes(),
                runtime: Duration::from_secs(iperf.runtime_secs),
            },
            SuiteConfig::Scp(scp) => RunParameters {
                protocols: vec![Protocol::Copy],
                thread_counts: vec![1],
                directions: Direction::BOTH.to_vec(),
                addressing: self.addressing.modes(),
                runtime: Duration::from_secs(scp.timeout_secs),
            },
            SuiteConfig::SpecCpu(spec) => RunParameters {
                protocols: vec![Protocol::Cpu],
                thread_counts: vec![spec.copies.unwrap_or(1)],
                directions: vec![Direction::Forward],
                addressing: vec![AddressingMode::Internal],
                runtime: Duration::from_secs(spec.run_timeout_secs),
            },
        };

        if params.thread_counts.is_empty() {
            return Err(ConfigError::EmptyThreadCounts);
        }
        if params.protocols.is_empty() {
            return Err(ConfigError::EmptyProtocols);
        }
        Ok(params)
    }

    /// Retry policy for benchmark combinations
    pub fn retry_policy(&self) -> Result<RetryPolicy, ConfigError> {
        let suite_default = match self.suite()? {
            SuiteConfig::Iperf(_) => DEFAULT_IPERF_RETRIES,
            SuiteConfig::Scp(_) | SuiteConfig::SpecCpu(_) => DEFAULT_SCP_RETRIES,
        };
        Ok(self.retry.policy(suite_default))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const HOSTS: &str = r#"
        "hosts": [
            {"name": "vm-1", "machine_type": "n1-standard-1", "zone": "us-central1-a",
             "ssh": {"user": "bench", "address": "34.1.1.1"}, "internal_ip": "10.0.0.1"},
            {"name": "vm-2", "machine_type": "n1-standard-1", "zone": "us-central1-b",
             "ssh": {"user": "bench", "address": "34.1.1.2"}, "internal_ip": "10.0.0.2",
             "external_ip": "34.1.1.2"}
        ]"#;

    fn config_with(suite: &str) -> String {
        format!("{{{HOSTS}, {suite}}}")
    }

    #[test]
    fn test_load_iperf_config_with_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{}", config_with(r#""iperf": {"thread_counts": [1, 2]}"#)).unwrap();

        let config = BenchConfig::load(file.path()).unwrap();
        let iperf = config.iperf.as_ref().unwrap();
        assert_eq!(iperf.protocols, vec![Protocol::Tcp]);
        assert_eq!(iperf.tcp_port, 20000);
        assert_eq!(iperf.udp_port, 25000);
        assert_eq!(iperf.runtime_secs, 60);
        assert_eq!(config.hosts[0].ssh.port, 22);

        let params = config.run_parameters().unwrap();
        assert_eq!(params.combination_count(), 4);
        assert_eq!(config.retry_policy().unwrap().max_attempts(), 5);
    }

    #[test]
    fn test_missing_file_has_path_context() {
        let err = BenchConfig::load(Path::new("/nonexistent/bench.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/bench.json"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = BenchConfig::from_json(&config_with(r#""iperf": {"threads": [1]}"#)).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_zero_thread_count_rejected() {
        let err = BenchConfig::from_json(&config_with(r#""iperf": {"thread_counts": [0]}"#)).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_copy_protocol_not_allowed_in_iperf() {
        let err = BenchConfig::from_json(&config_with(r#""iperf": {"protocols": ["TCP", "COPY"]}"#)).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedProtocol { .. }));
    }

    #[test]
    fn test_exactly_one_suite_section() {
        let none = format!("{{{HOSTS}}}");
        assert!(matches!(BenchConfig::from_json(&none), Err(ConfigError::MissingSuite)));

        let two = config_with(r#""iperf": {}, "scp": {}"#);
        assert!(matches!(BenchConfig::from_json(&two), Err(ConfigError::MultipleSuites)));
    }

    #[test]
    fn test_invalid_spec_subset_rejected() {
        let err = BenchConfig::from_json(&config_with(
            r#""speccpu": {"version": "cpu2006", "subset": "doom"}"#,
        ))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSubset { .. }));
    }

    #[test]
    fn test_emulator_requires_guest_nics() {
        let err = BenchConfig::from_json(&config_with(
            r#""scp": {}, "emulator": {"config_path": "/opt/e.cfg", "placeholder_mac": "0a:00:00:00:00:00", "launcher": "/opt/run.sh"}"#,
        ))
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingGuestNic(name) if name == "vm-1"));
    }

    #[test]
    fn test_overrides_replace_threads_and_runtime() {
        let mut config = BenchConfig::from_json(&config_with(r#""iperf": {}"#)).unwrap();
        config
            .apply_overrides(&CliOverrides {
                runtime_secs: Some(10),
                thread_counts: Some(vec![1, 4, 8]),
                stop_on_first_error: true,
            })
            .unwrap();

        let params = config.run_parameters().unwrap();
        assert_eq!(params.thread_counts, vec![1, 4, 8]);
        assert_eq!(params.runtime, Duration::from_secs(10));
        assert!(config.stop_on_first_error);

        let err = config
            .apply_overrides(&CliOverrides {
                thread_counts: Some(vec![]),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, ConfigError::EmptyThreadCounts));
    }

    #[test]
    fn test_addressing_both_orders_external_first() {
        let config = BenchConfig::from_json(&config_with(
            r#""scp": {}, "addressing": {"mode": "both", "dual_external_addresses": true}"#,
        ))
        .unwrap();
        assert_eq!(
            config.run_parameters().unwrap().addressing,
            vec![AddressingMode::External, AddressingMode::Internal]
        );
        assert_eq!(config.retry_policy().unwrap().max_attempts(), 1);
    }

    #[test]
    fn test_spec_version_defaults() {
        let config = BenchConfig::from_json(&config_with(r#""speccpu": {"version": "cpu2000"}"#)).unwrap();
        let spec = config.speccpu.as_ref().unwrap();
        assert_eq!(spec.runtime_metric(), RuntimeMetric::Speed);
        assert_eq!(spec.spec_dir(), "/export/home/cpu2000");
        assert_eq!(spec.subset, "int");
    }
}
