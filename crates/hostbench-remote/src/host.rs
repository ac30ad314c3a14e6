//! Host identity and the remote host capability
//!
//! `Host` is owned by the surrounding inventory; the pipeline only reads it.
//! Anything the pipeline creates while a benchmark runs (server pids, boot
//! status) lives in the coordinator's transient side-table, not here.

use crate::command::CommandOutput;
use crate::error::ExecError;
use hostbench_common::AddressingMode;
use hostbench_common::defaults::default_ssh_port;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// How to reach a host's control shell
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, garde::Validate)]
#[serde(deny_unknown_fields)]
pub struct SshTarget {
    /// Login user
    #[garde(length(min = 1))]
    pub user: String,

    /// Hostname or IP for the control connection
    #[garde(length(min = 1))]
    pub address: String,

    /// SSH port
    #[serde(default = "default_ssh_port")]
    #[garde(range(min = 1))]
    pub port: u16,

    /// Private key used for the control connection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[garde(skip)]
    pub identity_file: Option<PathBuf>,
}

impl SshTarget {
    /// The `user@address` destination string
    pub fn destination(&self) -> String {
        format!("{}@{}", self.user, self.address)
    }
}

/// Secondary network interface owned by an emulated guest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, garde::Validate)]
#[serde(deny_unknown_fields)]
pub struct GuestNic {
    /// MAC address the emulator must present for this NIC
    #[garde(length(min = 1))]
    pub mac_address: String,

    /// Private address of the NIC (reachable from the peer host)
    #[garde(length(min = 1))]
    pub private_ip: String,

    /// Public address of the NIC, when one is attached
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[garde(skip)]
    pub public_ip: Option<String>,
}

/// A machine participating in a benchmark
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, garde::Validate)]
#[serde(deny_unknown_fields)]
pub struct Host {
    /// Unique name within the host set
    #[garde(length(min = 1))]
    pub name: String,

    /// Machine type (e.g., "n2-standard-4")
    #[garde(length(min = 1))]
    pub machine_type: String,

    /// Availability zone
    #[garde(length(min = 1))]
    pub zone: String,

    /// Control connection
    #[garde(dive)]
    pub ssh: SshTarget,

    /// Private network address
    #[garde(length(min = 1))]
    pub internal_ip: String,

    /// Public address, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[garde(skip)]
    pub external_ip: Option<String>,

    /// Guest NIC when the benchmark runs inside an emulated guest
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[garde(dive)]
    pub guest: Option<GuestNic>,
}

impl Host {
    /// Identity key used by side-tables
    pub fn id(&self) -> &str {
        &self.name
    }

    /// Address a peer should connect to for the given addressing mode.
    ///
    /// When a guest NIC is present the benchmark endpoint is the guest, so its
    /// addresses take precedence over the host's own.
    pub fn target_address(&self, mode: AddressingMode) -> Option<&str> {
        match (&self.guest, mode) {
            (Some(nic), AddressingMode::Internal) => Some(nic.private_ip.as_str()),
            (Some(nic), AddressingMode::External) => nic.public_ip.as_deref(),
            (None, AddressingMode::Internal) => Some(self.internal_ip.as_str()),
            (None, AddressingMode::External) => self.external_ip.as_deref(),
        }
    }
}

/// Capabilities the benchmark pipeline needs from a host.
///
/// `run` reports the exit status without judging it; the retrying executor
/// decides whether a non-zero exit is a failure.
#[allow(async_fn_in_trait)] // Used through generics only; Send + Sync bounds on the trait are sufficient
pub trait RemoteHost: Send + Sync {
    /// The inventory entry this capability acts on
    fn identity(&self) -> &Host;

    /// Execute a shell command on the host, honouring an optional timeout
    async fn run(&self, command: &str, timeout: Option<Duration>) -> Result<CommandOutput, ExecError>;

    /// Execute once and fail on a non-zero exit
    async fn run_checked(&self, command: &str, timeout: Option<Duration>) -> Result<CommandOutput, ExecError> {
        self.run(command, timeout).await?.into_checked(command)
    }

    /// Install a named software package
    async fn install_package(&self, name: &str) -> Result<(), ExecError>;

    /// Copy a pre-staged benchmark artifact to `dest_dir`, returning its remote path
    async fn fetch_artifact(&self, name: &str, dest_dir: &str) -> Result<String, ExecError>;

    /// Open an inbound port on the host firewall
    async fn allow_port(&self, port: u16) -> Result<(), ExecError>;
}
