//! Emulated guest running on a host
//!
//! Some targets are guests of a machine emulator launched on the host. The
//! host boots the guest with the guest NIC's MAC address, then every
//! benchmark command is forwarded into the guest over a nested ssh hop.

use crate::error::{BenchError, CleanupError, ConfigError};
use crate::wait::{BootWaitConfig, wait_until_ready};
use hostbench_common::defaults::default_shutdown_settle_secs;
use hostbench_remote::shell::quote;
use hostbench_remote::{Host, RemoteHost, RetryPolicy, RetryingExecutor};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

/// Timeout for a single boot check
const CHECK_TIMEOUT: Duration = Duration::from_secs(30);

fn default_guest_user() -> String {
    "root".to_string()
}

fn default_guest_identity_file() -> String {
    "~/.ssh/guest_rsa".to_string()
}

fn default_guest_to_guest_identity_file() -> String {
    "/.ssh/id_rsa".to_string()
}

fn default_guest_ssh_options() -> Vec<String> {
    [
        "UserKnownHostsFile=/dev/null",
        "StrictHostKeyChecking=no",
        "IdentitiesOnly=yes",
        "PreferredAuthentications=publickey",
        "PasswordAuthentication=no",
        "GSSAPIAuthentication=no",
        "ServerAliveInterval=30",
        "ServerAliveCountMax=10",
        "ConnectTimeout=5",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// How to boot and reach the emulated guest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, garde::Validate)]
#[serde(deny_unknown_fields)]
pub struct EmulatorConfig {
    /// Emulator configuration file on the host
    #[garde(length(min = 1))]
    pub config_path: String,

    /// MAC address in `config_path` replaced by the guest NIC's address
    #[garde(length(min = 1))]
    pub placeholder_mac: String,

    /// Script that starts the emulator
    #[garde(length(min = 1))]
    pub launcher: String,

    /// Login user inside the guest
    #[serde(default = "default_guest_user")]
    #[garde(length(min = 1))]
    pub guest_user: String,

    /// Key on the host used to reach the guest
    #[serde(default = "default_guest_identity_file")]
    #[garde(length(min = 1))]
    pub guest_identity_file: String,

    /// Key inside a guest used to reach another guest
    #[serde(default = "default_guest_to_guest_identity_file")]
    #[garde(length(min = 1))]
    pub guest_to_guest_identity_file: String,

    /// `-o` options for the nested ssh hop
    #[serde(default = "default_guest_ssh_options")]
    #[garde(skip)]
    pub ssh_options: Vec<String>,

    /// Seconds to let the guest power off before the host moves on
    #[serde(default = "default_shutdown_settle_secs")]
    #[garde(skip)]
    pub shutdown_settle_secs: u64,
}

/// Command builder for one host's guest
#[derive(Debug, Clone, Copy)]
pub struct GuestShell<'a> {
    config: &'a EmulatorConfig,
    address: &'a str,
}

impl GuestShell<'_> {
    fn option_args(&self) -> String {
        let mut args: Vec<String> = self
            .config
            .ssh_options
            .iter()
            .map(|o| format!("-o {}", quote(o)))
            .collect();
        args.push(format!("-i {}", self.config.guest_identity_file));
        args.join(" ")
    }

    /// `user@address` of the guest
    pub fn destination(&self) -> String {
        format!("{}@{}", self.config.guest_user, self.address)
    }

    /// Run `command` inside the guest
    pub fn command(&self, command: &str) -> String {
        format!("ssh {} {} {}", self.option_args(), self.destination(), quote(command))
    }

    /// Copy a host file into the guest
    pub fn copy_to(&self, local_path: &str, guest_path: &str) -> String {
        format!(
            "scp {} {} {}:{}",
            self.option_args(),
            quote(local_path),
            self.destination(),
            quote(guest_path)
        )
    }
}

impl EmulatorConfig {
    /// Command builder for the guest of `host`.
    ///
    /// # Errors
    /// `MissingGuestNic` when the host has no guest NIC configured.
    pub fn guest<'a>(&'a self, host: &'a Host) -> Result<GuestShell<'a>, ConfigError> {
        let nic = host
            .guest
            .as_ref()
            .ok_or_else(|| ConfigError::MissingGuestNic(host.name.clone()))?;
        Ok(GuestShell {
            config: self,
            address: &nic.private_ip,
        })
    }

    /// Host commands that configure and start the emulator
    pub fn boot_commands(&self, host: &Host) -> Result<Vec<String>, ConfigError> {
        let nic = host
            .guest
            .as_ref()
            .ok_or_else(|| ConfigError::MissingGuestNic(host.name.clone()))?;
        let script = format!(
            "s/mac = {}/mac = {}/g",
            self.placeholder_mac, nic.mac_address
        );
        Ok(vec![
            format!("sudo sed -i {} {}", quote(&script), quote(&self.config_path)),
            format!("sudo {}", self.launcher),
        ])
    }

    /// Configure and launch the emulator on `host`
    pub async fn boot<H: RemoteHost>(
        &self,
        host: &H,
        executor: &RetryingExecutor,
        policy: &RetryPolicy,
    ) -> Result<(), BenchError> {
        let name = &host.identity().name;
        info!(host = %name, "Booting emulated guest");
        for command in self.boot_commands(host.identity())? {
            executor
                .execute(host, &command, policy, None)
                .await
                .map_err(|e| BenchError::execution(format!("boot {name}"), e))?;
        }
        Ok(())
    }

    /// Poll the guest with `hostname` until it answers.
    ///
    /// Each check is a single attempt; the loop itself has no attempt limit
    /// unless `wait.max_wait_secs` is set.
    pub async fn wait_for_boot<H: RemoteHost>(
        &self,
        host: &H,
        executor: &RetryingExecutor,
        wait: &BootWaitConfig,
    ) -> Result<u32, BenchError> {
        let name = &host.identity().name;
        let check = self.guest(host.identity())?.command("hostname");
        let check_policy = RetryPolicy::once();

        let attempts = wait_until_ready(
            wait,
            executor.cancel_token(),
            || async {
                executor
                    .execute(host, &check, &check_policy, Some(CHECK_TIMEOUT))
                    .await
                    .map(|_| ())
            },
            &format!("{name} guest"),
        )
        .await
        .map_err(|e| BenchError::execution(format!("wait for {name} guest"), e))?;

        info!(host = %name, attempts, "Emulated guest is up");
        Ok(attempts)
    }

    /// Power the guest off and give it time to settle. Best effort.
    pub async fn shutdown<H: RemoteHost>(&self, host: &H) -> Vec<CleanupError> {
        let name = host.identity().name.clone();
        let mut errors = Vec::new();

        let poweroff = match self.guest(host.identity()) {
            Ok(guest) => guest.command("poweroff &"),
            Err(e) => {
                warn!(host = %name, error = %e, "Cannot shut down guest");
                return errors;
            }
        };

        let steps = [
            ("guest poweroff", poweroff),
            ("shutdown settle", format!("sleep {}", self.shutdown_settle_secs)),
        ];
        for (step, command) in steps {
            if let Err(source) = host.run_checked(&command, None).await {
                errors.push(CleanupError {
                    host: name.clone(),
                    step: step.to_string(),
                    source,
                });
            }
        }
        errors
    }
}
