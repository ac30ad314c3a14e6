//! SSH-backed remote host
//!
//! Drives the local OpenSSH client (`ssh`, `scp`) through `tokio::process`.
//! Exit status 255 is reserved by ssh for its own failures and is reported
//! as a transport error rather than a command failure.

use crate::command::{CommandConfig, CommandOutput, run_local};
use crate::error::ExecError;
use crate::host::{Host, RemoteHost};
use crate::shell::quote_if_needed;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

/// Exit status ssh uses for connection-level failures
const SSH_TRANSPORT_EXIT: i32 = 255;

/// SSH connection options
#[derive(Debug, Clone)]
pub struct SshOptions {
    /// Connection timeout (`-o ConnectTimeout`)
    pub connect_timeout: Duration,
    /// Server keepalive interval (`-o ServerAliveInterval`)
    pub server_alive_interval: Duration,
    /// Timeout used when a caller does not supply one
    pub default_timeout: Duration,
    /// Local directory holding pre-staged benchmark artifacts
    pub artifact_dir: PathBuf,
}

impl Default for SshOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            server_alive_interval: Duration::from_secs(30),
            default_timeout: Duration::from_secs(
                hostbench_common::defaults::DEFAULT_SETUP_TIMEOUT_SECS,
            ),
            artifact_dir: PathBuf::from("data"),
        }
    }
}

/// A host reached over ssh
#[derive(Debug, Clone)]
pub struct SshHost {
    host: Host,
    options: SshOptions,
}

impl SshHost {
    pub fn new(host: Host, options: SshOptions) -> Self {
        Self { host, options }
    }

    /// Common `-o` options shared by ssh and scp
    fn common_args(&self) -> Vec<String> {
        let mut args = vec![
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            "StrictHostKeyChecking=no".to_string(),
            "-o".to_string(),
            "UserKnownHostsFile=/dev/null".to_string(),
            "-o".to_string(),
            "LogLevel=ERROR".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.options.connect_timeout.as_secs()),
            "-o".to_string(),
            format!(
                "ServerAliveInterval={}",
                self.options.server_alive_interval.as_secs()
            ),
        ];
        if let Some(key) = &self.host.ssh.identity_file {
            args.push("-i".to_string());
            args.push(key.display().to_string());
        }
        args
    }

    /// Full argument vector for running `command` over ssh
    pub fn ssh_args(&self, command: &str) -> Vec<String> {
        let mut args = self.common_args();
        args.push("-p".to_string());
        args.push(self.host.ssh.port.to_string());
        args.push(self.host.ssh.destination());
        args.push(command.to_string());
        args
    }

    /// Full argument vector for copying a local file to `remote_path`
    pub fn scp_args(&self, local: &str, remote_path: &str) -> Vec<String> {
        let mut args = self.common_args();
        args.push("-P".to_string());
        args.push(self.host.ssh.port.to_string());
        args.push(local.to_string());
        args.push(format!("{}:{}", self.host.ssh.destination(), remote_path));
        args
    }

    fn classify(&self, command: &str, output: CommandOutput) -> Result<CommandOutput, ExecError> {
        if output.exit_code == SSH_TRANSPORT_EXIT {
            return Err(ExecError::Transport {
                host: self.host.name.clone(),
                message: output.stderr.trim().to_string(),
            });
        }
        debug!(
            host = %self.host.name,
            command = %command,
            exit_code = output.exit_code,
            duration_ms = output.duration_ms,
            "Command finished"
        );
        Ok(output)
    }
}

impl RemoteHost for SshHost {
    fn identity(&self) -> &Host {
        &self.host
    }

    async fn run(&self, command: &str, timeout: Option<Duration>) -> Result<CommandOutput, ExecError> {
        let config = CommandConfig::with_timeout(timeout.unwrap_or(self.options.default_timeout));
        let output = run_local("ssh", &self.ssh_args(command), command, &config).await?;
        self.classify(command, output)
    }

    async fn install_package(&self, name: &str) -> Result<(), ExecError> {
        info!(host = %self.host.name, package = %name, "Installing package");
        let pkg = quote_if_needed(name);
        let command = format!(
            "if command -v apt-get >/dev/null 2>&1; then \
             sudo DEBIAN_FRONTEND=noninteractive apt-get install -y {pkg}; \
             else sudo yum install -y {pkg}; fi"
        );
        self.run_checked(&command, None).await.map(|_| ())
    }

    async fn fetch_artifact(&self, name: &str, dest_dir: &str) -> Result<String, ExecError> {
        let local = self.options.artifact_dir.join(name);
        let remote_path = format!("{}/{}", dest_dir.trim_end_matches('/'), name);
        info!(
            host = %self.host.name,
            artifact = %name,
            remote_path = %remote_path,
            "Staging artifact"
        );

        self.run_checked(&format!("mkdir -p {}", quote_if_needed(dest_dir)), None)
            .await?;

        let local = local.display().to_string();
        let display = format!("scp {local} {remote_path}");
        let config = CommandConfig::with_timeout(self.options.default_timeout);
        let output = run_local("scp", &self.scp_args(&local, &remote_path), &display, &config).await?;
        self.classify(&display, output)?.into_checked(&display)?;
        Ok(remote_path)
    }

    async fn allow_port(&self, port: u16) -> Result<(), ExecError> {
        info!(host = %self.host.name, port, "Opening inbound port");
        let command = format!(
            "sudo iptables -I INPUT -p tcp --dport {port} -j ACCEPT && \
             sudo iptables -I INPUT -p udp --dport {port} -j ACCEPT"
        );
        self.run_checked(&command, None).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::SshTarget;

    fn ssh_host(identity: Option<&str>) -> SshHost {
        SshHost::new(
            Host {
                name: "vm-1".into(),
                machine_type: "t3.micro".into(),
                zone: "us-east-2a".into(),
                ssh: SshTarget {
                    user: "ubuntu".into(),
                    address: "3.3.3.3".into(),
                    port: 2222,
                    identity_file: identity.map(PathBuf::from),
                },
                internal_ip: "10.0.0.1".into(),
                external_ip: None,
                guest: None,
            },
            SshOptions::default(),
        )
    }

    #[test]
    fn test_ssh_args_layout() {
        let args = ssh_host(Some("/keys/id_rsa")).ssh_args("hostname");
        assert!(args.contains(&"BatchMode=yes".to_string()));
        assert!(args.contains(&"ConnectTimeout=10".to_string()));
        let i = args.iter().position(|a| a == "-i").unwrap();
        assert_eq!(args[i + 1], "/keys/id_rsa");
        let n = args.len();
        assert_eq!(args[n - 4], "-p");
        assert_eq!(args[n - 3], "2222");
        assert_eq!(args[n - 2], "ubuntu@3.3.3.3");
        assert_eq!(args[n - 1], "hostname");
    }

    #[test]
    fn test_scp_args_layout() {
        let args = ssh_host(None).scp_args("data/iperf2.solaris", "/tmp/pkb/iperf2.solaris");
        assert!(!args.contains(&"-i".to_string()));
        let n = args.len();
        assert_eq!(args[n - 4], "-P");
        assert_eq!(args[n - 2], "data/iperf2.solaris");
        assert_eq!(args[n - 1], "ubuntu@3.3.3.3:/tmp/pkb/iperf2.solaris");
    }

    #[test]
    fn test_exit_255_is_transport_error() {
        let host = ssh_host(None);
        let err = host
            .classify("hostname", CommandOutput::failed(255, "Connection refused\n"))
            .unwrap_err();
        assert!(matches!(err, ExecError::Transport { ref message, .. } if message == "Connection refused"));

        let out = host.classify("false", CommandOutput::failed(1, "")).unwrap();
        assert_eq!(out.exit_code, 1);
    }
}
