//! Scripted remote host
//!
//! `ScriptedHost` answers `run` calls from rules matched by substring, in the
//! order the rules were added. A rule holds one-shot replies (consumed first)
//! and an optional reply repeated forever. Commands with no matching rule
//! succeed with empty output. Every call is recorded.

use hostbench_remote::{CommandOutput, ExecError, GuestNic, Host, RemoteHost, SshTarget};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// A call made against a scripted host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Run {
        command: String,
        timeout: Option<Duration>,
    },
    InstallPackage(String),
    FetchArtifact {
        name: String,
        dest_dir: String,
    },
    AllowPort(u16),
}

struct Rule {
    pattern: String,
    once: VecDeque<Result<CommandOutput, ExecError>>,
    always: Option<CommandOutput>,
}

/// Build a host inventory entry for tests
///
/// # Example
///
/// ```
/// use hostbench_test_utils::test_host;
///
/// let host = test_host("vm-1", "10.0.0.1");
/// assert_eq!(host.internal_ip, "10.0.0.1");
/// ```
pub fn test_host(name: &str, internal_ip: &str) -> Host {
    Host {
        name: name.to_string(),
        machine_type: "n1-standard-1".to_string(),
        zone: "us-central1-a".to_string(),
        ssh: SshTarget {
            user: "bench".to_string(),
            address: internal_ip.to_string(),
            port: 22,
            identity_file: None,
        },
        internal_ip: internal_ip.to_string(),
        external_ip: None,
        guest: None,
    }
}

/// In-memory `RemoteHost` driven by scripted replies
pub struct ScriptedHost {
    host: Host,
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedHost {
    pub fn new(name: &str, internal_ip: &str) -> Self {
        Self::from_host(test_host(name, internal_ip))
    }

    pub fn from_host(host: Host) -> Self {
        Self {
            host,
            rules: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Give the host a public address
    pub fn with_external_ip(mut self, ip: &str) -> Self {
        self.host.external_ip = Some(ip.to_string());
        self
    }

    /// Attach an emulated guest NIC
    pub fn with_guest(mut self, mac_address: &str, private_ip: &str) -> Self {
        self.host.guest = Some(GuestNic {
            mac_address: mac_address.to_string(),
            private_ip: private_ip.to_string(),
            public_ip: None,
        });
        self
    }

    /// Reply with `stdout` (exit 0) to every command containing `pattern`
    pub fn on(self, pattern: &str, stdout: &str) -> Self {
        self.respond(pattern, CommandOutput::ok(stdout));
        self
    }

    /// Reply with `output` to every command containing `pattern`
    pub fn respond(&self, pattern: &str, output: CommandOutput) {
        let mut rules = lock(&self.rules);
        match rules.iter_mut().find(|r| r.pattern == pattern) {
            Some(rule) => rule.always = Some(output),
            None => rules.push(Rule {
                pattern: pattern.to_string(),
                once: VecDeque::new(),
                always: Some(output),
            }),
        }
    }

    /// Queue a single reply for the next command containing `pattern`
    pub fn respond_once(&self, pattern: &str, reply: Result<CommandOutput, ExecError>) {
        let mut rules = lock(&self.rules);
        match rules.iter_mut().find(|r| r.pattern == pattern) {
            Some(rule) => rule.once.push_back(reply),
            None => rules.push(Rule {
                pattern: pattern.to_string(),
                once: VecDeque::from([reply]),
                always: None,
            }),
        }
    }

    /// Every call made so far
    pub fn calls(&self) -> Vec<Call> {
        lock(&self.calls).clone()
    }

    /// Commands passed to `run`, in order
    pub fn commands(&self) -> Vec<String> {
        lock(&self.calls)
            .iter()
            .filter_map(|c| match c {
                Call::Run { command, .. } => Some(command.clone()),
                _ => None,
            })
            .collect()
    }

    /// Number of `run` commands containing `pattern`
    pub fn count_matching(&self, pattern: &str) -> usize {
        self.commands().iter().filter(|c| c.contains(pattern)).count()
    }

    /// Timeout passed with the first command containing `pattern`
    pub fn timeout_for(&self, pattern: &str) -> Option<Duration> {
        lock(&self.calls).iter().find_map(|c| match c {
            Call::Run { command, timeout } if command.contains(pattern) => *timeout,
            _ => None,
        })
    }

    fn record(&self, call: Call) {
        lock(&self.calls).push(call);
    }

    fn reply_for(&self, command: &str) -> Result<CommandOutput, ExecError> {
        let mut rules = lock(&self.rules);
        for rule in rules.iter_mut() {
            if !command.contains(&rule.pattern) {
                continue;
            }
            if let Some(reply) = rule.once.pop_front() {
                return reply;
            }
            if let Some(output) = &rule.always {
                return Ok(output.clone());
            }
        }
        Ok(CommandOutput::ok(""))
    }
}

impl RemoteHost for ScriptedHost {
    fn identity(&self) -> &Host {
        &self.host
    }

    async fn run(&self, command: &str, timeout: Option<Duration>) -> Result<CommandOutput, ExecError> {
        self.record(Call::Run {
            command: command.to_string(),
            timeout,
        });
        self.reply_for(command)
    }

    async fn install_package(&self, name: &str) -> Result<(), ExecError> {
        self.record(Call::InstallPackage(name.to_string()));
        Ok(())
    }

    async fn fetch_artifact(&self, name: &str, dest_dir: &str) -> Result<String, ExecError> {
        self.record(Call::FetchArtifact {
            name: name.to_string(),
            dest_dir: dest_dir.to_string(),
        });
        Ok(format!("{}/{}", dest_dir.trim_end_matches('/'), name))
    }

    async fn allow_port(&self, port: u16) -> Result<(), ExecError> {
        self.record(Call::AllowPort(port));
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
