//! Transient per-host state owned by the controller
//!
//! Handles created during prepare (server process ids, boot status) are kept
//! here, keyed by host identity, and read back during cleanup. The host
//! inventory itself is never mutated.

use hostbench_common::Protocol;
use std::collections::HashMap;

/// What the controller started on one host
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransientState {
    /// Process id of the TCP server
    pub tcp_server_pid: Option<u32>,
    /// Process id of the UDP server
    pub udp_server_pid: Option<u32>,
    /// The emulated guest was launched
    pub booted: bool,
}

impl TransientState {
    /// Server pid recorded for `protocol`
    pub fn server_pid(&self, protocol: Protocol) -> Option<u32> {
        match protocol {
            Protocol::Tcp => self.tcp_server_pid,
            Protocol::Udp => self.udp_server_pid,
            _ => None,
        }
    }

    fn server_pid_mut(&mut self, protocol: Protocol) -> Option<&mut Option<u32>> {
        match protocol {
            Protocol::Tcp => Some(&mut self.tcp_server_pid),
            Protocol::Udp => Some(&mut self.udp_server_pid),
            _ => None,
        }
    }
}

/// Side-table of transient state keyed by host id
#[derive(Debug, Clone, Default)]
pub struct TransientStates {
    by_host: HashMap<String, TransientState>,
}

impl TransientStates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, host_id: &str) -> Option<&TransientState> {
        self.by_host.get(host_id)
    }

    /// State for `host_id`, created on first use
    pub fn entry(&mut self, host_id: &str) -> &mut TransientState {
        self.by_host.entry(host_id.to_string()).or_default()
    }

    pub fn server_pid(&self, host_id: &str, protocol: Protocol) -> Option<u32> {
        self.get(host_id).and_then(|s| s.server_pid(protocol))
    }

    /// Record a started server. Only iperf protocols have servers.
    pub fn set_server_pid(&mut self, host_id: &str, protocol: Protocol, pid: u32) {
        if let Some(slot) = self.entry(host_id).server_pid_mut(protocol) {
            *slot = Some(pid);
        }
    }

    /// Remove and return a recorded server pid
    pub fn take_server_pid(&mut self, host_id: &str, protocol: Protocol) -> Option<u32> {
        self.by_host
            .get_mut(host_id)
            .and_then(|s| s.server_pid_mut(protocol))
            .and_then(Option::take)
    }

    pub fn mark_booted(&mut self, host_id: &str) {
        self.entry(host_id).booted = true;
    }

    pub fn is_booted(&self, host_id: &str) -> bool {
        self.get(host_id).is_some_and(|s| s.booted)
    }

    pub fn clear(&mut self) {
        self.by_host.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.by_host.is_empty()
    }
}
