//! Default configuration values shared between the executor and coordinator
//!
//! These constants ensure consistent defaults across all hostbench components.

/// iperf TCP server port
pub const DEFAULT_IPERF_TCP_PORT: u16 = 20000;

/// iperf UDP server port
pub const DEFAULT_IPERF_UDP_PORT: u16 = 25000;

/// Attempts per iperf client invocation
pub const DEFAULT_IPERF_RETRIES: u32 = 5;

/// Nominal iperf run duration in seconds
pub const DEFAULT_IPERF_RUNTIME_SECS: u64 = 60;

/// Base timeout buffer added on top of the tool runtime (seconds).
/// The stream count is added to this when no explicit buffer is configured.
pub const DEFAULT_TIMEOUT_BUFFER_SECS: u64 = 30;

/// Write buffer size iperf uses for TCP (bytes)
pub const DEFAULT_TCP_BUFFER_SIZE: u64 = 8192;

/// Datagram buffer size iperf uses for UDP (bytes)
pub const DEFAULT_UDP_BUFFER_SIZE: u64 = 1470;

/// Payload copied by the scp suite, in MiB
pub const DEFAULT_SCP_PAYLOAD_MIB: u64 = 512;

/// Wall-clock limit for one scp transfer (seconds)
pub const DEFAULT_SCP_TIMEOUT_SECS: u64 = 120;

/// Attempts per scp transfer
pub const DEFAULT_SCP_RETRIES: u32 = 1;

/// SSH port used for host-to-host copies
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Poll interval between boot checks and retry attempts (seconds)
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 1;

/// Default timeout for short setup commands (seconds)
pub const DEFAULT_SETUP_TIMEOUT_SECS: u64 = 600;

/// Default timeout for a full SPEC CPU run (seconds)
pub const DEFAULT_SPEC_RUN_TIMEOUT_SECS: u64 = 48 * 3600;

/// How long to let an emulated guest power off before moving on (seconds)
pub const DEFAULT_SHUTDOWN_SETTLE_SECS: u64 = 20;

// Serde default functions for struct field defaults

/// Returns the default iperf TCP port
pub fn default_iperf_tcp_port() -> u16 {
    DEFAULT_IPERF_TCP_PORT
}

/// Returns the default iperf UDP port
pub fn default_iperf_udp_port() -> u16 {
    DEFAULT_IPERF_UDP_PORT
}

/// Returns the default iperf retry count
pub fn default_iperf_retries() -> u32 {
    DEFAULT_IPERF_RETRIES
}

/// Returns the default iperf runtime
pub fn default_iperf_runtime_secs() -> u64 {
    DEFAULT_IPERF_RUNTIME_SECS
}

/// Returns the default scp payload size
pub fn default_scp_payload_mib() -> u64 {
    DEFAULT_SCP_PAYLOAD_MIB
}

/// Returns the default scp timeout
pub fn default_scp_timeout_secs() -> u64 {
    DEFAULT_SCP_TIMEOUT_SECS
}

/// Returns the default scp retry count
pub fn default_scp_retries() -> u32 {
    DEFAULT_SCP_RETRIES
}

/// Returns the default ssh port
pub fn default_ssh_port() -> u16 {
    DEFAULT_SSH_PORT
}

/// Returns the default poll interval
pub fn default_poll_interval_secs() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

/// Returns the default SPEC CPU run timeout
pub fn default_spec_run_timeout_secs() -> u64 {
    DEFAULT_SPEC_RUN_TIMEOUT_SECS
}

/// Returns the default guest shutdown settle time
pub fn default_shutdown_settle_secs() -> u64 {
    DEFAULT_SHUTDOWN_SETTLE_SECS
}

/// Returns the default thread count list
pub fn default_thread_counts() -> Vec<u32> {
    vec![1]
}
