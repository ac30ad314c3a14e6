//! Run parameters: what to exercise and in which combinations
//!
//! `RunParameters` is built once from configuration and threaded through
//! every component call. Nothing in the pipeline reads ambient global state.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Protocol (or tool family) a combination exercises
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[strum(ascii_case_insensitive)]
pub enum Protocol {
    /// iperf TCP streams
    #[serde(rename = "TCP")]
    #[strum(serialize = "TCP")]
    Tcp,
    /// iperf UDP streams
    #[serde(rename = "UDP")]
    #[strum(serialize = "UDP")]
    Udp,
    /// Timed file copy (scp)
    #[serde(rename = "COPY")]
    #[strum(to_string = "COPY", serialize = "scp")]
    Copy,
    /// CPU benchmark suite subset
    #[serde(rename = "CPU")]
    #[strum(serialize = "CPU")]
    Cpu,
}

impl Protocol {
    /// Whether this protocol is driven by iperf
    pub fn is_iperf(self) -> bool {
        matches!(self, Self::Tcp | Self::Udp)
    }
}

/// Direction of traffic between the two hosts of a set
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Direction {
    /// host 0 sends to host 1
    Forward,
    /// host 1 sends to host 0
    Reverse,
}

impl Direction {
    /// Both directions, forward first
    pub const BOTH: [Direction; 2] = [Direction::Forward, Direction::Reverse];

    /// (sender index, receiver index) for a two-host set
    pub fn indices(self) -> (usize, usize) {
        match self {
            Self::Forward => (0, 1),
            Self::Reverse => (1, 0),
        }
    }
}

/// Which address of the receiver a connection targets
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum AddressingMode {
    /// Private network address
    Internal,
    /// Public address
    External,
}

/// SPEC CPU suite release
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum CpuSuiteVersion {
    Cpu2000,
    Cpu2006,
}

/// SPEC CPU runtime metric
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString, strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum RuntimeMetric {
    /// Time-based metric
    Speed,
    /// Throughput-based metric
    Rate,
}

/// The cross product of protocols, thread counts, directions and
/// addressing modes to exercise.
#[derive(Debug, Clone, PartialEq)]
pub struct RunParameters {
    pub protocols: Vec<Protocol>,
    pub thread_counts: Vec<u32>,
    pub directions: Vec<Direction>,
    pub addressing: Vec<AddressingMode>,
    /// Nominal tool run duration
    pub runtime: Duration,
}

impl RunParameters {
    /// Number of (protocol, thread count, direction, addressing) combinations
    pub fn combination_count(&self) -> usize {
        self.protocols.len() * self.thread_counts.len() * self.directions.len() * self.addressing.len()
    }
}
