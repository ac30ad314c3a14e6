//! Timed file copy output
//!
//! Throughput is payload size over the wall-clock time printed by the shell's
//! `time` builtin (`real 1m30.500s`). A copy whose timing line is missing
//! yields zero with `measured == false`; zero is then a "could not measure"
//! sentinel, never a genuine measurement.

use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;

static REAL_TIME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"real\s+(\d+)m(\d+\.?\d*)s").expect("valid regex"));

const MIB: f64 = 1024.0 * 1024.0;

/// Result of one timed copy
#[derive(Debug, Clone, PartialEq)]
pub struct TransferResult {
    /// Throughput in MiB per second; 0.0 when not measured
    pub throughput: f64,
    /// Wall-clock duration, when a usable timing line was found
    pub duration: Option<Duration>,
    /// Bytes copied
    pub payload_bytes: u64,
}

impl TransferResult {
    /// Whether `throughput` is a real measurement
    pub fn measured(&self) -> bool {
        self.duration.is_some()
    }
}

/// Compute copy throughput from `time` output.
///
/// A zero-length duration is treated like a missing timing line.
pub fn parse_timed_copy(output: &str, payload_bytes: u64) -> TransferResult {
    let duration = REAL_TIME.captures(output).and_then(|caps| {
        let minutes: f64 = caps[1].parse().ok()?;
        let seconds: f64 = caps[2].parse().ok()?;
        let total = minutes * 60.0 + seconds;
        (total > 0.0).then(|| Duration::from_secs_f64(total))
    });

    let throughput = duration
        .map(|d| (payload_bytes as f64 / MIB) / d.as_secs_f64())
        .unwrap_or(0.0);

    TransferResult {
        throughput,
        duration,
        payload_bytes,
    }
}
