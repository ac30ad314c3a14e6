//! hostbench-common - Shared types and utilities
//!
//! This crate provides the value types shared by the remote execution layer
//! and the coordinator, without any process or network dependencies.
//!
//! ## Modules
//!
//! - [`defaults`]: Default configuration values
//! - [`params`]: Protocols, directions, addressing modes and run parameters
//! - [`sample`]: Normalized benchmark sample type
//! - [`stats`]: Per-metric min/avg/max over measured samples
//! - [`status`]: Benchmark lifecycle states

pub mod defaults;
pub mod params;
pub mod sample;
pub mod stats;
pub mod status;

// Re-export commonly used types
pub use params::{AddressingMode, CpuSuiteVersion, Direction, Protocol, RunParameters, RuntimeMetric};
pub use sample::{MEASURED_KEY, Metadata, MetadataValue, Sample};
pub use stats::MetricSummary;
pub use status::LifecycleState;

/// Get the current timestamp in milliseconds since UNIX epoch.
///
/// Returns 0 if system time is before the epoch (should never happen in practice).
#[inline]
pub fn timestamp_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
