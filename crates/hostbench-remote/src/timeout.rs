//! Command timeout policy for long-running tool invocations
//!
//! A tool told to run for `runtime` needs extra wall-clock time to start,
//! connect every stream and exit. The buffer grows with the stream count so
//! a normal completion is never mistaken for a timeout.

use hostbench_common::defaults::DEFAULT_TIMEOUT_BUFFER_SECS;
use std::time::Duration;

/// Wall-clock timeout for a tool run of `runtime` with `streams` parallel
/// streams.
///
/// An explicit `buffer` replaces the default of
/// `DEFAULT_TIMEOUT_BUFFER_SECS + streams` seconds.
pub fn command_timeout(runtime: Duration, streams: u32, buffer: Option<Duration>) -> Duration {
    let buffer = buffer
        .unwrap_or_else(|| Duration::from_secs(DEFAULT_TIMEOUT_BUFFER_SECS + u64::from(streams)));
    runtime + buffer
}
