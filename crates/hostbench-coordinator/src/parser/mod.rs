//! Tool output extraction
//!
//! Each submodule turns one tool's free-form stdout into typed values.
//! Extraction never returns a made-up number: anything that cannot be
//! recovered is a `ParseError` carrying an excerpt of the output, except for
//! the timed copy's documented "could not measure" sentinel.

pub mod iperf;
pub mod speccpu;
pub mod transfer;

use crate::error::{ParseError, ParseErrorKind};

pub use iperf::{IperfReport, parse_iperf, parse_pid};
pub use speccpu::{SpecScore, parse_spec_log};
pub use transfer::{TransferResult, parse_timed_copy};

/// Where a throughput total came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum AggregateSource {
    /// The tool printed its own sum across streams
    SumMarker,
    /// Per-stream values summed by us; tends to overestimate the true aggregate
    PerStreamEstimate,
}

/// Throughput values recovered from one run
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedThroughput {
    /// Recovered values (one per `[SUM]` line, or one per stream)
    pub values: Vec<f64>,
    /// Stream count the tool was asked to use
    pub expected_streams: u32,
    pub source: AggregateSource,
}

impl ParsedThroughput {
    /// Total throughput across all recovered values
    pub fn total(&self) -> f64 {
        self.values.iter().sum()
    }

    /// Whether the total is a per-stream estimate rather than the tool's sum
    pub fn is_estimate(&self) -> bool {
        self.source == AggregateSource::PerStreamEstimate
    }
}

/// Parse a captured numeric token, reporting the output on failure
pub(crate) fn parse_number<T: std::str::FromStr>(token: &str, output: &str) -> Result<T, ParseError> {
    token
        .parse()
        .map_err(|_| ParseError::new(ParseErrorKind::InvalidNumber(token.to_string()), output))
}
