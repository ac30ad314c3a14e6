//! iperf client output
//!
//! The total comes from the `[SUM]` line when iperf prints one. When streams
//! start at slightly different offsets iperf prints no sum; the per-stream
//! lines are then added up instead, and their count must match the stream
//! count requested.

use super::{AggregateSource, ParsedThroughput, parse_number};
use crate::error::{ParseError, ParseErrorKind};
use hostbench_common::{Metadata, Protocol};
use regex::Regex;
use std::sync::LazyLock;
use tracing::warn;

static SUM_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[SUM\].*\s+(\d+\.?\d*).Mbits/sec").expect("valid regex"));

static TCP_STREAM_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[.*\d+\].*\s+(\d+\.?\d*).Mbits/sec").expect("valid regex"));

// UDP client lines carry Write/Err counters; server reports do not
static UDP_STREAM_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[.*\d+\].*\s+(\d+\.?\d*).Mbits/sec\s+\d+/\d+").expect("valid regex")
});

static WINDOW_SIZE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"TCP window size:\s+(\d+(?:\.\d+)?)\s+(\S+)").expect("valid regex")
});

static JITTER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Mbits/sec\s+(\d+\.\d+)\s+([a-zA-Z]+)").expect("valid regex")
});

static DATAGRAMS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)/\s*(\d+)\s+\(").expect("valid regex"));

static PID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^\s*(\d+)\s*$").expect("valid regex"));

/// Everything extracted from one iperf client run
#[derive(Debug, Clone, PartialEq)]
pub struct IperfReport {
    pub throughput: ParsedThroughput,
    /// TCP window size and its unit, when printed
    pub window_size: Option<(f64, String)>,
    /// Mean UDP jitter across server reports, and its unit
    pub jitter: Option<(f64, String)>,
    /// Lost and total UDP datagrams summed across server reports
    pub datagrams: Option<(u64, u64)>,
}

impl IperfReport {
    /// Extraction facts for the sample, keyed the way result consumers expect
    pub fn metadata(&self) -> Metadata {
        let mut meta = Metadata::new();
        meta.insert(
            "aggregate_source".into(),
            self.throughput.source.as_ref().into(),
        );
        if let Some((size, unit)) = &self.window_size {
            meta.insert("tcp_window_size".into(), (*size).into());
            meta.insert("tcp_window_size_unit".into(), unit.clone().into());
        }
        if let Some((jitter, unit)) = &self.jitter {
            meta.insert("jitter".into(), (*jitter).into());
            meta.insert("jitter_unit".into(), unit.clone().into());
        }
        if let Some((lost, total)) = self.datagrams {
            meta.insert("lost_datagrams".into(), lost.into());
            meta.insert("total_datagrams".into(), total.into());
        }
        meta
    }
}

/// Extract throughput and auxiliary facts from iperf client output.
///
/// # Errors
/// `StreamCountMismatch` when no `[SUM]` line is present and the number of
/// per-stream values differs from `expected_streams`.
pub fn parse_iperf(protocol: Protocol, output: &str, expected_streams: u32) -> Result<IperfReport, ParseError> {
    let throughput = parse_throughput(protocol, output, expected_streams)?;

    let window_size = if protocol == Protocol::Tcp {
        WINDOW_SIZE
            .captures(output)
            .map(|c| Ok::<_, ParseError>((parse_number(&c[1], output)?, c[2].to_string())))
            .transpose()?
    } else {
        None
    };

    let (jitter, datagrams) = if protocol == Protocol::Udp {
        (parse_jitter(output)?, parse_datagrams(output)?)
    } else {
        (None, None)
    };

    Ok(IperfReport {
        throughput,
        window_size,
        jitter,
        datagrams,
    })
}

fn parse_throughput(protocol: Protocol, output: &str, expected_streams: u32) -> Result<ParsedThroughput, ParseError> {
    let sums = capture_all(&SUM_LINE, output)?;
    if !sums.is_empty() {
        if sums.len() > 1 {
            warn!(lines = sums.len(), "Multiple [SUM] lines in iperf output, adding them up");
        }
        return Ok(ParsedThroughput {
            values: sums,
            expected_streams,
            source: AggregateSource::SumMarker,
        });
    }

    let stream_line = match protocol {
        Protocol::Udp => &*UDP_STREAM_LINE,
        _ => &*TCP_STREAM_LINE,
    };
    let values = capture_all(stream_line, output)?;
    if values.len() != expected_streams as usize {
        return Err(ParseError::new(
            ParseErrorKind::StreamCountMismatch {
                expected: expected_streams,
                actual: values.len(),
            },
            output,
        ));
    }

    Ok(ParsedThroughput {
        values,
        expected_streams,
        source: AggregateSource::PerStreamEstimate,
    })
}

fn capture_all(re: &Regex, output: &str) -> Result<Vec<f64>, ParseError> {
    re.captures_iter(output)
        .map(|c| parse_number(&c[1], output))
        .collect()
}

fn parse_jitter(output: &str) -> Result<Option<(f64, String)>, ParseError> {
    let mut values = Vec::new();
    let mut unit = None;
    for caps in JITTER.captures_iter(output) {
        values.push(parse_number::<f64>(&caps[1], output)?);
        unit.get_or_insert_with(|| caps[2].to_string());
    }
    Ok(unit.map(|unit| (values.iter().sum::<f64>() / values.len() as f64, unit)))
}

fn parse_datagrams(output: &str) -> Result<Option<(u64, u64)>, ParseError> {
    let mut totals = None;
    for caps in DATAGRAMS.captures_iter(output) {
        let lost: u64 = parse_number(&caps[1], output)?;
        let total: u64 = parse_number(&caps[2], output)?;
        let (l, t) = totals.get_or_insert((0, 0));
        *l += lost;
        *t += total;
    }
    Ok(totals)
}

/// Extract the process id echoed by `nohup ... & echo $!`
pub fn parse_pid(output: &str) -> Result<u32, ParseError> {
    let caps = PID
        .captures(output)
        .ok_or_else(|| ParseError::new(ParseErrorKind::MissingMarker("server process id"), output))?;
    parse_number(&caps[1], output)
}
