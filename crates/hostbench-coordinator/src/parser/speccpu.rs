//! SPEC CPU result logs
//!
//! Each log holds summary lines such as `SPECint(R)_base2006   16.8`.
//! Scores the suite could not compute are printed as `--` or `Not Run`; those
//! lines are skipped.

use crate::error::{ParseError, ParseErrorKind};
use hostbench_common::CpuSuiteVersion;
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

static BASE_2000: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Est\. (SPEC.*_base2000)\s*(\S*)").expect("valid regex"));

static BASE_2006: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(SPEC.*_base2006)\s*(\S*)").expect("valid regex"));

/// One named score from a result log
#[derive(Debug, Clone, PartialEq)]
pub struct SpecScore {
    pub metric: String,
    pub score: f64,
}

/// Extract every numeric base score from a result log.
///
/// # Errors
/// `NoScores` when the log contains no numeric score at all.
pub fn parse_spec_log(version: CpuSuiteVersion, log_name: &str, content: &str) -> Result<Vec<SpecScore>, ParseError> {
    let pattern = match version {
        CpuSuiteVersion::Cpu2000 => &*BASE_2000,
        CpuSuiteVersion::Cpu2006 => &*BASE_2006,
    };

    let mut scores = Vec::new();
    for line in content.lines() {
        let Some(caps) = pattern.captures(line) else {
            continue;
        };
        match caps[2].parse::<f64>() {
            Ok(score) if score.is_finite() => scores.push(SpecScore {
                metric: caps[1].to_string(),
                score,
            }),
            _ => debug!(log = %log_name, metric = &caps[1], value = &caps[2], "Skipping non-numeric score"),
        }
    }

    if scores.is_empty() {
        return Err(ParseError::new(ParseErrorKind::NoScores(log_name.to_string()), content));
    }
    Ok(scores)
}
