//! Error taxonomy for the benchmark pipeline
//!
//! - `ConfigError`: fatal, raised before any remote work
//! - `BenchError::Execution`: a command failed or timed out after its retries
//! - `BenchError::Parse`: tool output did not match, reported with an excerpt
//! - `CleanupError`: logged and collected, never propagated

use hostbench_common::{LifecycleState, Protocol};
use hostbench_remote::ExecError;
use thiserror::Error;

/// Maximum number of raw output characters kept in a parse failure
pub const EXCERPT_LIMIT: usize = 512;

/// Configuration errors (wrong host count, invalid protocol/subset, bad file)
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Host set size does not match the suite's arity
    #[error("{suite} benchmark requires exactly {expected} host(s), found {found}")]
    HostCount {
        suite: String,
        expected: usize,
        found: usize,
    },

    /// Two hosts share a name
    #[error("duplicate host name '{0}'")]
    DuplicateHost(String),

    /// No thread counts configured
    #[error("thread_counts cannot be empty")]
    EmptyThreadCounts,

    /// Thread count of zero
    #[error("thread counts must be at least 1")]
    InvalidThreadCount,

    /// No protocols configured
    #[error("protocols cannot be empty")]
    EmptyProtocols,

    /// Protocol not supported by the selected suite
    #[error("protocol {protocol} is not supported by the {suite} suite")]
    UnsupportedProtocol { suite: String, protocol: String },

    /// Unknown SPEC CPU subset name
    #[error("unknown {version} benchmark subset '{subset}'")]
    InvalidSubset { version: String, subset: String },

    /// No suite section present
    #[error("config must contain exactly one of 'iperf', 'scp' or 'speccpu'")]
    MissingSuite,

    /// More than one suite section present
    #[error("config contains more than one suite section")]
    MultipleSuites,

    /// Hosts run inside an emulated guest but no guest NIC is configured
    #[error("host '{0}' has no guest NIC but an emulator is configured")]
    MissingGuestNic(String),

    /// Field-level validation failure
    #[error("invalid config: {0}")]
    Validation(String),

    /// Failed to parse JSON configuration
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// Failed to read configuration file
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    /// Create an IO error with path context
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// What to change in the configuration, when there is a single obvious fix
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::HostCount { suite, expected, .. } => {
                Some(format!("list exactly {expected} entries under \"hosts\" for the {suite} suite"))
            }
            Self::MissingGuestNic(host) => Some(format!(
                "add a \"guest\" entry to host '{host}' or drop the \"emulator\" section"
            )),
            Self::MissingSuite | Self::MultipleSuites => {
                Some("keep exactly one of the \"iperf\", \"scp\" or \"speccpu\" sections".to_string())
            }
            _ => None,
        }
    }
}

impl From<garde::Report> for ConfigError {
    fn from(report: garde::Report) -> Self {
        Self::Validation(report.to_string())
    }
}

/// What was wrong with a tool's output
#[derive(Debug, Error, PartialEq)]
pub enum ParseErrorKind {
    /// An expected line is absent
    #[error("no {0} found in output")]
    MissingMarker(&'static str),

    /// Per-stream fallback recovered the wrong number of values
    #[error("only {actual} out of {expected} streams reported a throughput value")]
    StreamCountMismatch { expected: u32, actual: usize },

    /// A captured token is not a number
    #[error("invalid number '{0}'")]
    InvalidNumber(String),

    /// A suite log contained no numeric score
    #[error("no numeric scores in {0}")]
    NoScores(String),
}

/// A parse failure with enough of the raw output to diagnose it
#[derive(Debug, Error)]
#[error("{kind} ({output_len} bytes of output, starting: {excerpt:?})")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    /// Total size of the raw output
    pub output_len: usize,
    /// First `EXCERPT_LIMIT` characters of the raw output
    pub excerpt: String,
}

impl ParseError {
    /// Build a parse error carrying an excerpt of `output`
    pub fn new(kind: ParseErrorKind, output: &str) -> Self {
        Self {
            kind,
            output_len: output.len(),
            excerpt: output.chars().take(EXCERPT_LIMIT).collect(),
        }
    }
}

/// Errors surfaced by the lifecycle controller
#[derive(Debug, Error)]
pub enum BenchError {
    /// Fatal configuration problem; no remote work was attempted
    #[error(transparent)]
    Configuration(#[from] ConfigError),

    /// A remote command failed after exhausting its retries
    #[error("{combination}: {source}")]
    Execution {
        combination: String,
        #[source]
        source: ExecError,
    },

    /// Tool output could not be turned into a sample
    #[error("{combination}: {source}")]
    Parse {
        combination: String,
        #[source]
        source: ParseError,
    },

    /// Lifecycle operation called in the wrong state
    #[error("cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: LifecycleState,
    },

    /// A client combination targets a host with no server recorded
    #[error("no {protocol} server recorded on {host}")]
    MissingServer { host: String, protocol: Protocol },

    /// Every combination failed
    #[error("run produced no samples ({failures} combination(s) failed)")]
    NoSamples { failures: usize },

    /// Cancellation was requested
    #[error("benchmark cancelled")]
    Cancelled,
}

impl BenchError {
    /// Wrap an execution error with the step it belongs to.
    ///
    /// Cancellation is surfaced as `BenchError::Cancelled` so callers can stop.
    pub fn execution(combination: impl Into<String>, source: ExecError) -> Self {
        if source.is_cancelled() {
            Self::Cancelled
        } else {
            Self::Execution {
                combination: combination.into(),
                source,
            }
        }
    }

    /// Wrap a parse error with the step it belongs to
    pub fn parse(combination: impl Into<String>, source: ParseError) -> Self {
        Self::Parse {
            combination: combination.into(),
            source,
        }
    }

    /// A pointer at the failing combination or host for the operator
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::Configuration(e) => e.hint(),
            Self::Execution { combination, source } => Some(match source {
                ExecError::Transport { host, .. } => {
                    format!("{combination}: check that {host} accepts ssh from this machine")
                }
                ExecError::Timeout { timeout, .. } => format!(
                    "{combination}: no result within {}s; raise the suite timeout or lower the runtime",
                    timeout.as_secs()
                ),
                _ => format!("{combination}: failed on every attempt; rerun with -v to see each one"),
            }),
            Self::Parse { combination, source } => Some(format!(
                "{combination}: tool printed {} bytes that did not match; rerun with -v to log them",
                source.output_len
            )),
            Self::NoSamples { .. } => {
                Some("every combination failed; the warnings above name each one".to_string())
            }
            Self::Cancelled => Some("interrupted before any combination finished; hosts were cleaned up".to_string()),
            Self::InvalidState { .. } | Self::MissingServer { .. } => None,
        }
    }

    /// Whether this error should stop the remaining combinations regardless
    /// of the stop-on-first-error setting
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Configuration(_) | Self::InvalidState { .. } | Self::Cancelled
        )
    }
}

/// A failure during best-effort cleanup. Logged, never raised.
#[derive(Debug, Error)]
#[error("cleanup of {host} failed during {step}: {source}")]
pub struct CleanupError {
    pub host: String,
    pub step: String,
    #[source]
    pub source: ExecError,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_count_display() {
        let err = ConfigError::HostCount {
            suite: "iperf".into(),
            expected: 2,
            found: 3,
        };
        assert_eq!(err.to_string(), "iperf benchmark requires exactly 2 host(s), found 3");
    }

    #[test]
    fn test_parse_error_keeps_bounded_excerpt() {
        let output = "x".repeat(2000);
        let err = ParseError::new(
            ParseErrorKind::StreamCountMismatch {
                expected: 4,
                actual: 3,
            },
            &output,
        );
        assert_eq!(err.output_len, 2000);
        assert_eq!(err.excerpt.len(), EXCERPT_LIMIT);
        assert!(err.to_string().starts_with("only 3 out of 4 streams"));
    }

    #[test]
    fn test_cancelled_execution_maps_to_cancelled() {
        let err = BenchError::execution(
            "TCP x1 vm-1 -> vm-2",
            ExecError::Cancelled {
                command: "iperf".into(),
            },
        );
        assert!(matches!(err, BenchError::Cancelled));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_hint_names_combination_and_host() {
        let err = BenchError::execution(
            "TCP x1 vm-1 -> vm-2 (internal)",
            ExecError::Transport {
                host: "vm-1".into(),
                message: "Connection timed out".into(),
            },
        );
        assert_eq!(
            err.hint().unwrap(),
            "TCP x1 vm-1 -> vm-2 (internal): check that vm-1 accepts ssh from this machine"
        );

        let err = BenchError::execution(
            "copy vm-1 -> vm-2 (internal)",
            ExecError::Timeout {
                command: "scp".into(),
                timeout: std::time::Duration::from_secs(120),
            },
        );
        assert!(err.hint().unwrap().contains("no result within 120s"));
    }

    #[test]
    fn test_hint_for_config_errors() {
        let err = BenchError::from(ConfigError::HostCount {
            suite: "scp".into(),
            expected: 2,
            found: 1,
        });
        assert_eq!(err.hint().unwrap(), "list exactly 2 entries under \"hosts\" for the scp suite");
        assert!(ConfigError::EmptyProtocols.hint().is_none());
    }

    #[test]
    fn test_invalid_state_display() {
        let err = BenchError::InvalidState {
            operation: "run",
            state: LifecycleState::Idle,
        };
        assert_eq!(err.to_string(), "cannot run while idle");
    }
}
