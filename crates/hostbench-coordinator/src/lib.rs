//! hostbench-coordinator - benchmark lifecycle and metric extraction
//!
//! This crate prepares, runs and tears down tool-driven benchmarks across a
//! fixed set of remote hosts, and turns each tool's textual output into
//! normalized samples.

pub mod config;
pub mod emulator;
pub mod error;
pub mod orchestrator;
pub mod pairs;
pub mod parser;
pub mod sample_builder;
pub mod suite;
pub mod wait;

pub use error::{BenchError, CleanupError, ConfigError, ParseError, ParseErrorKind};
pub use orchestrator::{BenchmarkController, ControllerOptions};
