//! Shared test utilities for hostbench
//!
//! This crate provides common test helpers that can be used across
//! multiple test modules without circular dependencies.
//!
//! ## Modules
//!
//! - [`host`]: an in-memory `RemoteHost` with scripted replies and a call log
//! - [`fixtures`]: canned iperf, timed copy and SPEC CPU output

pub mod fixtures;
pub mod host;

// Re-export commonly used items
pub use host::{Call, ScriptedHost, test_host};
