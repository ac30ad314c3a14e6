//! hostbench-remote - Remote command execution for hostbench
//!
//! This crate models the host capability the benchmark pipeline consumes
//! (run a command, install a package, fetch a staged artifact, open a port)
//! and the bounded-retry discipline every remote invocation goes through.

pub mod command;
pub mod error;
pub mod host;
pub mod retry;
pub mod shell;
pub mod ssh;
pub mod timeout;

pub use command::{CommandConfig, CommandOutput};
pub use error::ExecError;
pub use host::{GuestNic, Host, RemoteHost, SshTarget};
pub use retry::{RetryPolicy, Retryable, RetryingExecutor};
pub use ssh::{SshHost, SshOptions};
pub use timeout::command_timeout;
