//! hostbench: run tool-driven benchmarks across remote hosts
//!
//! Loads one benchmark configuration, prepares the hosts, runs every
//! combination, always cleans up, and publishes the samples.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hostbench_coordinator::config::{BenchConfig, CliOverrides, SuiteConfig};
use hostbench_coordinator::orchestrator::{JsonFileSink, ResultSink, SummarySink};
use hostbench_coordinator::suite::{BenchmarkSuite, IperfSuite, ScpSuite, SpecCpuSuite};
use hostbench_coordinator::{BenchError, BenchmarkController, ConfigError, ControllerOptions};
use hostbench_remote::{SshHost, SshOptions};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "hostbench")]
#[command(about = "Remote benchmark execution and metric extraction")]
#[command(version)]
struct Args {
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

/// Arguments for the run command
#[derive(clap::Args, Debug)]
struct RunArgs {
    /// Benchmark configuration (JSON)
    config: PathBuf,

    /// Tool runtime in seconds (overrides the config)
    #[arg(long)]
    runtime: Option<u64>,

    /// Comma-separated thread counts (overrides the config)
    #[arg(long, value_delimiter = ',')]
    threads: Option<Vec<u32>>,

    /// Skip the remaining combinations after the first failure
    #[arg(long)]
    stop_on_first_error: bool,

    /// Output JSON file for results
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Local directory holding pre-staged artifacts
    #[arg(long, env = "HOSTBENCH_ARTIFACT_DIR")]
    artifact_dir: Option<PathBuf>,
}

impl RunArgs {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            runtime_secs: self.runtime,
            thread_counts: self.threads.clone(),
            stop_on_first_error: self.stop_on_first_error,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Prepare, run and clean up the configured benchmark
    Run(RunArgs),

    /// Check a configuration file without touching any host
    Validate {
        /// Benchmark configuration (JSON)
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        print_error(&e);
        std::process::exit(1);
    }
}

/// Print the error chain, then a hint naming the failing combination or host
fn print_error(e: &anyhow::Error) {
    eprintln!("\n\x1b[1;31mError:\x1b[0m {e}");
    for cause in e.chain().skip(1) {
        eprintln!("  \x1b[33mCaused by:\x1b[0m {cause}");
    }

    let hint = e.chain().find_map(|cause| {
        if let Some(bench) = cause.downcast_ref::<BenchError>() {
            bench.hint()
        } else {
            cause.downcast_ref::<ConfigError>().and_then(ConfigError::hint)
        }
    });
    if let Some(hint) = hint {
        eprintln!("\n\x1b[36mHint:\x1b[0m {hint}");
    }
}

async fn run() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    match args.command {
        Command::Run(run_args) => handle_run(run_args).await,
        Command::Validate { config } => {
            let config = BenchConfig::load(&config)
                .with_context(|| format!("Invalid configuration {}", config.display()))?;
            let params = config.run_parameters()?;
            println!(
                "Configuration OK: {} suite, {} host(s), {} combination(s)",
                config.suite()?.name(),
                config.hosts.len(),
                params.combination_count()
            );
            Ok(())
        }
    }
}

async fn handle_run(args: RunArgs) -> Result<()> {
    let mut config = BenchConfig::load(&args.config)
        .with_context(|| format!("Failed to load configuration {}", args.config.display()))?;
    config.apply_overrides(&args.overrides())?;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, stopping after the current attempt");
                cancel.cancel();
            }
        });
    }

    let mut ssh_options = SshOptions::default();
    if let Some(dir) = args.artifact_dir.clone() {
        ssh_options.artifact_dir = dir;
    }
    let hosts: Vec<SshHost> = config
        .hosts
        .iter()
        .cloned()
        .map(|host| SshHost::new(host, ssh_options.clone()))
        .collect();

    let mut options = ControllerOptions::new(config.retry_policy()?)
        .with_boot_wait(config.boot_wait.clone())
        .with_stop_on_first_error(config.stop_on_first_error);
    if let Some(emulator) = config.emulator.clone() {
        options = options.with_emulator(emulator);
    }

    let params = config.run_parameters()?;
    info!(
        hosts = hosts.len(),
        combinations = params.combination_count(),
        "Starting benchmark"
    );

    let mut sinks: Vec<Box<dyn ResultSink>> = vec![Box::new(SummarySink)];
    if let Some(output) = &args.output {
        sinks.push(Box::new(JsonFileSink::new(output)));
    }

    match config.suite()? {
        SuiteConfig::Iperf(iperf) => {
            let suite = IperfSuite::new(iperf.clone());
            drive(BenchmarkController::new(hosts, suite, params, options, cancel), &sinks).await
        }
        SuiteConfig::Scp(scp) => {
            let suite = ScpSuite::new(scp.clone(), config.addressing.dual_external_addresses);
            drive(BenchmarkController::new(hosts, suite, params, options, cancel), &sinks).await
        }
        SuiteConfig::SpecCpu(spec) => {
            let suite = SpecCpuSuite::new(spec.clone())?;
            drive(BenchmarkController::new(hosts, suite, params, options, cancel), &sinks).await
        }
    }
}

/// Prepare, run, always clean up, then publish
async fn drive<S: BenchmarkSuite>(
    mut controller: BenchmarkController<SshHost, S>,
    sinks: &[Box<dyn ResultSink>],
) -> Result<()> {
    let suite = controller.suite().name();

    if let Err(e) = controller.prepare().await {
        controller.cleanup().await;
        return Err(e).context("Prepare failed");
    }

    let outcome = controller.run().await;
    let cleanup_errors = controller.cleanup().await;
    if !cleanup_errors.is_empty() {
        warn!(count = cleanup_errors.len(), "Cleanup reported errors (results are unaffected)");
    }

    let report = outcome.context("Benchmark run failed")?;
    for sink in sinks {
        sink.publish(suite, &report)?;
    }
    Ok(())
}
