//! SPEC CPU 2000 / 2006
//!
//! Single-host suite. SPEC must already be installed under `spec_dir` (on the
//! host, or inside the emulated guest). One run executes `runspec` for the
//! selected subset and reads the base scores from the reference result logs.

use super::{AttemptError, BenchmarkSuite, Combination, SuiteContext};
use crate::config::SpecCpuConfig;
use crate::error::{BenchError, CleanupError, ConfigError};
use crate::orchestrator::state::TransientStates;
use crate::parser::{SpecScore, parse_number, parse_spec_log};
use crate::sample_builder::SampleBuilder;
use hostbench_common::{CpuSuiteVersion, Metadata, Protocol, RunParameters, RuntimeMetric, Sample};
use hostbench_remote::shell::quote;
use hostbench_remote::{Host, RemoteHost};
use std::time::Duration;
use tracing::{debug, info};

const CPU2000_INT: &[&str] = &[
    "gzip", "vpr", "gcc", "mcf", "crafty", "parser", "eon", "perlbmk", "gap", "vortex", "bzip2", "twolf",
];

const CPU2000_FP: &[&str] = &[
    "wupwise", "swim", "mgrid", "applu", "mesa", "galgel", "art", "equake", "facerec", "ammp", "lucas", "fma3d",
    "sixtrack", "apsi",
];

const CPU2006_INT: &[&str] = &[
    "perlbench", "bzip2", "gcc", "mcf", "gobmk", "hmmer", "sjeng", "libquantum", "h264ref", "omnetpp", "astar",
    "xalancbmk",
];

const CPU2006_FP: &[&str] = &[
    "bwaves", "gamess", "milc", "zeusmp", "gromacs", "cactusADM", "leslie3d", "namd", "dealII", "soplex", "povray",
    "calculix", "GemsFDTD", "tonto", "lbm", "wrf", "sphinx3",
];

/// A validated subset: which result logs it produces and whether it is a
/// single sub-benchmark.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubsetSelection {
    name: String,
    int: bool,
    fp: bool,
    partial: bool,
}

impl SubsetSelection {
    /// Resolve `int`, `fp`, `all` or a sub-benchmark name of `version`
    pub fn resolve(version: CpuSuiteVersion, subset: &str) -> Result<Self, ConfigError> {
        let (int_names, fp_names) = match version {
            CpuSuiteVersion::Cpu2000 => (CPU2000_INT, CPU2000_FP),
            CpuSuiteVersion::Cpu2006 => (CPU2006_INT, CPU2006_FP),
        };

        let (int, fp, partial) = match subset {
            "int" => (true, false, false),
            "fp" => (false, true, false),
            "all" => (true, true, false),
            name if int_names.contains(&name) => (true, false, true),
            name if fp_names.contains(&name) => (false, true, true),
            _ => {
                return Err(ConfigError::InvalidSubset {
                    version: version.to_string(),
                    subset: subset.to_string(),
                });
            }
        };

        Ok(Self {
            name: subset.to_string(),
            int,
            fp,
            partial,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// True when a single sub-benchmark was selected
    pub fn partial(&self) -> bool {
        self.partial
    }

    /// Result logs the run writes, integer first
    pub fn log_files(&self, version: CpuSuiteVersion) -> Vec<&'static str> {
        let (int_log, fp_log) = match version {
            CpuSuiteVersion::Cpu2000 => ("CINT2000.001.asc", "CFP2000.001.asc"),
            CpuSuiteVersion::Cpu2006 => ("CINT2006.001.ref.txt", "CFP2006.001.ref.txt"),
        };
        let mut logs = Vec::new();
        if self.int {
            logs.push(int_log);
        }
        if self.fp {
            logs.push(fp_log);
        }
        logs
    }
}

/// SPEC CPU runner
#[derive(Debug, Clone)]
pub struct SpecCpuSuite {
    config: SpecCpuConfig,
    subset: SubsetSelection,
}

impl SpecCpuSuite {
    pub fn new(config: SpecCpuConfig) -> Result<Self, ConfigError> {
        let subset = SubsetSelection::resolve(config.version, &config.subset)?;
        Ok(Self { config, subset })
    }

    fn result_dir(&self) -> String {
        format!("{}/result", self.config.spec_dir())
    }

    /// `runspec` invocation; `copies` is only used for rate runs
    pub fn runspec_command(&self, copies: u32) -> String {
        let metric = match (self.config.runtime_metric(), self.config.version) {
            (RuntimeMetric::Rate, _) => format!(" --rate={copies}"),
            (RuntimeMetric::Speed, CpuSuiteVersion::Cpu2006) => " --speed".to_string(),
            (RuntimeMetric::Speed, CpuSuiteVersion::Cpu2000) => String::new(),
        };
        format!(
            "cd {} && . ./shrc && rm -rf result && runspec --config={} --tune=base --size=ref --noreportable --iterations=1{metric} {}",
            quote(&self.config.spec_dir()),
            quote(&self.config.runspec_config()),
            self.subset.name()
        )
    }

    async fn copies<H: RemoteHost>(&self, ctx: &SuiteContext<'_, H>, host: &H) -> Result<u32, BenchError> {
        if let Some(copies) = self.config.copies {
            return Ok(copies);
        }
        if self.config.runtime_metric() == RuntimeMetric::Speed {
            return Ok(1);
        }
        let output = ctx.setup(host, "getconf NPROCESSORS_ONLN", "count cpus").await?;
        parse_number::<u32>(output.stdout.trim(), &output.stdout)
            .map_err(|e| BenchError::parse(format!("count cpus on {}", host.identity().name), e))
    }

    fn samples(&self, host: &Host, log_name: &str, scores: Vec<SpecScore>) -> Vec<Sample> {
        let builder = SampleBuilder::for_host(host);
        scores
            .into_iter()
            .map(|score| {
                let mut extraction = Metadata::new();
                extraction.insert("runspec_config".into(), self.config.runspec_config().into());
                extraction.insert("runspec_metric".into(), self.config.runtime_metric().as_ref().into());
                extraction.insert("spec_subset".into(), self.subset.name().into());
                extraction.insert("partial".into(), self.subset.partial().into());
                extraction.insert("log_file".into(), log_name.into());
                builder.build(&score.metric, score.score, "", extraction)
            })
            .collect()
    }
}

impl BenchmarkSuite for SpecCpuSuite {
    fn name(&self) -> &'static str {
        "speccpu"
    }

    fn arity(&self) -> usize {
        1
    }

    async fn prepare<H: RemoteHost>(
        &self,
        ctx: &SuiteContext<'_, H>,
        _state: &mut TransientStates,
    ) -> Result<(), BenchError> {
        for host in ctx.hosts {
            let check = format!("test -d {}", quote(&self.config.spec_dir()));
            ctx.setup(host, &check, "locate SPEC install").await?;
            debug!(host = %host.identity().name, spec_dir = %self.config.spec_dir(), "SPEC install found");
        }
        Ok(())
    }

    fn plan(&self, _params: &RunParameters, hosts: &[&Host]) -> Vec<Combination> {
        hosts
            .iter()
            .map(|host| Combination {
                protocol: Protocol::Cpu,
                threads: self.config.copies.unwrap_or(1),
                pair: None,
                label: format!("{} {} on {}", self.config.version, self.subset.name(), host.name),
            })
            .collect()
    }

    async fn run_one<H: RemoteHost>(
        &self,
        ctx: &SuiteContext<'_, H>,
        _state: &TransientStates,
        combination: &Combination,
    ) -> Result<Vec<Sample>, BenchError> {
        let host = &ctx.hosts[0];
        let copies = self.copies(ctx, host).await?;
        let runspec = ctx.endpoint_command(host, &self.runspec_command(copies))?;
        let timeout = Duration::from_secs(self.config.run_timeout_secs);

        info!(combination = %combination.label, copies, "Starting runspec");
        ctx.executor
            .execute(host, &runspec, ctx.retry, Some(timeout))
            .await
            .map_err(|e| BenchError::execution(&combination.label, e))?;

        let mut samples = Vec::new();
        for log_name in self.subset.log_files(self.config.version) {
            let cat = &ctx.endpoint_command(host, &format!("cat {}/{log_name}", quote(&self.result_dir())))?;
            let result: Result<Vec<SpecScore>, AttemptError> = ctx
                .executor
                .retry(&combination.label, ctx.retry, || async move {
                    let output = host.run_checked(cat, None).await?;
                    Ok(parse_spec_log(self.config.version, log_name, &output.stdout)?)
                })
                .await;
            let scores = result.map_err(|e| e.into_bench(&combination.label))?;
            samples.extend(self.samples(host.identity(), log_name, scores));
        }
        Ok(samples)
    }

    async fn cleanup<H: RemoteHost>(
        &self,
        _ctx: &SuiteContext<'_, H>,
        _state: &mut TransientStates,
    ) -> Vec<CleanupError> {
        Vec::new()
    }
}
