//! Run results and where they go
//!
//! A run produces a `RunReport`. Sinks publish it: a pretty-printed JSON
//! file and a summary table on stdout.

use crate::error::BenchError;
use anyhow::{Context, Result};
use comfy_table::{Cell, ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use hostbench_common::{MetricSummary, Sample};
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

/// A combination that produced no samples
#[derive(Debug, Clone, Serialize)]
pub struct CombinationFailure {
    pub combination: String,
    pub error: String,
}

impl CombinationFailure {
    pub fn new(combination: &str, error: &BenchError) -> Self {
        Self {
            combination: combination.to_string(),
            error: error.to_string(),
        }
    }
}

/// Outcome of `BenchmarkController::run`
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub samples: Vec<Sample>,
    pub failures: Vec<CombinationFailure>,
}

impl RunReport {
    /// Whether every planned combination produced samples
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Per-metric aggregates; unmeasured placeholders are counted, not averaged
    pub fn summaries(&self) -> Vec<MetricSummary> {
        MetricSummary::summarize(&self.samples)
    }
}

/// Destination for a finished run
pub trait ResultSink {
    fn publish(&self, suite: &str, report: &RunReport) -> Result<()>;
}

/// Writes the report as pretty JSON
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    path: PathBuf,
    run_id: String,
}

impl JsonFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            run_id: uuid::Uuid::now_v7().to_string(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    fn document(&self, suite: &str, report: &RunReport) -> serde_json::Value {
        serde_json::json!({
            "run_id": self.run_id,
            "suite": suite,
            "written_at": chrono::Utc::now().to_rfc3339(),
            "complete": report.is_complete(),
            "samples": report.samples,
            "failures": report.failures,
        })
    }
}

impl ResultSink for JsonFileSink {
    fn publish(&self, suite: &str, report: &RunReport) -> Result<()> {
        let output = serde_json::to_string_pretty(&self.document(suite, report))?;
        std::fs::write(&self.path, output)
            .with_context(|| format!("Failed to write results to {}", self.path.display()))?;
        info!(path = %self.path.display(), run_id = %self.run_id, "Results written");
        Ok(())
    }
}

/// Prints min/avg/max per metric
#[derive(Debug, Clone, Copy, Default)]
pub struct SummarySink;

fn stat_cell(value: Option<f64>) -> Cell {
    match value {
        Some(v) => Cell::new(format!("{v:.2}")),
        None => Cell::new("-"),
    }
}

impl SummarySink {
    /// Summary table; `None` when there is nothing to show
    pub fn render(&self, suite: &str, report: &RunReport) -> Option<String> {
        if report.samples.is_empty() && report.failures.is_empty() {
            return None;
        }

        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL_CONDENSED)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec![
                Cell::new("Metric"),
                Cell::new("Unit"),
                Cell::new("Samples"),
                Cell::new("Unmeasured"),
                Cell::new("Min"),
                Cell::new("Avg"),
                Cell::new("Max"),
            ]);

        for summary in report.summaries() {
            table.add_row(vec![
                Cell::new(&summary.metric),
                Cell::new(&summary.unit),
                Cell::new(summary.measured),
                Cell::new(summary.unmeasured),
                stat_cell(summary.min()),
                stat_cell(summary.avg()),
                stat_cell(summary.max()),
            ]);
        }

        let mut out = format!("=== {suite} results ===\n\n{table}\n");
        if !report.failures.is_empty() {
            out.push_str(&format!("\n{} combination(s) failed:\n", report.failures.len()));
            for failure in &report.failures {
                out.push_str(&format!("  {}: {}\n", failure.combination, failure.error));
            }
        }
        Some(out)
    }
}

impl ResultSink for SummarySink {
    fn publish(&self, suite: &str, report: &RunReport) -> Result<()> {
        if let Some(summary) = self.render(suite, report) {
            println!("\n{summary}");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostbench_common::{MEASURED_KEY, Metadata};

    fn report() -> RunReport {
        let sample = |value| Sample::new("Throughput", value, "Mbits/sec", Metadata::new());
        RunReport {
            samples: vec![sample(900.0), sample(1100.0)],
            failures: vec![CombinationFailure {
                combination: "UDP x1 vm-1 -> vm-2 (internal)".into(),
                error: "no [SUM] line".into(),
            }],
        }
    }

    fn copy_report() -> RunReport {
        let mut unmeasured = Metadata::new();
        unmeasured.insert(MEASURED_KEY.into(), false.into());
        RunReport {
            samples: vec![
                Sample::new("Throughput", 5.66, "MBytes/sec", Metadata::new()),
                Sample::new("Throughput", 0.0, "MBytes/sec", unmeasured),
            ],
            failures: Vec::new(),
        }
    }

    #[test]
    fn test_summaries_grouped_by_metric() {
        let report = report();
        let summaries = report.summaries();
        assert_eq!(summaries.len(), 1);
        assert_eq!((summaries[0].metric.as_str(), summaries[0].unit.as_str()), ("Throughput", "Mbits/sec"));
        assert_eq!(summaries[0].measured, 2);
        assert_eq!(summaries[0].avg(), Some(1000.0));
        assert!(!report.is_complete());
    }

    #[test]
    fn test_summary_leaves_unmeasured_copy_out_of_range() {
        let out = SummarySink.render("scp", &copy_report()).unwrap();
        assert!(out.contains("Unmeasured"));

        let row = out.lines().find(|l| l.contains("MBytes/sec")).unwrap();
        let cells: Vec<_> = row
            .split(['│', '┆'])
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .collect();
        assert_eq!(cells, vec!["Throughput", "MBytes/sec", "1", "1", "5.66", "5.66", "5.66"]);
    }

    #[test]
    fn test_summary_render() {
        let out = SummarySink.render("iperf", &report()).unwrap();
        assert!(out.contains("Throughput"));
        assert!(out.contains("1000.00"));
        assert!(out.contains("1 combination(s) failed"));
        assert!(SummarySink.render("iperf", &RunReport::default()).is_none());
    }

    #[test]
    fn test_json_sink_writes_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");
        let sink = JsonFileSink::new(&path);
        sink.publish("iperf", &report()).unwrap();

        let written: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["suite"], "iperf");
        assert_eq!(written["run_id"], sink.run_id());
        assert_eq!(written["samples"].as_array().unwrap().len(), 2);
        assert_eq!(written["failures"][0]["combination"], "UDP x1 vm-1 -> vm-2 (internal)");
        assert_eq!(written["complete"], false);
    }
}
