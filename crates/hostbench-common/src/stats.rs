//! Per-metric aggregates over a run's samples
//!
//! Samples are grouped by `(metric, unit)`. Only measured samples feed the
//! min/avg/max range; unmeasured placeholders are counted separately so a
//! recorded zero never drags the range down.

use crate::sample::Sample;
use std::collections::BTreeMap;

/// Aggregate of the samples sharing one metric and unit
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSummary {
    /// Metric name
    pub metric: String,
    /// Unit string
    pub unit: String,
    /// Samples that contributed to the range
    pub measured: usize,
    /// Samples recorded without a usable reading
    pub unmeasured: usize,
    range: Option<(f64, f64)>,
    sum: f64,
}

impl MetricSummary {
    fn empty(metric: &str, unit: &str) -> Self {
        Self {
            metric: metric.to_string(),
            unit: unit.to_string(),
            measured: 0,
            unmeasured: 0,
            range: None,
            sum: 0.0,
        }
    }

    fn add(&mut self, sample: &Sample) {
        let value = sample.value();
        if !sample.is_measured() || !value.is_finite() {
            self.unmeasured += 1;
            return;
        }
        self.measured += 1;
        self.sum += value;
        self.range = Some(match self.range {
            Some((lo, hi)) => (lo.min(value), hi.max(value)),
            None => (value, value),
        });
    }

    /// Summaries for every `(metric, unit)` pair in `samples`, ordered by metric then unit.
    ///
    /// # Example
    /// ```
    /// use hostbench_common::{Metadata, Sample, MetricSummary};
    ///
    /// let mut unmeasured = Metadata::new();
    /// unmeasured.insert("measured".into(), false.into());
    /// let samples = vec![
    ///     Sample::new("Throughput", 5.5, "MBytes/sec", Metadata::new()),
    ///     Sample::new("Throughput", 0.0, "MBytes/sec", unmeasured),
    /// ];
    ///
    /// let summary = &MetricSummary::summarize(&samples)[0];
    /// assert_eq!(summary.measured, 1);
    /// assert_eq!(summary.unmeasured, 1);
    /// assert_eq!(summary.min(), Some(5.5));
    /// assert_eq!(summary.avg(), Some(5.5));
    /// ```
    pub fn summarize(samples: &[Sample]) -> Vec<Self> {
        let mut grouped: BTreeMap<(&str, &str), Self> = BTreeMap::new();
        for sample in samples {
            grouped
                .entry((sample.metric(), sample.unit()))
                .or_insert_with(|| Self::empty(sample.metric(), sample.unit()))
                .add(sample);
        }
        grouped.into_values().collect()
    }

    /// Smallest measured value
    pub fn min(&self) -> Option<f64> {
        self.range.map(|(lo, _)| lo)
    }

    /// Largest measured value
    pub fn max(&self) -> Option<f64> {
        self.range.map(|(_, hi)| hi)
    }

    /// Mean of the measured values
    pub fn avg(&self) -> Option<f64> {
        (self.measured > 0).then(|| self.sum / self.measured as f64)
    }

    /// Total samples seen for this metric
    pub fn total(&self) -> usize {
        self.measured + self.unmeasured
    }
}
