//! In-memory benchmark report accumulated over a sweep

use serde::{Deserialize, Serialize};

use crate::error::{BenchError, Result};
use crate::stats::Statistics;

/// One metric across concurrency levels `1..=max_threads`.
///
/// Level `t` is stored at index `t - 1`; levels never measured stay `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRow {
    slots: Vec<Option<f64>>,
}

impl MetricRow {
    pub fn new(max_threads: usize) -> Self {
        Self {
            slots: vec![None; max_threads],
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Value at 1-based concurrency level `threads`
    pub fn get(&self, threads: usize) -> Option<f64> {
        threads
            .checked_sub(1)
            .and_then(|i| self.slots.get(i))
            .copied()
            .flatten()
    }

    /// Value at `threads`, 0 when never measured
    pub fn value_or_zero(&self, threads: usize) -> f64 {
        self.get(threads).unwrap_or(0.0)
    }

    pub fn slots(&self) -> &[Option<f64>] {
        &self.slots
    }

    fn set(&mut self, threads: usize, value: f64) {
        self.slots[threads - 1] = Some(value);
    }
}

/// The three metric rows of one workload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkloadMetrics {
    pub name: String,
    pub average: MetricRow,
    pub stddev: MetricRow,
    pub throughput_per_second: MetricRow,
}

impl WorkloadMetrics {
    fn new(name: &str, max_threads: usize) -> Self {
        Self {
            name: name.to_string(),
            average: MetricRow::new(max_threads),
            stddev: MetricRow::new(max_threads),
            throughput_per_second: MetricRow::new(max_threads),
        }
    }

    /// Rows in output order with their metric labels
    pub fn rows(&self) -> [(&'static str, &MetricRow); 3] {
        [
            ("average", &self.average),
            ("stddev", &self.stddev),
            ("throughputPerSecond", &self.throughput_per_second),
        ]
    }
}

/// Workload name to metrics, in first-recorded order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkReport {
    max_threads: usize,
    iterations: usize,
    workloads: Vec<WorkloadMetrics>,
}

impl BenchmarkReport {
    pub fn new(max_threads: usize, iterations: usize) -> Self {
        Self {
            max_threads,
            iterations,
            workloads: Vec::new(),
        }
    }

    pub fn max_threads(&self) -> usize {
        self.max_threads
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Fold one batch's statistics into the row for `workload` at `threads`
    pub fn record(&mut self, workload: &str, threads: usize, stats: &Statistics) -> Result<()> {
        if threads == 0 || threads > self.max_threads {
            return Err(BenchError::Config(format!(
                "concurrency level {} outside 1..={}",
                threads, self.max_threads
            )));
        }

        let max_threads = self.max_threads;
        let index = match self.workloads.iter().position(|w| w.name == workload) {
            Some(index) => index,
            None => {
                self.workloads.push(WorkloadMetrics::new(workload, max_threads));
                self.workloads.len() - 1
            }
        };

        let metrics = &mut self.workloads[index];
        metrics.average.set(threads, stats.mean);
        metrics.stddev.set(threads, stats.stddev);
        metrics.throughput_per_second.set(threads, stats.throughput_per_second);
        Ok(())
    }

    pub fn get(&self, workload: &str) -> Option<&WorkloadMetrics> {
        self.workloads.iter().find(|w| w.name == workload)
    }

    pub fn workloads(&self) -> &[WorkloadMetrics] {
        &self.workloads
    }

    pub fn workload_names(&self) -> Vec<&str> {
        self.workloads.iter().map(|w| w.name.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.workloads.is_empty()
    }
}
