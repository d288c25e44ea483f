//! Descriptive statistics over a completed batch

use hdrhistogram::Histogram;
use serde::{Deserialize, Serialize};

use crate::error::{BenchError, Result};

/// Aggregated metrics of one (workload, concurrency) batch, at full precision
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    /// Mean latency in milliseconds
    pub mean: f64,
    /// Sample standard deviation of latency in milliseconds
    pub stddev: f64,
    pub throughput_per_second: f64,
}

/// Compute mean, sample standard deviation and throughput.
///
/// `total_batch_millis` is the wall-clock duration of the whole batch and
/// must be strictly positive.
pub fn aggregate(samples: &[u64], total_batch_millis: f64, iterations: usize) -> Result<Statistics> {
    if !(total_batch_millis.is_finite() && total_batch_millis > 0.0) {
        return Err(BenchError::Measurement(format!(
            "batch duration must be positive, got {} ms",
            total_batch_millis
        )));
    }

    Ok(Statistics {
        mean: mean(samples),
        stddev: sample_stddev(samples),
        throughput_per_second: throughput_per_second(iterations, total_batch_millis),
    })
}

/// Arithmetic mean; 0 for an empty slice
pub fn mean(samples: &[u64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().map(|&s| s as f64).sum::<f64>() / samples.len() as f64
}

/// Standard deviation with an n-1 denominator; 0 below two samples
pub fn sample_stddev(samples: &[u64]) -> f64 {
    if samples.len() < 2 {
        return 0.0;
    }
    let mean = mean(samples);
    let variance = samples
        .iter()
        .map(|&s| (s as f64 - mean).powi(2))
        .sum::<f64>()
        / (samples.len() as f64 - 1.0);
    variance.sqrt()
}

pub fn throughput_per_second(iterations: usize, total_batch_millis: f64) -> f64 {
    iterations as f64 / (total_batch_millis / 1000.0)
}

/// Latency percentiles of a batch, for logging
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatencyPercentiles {
    pub p50_ms: u64,
    pub p95_ms: u64,
    pub p99_ms: u64,
    pub max_ms: u64,
}

impl LatencyPercentiles {
    pub fn from_samples(samples: &[u64]) -> Self {
        // 1 hour upper bound matches the step timeout, 3 significant figures
        let mut hist = match Histogram::<u64>::new_with_bounds(1, 3_600_000, 3) {
            Ok(hist) => hist,
            Err(_) => return Self::default(),
        };
        for &sample in samples {
            hist.saturating_record(sample.max(1));
        }
        if hist.is_empty() {
            return Self::default();
        }
        Self {
            p50_ms: hist.value_at_quantile(0.50),
            p95_ms: hist.value_at_quantile(0.95),
            p99_ms: hist.value_at_quantile(0.99),
            max_ms: hist.max(),
        }
    }
}
