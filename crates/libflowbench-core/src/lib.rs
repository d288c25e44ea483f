//! Benchmark harness for process engines
//!
//! Runs a fixed set of workloads at every worker pool size of a range and
//! writes per-level latency and throughput figures as CSV.

pub mod clock;
pub mod config;
pub mod error;
pub mod pool;
pub mod report;
pub mod stats;
pub mod sweep;
pub mod workload;
pub mod writer;

pub use clock::{IterationClock, IterationSample};
pub use config::{BenchConfig, EngineConfig};
pub use error::{BenchError, Result};
pub use report::{BenchmarkReport, MetricRow, WorkloadMetrics};
pub use stats::{aggregate, LatencyPercentiles, Statistics};
pub use sweep::{run_with_warmup, BatchResult, SweepController, SweepPlan};
pub use workload::{Workload, WorkloadRegistry};
pub use writer::{render_summary, report_to_string, write_report};
