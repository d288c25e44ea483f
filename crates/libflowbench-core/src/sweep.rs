//! Concurrency sweep: every workload at every pool size in `min..=max`

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use libflowbench_engine::{processes, Engine, EngineError, ProcessDefinition};

use crate::clock::{IterationClock, IterationSample};
use crate::config::{BenchConfig, DEFAULT_TIMEOUT_SECS};
use crate::error::{BenchError, Result};
use crate::pool::{BarrierError, BarrierFailure, CompletionBarrier, WorkerPool};
use crate::report::BenchmarkReport;
use crate::stats::{aggregate, LatencyPercentiles, Statistics};
use crate::workload::{Workload, WorkloadRegistry};

/// Bounds and workloads of one sweep
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepPlan {
    pub min_threads: usize,
    pub max_threads: usize,
    pub iterations: usize,
    pub workloads: Vec<String>,
}

impl SweepPlan {
    /// Measured sweep described by `config`
    pub fn measured(config: &BenchConfig, workloads: Vec<String>) -> Self {
        Self {
            min_threads: config.min_threads,
            max_threads: config.max_threads,
            iterations: config.iterations,
            workloads,
        }
    }

    /// Same plan with a different iteration count
    pub fn with_iterations(&self, iterations: usize) -> Self {
        Self {
            iterations,
            ..self.clone()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_threads < 1 || self.min_threads > self.max_threads {
            return Err(BenchError::Config(format!(
                "invalid thread range {}..={}",
                self.min_threads, self.max_threads
            )));
        }
        if self.iterations < 1 {
            return Err(BenchError::Config("iterations must be at least 1".to_string()));
        }
        if self.workloads.is_empty() {
            return Err(BenchError::Config("no workloads to run".to_string()));
        }
        Ok(())
    }
}

/// Samples and wall-clock duration of one step
#[derive(Debug, Clone)]
pub struct BatchResult {
    pub samples: Vec<u64>,
    pub total: Duration,
}

impl BatchResult {
    /// Batch duration in fractional milliseconds
    pub fn total_millis(&self) -> f64 {
        self.total.as_secs_f64() * 1000.0
    }

    pub fn statistics(&self, iterations: usize) -> Result<Statistics> {
        aggregate(&self.samples, self.total_millis(), iterations)
    }
}

/// Drives workloads against an engine, one fresh worker pool per step
pub struct SweepController {
    engine: Arc<dyn Engine>,
    registry: WorkloadRegistry,
    definitions: Vec<ProcessDefinition>,
    timeout: Duration,
}

impl SweepController {
    /// Controller deploying the built-in processes before every step
    pub fn new(engine: Arc<dyn Engine>, registry: WorkloadRegistry) -> Self {
        Self {
            engine,
            registry,
            definitions: processes::builtin(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_definitions(mut self, definitions: Vec<ProcessDefinition>) -> Self {
        self.definitions = definitions;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn registry(&self) -> &WorkloadRegistry {
        &self.registry
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run every known workload at every level of the plan.
    ///
    /// Unknown workload names are skipped. Any other failure aborts the
    /// sweep and no report is returned.
    pub fn run_sweep(&self, plan: &SweepPlan) -> Result<BenchmarkReport> {
        plan.validate()?;

        let mut report = BenchmarkReport::new(plan.max_threads, plan.iterations);

        for threads in plan.min_threads..=plan.max_threads {
            info!("Running with {} threads", threads);

            for name in &plan.workloads {
                let workload = match self.registry.get(name) {
                    Some(workload) => workload,
                    None => {
                        warn!("Unknown workload '{}', skipping", name);
                        continue;
                    }
                };

                self.prepare_engine(name, threads)?;

                let batch = self
                    .run_step(&workload, threads, plan.iterations)
                    .map_err(|e| {
                        error!("Step '{}' at {} threads failed: {}", name, threads, e);
                        e
                    })?;
                let stats = batch.statistics(plan.iterations)?;
                let percentiles = LatencyPercentiles::from_samples(&batch.samples);

                info!(
                    workload = %name,
                    threads,
                    total_ms = batch.total_millis(),
                    p50_ms = percentiles.p50_ms,
                    p99_ms = percentiles.p99_ms,
                    max_ms = percentiles.max_ms,
                    "Finished {} iterations: average {:.2} ms, stddev {:.2} ms, {:.2}/s",
                    plan.iterations,
                    stats.mean,
                    stats.stddev,
                    stats.throughput_per_second
                );

                report.record(name, threads, &stats)?;
            }
        }

        Ok(report)
    }

    fn prepare_engine(&self, workload: &str, threads: usize) -> Result<()> {
        let reset = |source: EngineError| BenchError::EngineReset {
            workload: workload.to_string(),
            threads,
            source,
        };
        self.engine.reset_store().map_err(reset)?;
        self.engine.deploy(&self.definitions).map_err(reset)?;
        debug!(workload, threads, "engine reset");
        Ok(())
    }

    /// Run `iterations` invocations on a pool of `threads` workers
    fn run_step(
        &self,
        workload: &Arc<dyn Workload>,
        threads: usize,
        iterations: usize,
    ) -> Result<BatchResult> {
        let pool = WorkerPool::new(threads)?;
        let barrier = CompletionBarrier::<Result<IterationSample>>::new(iterations);

        let start = Instant::now();
        for _ in 0..iterations {
            let workload = Arc::clone(workload);
            let reporter = barrier.reporter();
            pool.execute(move || {
                let _ = reporter.send(IterationClock::time(workload.as_ref()));
            })?;
        }
        debug!(iterations, threads, "submitted iterations");

        let outcome = barrier.try_wait(start + self.timeout);
        let total = start.elapsed();

        match outcome {
            Ok(samples) => {
                pool.join();
                Ok(BatchResult {
                    samples: samples.into_iter().map(|s| s.elapsed_ms).collect(),
                    total,
                })
            }
            Err(failure) => {
                // Busy workers are detached, queued iterations never start
                drop(pool);
                Err(self.step_error(failure, workload.name(), threads, iterations))
            }
        }
    }

    fn step_error(
        &self,
        failure: BarrierFailure<BenchError>,
        workload: &str,
        threads: usize,
        iterations: usize,
    ) -> BenchError {
        match failure {
            BarrierFailure::Task {
                error: BenchError::Engine(source),
                ..
            } => BenchError::Iteration {
                workload: workload.to_string(),
                threads,
                source,
            },
            BarrierFailure::Task { error, .. } => error,
            BarrierFailure::Barrier(BarrierError::Timeout { completed }) => {
                warn!(completed, iterations, "completion barrier timed out");
                BenchError::Timeout {
                    workload: workload.to_string(),
                    threads,
                    timeout: self.timeout,
                }
            }
            BarrierFailure::Barrier(BarrierError::Disconnected { completed }) => {
                BenchError::WorkerLost(format!(
                    "{} of {} iterations of '{}' reported before workers exited",
                    completed, iterations, workload
                ))
            }
        }
    }
}

/// Warm-up sweep (discarded) followed by the measured sweep.
///
/// A warm-up of 0 iterations is skipped.
pub fn run_with_warmup(
    controller: &SweepController,
    plan: &SweepPlan,
    warmup_iterations: usize,
) -> Result<BenchmarkReport> {
    if warmup_iterations > 0 {
        info!("Warming up with {} iterations per step", warmup_iterations);
        controller.run_sweep(&plan.with_iterations(warmup_iterations))?;
        info!("Warm-up finished");
    }
    info!("Measuring with {} iterations per step", plan.iterations);
    controller.run_sweep(plan)
}
