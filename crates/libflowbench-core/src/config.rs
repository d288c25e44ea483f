//! Benchmark configuration loaded from `flowbench.toml`

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use libflowbench_engine::{EngineOptions, HistoryLevel};

use crate::error::{BenchError, Result};
use crate::workload::WorkloadRegistry;

/// Default step timeout (60 minutes)
pub const DEFAULT_TIMEOUT_SECS: u64 = 60 * 60;

/// Iterations per step of the warm-up sweep
pub const DEFAULT_WARMUP_ITERATIONS: usize = 1000;

/// Configuration for a benchmark run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BenchConfig {
    /// Smallest worker pool size swept
    pub min_threads: usize,
    /// Largest worker pool size swept; also the number of report columns
    pub max_threads: usize,
    /// Iterations per (workload, concurrency) step of the measured sweep
    pub iterations: usize,
    /// Iterations per step of the warm-up sweep (0 = skip warm-up)
    pub warmup_iterations: usize,
    /// CSV report path
    pub output: PathBuf,
    /// Workloads to run, in order (empty = all registered)
    pub workloads: Vec<String>,
    /// Completion barrier timeout per step, in seconds
    pub timeout_secs: u64,
    pub engine: EngineConfig,
}

/// Options passed to the embedded engine
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub history_level: HistoryLevel,
    /// Store directory (None = temporary store)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            min_threads: 10,
            max_threads: 16,
            iterations: 10_000,
            warmup_iterations: DEFAULT_WARMUP_ITERATIONS,
            output: PathBuf::from("results.csv"),
            workloads: Vec::new(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            engine: EngineConfig::default(),
        }
    }
}

impl BenchConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            BenchError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Check sweep bounds; fatal before any step runs
    pub fn validate(&self) -> Result<()> {
        if self.min_threads < 1 {
            return Err(BenchError::Config("min_threads must be at least 1".to_string()));
        }
        if self.min_threads > self.max_threads {
            return Err(BenchError::Config(format!(
                "min_threads ({}) must not exceed max_threads ({})",
                self.min_threads, self.max_threads
            )));
        }
        if self.iterations < 1 {
            return Err(BenchError::Config("iterations must be at least 1".to_string()));
        }
        if self.timeout_secs == 0 {
            return Err(BenchError::Config("timeout_secs must be positive".to_string()));
        }
        if self.output.as_os_str().is_empty() {
            return Err(BenchError::Config("output path is empty".to_string()));
        }
        Ok(())
    }

    /// Workloads to sweep: the configured list, or every registered name
    pub fn resolve_workloads(&self, registry: &WorkloadRegistry) -> Result<Vec<String>> {
        let names = if self.workloads.is_empty() {
            registry.names()
        } else {
            self.workloads.clone()
        };
        if names.is_empty() {
            return Err(BenchError::Config("no workloads registered".to_string()));
        }
        Ok(names)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            data_dir: self.engine.data_dir.clone(),
            history_level: self.engine.history_level,
        }
    }
}
