use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};
use libflowbench_core::{BenchConfig, Result};
use libflowbench_engine::HistoryLevel;

/// Config file picked up from the working directory when `--config` is absent
pub const DEFAULT_CONFIG_FILE: &str = "flowbench.toml";

#[derive(Parser)]
#[command(
    name = "flowbench",
    about = "Measure process engine latency and throughput across worker pool sizes",
    version
)]
pub struct Cli {
    /// Configuration file (defaults to ./flowbench.toml when present)
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Smallest worker pool size
    #[arg(long)]
    pub min_threads: Option<usize>,

    /// Largest worker pool size
    #[arg(long)]
    pub max_threads: Option<usize>,

    /// Iterations per workload and pool size
    #[arg(long, short = 'n')]
    pub iterations: Option<usize>,

    /// Iterations per step of the warm-up sweep (0 = skip warm-up)
    #[arg(long)]
    pub warmup_iterations: Option<usize>,

    /// CSV report path
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// Workloads to run, in order (repeatable or comma separated)
    #[arg(long = "workload", short, value_delimiter = ',')]
    pub workloads: Vec<String>,

    /// Per-step timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Engine store directory (default: temporary store)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Engine history level
    #[arg(long, value_enum)]
    pub history: Option<HistoryArg>,

    /// List registered workloads and exit
    #[arg(long)]
    pub list_workloads: bool,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    pub print_config: bool,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,

    /// Suppress human-readable output
    #[arg(long, short)]
    pub quiet: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum HistoryArg {
    None,
    Audit,
}

impl From<HistoryArg> for HistoryLevel {
    fn from(arg: HistoryArg) -> Self {
        match arg {
            HistoryArg::None => HistoryLevel::None,
            HistoryArg::Audit => HistoryLevel::Audit,
        }
    }
}

impl Cli {
    /// Configuration file contents with command line overrides applied
    pub fn load_config(&self) -> Result<BenchConfig> {
        let mut config = match self.config {
            Some(ref path) => BenchConfig::load(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                BenchConfig::load(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => BenchConfig::default(),
        };
        self.apply_overrides(&mut config);
        Ok(config)
    }

    fn apply_overrides(&self, config: &mut BenchConfig) {
        if let Some(min) = self.min_threads {
            config.min_threads = min;
        }
        if let Some(max) = self.max_threads {
            config.max_threads = max;
        }
        if let Some(iterations) = self.iterations {
            config.iterations = iterations;
        }
        if let Some(warmup) = self.warmup_iterations {
            config.warmup_iterations = warmup;
        }
        if let Some(ref output) = self.output {
            config.output = output.clone();
        }
        if !self.workloads.is_empty() {
            config.workloads = self.workloads.clone();
        }
        if let Some(timeout) = self.timeout {
            config.timeout_secs = timeout;
        }
        if let Some(ref dir) = self.data_dir {
            config.engine.data_dir = Some(dir.clone());
        }
        if let Some(history) = self.history {
            config.engine.history_level = history.into();
        }
    }
}
