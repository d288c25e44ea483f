//! Error types for flowbench

use std::time::Duration;

use libflowbench_engine::EngineError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BenchError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Engine invocation error: {0}")]
    Engine(#[from] EngineError),

    #[error("Engine reset failed before '{workload}' at {threads} threads: {source}")]
    EngineReset {
        workload: String,
        threads: usize,
        #[source]
        source: EngineError,
    },

    #[error("Iteration of '{workload}' at {threads} threads failed: {source}")]
    Iteration {
        workload: String,
        threads: usize,
        #[source]
        source: EngineError,
    },

    #[error("'{workload}' at {threads} threads did not complete within {timeout:?}")]
    Timeout {
        workload: String,
        threads: usize,
        timeout: Duration,
    },

    #[error("Worker pool lost: {0}")]
    WorkerLost(String),

    #[error("Measurement error: {0}")]
    Measurement(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, BenchError>;

impl BenchError {
    /// Process exit code for the CLI
    pub fn exit_code(&self) -> i32 {
        match self {
            BenchError::Config(_) | BenchError::TomlParse(_) => 2,
            BenchError::Engine(_) | BenchError::EngineReset { .. } | BenchError::Iteration { .. } => 3,
            BenchError::Timeout { .. } => 4,
            BenchError::Io(_) | BenchError::Csv(_) => 5,
            _ => 1,
        }
    }

    /// Short machine-readable code for JSON output
    pub fn error_code(&self) -> &'static str {
        match self {
            BenchError::Config(_) | BenchError::TomlParse(_) => "invalid_config",
            BenchError::Engine(e) => e.error_code(),
            BenchError::EngineReset { .. } => "engine_reset_failed",
            BenchError::Iteration { .. } => "iteration_failed",
            BenchError::Timeout { .. } => "timeout",
            BenchError::WorkerLost(_) => "worker_lost",
            BenchError::Measurement(_) => "measurement_error",
            BenchError::Io(_) => "io_error",
            BenchError::Csv(_) => "csv_error",
        }
    }
}
