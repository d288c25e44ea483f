//! Per-iteration wall-clock timing

use std::time::{Duration, Instant};

use crate::error::Result;
use crate::workload::Workload;

/// Elapsed time of one run, in whole milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct IterationSample {
    pub elapsed_ms: u64,
}

impl IterationSample {
    pub fn from_duration(elapsed: Duration) -> Self {
        Self {
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }

    pub fn as_duration(&self) -> Duration {
        Duration::from_millis(self.elapsed_ms)
    }
}

/// Times a single workload invocation
pub struct IterationClock;

impl IterationClock {
    /// Run the workload once; an engine failure is returned instead of a sample
    pub fn time(workload: &dyn Workload) -> Result<IterationSample> {
        let start = Instant::now();
        workload.execute_run()?;
        Ok(IterationSample::from_duration(start.elapsed()))
    }
}
