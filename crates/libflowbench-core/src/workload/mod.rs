//! Named workloads and the registry they are selected from

pub mod processes;

use std::sync::Arc;

use libflowbench_engine::{Engine, EngineError};

use crate::error::{BenchError, Result};

pub use processes::{
    AllSequentialServiceTasks, ManyVariables, ParallelSubprocesses, StartToEnd, TerminateUserTasks,
};

/// A named unit of work driven through the engine once per iteration.
///
/// Implementations hold only immutable inputs so a single instance can be
/// shared by every worker of a step.
pub trait Workload: Send + Sync {
    /// Stable name, used as configuration key and report row key
    fn name(&self) -> &str;

    /// Execute one run, returning once the workload's last required
    /// completion call has returned.
    fn execute_run(&self) -> std::result::Result<(), EngineError>;
}

/// Workloads available to a sweep, in registration order
#[derive(Default, Clone)]
pub struct WorkloadRegistry {
    workloads: Vec<Arc<dyn Workload>>,
}

impl WorkloadRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the five built-in workloads bound to `engine`
    pub fn builtin(engine: Arc<dyn Engine>) -> Self {
        let mut registry = Self::new();
        let workloads: Vec<Arc<dyn Workload>> = vec![
            Arc::new(StartToEnd::new(Arc::clone(&engine))),
            Arc::new(AllSequentialServiceTasks::new(Arc::clone(&engine))),
            Arc::new(ParallelSubprocesses::new(Arc::clone(&engine))),
            Arc::new(ManyVariables::new(Arc::clone(&engine))),
            Arc::new(TerminateUserTasks::new(engine)),
        ];
        for workload in workloads {
            // Built-in names are distinct
            let _ = registry.register(workload);
        }
        registry
    }

    /// Add a workload; names must be unique
    pub fn register(&mut self, workload: Arc<dyn Workload>) -> Result<()> {
        if self.get(workload.name()).is_some() {
            return Err(BenchError::Config(format!(
                "workload '{}' registered twice",
                workload.name()
            )));
        }
        self.workloads.push(workload);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Workload>> {
        self.workloads.iter().find(|w| w.name() == name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.workloads.iter().map(|w| w.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.workloads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workloads.is_empty()
    }
}

impl std::fmt::Debug for WorkloadRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkloadRegistry")
            .field("workloads", &self.names())
            .finish()
    }
}
