//! The built-in workloads, one per benchmark process

use std::sync::Arc;

use serde_json::Value;

use libflowbench_engine::processes::{
    ALL_SEQUENTIAL_SERVICE_TASKS, MANY_VARIABLES, PARALLEL_SUBPROCESSES, START_TO_END,
    TERMINATE_USER_TASKS,
};
use libflowbench_engine::{Engine, EngineError, InstanceId, Variables, WorkSelector};

use super::Workload;

/// Generated variables passed to `manyVariables`, on top of the two gateway variables
pub const MANY_VARIABLES_GENERATED: usize = 50;

/// Variables passed to `terminateUserTasks`
pub const TERMINATE_VARIABLES: usize = 10;

/// Start and end with nothing in between
pub struct StartToEnd {
    engine: Arc<dyn Engine>,
    variables: Variables,
}

impl StartToEnd {
    pub fn new(engine: Arc<dyn Engine>) -> Self {
        Self {
            engine,
            variables: Variables::new(),
        }
    }
}

impl Workload for StartToEnd {
    fn name(&self) -> &str {
        START_TO_END
    }

    fn execute_run(&self) -> Result<(), EngineError> {
        self.engine.start_instance(START_TO_END, &self.variables)?;
        Ok(())
    }
}

/// A chain of automated steps the engine runs inside the start call
pub struct AllSequentialServiceTasks {
    engine: Arc<dyn Engine>,
    variables: Variables,
}

impl AllSequentialServiceTasks {
    pub fn new(engine: Arc<dyn Engine>) -> Self {
        Self {
            engine,
            variables: Variables::new(),
        }
    }
}

impl Workload for AllSequentialServiceTasks {
    fn name(&self) -> &str {
        ALL_SEQUENTIAL_SERVICE_TASKS
    }

    fn execute_run(&self) -> Result<(), EngineError> {
        self.engine
            .start_instance(ALL_SEQUENTIAL_SERVICE_TASKS, &self.variables)?;
        Ok(())
    }
}

/// Concurrently created tasks, all completed in name order
pub struct ParallelSubprocesses {
    engine: Arc<dyn Engine>,
    variables: Variables,
}

impl ParallelSubprocesses {
    pub fn new(engine: Arc<dyn Engine>) -> Self {
        Self {
            engine,
            variables: Variables::new(),
        }
    }
}

impl Workload for ParallelSubprocesses {
    fn name(&self) -> &str {
        PARALLEL_SUBPROCESSES
    }

    fn execute_run(&self) -> Result<(), EngineError> {
        let instance = self
            .engine
            .start_instance(PARALLEL_SUBPROCESSES, &self.variables)?;
        let tasks = self.engine.find_pending_work(&instance, &WorkSelector::All)?;
        if tasks.is_empty() {
            return Err(EngineError::task_not_found(&instance.to_string(), "*"));
        }
        for task in &tasks {
            self.engine.complete_work(task)?;
        }
        Ok(())
    }
}

/// Single task behind two gateways, started with a large variable payload
pub struct ManyVariables {
    engine: Arc<dyn Engine>,
    variables: Arc<Variables>,
}

impl ManyVariables {
    pub fn new(engine: Arc<dyn Engine>) -> Self {
        let mut variables = generated_variables(MANY_VARIABLES_GENERATED);
        variables.insert("firstGw".to_string(), Value::from("A"));
        variables.insert("secondGw".to_string(), Value::from("A"));
        Self {
            engine,
            variables: Arc::new(variables),
        }
    }

    pub fn variables(&self) -> &Variables {
        &self.variables
    }
}

impl Workload for ManyVariables {
    fn name(&self) -> &str {
        MANY_VARIABLES
    }

    fn execute_run(&self) -> Result<(), EngineError> {
        let instance = self.engine.start_instance(MANY_VARIABLES, &self.variables)?;
        complete_single(self.engine.as_ref(), &instance, &WorkSelector::All)
    }
}

/// Completing task `A` signals termination of the other pending tasks
pub struct TerminateUserTasks {
    engine: Arc<dyn Engine>,
    variables: Arc<Variables>,
}

impl TerminateUserTasks {
    pub fn new(engine: Arc<dyn Engine>) -> Self {
        Self {
            engine,
            variables: Arc::new(generated_variables(TERMINATE_VARIABLES)),
        }
    }

    pub fn variables(&self) -> &Variables {
        &self.variables
    }
}

impl Workload for TerminateUserTasks {
    fn name(&self) -> &str {
        TERMINATE_USER_TASKS
    }

    fn execute_run(&self) -> Result<(), EngineError> {
        let instance = self
            .engine
            .start_instance(TERMINATE_USER_TASKS, &self.variables)?;
        complete_single(
            self.engine.as_ref(),
            &instance,
            &WorkSelector::named("A"),
        )
    }
}

/// Complete the one work item matching `selector`
fn complete_single(
    engine: &dyn Engine,
    instance: &InstanceId,
    selector: &WorkSelector,
) -> Result<(), EngineError> {
    let mut tasks = engine.find_pending_work(instance, selector)?;
    match tasks.len() {
        1 => engine.complete_work(&tasks.remove(0)),
        0 => Err(EngineError::task_not_found(
            &instance.to_string(),
            selector_label(selector),
        )),
        n => Err(EngineError::InvalidState(format!(
            "expected a single task in instance {}, found {}",
            instance, n
        ))),
    }
}

fn selector_label(selector: &WorkSelector) -> &str {
    match selector {
        WorkSelector::All => "*",
        WorkSelector::Named(name) => name,
    }
}

fn generated_variables(count: usize) -> Variables {
    (0..count)
        .map(|i| (format!("variable_{}", i), Value::from(format!("value_{}", i))))
        .collect()
}
