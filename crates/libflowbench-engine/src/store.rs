use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::definition::{Completion, ProcessDefinition, Step};
use crate::engine::{Engine, InstanceId, Variables, WorkItem, WorkSelector};
use crate::error::EngineError;

/// How much history the engine keeps for finished instances
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryLevel {
    None,
    #[default]
    Audit,
}

/// Options for opening an [`EmbeddedEngine`]
#[derive(Debug, Clone, Default)]
pub struct EngineOptions {
    /// Directory for the sled database (None = temporary store removed on drop)
    pub data_dir: Option<PathBuf>,
    pub history_level: HistoryLevel,
}

/// Counters over the current store contents
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub deployed_definitions: usize,
    pub running_instances: usize,
    pub pending_tasks: usize,
    pub finished_instances: usize,
}

/// History record of a finished instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricInstance {
    pub id: InstanceId,
    pub key: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    /// Start event, executed service tasks, completed user tasks and end event
    pub activity_count: u32,
    pub variable_count: usize,
    /// Ended by a terminating signal rather than by reaching the end event
    pub terminated: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct InstanceRecord {
    id: InstanceId,
    key: String,
    plan: Vec<Step>,
    cursor: usize,
    started_at: DateTime<Utc>,
    activity_count: u32,
    variable_count: usize,
}

/// Embedded process engine persisted in sled.
///
/// Every instance is driven by the thread that owns it, so per-instance
/// updates need no coordination beyond sled's own atomic operations.
pub struct EmbeddedEngine {
    db: sled::Db,
    definitions: sled::Tree,
    instances: sled::Tree,
    tasks: sled::Tree,
    variables: sled::Tree,
    history: sled::Tree,
    history_level: HistoryLevel,
}

impl std::fmt::Debug for EmbeddedEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddedEngine")
            .field("history_level", &self.history_level)
            .finish()
    }
}

impl EmbeddedEngine {
    /// Open or create an engine store
    pub fn open(options: &EngineOptions) -> Result<Self, EngineError> {
        let db = match options.data_dir {
            Some(ref dir) => {
                std::fs::create_dir_all(dir)?;
                sled::open(dir)?
            }
            None => sled::Config::new().temporary(true).open()?,
        };
        Self::from_db(db, options.history_level)
    }

    /// Open an engine store at an explicit path
    pub fn open_path(path: &Path, history_level: HistoryLevel) -> Result<Self, EngineError> {
        Self::open(&EngineOptions {
            data_dir: Some(path.to_path_buf()),
            history_level,
        })
    }

    fn from_db(db: sled::Db, history_level: HistoryLevel) -> Result<Self, EngineError> {
        let definitions = db.open_tree("definitions")?;
        let instances = db.open_tree("instances")?;
        let tasks = db.open_tree("tasks")?;
        let variables = db.open_tree("variables")?;
        let history = db.open_tree("history")?;

        Ok(Self {
            db,
            definitions,
            instances,
            tasks,
            variables,
            history,
            history_level,
        })
    }

    pub fn history_level(&self) -> HistoryLevel {
        self.history_level
    }

    /// Current store counters
    pub fn stats(&self) -> EngineStats {
        EngineStats {
            deployed_definitions: self.definitions.len(),
            running_instances: self.instances.len(),
            pending_tasks: self.tasks.len(),
            finished_instances: self.history.len(),
        }
    }

    /// History of a finished instance, if recorded
    pub fn history_for(&self, id: &InstanceId) -> Result<Option<HistoricInstance>, EngineError> {
        match self.history.get(id.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// All recorded history, in instance id order
    pub fn finished_instances(&self) -> Result<Vec<HistoricInstance>, EngineError> {
        let mut out = Vec::new();
        for entry in self.history.iter() {
            let (_, value) = entry?;
            out.push(serde_json::from_slice(&value)?);
        }
        Ok(out)
    }

    /// Variables held by a running instance
    pub fn runtime_variables(&self, id: &InstanceId) -> Result<Variables, EngineError> {
        let mut vars = Variables::new();
        for entry in self.variables.scan_prefix(id.as_bytes()) {
            let (key, value) = entry?;
            let name = String::from_utf8_lossy(&key[16..]).into_owned();
            vars.insert(name, serde_json::from_slice(&value)?);
        }
        Ok(vars)
    }

    /// Flush pending writes to disk
    pub fn flush(&self) -> Result<(), EngineError> {
        self.db.flush()?;
        Ok(())
    }

    fn load_definition(&self, key: &str) -> Result<ProcessDefinition, EngineError> {
        match self.definitions.get(key.as_bytes())? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Err(EngineError::NotDeployed(key.to_string())),
        }
    }

    fn load_instance(&self, id: &InstanceId) -> Result<InstanceRecord, EngineError> {
        match self.instances.get(id.as_bytes())? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Err(EngineError::InstanceNotFound(id.to_string())),
        }
    }

    fn save_instance(&self, record: &InstanceRecord) -> Result<(), EngineError> {
        self.instances
            .insert(record.id.as_bytes(), serde_json::to_vec(record)?)?;
        Ok(())
    }

    fn pending_for(&self, id: &InstanceId) -> Result<Vec<WorkItem>, EngineError> {
        let mut items = Vec::new();
        for entry in self.tasks.scan_prefix(id.as_bytes()) {
            let (_, value) = entry?;
            items.push(serde_json::from_slice::<WorkItem>(&value)?);
        }
        Ok(items)
    }

    /// Run automated steps until the instance waits on user tasks or ends
    fn advance(&self, mut record: InstanceRecord) -> Result<(), EngineError> {
        while let Some(step) = record.plan.get(record.cursor) {
            match step {
                Step::Service { .. } => {
                    record.activity_count += 1;
                    record.cursor += 1;
                }
                Step::Wait { names, .. } => {
                    for name in names {
                        let item = WorkItem {
                            id: uuid::Uuid::new_v4(),
                            instance: record.id,
                            name: name.clone(),
                        };
                        self.tasks.insert(task_key(&item), serde_json::to_vec(&item)?)?;
                    }
                    return self.save_instance(&record);
                }
            }
        }
        self.finish(record, false)
    }

    fn finish(&self, mut record: InstanceRecord, terminated: bool) -> Result<(), EngineError> {
        record.activity_count += 1;

        for entry in self.tasks.scan_prefix(record.id.as_bytes()).keys() {
            self.tasks.remove(entry?)?;
        }
        for entry in self.variables.scan_prefix(record.id.as_bytes()).keys() {
            self.variables.remove(entry?)?;
        }
        self.instances.remove(record.id.as_bytes())?;

        if self.history_level == HistoryLevel::Audit {
            let historic = HistoricInstance {
                id: record.id,
                key: record.key,
                started_at: record.started_at,
                ended_at: Utc::now(),
                activity_count: record.activity_count,
                variable_count: record.variable_count,
                terminated,
            };
            self.history
                .insert(record.id.as_bytes(), serde_json::to_vec(&historic)?)?;
        }
        Ok(())
    }
}

impl Engine for EmbeddedEngine {
    fn reset_store(&self) -> Result<(), EngineError> {
        for tree in [
            &self.definitions,
            &self.instances,
            &self.tasks,
            &self.variables,
            &self.history,
        ] {
            tree.clear()?;
        }
        debug!("engine store reset");
        Ok(())
    }

    fn deploy(&self, definitions: &[ProcessDefinition]) -> Result<(), EngineError> {
        for def in definitions {
            def.validate()?;
            self.definitions
                .insert(def.key.as_bytes(), serde_json::to_vec(def)?)?;
        }
        debug!(count = definitions.len(), "deployed process definitions");
        Ok(())
    }

    fn start_instance(&self, key: &str, variables: &Variables) -> Result<InstanceId, EngineError> {
        let definition = self.load_definition(key)?;
        let plan = definition.resolve(variables)?;
        let id = InstanceId::generate();

        for (name, value) in variables {
            self.variables
                .insert(variable_key(&id, name), serde_json::to_vec(value)?)?;
        }

        let record = InstanceRecord {
            id,
            key: definition.key,
            plan,
            cursor: 0,
            started_at: Utc::now(),
            activity_count: 1,
            variable_count: variables.len(),
        };
        self.advance(record)?;
        Ok(id)
    }

    fn find_pending_work(
        &self,
        instance: &InstanceId,
        selector: &WorkSelector,
    ) -> Result<Vec<WorkItem>, EngineError> {
        let mut items: Vec<WorkItem> = self
            .pending_for(instance)?
            .into_iter()
            .filter(|item| selector.matches(item))
            .collect();
        items.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(items)
    }

    fn complete_work(&self, item: &WorkItem) -> Result<(), EngineError> {
        if self.tasks.remove(task_key(item))?.is_none() {
            return Err(EngineError::task_not_found(
                &item.instance.to_string(),
                &item.name,
            ));
        }

        let mut record = self.load_instance(&item.instance)?;
        record.activity_count += 1;

        let completion = match record.plan.get(record.cursor) {
            Some(Step::Wait { completion, .. }) => completion.clone(),
            _ => {
                return Err(EngineError::InvalidState(format!(
                    "instance {} is not waiting on user tasks",
                    record.id
                )))
            }
        };

        match completion {
            Completion::Terminate { ref trigger } if *trigger == item.name => {
                self.finish(record, true)
            }
            _ => {
                if self.pending_for(&item.instance)?.is_empty() {
                    record.cursor += 1;
                    self.advance(record)
                } else {
                    self.save_instance(&record)
                }
            }
        }
    }
}

fn task_key(item: &WorkItem) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(item.instance.as_bytes());
    key.extend_from_slice(item.id.as_bytes());
    key
}

fn variable_key(id: &InstanceId, name: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(16 + name.len());
    key.extend_from_slice(id.as_bytes());
    key.extend_from_slice(name.as_bytes());
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::Activity;
    use crate::processes;
    use serde_json::json;
    use tempfile::tempdir;

    fn engine() -> EmbeddedEngine {
        let engine = EmbeddedEngine::open(&EngineOptions::default()).unwrap();
        engine.deploy(&processes::builtin()).unwrap();
        engine
    }

    #[test]
    fn test_start_to_end_finishes_immediately() {
        let engine = engine();
        let id = engine
            .start_instance(processes::START_TO_END, &Variables::new())
            .unwrap();

        let history = engine.history_for(&id).unwrap().unwrap();
        assert_eq!(history.activity_count, 2);
        assert!(!history.terminated);
        assert_eq!(engine.stats().running_instances, 0);
    }

    #[test]
    fn test_sequential_service_tasks_counted() {
        let engine = engine();
        let id = engine
            .start_instance(processes::ALL_SEQUENTIAL_SERVICE_TASKS, &Variables::new())
            .unwrap();

        let history = engine.history_for(&id).unwrap().unwrap();
        // 10 service tasks + start + end
        assert_eq!(history.activity_count, 12);
    }

    #[test]
    fn test_parallel_join_waits_for_all_tasks() {
        let engine = engine();
        let id = engine
            .start_instance(processes::PARALLEL_SUBPROCESSES, &Variables::new())
            .unwrap();

        let tasks = engine.find_pending_work(&id, &WorkSelector::All).unwrap();
        let names: Vec<_> = tasks.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "C"]);

        engine.complete_work(&tasks[0]).unwrap();
        engine.complete_work(&tasks[1]).unwrap();
        assert!(engine.history_for(&id).unwrap().is_none());

        engine.complete_work(&tasks[2]).unwrap();
        let history = engine.history_for(&id).unwrap().unwrap();
        assert_eq!(history.activity_count, 5);
        assert_eq!(engine.stats().pending_tasks, 0);
    }

    #[test]
    fn test_terminate_trigger_cancels_other_tasks() {
        let engine = engine();
        let id = engine
            .start_instance(processes::TERMINATE_USER_TASKS, &Variables::new())
            .unwrap();

        let a = engine
            .find_pending_work(&id, &WorkSelector::named("A"))
            .unwrap();
        assert_eq!(a.len(), 1);
        assert_eq!(engine.stats().pending_tasks, 3);

        engine.complete_work(&a[0]).unwrap();

        let history = engine.history_for(&id).unwrap().unwrap();
        assert!(history.terminated);
        assert_eq!(engine.stats().pending_tasks, 0);
        assert_eq!(engine.stats().running_instances, 0);
    }

    #[test]
    fn test_non_trigger_completion_keeps_instance_waiting() {
        let engine = engine();
        let id = engine
            .start_instance(processes::TERMINATE_USER_TASKS, &Variables::new())
            .unwrap();

        let b = engine
            .find_pending_work(&id, &WorkSelector::named("B"))
            .unwrap();
        engine.complete_work(&b[0]).unwrap();

        assert!(engine.history_for(&id).unwrap().is_none());
        assert_eq!(engine.find_pending_work(&id, &WorkSelector::All).unwrap().len(), 2);
    }

    #[test]
    fn test_gateway_routes_on_variables() {
        let engine = engine();
        let mut vars = Variables::new();
        vars.insert("firstGw".to_string(), json!("A"));
        vars.insert("secondGw".to_string(), json!("A"));
        let id = engine.start_instance(processes::MANY_VARIABLES, &vars).unwrap();

        let tasks = engine.find_pending_work(&id, &WorkSelector::All).unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].name, "A");
        assert_eq!(engine.runtime_variables(&id).unwrap(), vars);

        engine.complete_work(&tasks[0]).unwrap();
        let history = engine.history_for(&id).unwrap().unwrap();
        assert_eq!(history.variable_count, 2);
        assert!(engine.runtime_variables(&id).unwrap().is_empty());
    }

    #[test]
    fn test_completing_twice_fails() {
        let engine = engine();
        let id = engine
            .start_instance(processes::PARALLEL_SUBPROCESSES, &Variables::new())
            .unwrap();
        let tasks = engine.find_pending_work(&id, &WorkSelector::All).unwrap();

        engine.complete_work(&tasks[0]).unwrap();
        assert!(matches!(
            engine.complete_work(&tasks[0]),
            Err(EngineError::WorkNotFound(_))
        ));
    }

    #[test]
    fn test_unknown_key_not_deployed() {
        let engine = engine();
        assert!(matches!(
            engine.start_instance("nope", &Variables::new()),
            Err(EngineError::NotDeployed(_))
        ));
    }

    #[test]
    fn test_reset_store_drops_everything() {
        let engine = engine();
        engine
            .start_instance(processes::PARALLEL_SUBPROCESSES, &Variables::new())
            .unwrap();
        engine
            .start_instance(processes::START_TO_END, &Variables::new())
            .unwrap();

        engine.reset_store().unwrap();

        assert_eq!(engine.stats(), EngineStats::default());
        assert!(matches!(
            engine.start_instance(processes::START_TO_END, &Variables::new()),
            Err(EngineError::NotDeployed(_))
        ));
    }

    #[test]
    fn test_history_level_none_keeps_no_history() {
        let engine = EmbeddedEngine::open(&EngineOptions {
            data_dir: None,
            history_level: HistoryLevel::None,
        })
        .unwrap();
        engine.deploy(&processes::builtin()).unwrap();
        let id = engine
            .start_instance(processes::START_TO_END, &Variables::new())
            .unwrap();

        assert!(engine.history_for(&id).unwrap().is_none());
        assert_eq!(engine.stats().finished_instances, 0);
    }

    #[test]
    fn test_deploy_rejects_invalid_definition() {
        let engine = engine();
        let bad = ProcessDefinition::new(
            "bad",
            "Bad",
            vec![Activity::UserTasks {
                names: Vec::new(),
                completion: Completion::All,
            }],
        );
        assert!(matches!(
            engine.deploy(&[bad]),
            Err(EngineError::InvalidDefinition(_))
        ));
    }

    #[test]
    fn test_open_path_persists_history() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("engine");
        let id = {
            let engine = EmbeddedEngine::open_path(&path, HistoryLevel::Audit).unwrap();
            engine.deploy(&processes::builtin()).unwrap();
            let id = engine
                .start_instance(processes::START_TO_END, &Variables::new())
                .unwrap();
            engine.flush().unwrap();
            id
        };

        let engine = EmbeddedEngine::open_path(&path, HistoryLevel::Audit).unwrap();
        assert!(engine.history_for(&id).unwrap().is_some());
        assert_eq!(engine.finished_instances().unwrap().len(), 1);
    }
}
