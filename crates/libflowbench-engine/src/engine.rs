//! Engine interface consumed by the benchmark harness

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::definition::ProcessDefinition;
use crate::error::EngineError;

/// Process variables passed when starting an instance
pub type Variables = BTreeMap<String, serde_json::Value>;

/// Identifier of a running (or finished) process instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceId(pub Uuid);

impl InstanceId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// A pending unit of work (user task) waiting for completion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: Uuid,
    pub instance: InstanceId,
    pub name: String,
}

/// Which pending work items to return
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkSelector {
    All,
    Named(String),
}

impl WorkSelector {
    pub fn named(name: impl Into<String>) -> Self {
        WorkSelector::Named(name.into())
    }

    pub fn matches(&self, item: &WorkItem) -> bool {
        match self {
            WorkSelector::All => true,
            WorkSelector::Named(name) => item.name == *name,
        }
    }
}

/// A workflow engine the harness can drive.
///
/// Implementations must be shareable across worker threads. Every call may
/// fail with an [`EngineError`]; the harness treats any failure as fatal for
/// the step in progress.
pub trait Engine: Send + Sync {
    /// Drop and recreate all persisted state, including deployments.
    fn reset_store(&self) -> Result<(), EngineError>;

    /// Make process definitions available to `start_instance`.
    fn deploy(&self, definitions: &[ProcessDefinition]) -> Result<(), EngineError>;

    /// Start a new instance of the definition registered under `key`.
    fn start_instance(&self, key: &str, variables: &Variables) -> Result<InstanceId, EngineError>;

    /// List pending work for an instance, ordered by name ascending.
    fn find_pending_work(
        &self,
        instance: &InstanceId,
        selector: &WorkSelector,
    ) -> Result<Vec<WorkItem>, EngineError>;

    /// Complete a pending work item and advance its instance.
    fn complete_work(&self, item: &WorkItem) -> Result<(), EngineError>;
}
