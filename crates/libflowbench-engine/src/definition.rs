//! Process definitions understood by the embedded engine

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::engine::Variables;
use crate::error::EngineError;

/// A deployable process definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessDefinition {
    /// Key used by `start_instance`
    pub key: String,
    /// Human readable name
    pub name: String,
    /// Activities executed in order between the start and end events
    pub activities: Vec<Activity>,
}

/// A flow element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Activity {
    /// Automated step executed synchronously by the engine
    Service { name: String },
    /// One or more user tasks created together; the instance waits on them
    UserTasks { names: Vec<String>, completion: Completion },
    /// Exclusive gateway routed on a start variable
    Choice { variable: String, branches: Vec<Branch> },
}

/// When a group of user tasks is considered done
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Completion {
    /// Every task in the group must be completed (parallel join)
    All,
    /// Completing `trigger` throws an instance-scoped signal that ends the instance
    Terminate { trigger: String },
}

/// Outgoing branch of a [`Activity::Choice`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    /// Value the gateway variable must equal; `None` marks the default flow
    pub when: Option<serde_json::Value>,
    pub activities: Vec<Activity>,
}

/// A flattened step of a resolved instance plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Step {
    Service { name: String },
    Wait { names: Vec<String>, completion: Completion },
}

impl ProcessDefinition {
    pub fn new(key: impl Into<String>, name: impl Into<String>, activities: Vec<Activity>) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            activities,
        }
    }

    /// Check structural rules before deployment
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.key.trim().is_empty() {
            return Err(EngineError::InvalidDefinition("empty process key".to_string()));
        }
        validate_activities(&self.key, &self.activities)
    }

    /// Resolve gateways against the start variables into a linear plan
    pub fn resolve(&self, variables: &Variables) -> Result<Vec<Step>, EngineError> {
        let mut steps = Vec::new();
        flatten(&self.key, &self.activities, variables, &mut steps)?;
        Ok(steps)
    }
}

fn validate_activities(key: &str, activities: &[Activity]) -> Result<(), EngineError> {
    for activity in activities {
        match activity {
            Activity::Service { name } => {
                if name.is_empty() {
                    return Err(EngineError::InvalidDefinition(format!(
                        "{}: service task without a name",
                        key
                    )));
                }
            }
            Activity::UserTasks { names, completion } => {
                if names.is_empty() {
                    return Err(EngineError::InvalidDefinition(format!(
                        "{}: empty user task group",
                        key
                    )));
                }
                let unique: HashSet<&String> = names.iter().collect();
                if unique.len() != names.len() {
                    return Err(EngineError::InvalidDefinition(format!(
                        "{}: duplicate task names in group {:?}",
                        key, names
                    )));
                }
                if let Completion::Terminate { trigger } = completion {
                    if !names.contains(trigger) {
                        return Err(EngineError::InvalidDefinition(format!(
                            "{}: terminate trigger '{}' is not part of the group",
                            key, trigger
                        )));
                    }
                }
            }
            Activity::Choice { variable, branches } => {
                if branches.is_empty() {
                    return Err(EngineError::InvalidDefinition(format!(
                        "{}: gateway on '{}' has no branches",
                        key, variable
                    )));
                }
                if branches.iter().filter(|b| b.when.is_none()).count() > 1 {
                    return Err(EngineError::InvalidDefinition(format!(
                        "{}: gateway on '{}' has more than one default flow",
                        key, variable
                    )));
                }
                for branch in branches {
                    validate_activities(key, &branch.activities)?;
                }
            }
        }
    }
    Ok(())
}

fn flatten(
    key: &str,
    activities: &[Activity],
    variables: &Variables,
    out: &mut Vec<Step>,
) -> Result<(), EngineError> {
    for activity in activities {
        match activity {
            Activity::Service { name } => out.push(Step::Service { name: name.clone() }),
            Activity::UserTasks { names, completion } => out.push(Step::Wait {
                names: names.clone(),
                completion: completion.clone(),
            }),
            Activity::Choice { variable, branches } => {
                let value = variables.get(variable);
                let chosen = branches
                    .iter()
                    .find(|b| b.when.is_some() && b.when.as_ref() == value)
                    .or_else(|| branches.iter().find(|b| b.when.is_none()))
                    .ok_or_else(|| {
                        EngineError::InvalidState(format!(
                            "{}: no outgoing flow for gateway variable '{}' = {:?}",
                            key, variable, value
                        ))
                    })?;
                flatten(key, &chosen.activities, variables, out)?;
            }
        }
    }
    Ok(())
}
