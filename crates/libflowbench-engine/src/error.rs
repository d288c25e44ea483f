use thiserror::Error;

/// Errors raised by a process engine
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("process definition not deployed: {0}")]
    NotDeployed(String),

    #[error("process instance not found: {0}")]
    InstanceNotFound(String),

    #[error("work item not found: {0}")]
    WorkNotFound(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("invalid definition: {0}")]
    InvalidDefinition(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EngineError {
    /// Short machine-readable code for log lines
    pub fn error_code(&self) -> &'static str {
        match self {
            EngineError::NotDeployed(_) => "not_deployed",
            EngineError::InstanceNotFound(_) => "instance_not_found",
            EngineError::WorkNotFound(_) => "work_not_found",
            EngineError::InvalidState(_) => "invalid_state",
            EngineError::InvalidDefinition(_) => "invalid_definition",
            EngineError::Io(_) => "io_error",
            EngineError::Sled(_) => "db_error",
            EngineError::Json(_) => "internal_error",
        }
    }

    /// Create a WorkNotFound error for a named task in an instance
    pub fn task_not_found(instance: &str, task: &str) -> Self {
        EngineError::WorkNotFound(format!(
            "task '{}' in instance {}",
            task,
            if instance.len() > 8 { &instance[..8] } else { instance }
        ))
    }
}
