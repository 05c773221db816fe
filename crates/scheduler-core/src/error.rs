use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("not initialized: no config at {0} (run 'scheduler init')")]
    NotInitialized(PathBuf),

    #[error("invalid schedule expression '{expr}': {reason}")]
    InvalidSchedule { expr: String, reason: String },

    #[error("run not found: {0}")]
    RunNotFound(String),

    #[error("run id prefix '{0}' matches more than one run")]
    AmbiguousRunId(String),

    #[error("run store error: {0}")]
    RunStore(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
