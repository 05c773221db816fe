//! Run record: the persisted, after-the-fact view of one workflow run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::workflow::{Direction, RunReport, RunStatus, StepReport, WorkflowState};

// ---------------------------------------------------------------------------
// RunTrigger
// ---------------------------------------------------------------------------

/// What started the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunTrigger {
    /// Dispatched by the periodic trigger for the tick due at `fire_at`.
    Scheduled { fire_at: DateTime<Utc> },
    /// Started by hand (`scheduler run`).
    Manual,
}

// ---------------------------------------------------------------------------
// RunRecord
// ---------------------------------------------------------------------------

/// Lifecycle: written as `Running` before the engine starts, rewritten with
/// the terminal status once it returns. A record left `Running` by a crash is
/// marked `Failed` by `RunStore::startup_recovery`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: Uuid,
    pub trigger: RunTrigger,
    pub status: RunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
    #[serde(default)]
    pub states: Vec<WorkflowState>,
    #[serde(default)]
    pub steps: Vec<StepReport>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunRecord {
    /// A fresh `Running` record with a new id.
    pub fn started(trigger: RunTrigger) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            trigger,
            status: RunStatus::Running,
            direction: None,
            states: vec![WorkflowState::Init],
            steps: Vec::new(),
            started_at: now,
            updated_at: now,
            finished_at: None,
        }
    }

    /// Copy the engine's report into this record.
    pub fn complete(&mut self, report: &RunReport) {
        self.status = report.status.clone();
        self.direction = report.direction;
        self.states = report.states.clone();
        self.steps = report.steps.clone();
        self.finished_at = Some(report.finished_at);
        self.updated_at = Utc::now();
    }

    pub fn is_running(&self) -> bool {
        matches!(self.status, RunStatus::Running)
    }
}
