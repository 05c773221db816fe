use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::oracle::Oracle;
use super::sequencer::{Direction, Step};

// ---------------------------------------------------------------------------
// WorkflowState
// ---------------------------------------------------------------------------

/// Position of a run in the workflow.
///
/// Transitions: `Init → PolicyEvaluated → InstancesFiltered → ParametersBuilt
/// → Starting | Stopping → Succeeded | Failed`. Any non-terminal state may
/// also go straight to `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    Init,
    PolicyEvaluated,
    InstancesFiltered,
    ParametersBuilt,
    Starting,
    Stopping,
    Succeeded,
    Failed,
}

impl WorkflowState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::PolicyEvaluated => "policy_evaluated",
            Self::InstancesFiltered => "instances_filtered",
            Self::ParametersBuilt => "parameters_built",
            Self::Starting => "starting",
            Self::Stopping => "stopping",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// FailureReason
// ---------------------------------------------------------------------------

/// Why a run ended `Failed`. Every variant is terminal; nothing is retried
/// within a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    #[error("{oracle} oracle timed out")]
    OracleTimeout { oracle: Oracle },

    #[error("{oracle} oracle failed: {message}")]
    OracleError { oracle: Oracle, message: String },

    #[error("step {step} timed out")]
    ExecutorTimeout { step: Step },

    #[error("step {step} failed: {message}")]
    ExecutorError { step: Step, message: String },

    #[error("run exceeded its {budget_seconds}s budget while {in_flight}")]
    WorkflowTimeout {
        budget_seconds: u64,
        in_flight: WorkflowState,
    },

    /// The process recording the run went away before it reached a terminal
    /// state. Only assigned by run-store recovery, never by the engine.
    #[error("run interrupted while {in_flight}")]
    Interrupted { in_flight: WorkflowState },
}

// ---------------------------------------------------------------------------
// Steps
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepOutcome {
    Succeeded,
    Failed { message: String },
    TimedOut,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepReport {
    pub step: Step,
    pub outcome: StepOutcome,
    pub elapsed_ms: u64,
}

// ---------------------------------------------------------------------------
// RunStatus / RunReport
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunStatus {
    /// Dispatched and not yet terminal (or the process died mid-run).
    Running,
    Succeeded,
    Failed { reason: FailureReason },
}

impl RunStatus {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed { .. } => "failed",
        }
    }
}

/// Everything observable about one finished run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// `None` if the run failed before the direction was chosen.
    pub direction: Option<Direction>,
    /// Every state the run entered, in order, starting with `Init`.
    pub states: Vec<WorkflowState>,
    pub steps: Vec<StepReport>,
    pub status: RunStatus,
}

impl RunReport {
    pub fn succeeded(&self) -> bool {
        matches!(self.status, RunStatus::Succeeded)
    }

    pub fn failure(&self) -> Option<&FailureReason> {
        match &self.status {
            RunStatus::Failed { reason } => Some(reason),
            RunStatus::Running | RunStatus::Succeeded => None,
        }
    }

    pub fn final_state(&self) -> WorkflowState {
        self.states.last().copied().unwrap_or(WorkflowState::Init)
    }
}
