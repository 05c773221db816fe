use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use super::executor::ActionExecutor;
use super::oracle::PolicyDecision;
use super::params::{ActionParameters, InstanceType};
use super::report::{FailureReason, StepOutcome, StepReport, WorkflowState};

// ---------------------------------------------------------------------------
// Direction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Start,
    Stop,
}

impl Direction {
    /// The single branch point of the workflow.
    pub fn route(decision: &PolicyDecision) -> Self {
        if decision.is_start {
            Self::Start
        } else {
            Self::Stop
        }
    }

    /// The ordered pair of executor steps for this direction. The database
    /// tier comes up first and goes down last.
    pub fn chain(&self) -> [Step; 2] {
        match self {
            Self::Start => [Step::StartRdsFirst, Step::StartEc2Later],
            Self::Stop => [Step::StopEc2First, Step::StopRdsLater],
        }
    }

    pub fn state(&self) -> WorkflowState {
        match self {
            Self::Start => WorkflowState::Starting,
            Self::Stop => WorkflowState::Stopping,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Start => "start",
            Self::Stop => "stop",
        })
    }
}

// ---------------------------------------------------------------------------
// Step
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    StartRdsFirst,
    StartEc2Later,
    StopEc2First,
    StopRdsLater,
}

impl Step {
    pub fn instance_type(&self) -> InstanceType {
        match self {
            Self::StartRdsFirst | Self::StopRdsLater => InstanceType::Rds,
            Self::StartEc2Later | Self::StopEc2First => InstanceType::Ec2,
        }
    }

    pub fn direction(&self) -> Direction {
        match self {
            Self::StartRdsFirst | Self::StartEc2Later => Direction::Start,
            Self::StopEc2First | Self::StopRdsLater => Direction::Stop,
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let position = match self {
            Self::StartRdsFirst | Self::StopEc2First => "first",
            Self::StartEc2Later | Self::StopRdsLater => "second",
        };
        write!(f, "{} {} ({position})", self.direction(), self.instance_type())
    }
}

// ---------------------------------------------------------------------------
// Sequencer
// ---------------------------------------------------------------------------

/// Drives the two executor steps of a chain strictly in order. A failed
/// step ends the chain; the remaining step is never invoked and nothing is
/// rolled back.
pub struct Sequencer<'a> {
    executor: ActionExecutor<'a>,
}

impl<'a> Sequencer<'a> {
    pub fn new(executor: ActionExecutor<'a>) -> Self {
        Self { executor }
    }

    /// Run the chain for `direction`, appending one [`StepReport`] per
    /// invoked step to `steps`.
    pub async fn run(
        &self,
        direction: Direction,
        params: &ActionParameters,
        steps: &mut Vec<StepReport>,
    ) -> Result<(), FailureReason> {
        for step in direction.chain() {
            let step_params = params.for_kind(step.instance_type());
            tracing::info!(
                %step,
                instances = step_params.instance_ids.len(),
                "invoking executor"
            );

            let started = Instant::now();
            let outcome = self.executor.execute(step_params).await;
            let elapsed_ms = started.elapsed().as_millis() as u64;
            steps.push(StepReport {
                step,
                outcome: outcome.clone(),
                elapsed_ms,
            });

            match outcome {
                StepOutcome::Succeeded => {
                    tracing::info!(%step, elapsed_ms, "step succeeded");
                }
                StepOutcome::Failed { message } => {
                    tracing::warn!(%step, %message, "step failed");
                    return Err(FailureReason::ExecutorError { step, message });
                }
                StepOutcome::TimedOut => {
                    tracing::warn!(%step, elapsed_ms, "step timed out");
                    return Err(FailureReason::ExecutorTimeout { step });
                }
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
