//! The start/stop workflow.
//!
//! One run asks the policy oracle for a direction, asks the filter oracle for
//! eligible instances, builds per-kind executor parameters, and drives exactly
//! one ordered chain:
//!
//! ```text
//! start:  rds ──▶ ec2      (database up first)
//! stop:   ec2 ──▶ rds      (database down last)
//! ```
//!
//! Any failure or timeout ends the run `Failed`; nothing is retried or rolled
//! back. `WorkflowEngine` owns the whole-run budget and returns a `RunReport`.

pub mod engine;
pub mod executor;
pub mod oracle;
pub mod params;
pub mod report;
pub mod sequencer;

pub use engine::WorkflowEngine;
pub use executor::ActionExecutor;
pub use oracle::{EligibleInstances, FilterOracle, Oracle, PolicyDecision, PolicyOracle, WorkflowInput};
pub use params::{build, ActionParameters, InstanceType, ResourceActionParameters};
pub use report::{FailureReason, RunReport, RunStatus, StepOutcome, StepReport, WorkflowState};
pub use sequencer::{Direction, Sequencer, Step};
