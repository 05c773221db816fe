use crate::output::print_json;
use remote_task::Transport;
use scheduler_core::{
    record::{RunRecord, RunTrigger},
    workflow::{RunReport, RunStatus, StepOutcome, WorkflowEngine},
};
use std::path::Path;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// RunExit: typed non-zero exit codes (no std::process::exit in command code)
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum RunExit {
    /// The run reached the terminal `Failed` state.
    RunFailed { run_id: String, reason: String },
}

impl RunExit {
    pub fn exit_code(&self) -> i32 {
        match self {
            RunExit::RunFailed { .. } => 2,
        }
    }
}

impl std::fmt::Display for RunExit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunExit::RunFailed { run_id, reason } => write!(f, "run {run_id} failed: {reason}"),
        }
    }
}

impl std::error::Error for RunExit {}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

pub fn run(root: &Path, config: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let config = Arc::new(super::load_config(root, config)?);
    let store = super::open_store(root, &config)?;

    let engine = WorkflowEngine::new(config.clone(), Arc::new(Transport::new()));
    let mut record = RunRecord::started(RunTrigger::Manual);
    store.insert(&record)?;

    let rt = tokio::runtime::Runtime::new()?;
    let report = rt.block_on(engine.run_with_id(record.id, &config.input));

    record.complete(&report);
    store.finish(&record)?;

    if json {
        print_json(&report)?;
    } else {
        print_report(&report);
    }

    match &report.status {
        RunStatus::Failed { reason } => Err(RunExit::RunFailed {
            run_id: report.run_id.to_string(),
            reason: reason.to_string(),
        }
        .into()),
        RunStatus::Succeeded | RunStatus::Running => Ok(()),
    }
}

pub fn print_report(report: &RunReport) {
    println!("Run:       {}", report.run_id);
    println!("Status:    {}", report.status.label());
    if let Some(direction) = report.direction {
        println!("Direction: {direction}");
    }
    let states: Vec<&str> = report.states.iter().map(|s| s.as_str()).collect();
    println!("States:    {}", states.join(" -> "));
    let elapsed = report.finished_at - report.started_at;
    println!("Elapsed:   {}ms", elapsed.num_milliseconds());

    if !report.steps.is_empty() {
        println!("Steps:");
        for step in &report.steps {
            let outcome = match &step.outcome {
                StepOutcome::Succeeded => "succeeded".to_string(),
                StepOutcome::TimedOut => "timed out".to_string(),
                StepOutcome::Failed { message } => format!("failed: {message}"),
            };
            println!("  {:<20} {:<24} {}ms", step.step.to_string(), outcome, step.elapsed_ms);
        }
    }

    if let Some(reason) = report.failure() {
        println!("Reason:    {reason}");
    }
}
