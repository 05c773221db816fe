use std::sync::Arc;

use chrono::Utc;
use remote_task::Invoker;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::SchedulerConfig;

use super::executor::ActionExecutor;
use super::oracle::{FilterOracle, PolicyOracle, WorkflowInput};
use super::params;
use super::report::{FailureReason, RunReport, RunStatus, StepReport, WorkflowState};
use super::sequencer::{Direction, Sequencer};

// ---------------------------------------------------------------------------
// Journal
// ---------------------------------------------------------------------------

/// What a run has done so far. Survives the run future being dropped by the
/// whole-run timeout, so a timed-out run still reports how far it got.
#[derive(Debug)]
struct Journal {
    states: Vec<WorkflowState>,
    steps: Vec<StepReport>,
    direction: Option<Direction>,
}

impl Journal {
    fn new() -> Self {
        Self {
            states: vec![WorkflowState::Init],
            steps: Vec::new(),
            direction: None,
        }
    }

    fn current(&self) -> WorkflowState {
        self.states.last().copied().unwrap_or(WorkflowState::Init)
    }

    fn enter(&mut self, state: WorkflowState) {
        tracing::info!(from = %self.current(), to = %state, "transition");
        self.states.push(state);
    }
}

// ---------------------------------------------------------------------------
// WorkflowEngine
// ---------------------------------------------------------------------------

/// Runs the fixed start/stop workflow: policy → filter → parameters →
/// direction → ordered executor chain.
///
/// The engine holds only immutable configuration and the invoker; every call
/// to [`run`](Self::run) builds a fresh object graph, so concurrent runs share
/// nothing mutable.
pub struct WorkflowEngine {
    config: Arc<SchedulerConfig>,
    invoker: Arc<dyn Invoker>,
}

impl WorkflowEngine {
    pub fn new(config: Arc<SchedulerConfig>, invoker: Arc<dyn Invoker>) -> Self {
        Self { config, invoker }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Execute one run with a fresh run id.
    pub async fn run(&self, input: &WorkflowInput) -> RunReport {
        self.run_with_id(Uuid::new_v4(), input).await
    }

    /// Execute one run under a caller-chosen id (used when a run record is
    /// written before the run starts).
    pub async fn run_with_id(&self, run_id: Uuid, input: &WorkflowInput) -> RunReport {
        let span = tracing::info_span!("run", %run_id);
        async move {
            let started_at = Utc::now();
            let budget = self.config.timeouts.run();
            let mut journal = Journal::new();
            tracing::info!(budget_secs = budget.as_secs(), "run started");

            let outcome = tokio::time::timeout(budget, self.drive(input, &mut journal)).await;

            let status = match outcome {
                Ok(Ok(())) => {
                    journal.enter(WorkflowState::Succeeded);
                    RunStatus::Succeeded
                }
                Ok(Err(reason)) => {
                    journal.enter(WorkflowState::Failed);
                    RunStatus::Failed { reason }
                }
                Err(_) => {
                    let in_flight = journal.current();
                    journal.enter(WorkflowState::Failed);
                    RunStatus::Failed {
                        reason: FailureReason::WorkflowTimeout {
                            budget_seconds: budget.as_secs(),
                            in_flight,
                        },
                    }
                }
            };

            match &status {
                RunStatus::Failed { reason } => tracing::error!(%reason, "run failed"),
                RunStatus::Succeeded | RunStatus::Running => tracing::info!("run succeeded"),
            }

            RunReport {
                run_id,
                started_at,
                finished_at: Utc::now(),
                direction: journal.direction,
                states: journal.states,
                steps: journal.steps,
                status,
            }
        }
        .instrument(span)
        .await
    }

    async fn drive(
        &self,
        input: &WorkflowInput,
        journal: &mut Journal,
    ) -> Result<(), FailureReason> {
        let invoker = self.invoker.as_ref();
        let collaborators = &self.config.collaborators;
        let timeouts = &self.config.timeouts;

        let decision = PolicyOracle::new(invoker, &collaborators.policy, timeouts.policy())
            .decide(input)
            .await?;
        tracing::info!(is_start = decision.is_start, "policy decided");
        journal.enter(WorkflowState::PolicyEvaluated);

        let instances = FilterOracle::new(invoker, &collaborators.filter_out, timeouts.filter())
            .eligible(input)
            .await?;
        tracing::info!(
            ec2 = instances.ec2.len(),
            rds = instances.rds.len(),
            "instances filtered"
        );
        journal.enter(WorkflowState::InstancesFiltered);

        let params = params::build(&decision, &instances);
        journal.enter(WorkflowState::ParametersBuilt);

        let direction = Direction::route(&decision);
        journal.direction = Some(direction);
        journal.enter(direction.state());

        let executor = ActionExecutor::new(invoker, &collaborators.start_stop, timeouts);
        Sequencer::new(executor)
            .run(direction, &params, &mut journal.steps)
            .await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{config, Reply, ScriptedInvoker, EXECUTOR, FILTER, POLICY};
    use crate::workflow::oracle::Oracle;
    use crate::workflow::params::{InstanceType, ResourceActionParameters};
    use crate::workflow::report::StepOutcome;
    use crate::workflow::sequencer::Step;
    use serde_json::json;
    use std::time::Duration;

    fn engine(invoker: &Arc<ScriptedInvoker>) -> WorkflowEngine {
        WorkflowEngine::new(Arc::new(config()), invoker.clone())
    }

    fn input() -> WorkflowInput {
        json!({"environment": "dev"}).as_object().cloned().unwrap()
    }

    fn ids(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn start_scenario_runs_rds_then_ec2() {
        let invoker = Arc::new(
            ScriptedInvoker::new()
                .policy(Reply::value(json!({"is_start": true})))
                .filter(Reply::value(json!({"ec2": ["i-1", "i-2"], "rds": ["db-1"]}))),
        );
        let report = engine(&invoker).run(&input()).await;

        assert!(report.succeeded(), "{:?}", report.status);
        assert_eq!(
            invoker.executor_calls(),
            vec![
                ResourceActionParameters {
                    is_start: true,
                    instance_type: InstanceType::Rds,
                    instance_ids: ids(&["db-1"]),
                },
                ResourceActionParameters {
                    is_start: true,
                    instance_type: InstanceType::Ec2,
                    instance_ids: ids(&["i-1", "i-2"]),
                },
            ]
        );
        assert_eq!(report.direction, Some(Direction::Start));
        assert_eq!(
            report.states,
            vec![
                WorkflowState::Init,
                WorkflowState::PolicyEvaluated,
                WorkflowState::InstancesFiltered,
                WorkflowState::ParametersBuilt,
                WorkflowState::Starting,
                WorkflowState::Succeeded,
            ]
        );
    }

    #[tokio::test]
    async fn stop_scenario_with_empty_database_set() {
        let invoker = Arc::new(
            ScriptedInvoker::new()
                .policy(Reply::value(json!({"is_start": false})))
                .filter(Reply::value(json!({"ec2": ["i-9"], "rds": []}))),
        );
        let report = engine(&invoker).run(&input()).await;

        assert!(report.succeeded());
        let calls = invoker.executor_calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].instance_type, InstanceType::Ec2);
        assert_eq!(calls[0].instance_ids, ids(&["i-9"]));
        assert!(!calls[0].is_start);
        assert_eq!(calls[1].instance_type, InstanceType::Rds);
        assert!(calls[1].instance_ids.is_empty());
        assert_eq!(report.final_state(), WorkflowState::Succeeded);
        assert!(report.states.contains(&WorkflowState::Stopping));
    }

    #[tokio::test]
    async fn failed_rds_start_never_touches_ec2() {
        let invoker = Arc::new(
            ScriptedInvoker::new()
                .policy(Reply::value(json!(true)))
                .filter(Reply::value(json!({"ec2": ["i-1"], "rds": ["db-1"]})))
                .rds(Reply::fail("db-1 in incompatible state")),
        );
        let report = engine(&invoker).run(&input()).await;

        let calls = invoker.executor_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].instance_type, InstanceType::Rds);
        match report.failure() {
            Some(FailureReason::ExecutorError { step, message }) => {
                assert_eq!(*step, Step::StartRdsFirst);
                assert!(message.contains("incompatible state"));
            }
            other => panic!("expected ExecutorError, got {other:?}"),
        }
        assert_eq!(report.final_state(), WorkflowState::Failed);
        assert_eq!(report.steps.len(), 1);
    }

    #[tokio::test]
    async fn policy_failure_touches_nothing() {
        let invoker = Arc::new(ScriptedInvoker::new().policy(Reply::fail("no calendar")));
        let report = engine(&invoker).run(&input()).await;

        assert!(matches!(
            report.failure(),
            Some(FailureReason::OracleError {
                oracle: Oracle::Policy,
                ..
            })
        ));
        assert_eq!(invoker.addresses(), vec![POLICY]);
        assert_eq!(report.direction, None);
        assert_eq!(
            report.states,
            vec![WorkflowState::Init, WorkflowState::Failed]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn policy_timeout_touches_nothing() {
        let invoker = Arc::new(ScriptedInvoker::new().policy(Reply::Hang));
        let report = engine(&invoker).run(&input()).await;

        assert_eq!(
            report.failure(),
            Some(&FailureReason::OracleTimeout {
                oracle: Oracle::Policy
            })
        );
        assert_eq!(invoker.addresses(), vec![POLICY]);
    }

    #[tokio::test]
    async fn filter_failure_touches_no_instances() {
        let invoker = Arc::new(ScriptedInvoker::new().filter(Reply::fail("tag lookup failed")));
        let report = engine(&invoker).run(&input()).await;

        assert!(matches!(
            report.failure(),
            Some(FailureReason::OracleError {
                oracle: Oracle::Filter,
                ..
            })
        ));
        assert_eq!(invoker.addresses(), vec![POLICY, FILTER]);
        assert!(report.steps.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn filter_timeout_touches_no_instances() {
        let invoker = Arc::new(ScriptedInvoker::new().filter(Reply::Hang));
        let report = engine(&invoker).run(&input()).await;

        assert_eq!(
            report.failure(),
            Some(&FailureReason::OracleTimeout {
                oracle: Oracle::Filter
            })
        );
        assert_eq!(invoker.addresses(), vec![POLICY, FILTER]);
        assert!(invoker.executor_calls().is_empty());
        assert!(report.steps.is_empty());
        assert_eq!(report.direction, None);
        assert_eq!(
            report.states,
            vec![
                WorkflowState::Init,
                WorkflowState::PolicyEvaluated,
                WorkflowState::Failed,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn whole_run_budget_stops_the_run() {
        let mut cfg = config();
        cfg.timeouts.run_seconds = 60;
        let invoker = Arc::new(
            ScriptedInvoker::new()
                .policy(Reply::Delayed(Duration::from_secs(30), json!(true)))
                .filter(Reply::Delayed(
                    Duration::from_secs(40),
                    json!({"ec2": ["i-1"], "rds": ["db-1"]}),
                )),
        );
        let engine = WorkflowEngine::new(Arc::new(cfg), invoker.clone());
        let report = engine.run(&input()).await;

        assert_eq!(
            report.failure(),
            Some(&FailureReason::WorkflowTimeout {
                budget_seconds: 60,
                in_flight: WorkflowState::PolicyEvaluated,
            })
        );
        assert!(invoker.executor_calls().is_empty());

        // Nothing else is invoked after the budget fires.
        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert_eq!(invoker.addresses(), vec![POLICY, FILTER]);
    }

    #[tokio::test(start_paused = true)]
    async fn budget_expiring_mid_chain_fails_the_run() {
        let mut cfg = config();
        cfg.timeouts.run_seconds = 600;
        let invoker = Arc::new(
            ScriptedInvoker::new()
                .policy(Reply::value(json!(false)))
                .filter(Reply::value(json!({"ec2": ["i-1"], "rds": ["db-1"]})))
                .ec2(Reply::Delayed(Duration::from_secs(290), json!(null)))
                .rds(Reply::Delayed(Duration::from_secs(400), json!(null))),
        );
        let engine = WorkflowEngine::new(Arc::new(cfg), invoker.clone());
        let report = engine.run(&input()).await;

        assert!(matches!(
            report.failure(),
            Some(FailureReason::WorkflowTimeout {
                in_flight: WorkflowState::Stopping,
                ..
            })
        ));
        assert_eq!(report.steps.len(), 1);
        assert_eq!(report.steps[0].outcome, StepOutcome::Succeeded);
        assert_eq!(invoker.executor_calls().len(), 2);
    }

    #[tokio::test]
    async fn identical_runs_are_repeatable() {
        let invoker = Arc::new(
            ScriptedInvoker::new()
                .policy(Reply::value(json!(true)))
                .filter(Reply::value(json!({"ec2": ["i-1"], "rds": ["db-1", "db-2"]}))),
        );
        let engine = engine(&invoker);

        let first = engine.run(&input()).await;
        let first_calls = invoker.take_calls();
        let second = engine.run(&input()).await;
        let second_calls = invoker.take_calls();

        assert!(first.succeeded() && second.succeeded());
        assert_ne!(first.run_id, second.run_id);
        assert_eq!(first_calls, second_calls);
        assert_eq!(
            first_calls.iter().map(|c| c.address.as_str()).collect::<Vec<_>>(),
            vec![POLICY, FILTER, EXECUTOR, EXECUTOR]
        );
    }
}
