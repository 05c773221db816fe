use std::fmt;
use std::time::Duration;

use remote_task::{invoke_with_timeout, InvokeError, Invoker};
use serde::{Deserialize, Serialize};

use super::report::FailureReason;

/// The constant payload handed to both oracles on every tick.
pub type WorkflowInput = serde_json::Map<String, serde_json::Value>;

// ---------------------------------------------------------------------------
// Oracle
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Oracle {
    Policy,
    Filter,
}

impl fmt::Display for Oracle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Policy => "policy",
            Self::Filter => "filter",
        })
    }
}

fn oracle_failure(oracle: Oracle, err: InvokeError) -> FailureReason {
    if err.is_timeout() {
        FailureReason::OracleTimeout { oracle }
    } else {
        FailureReason::OracleError {
            oracle,
            message: err.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// PolicyDecision
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDecision {
    pub is_start: bool,
}

/// The policy collaborator may answer `{"is_start": bool}` or a bare boolean.
#[derive(Deserialize)]
#[serde(untagged)]
enum PolicyResponse {
    Bare(bool),
    Object(PolicyDecision),
}

impl From<PolicyResponse> for PolicyDecision {
    fn from(resp: PolicyResponse) -> Self {
        match resp {
            PolicyResponse::Bare(is_start) => Self { is_start },
            PolicyResponse::Object(decision) => decision,
        }
    }
}

// ---------------------------------------------------------------------------
// EligibleInstances
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EligibleInstances {
    pub ec2: Vec<String>,
    pub rds: Vec<String>,
}

// ---------------------------------------------------------------------------
// Clients
// ---------------------------------------------------------------------------

/// Asks the policy collaborator whether now is a start or a stop window.
pub struct PolicyOracle<'a> {
    invoker: &'a dyn Invoker,
    address: &'a str,
    timeout: Duration,
}

impl<'a> PolicyOracle<'a> {
    pub fn new(invoker: &'a dyn Invoker, address: &'a str, timeout: Duration) -> Self {
        Self {
            invoker,
            address,
            timeout,
        }
    }

    pub async fn decide(&self, input: &WorkflowInput) -> Result<PolicyDecision, FailureReason> {
        let payload = serde_json::Value::Object(input.clone());
        let out = invoke_with_timeout(self.invoker, self.address, &payload, self.timeout)
            .await
            .map_err(|e| oracle_failure(Oracle::Policy, e))?;
        serde_json::from_value::<PolicyResponse>(out.clone())
            .map(PolicyDecision::from)
            .map_err(|_| FailureReason::OracleError {
                oracle: Oracle::Policy,
                message: format!("expected {{\"is_start\": bool}} or a boolean, got {out}"),
            })
    }
}

/// Asks the filter collaborator which instances may be touched this run.
pub struct FilterOracle<'a> {
    invoker: &'a dyn Invoker,
    address: &'a str,
    timeout: Duration,
}

impl<'a> FilterOracle<'a> {
    pub fn new(invoker: &'a dyn Invoker, address: &'a str, timeout: Duration) -> Self {
        Self {
            invoker,
            address,
            timeout,
        }
    }

    pub async fn eligible(&self, input: &WorkflowInput) -> Result<EligibleInstances, FailureReason> {
        let payload = serde_json::Value::Object(input.clone());
        let out = invoke_with_timeout(self.invoker, self.address, &payload, self.timeout)
            .await
            .map_err(|e| oracle_failure(Oracle::Filter, e))?;
        serde_json::from_value::<EligibleInstances>(out).map_err(|e| FailureReason::OracleError {
            oracle: Oracle::Filter,
            message: format!("malformed instance list: {e}"),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
