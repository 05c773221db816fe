//! Deterministic collaborator fakes shared by the unit tests.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use remote_task::{InvokeError, Invoker};
use serde_json::{json, Value};

use crate::config::{Collaborators, SchedulerConfig};
use crate::workflow::ResourceActionParameters;

pub(crate) const POLICY: &str = "policy";
pub(crate) const FILTER: &str = "filter";
pub(crate) const EXECUTOR: &str = "start-stop";

pub(crate) fn config() -> SchedulerConfig {
    SchedulerConfig::new(
        Collaborators {
            policy: POLICY.into(),
            filter_out: FILTER.into(),
            start_stop: EXECUTOR.into(),
        },
        "rate(1 hour)",
    )
}

#[derive(Debug, Clone)]
pub(crate) enum Reply {
    Value(Value),
    Fail(String),
    Delayed(Duration, Value),
    Hang,
}

impl Reply {
    pub(crate) fn value(v: Value) -> Self {
        Self::Value(v)
    }

    pub(crate) fn fail(message: &str) -> Self {
        Self::Fail(message.to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Call {
    pub address: String,
    pub input: Value,
}

/// Answers by address; executor calls are answered per `instance_type`.
/// Every call is recorded before it is answered.
pub(crate) struct ScriptedInvoker {
    policy: Reply,
    filter: Reply,
    rds: Reply,
    ec2: Reply,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedInvoker {
    pub(crate) fn new() -> Self {
        Self {
            policy: Reply::Value(json!({"is_start": true})),
            filter: Reply::Value(json!({"ec2": [], "rds": []})),
            rds: Reply::Value(Value::Null),
            ec2: Reply::Value(Value::Null),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn policy(mut self, reply: Reply) -> Self {
        self.policy = reply;
        self
    }

    pub(crate) fn filter(mut self, reply: Reply) -> Self {
        self.filter = reply;
        self
    }

    pub(crate) fn rds(mut self, reply: Reply) -> Self {
        self.rds = reply;
        self
    }

    pub(crate) fn ec2(mut self, reply: Reply) -> Self {
        self.ec2 = reply;
        self
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn take_calls(&self) -> Vec<Call> {
        std::mem::take(&mut *self.calls.lock().unwrap())
    }

    pub(crate) fn addresses(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.address).collect()
    }

    pub(crate) fn executor_calls(&self) -> Vec<ResourceActionParameters> {
        self.calls()
            .into_iter()
            .filter(|c| c.address == EXECUTOR)
            .map(|c| serde_json::from_value(c.input).unwrap())
            .collect()
    }
}

#[async_trait]
impl Invoker for ScriptedInvoker {
    async fn invoke(&self, address: &str, input: &Value) -> remote_task::Result<Value> {
        self.calls.lock().unwrap().push(Call {
            address: address.to_string(),
            input: input.clone(),
        });

        let reply = match address {
            POLICY => self.policy.clone(),
            FILTER => self.filter.clone(),
            EXECUTOR => match input.get("instance_type").and_then(Value::as_str) {
                Some("rds") => self.rds.clone(),
                _ => self.ec2.clone(),
            },
            other => {
                return Err(InvokeError::Transport {
                    address: other.to_string(),
                    message: "unknown address".into(),
                })
            }
        };

        match reply {
            Reply::Value(v) => Ok(v),
            Reply::Fail(message) => Err(InvokeError::Failed {
                address: address.to_string(),
                message,
            }),
            Reply::Delayed(delay, v) => {
                tokio::time::sleep(delay).await;
                Ok(v)
            }
            Reply::Hang => std::future::pending().await,
        }
    }
}
