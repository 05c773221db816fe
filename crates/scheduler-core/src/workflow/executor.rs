use remote_task::{invoke_with_timeout, Invoker};

use crate::config::Timeouts;

use super::params::ResourceActionParameters;
use super::report::StepOutcome;

/// Invokes the start/stop collaborator for one resource kind.
///
/// The bound differs per kind (`timeouts.rds_seconds` / `timeouts.ec2_seconds`).
/// The collaborator's response payload is discarded.
pub struct ActionExecutor<'a> {
    invoker: &'a dyn Invoker,
    address: &'a str,
    timeouts: &'a Timeouts,
}

impl<'a> ActionExecutor<'a> {
    pub fn new(invoker: &'a dyn Invoker, address: &'a str, timeouts: &'a Timeouts) -> Self {
        Self {
            invoker,
            address,
            timeouts,
        }
    }

    pub async fn execute(&self, params: &ResourceActionParameters) -> StepOutcome {
        let input = match serde_json::to_value(params) {
            Ok(v) => v,
            Err(e) => {
                return StepOutcome::Failed {
                    message: format!("failed to encode parameters: {e}"),
                }
            }
        };
        let timeout = self.timeouts.for_kind(params.instance_type);
        match invoke_with_timeout(self.invoker, self.address, &input, timeout).await {
            Ok(_) => StepOutcome::Succeeded,
            Err(e) if e.is_timeout() => StepOutcome::TimedOut,
            Err(e) => StepOutcome::Failed {
                message: e.to_string(),
            },
        }
    }
}
