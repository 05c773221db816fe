use std::time::Duration;

use async_trait::async_trait;

use crate::address::Address;
use crate::{http, process, InvokeError, Result};

// ─── Invoker ──────────────────────────────────────────────────────────────

/// The single capability used to reach every external collaborator.
///
/// Implementations must not apply their own timeout; callers bound each call
/// with [`invoke_with_timeout`].
#[async_trait]
pub trait Invoker: Send + Sync {
    async fn invoke(&self, address: &str, input: &serde_json::Value) -> Result<serde_json::Value>;
}

/// Invoke `address` through `invoker`, failing with [`InvokeError::Timeout`]
/// if no response arrives within `timeout`. The in-flight call is dropped on
/// timeout.
pub async fn invoke_with_timeout(
    invoker: &dyn Invoker,
    address: &str,
    input: &serde_json::Value,
    timeout: Duration,
) -> Result<serde_json::Value> {
    match tokio::time::timeout(timeout, invoker.invoke(address, input)).await {
        Ok(result) => result,
        Err(_) => Err(InvokeError::Timeout {
            address: address.to_string(),
            timeout,
        }),
    }
}

// ─── Transport ────────────────────────────────────────────────────────────

/// The production [`Invoker`]: dispatches on the [`Address`] kind.
#[derive(Debug, Clone, Default)]
pub struct Transport {
    client: reqwest::Client,
}

impl Transport {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Invoker for Transport {
    async fn invoke(&self, address: &str, input: &serde_json::Value) -> Result<serde_json::Value> {
        match Address::parse(address)? {
            Address::Http(url) => http::post_json(&self.client, &url, input).await,
            Address::Shell(command) => {
                process::run_json(process::shell_command(&command), address, input).await
            }
            Address::Program(path) => {
                process::run_json(process::program_command(&path), address, input).await
            }
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Never;

    #[async_trait]
    impl Invoker for Never {
        async fn invoke(&self, _: &str, _: &serde_json::Value) -> Result<serde_json::Value> {
            std::future::pending().await
        }
    }

    struct Echo;

    #[async_trait]
    impl Invoker for Echo {
        async fn invoke(&self, _: &str, input: &serde_json::Value) -> Result<serde_json::Value> {
            Ok(input.clone())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn pending_call_times_out() {
        let err = invoke_with_timeout(&Never, "policy", &json!({}), Duration::from_secs(180))
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        assert!(err.to_string().contains("180s"));
    }

    #[tokio::test(start_paused = true)]
    async fn fast_call_passes_through() {
        let out = invoke_with_timeout(&Echo, "policy", &json!({"a": 1}), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(out, json!({"a": 1}));
    }

    #[tokio::test]
    async fn transport_runs_shell_addresses() {
        let out = Transport::new()
            .invoke("cmd:cat", &json!({"ec2": [], "rds": []}))
            .await
            .unwrap();
        assert_eq!(out, json!({"ec2": [], "rds": []}));
    }

    #[tokio::test]
    async fn transport_times_out_slow_subprocess() {
        let err = invoke_with_timeout(
            &Transport::new(),
            "cmd:sleep 5",
            &json!({}),
            Duration::from_millis(100),
        )
        .await
        .unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn transport_rejects_empty_address() {
        let err = Transport::new().invoke("", &json!({})).await.unwrap_err();
        assert!(matches!(err, InvokeError::InvalidAddress(_)));
    }
}
