//! `remote-task`: invoke an external task with a JSON input and wait for its
//! JSON output, bounded by a timeout.
//!
//! Every external collaborator of the scheduler (policy, filter, start/stop
//! executor) is reached through the same capability: an [`Invoker`] that takes
//! an address and a JSON value and returns a JSON value or an [`InvokeError`].
//!
//! # Architecture
//!
//! ```text
//! address string
//!     │
//!     ▼
//! Address::parse   ← http(s)://…  |  cmd:<shell>  |  <executable>
//!     │
//!     ▼
//! Transport        ← implements Invoker; dispatches per address kind
//!     │
//!     ├── http.rs     POST JSON body, read JSON response
//!     └── process.rs  spawn child, JSON on stdin, JSON on stdout
//!     │
//!     ▼
//! invoke_with_timeout  ← wraps any Invoker in tokio::time::timeout
//! ```
//!
//! # Quick start
//!
//! ```rust,ignore
//! use remote_task::{invoke_with_timeout, Transport};
//! use std::time::Duration;
//!
//! let transport = Transport::new();
//! let out = invoke_with_timeout(
//!     &transport,
//!     "cmd:cat",
//!     &serde_json::json!({"hello": "world"}),
//!     Duration::from_secs(5),
//! )
//! .await?;
//! ```

pub mod address;
pub mod error;
pub mod invoker;

pub(crate) mod http;
pub(crate) mod process;

pub use address::Address;
pub use error::InvokeError;
pub use invoker::{invoke_with_timeout, Invoker, Transport};

/// Convenience `Result` alias for this crate.
pub type Result<T> = std::result::Result<T, InvokeError>;

/// Maximum number of characters of a failing collaborator's diagnostic output
/// carried in an [`InvokeError::Failed`] message.
pub(crate) const DIAGNOSTIC_EXCERPT_CHARS: usize = 500;

/// Parse a collaborator response body. An empty body is `null`.
pub(crate) fn parse_response(address: &str, body: &str) -> Result<serde_json::Value> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Ok(serde_json::Value::Null);
    }
    serde_json::from_str(trimmed).map_err(|source| InvokeError::Parse {
        address: address.to_string(),
        source,
    })
}

pub(crate) fn excerpt(text: &str) -> String {
    text.trim().chars().take(DIAGNOSTIC_EXCERPT_CHARS).collect()
}
