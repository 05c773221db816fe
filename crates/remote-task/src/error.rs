use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum InvokeError {
    #[error("invocation of '{address}' timed out after {}s", timeout.as_secs())]
    Timeout { address: String, timeout: Duration },

    /// The collaborator ran and signalled an application-level failure.
    #[error("'{address}' reported failure: {message}")]
    Failed { address: String, message: String },

    /// The collaborator could not be reached at all.
    #[error("could not invoke '{address}': {message}")]
    Transport { address: String, message: String },

    #[error("failed to parse response from '{address}': {source}")]
    Parse {
        address: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid address '{0}'")]
    InvalidAddress(String),
}

impl InvokeError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
