use serde::{Deserialize, Serialize};

/// Body of `POST /agents/run-stream`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentStreamRequest {
    /// The user's message text.
    pub message: String,
}

impl AgentStreamRequest {
    /// Creates a new stream request.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
