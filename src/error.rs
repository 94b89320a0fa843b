//! Error types for the onboarding engine.

use std::time::Duration;

use uuid::Uuid;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Inference error: {0}")]
    Llm(#[from] LlmError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),

    #[error("Orchestration error: {0}")]
    Orchestration(#[from] OrchestrationError),
}

/// Knowledge store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Text inference provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },
}

/// Conversation session errors. These surface to API callers with a
/// stable error code.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Session {id} not found or no longer active")]
    UnknownSession { id: Uuid },

    #[error("Session {id} is processing another message")]
    SessionBusy { id: Uuid },
}

impl SessionError {
    /// Stable machine-readable code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownSession { .. } => "unknown_session",
            Self::SessionBusy { .. } => "session_busy",
        }
    }
}

/// Specialist agent execution errors.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("Agent {agent} execution failed: {reason}")]
    ExecutionFailed { agent: String, reason: String },

    #[error("Agent {agent} timed out after {timeout:?}")]
    Timeout { agent: String, timeout: Duration },

    #[error("Agent {agent} received invalid input: {reason}")]
    InvalidInput { agent: String, reason: String },
}

/// Orchestration pipeline errors.
#[derive(Debug, thiserror::Error)]
pub enum OrchestrationError {
    #[error("Run {id} not found")]
    RunNotFound { id: Uuid },

    #[error("Orchestration queue is closed")]
    QueueClosed,
}

/// Result type alias for the engine.
pub type Result<T> = std::result::Result<T, Error>;
