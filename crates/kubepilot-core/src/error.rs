//! Orchestrator error taxonomy
//!
//! Lower layers return `anyhow::Error` with context; the orchestrator wraps
//! them here so callers can tell which phase of a turn failed.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AiError {
    /// AI features are switched off in configuration.
    #[error("AI features are disabled. Enable in config: ai.enabled=true")]
    Disabled,

    /// Lazy initialization failed; the next call retries.
    #[error("AI not ready: {0:#}")]
    NotReady(anyhow::Error),

    #[error("AI client not initialized")]
    NotInitialized,

    #[error("failed to create AI session: {0:#}")]
    SessionCreate(anyhow::Error),

    #[error("AI request failed: {0:#}")]
    Send(anyhow::Error),

    #[error("AI request timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("failed to list models: {0:#}")]
    ListModels(anyhow::Error),

    /// The agent runtime could not be located or provisioned.
    #[error("AI integration unavailable: {0:#}")]
    Unavailable(anyhow::Error),
}

impl AiError {
    /// Whether a later call may succeed without a configuration change.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, AiError::Disabled)
    }
}
