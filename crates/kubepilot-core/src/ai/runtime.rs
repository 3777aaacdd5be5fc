//! Agent runtime contract
//!
//! The orchestrator talks to the external agent runtime only through these
//! traits. `crate::runtime::client` implements them over stdio JSON-RPC;
//! tests use in-memory fakes.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;

use super::types::{AiTool, ModelInfo};
use crate::tools::ToolHandle;

/// Capacity of the per-turn event channel
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Raw session event emitted by the runtime
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeEvent {
    MessageDelta(String),
    /// Full assistant message; the last one of a turn is the final text
    Message(String),
    ReasoningDelta(String),
    Reasoning(String),
    ToolStart(String),
    ToolComplete(String),
    Error(String),
    /// The turn is over
    Idle,
}

/// Context compaction thresholds for long-lived sessions
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InfiniteSessionConfig {
    pub enabled: bool,
    pub background_compaction_threshold: f64,
    pub buffer_exhaustion_threshold: f64,
}

impl Default for InfiniteSessionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            background_compaction_threshold: 0.80,
            buffer_exhaustion_threshold: 0.95,
        }
    }
}

#[derive(Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AzureProviderOptions {
    pub api_version: String,
}

/// BYOK provider block sent with session creation
#[derive(Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderOverride {
    #[serde(rename = "type")]
    pub provider_type: String,
    #[serde(rename = "baseURL")]
    pub base_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bearer_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wire_api: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub azure: Option<AzureProviderOptions>,
}

impl fmt::Debug for ProviderOverride {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderOverride")
            .field("provider_type", &self.provider_type)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("bearer_token", &self.bearer_token.as_ref().map(|_| "***"))
            .field("wire_api", &self.wire_api)
            .field(
                "azure_api_version",
                &self.azure.as_ref().map(|a| a.api_version.as_str()),
            )
            .finish()
    }
}

/// Snapshot of everything a session is created with
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    pub model: String,
    pub streaming: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_effort: Option<String>,
    pub system_message: String,
    pub tools: Vec<AiTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderOverride>,
    pub infinite_sessions: InfiniteSessionConfig,
}

impl SessionConfig {
    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name.as_str()).collect()
    }
}

/// Keeps an event subscription alive; unsubscribes on drop.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn unsubscribe(mut self) {
        self.cancel_now();
    }

    fn cancel_now(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel_now();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// A live conversation with the runtime
#[async_trait]
pub trait RuntimeSession: Send + Sync {
    fn id(&self) -> &str;

    /// Subscribe to this session's events. The receiver closes once the
    /// subscription is dropped.
    fn subscribe(&self) -> (Subscription, mpsc::Receiver<RuntimeEvent>);

    /// Submit a prompt and wait for the turn to finish. Returns the final
    /// assistant message, if any.
    async fn send_and_wait(&self, prompt: &str) -> Result<Option<String>>;

    async fn destroy(&self) -> Result<()>;
}

/// A started runtime process or service
#[async_trait]
pub trait AgentRuntime: Send + Sync {
    async fn list_models(&self) -> Result<Vec<ModelInfo>>;

    /// Create a session. `tools` are the handlers behind `config.tools`.
    async fn create_session(
        &self,
        config: SessionConfig,
        tools: Vec<ToolHandle>,
    ) -> Result<Arc<dyn RuntimeSession>>;

    async fn stop(&self) -> Result<()>;
}

/// How to start the runtime
#[derive(Clone, Default, PartialEq)]
pub struct LaunchOptions {
    /// Runtime executable; `None` means the launcher's default
    pub cli_path: Option<PathBuf>,
    pub github_token: Option<String>,
    /// Authenticate with the ambient CLI login
    pub use_logged_in_user: bool,
}

impl fmt::Debug for LaunchOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LaunchOptions")
            .field("cli_path", &self.cli_path)
            .field(
                "github_token",
                &self.github_token.as_deref().map(mask_secret),
            )
            .field("use_logged_in_user", &self.use_logged_in_user)
            .finish()
    }
}

/// Starts runtimes. Binary resolution lives here so the orchestrator can
/// report "unavailable" separately from a failed start.
#[async_trait]
pub trait RuntimeLauncher: Send + Sync {
    /// Locate (or provision) the runtime executable.
    async fn resolve_cli(&self) -> Result<Option<PathBuf>> {
        Ok(None)
    }

    async fn launch(&self, options: LaunchOptions) -> Result<Arc<dyn AgentRuntime>>;
}

/// `ghp_...wxyz` style mask for logs
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "***".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}
