//! Tool registry for the cluster tools exposed to the agent runtime
//!
//! Tools are kept in registration order so skill filtering is stable.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;

use crate::ai::types::AiTool;
use crate::skills::NamedTool;

/// Default tool execution timeout (2 minutes)
const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(120);

/// Tool execution result
#[derive(Debug, Clone)]
pub struct ToolResult {
    pub output: String,
    pub is_error: bool,
}

impl ToolResult {
    /// Create a structured success envelope with `ok=true` and `data`.
    pub fn success_data(data: Value) -> Self {
        let mut envelope = serde_json::Map::new();
        envelope.insert("ok".to_string(), Value::Bool(true));
        envelope.insert("data".to_string(), data);

        Self {
            output: Value::Object(envelope).to_string(),
            is_error: false,
        }
    }

    /// Create a structured error with explicit code.
    pub fn error_with_code(code: &str, msg: impl std::fmt::Display) -> Self {
        let envelope = serde_json::json!({
            "ok": false,
            "error": {
                "code": code,
                "message": msg.to_string()
            }
        });

        Self {
            output: envelope.to_string(),
            is_error: true,
        }
    }

    /// Create an invalid-parameters error.
    pub fn invalid_parameters(msg: impl std::fmt::Display) -> Self {
        Self::error_with_code("invalid_parameters", msg)
    }

    /// Create an error result with JSON-formatted error message
    pub fn error(msg: impl std::fmt::Display) -> Self {
        let message = msg.to_string();
        let code = classify_error_code(&message);
        Self::error_with_code(code, message)
    }

    /// Error from an `anyhow` chain, keeping every cause in the message
    pub fn from_error(err: &anyhow::Error) -> Self {
        Self::error(format!("{:#}", err))
    }
}

/// Parse tool parameters, returning a ToolResult error on failure
pub fn parse_params<T: serde::de::DeserializeOwned>(params: Value) -> Result<T, ToolResult> {
    // Runtimes send `null` for tools without arguments
    let params = if params.is_null() {
        Value::Object(Default::default())
    } else {
        params
    };
    serde_json::from_value(params)
        .map_err(|e| ToolResult::invalid_parameters(format!("Invalid parameters: {}", e)))
}

fn classify_error_code(message: &str) -> &'static str {
    let lower = message.to_ascii_lowercase();
    if lower.contains("invalid parameters")
        || lower.contains("missing field")
        || lower.contains("unknown field")
    {
        "invalid_parameters"
    } else if lower.contains("not found") {
        "not_found"
    } else if lower.contains("forbidden") {
        "forbidden"
    } else if lower.contains("timed out") || lower.contains("timeout") {
        "timeout"
    } else if lower.contains("unknown tool") {
        "unknown_tool"
    } else {
        "tool_error"
    }
}

/// Per-invocation context
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    pub session_id: Option<String>,
    pub tool_call_id: Option<String>,
    /// Optional per-call timeout override
    pub timeout: Option<Duration>,
}

impl ToolContext {
    pub fn for_call(session_id: impl Into<String>, tool_call_id: impl Into<String>) -> Self {
        Self {
            session_id: Some(session_id.into()),
            tool_call_id: Some(tool_call_id.into()),
            timeout: None,
        }
    }
}

/// Trait for tool implementations
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name (id)
    fn name(&self) -> &str;

    /// Tool description for AI
    fn description(&self) -> &str;

    /// JSON schema for parameters
    fn parameters_schema(&self) -> Value;

    /// Execute the tool
    async fn execute(&self, params: Value, ctx: &ToolContext) -> ToolResult;
}

/// Shared tool handle; filtering clones the handle, never the tool.
pub type ToolHandle = Arc<dyn Tool>;

impl NamedTool for ToolHandle {
    fn tool_name(&self) -> &str {
        self.name()
    }
}

/// Provider-facing descriptor for a tool
pub fn describe(tool: &dyn Tool) -> AiTool {
    AiTool {
        name: tool.name().to_string(),
        description: tool.description().to_string(),
        input_schema: tool.parameters_schema(),
    }
}

/// Execute `name` from `tools` with a timeout. `None` if no such tool.
pub async fn execute_tool(
    tools: &[ToolHandle],
    name: &str,
    params: Value,
    ctx: &ToolContext,
) -> Option<ToolResult> {
    let tool = tools.iter().find(|t| t.name() == name)?;
    let timeout = ctx.timeout.unwrap_or(DEFAULT_TOOL_TIMEOUT);
    let start = Instant::now();

    let result = match tokio::time::timeout(timeout, tool.execute(params, ctx)).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(
                tool = name,
                timeout_secs = timeout.as_secs(),
                "Tool execution timed out"
            );
            ToolResult::error_with_code(
                "timeout",
                format!(
                    "Tool '{}' timed out after {} seconds",
                    name,
                    timeout.as_secs()
                ),
            )
        }
    };

    tracing::debug!(
        tool = name,
        is_error = result.is_error,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Tool completed"
    );
    Some(result)
}

/// Registry holding the full, ordered tool set
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: Vec<ToolHandle>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, replacing any tool with the same name in place
    pub fn register(&mut self, tool: ToolHandle) {
        if let Some(existing) = self.tools.iter_mut().find(|t| t.name() == tool.name()) {
            *existing = tool;
        } else {
            self.tools.push(tool);
        }
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<ToolHandle> {
        self.tools.iter().find(|t| t.name() == name).cloned()
    }

    /// All tools in registration order
    pub fn all(&self) -> Vec<ToolHandle> {
        self.tools.clone()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Get all tools as AI tool definitions
    pub fn ai_tools(&self) -> Vec<AiTool> {
        self.tools.iter().map(|t| describe(t.as_ref())).collect()
    }

    /// Execute a tool by name with timeout
    pub async fn execute(&self, name: &str, params: Value, ctx: &ToolContext) -> Option<ToolResult> {
        execute_tool(&self.tools, name, params, ctx).await
    }
}
