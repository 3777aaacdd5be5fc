//! Agent runtime wire types (JSON-RPC 2.0)
//!
//! Requests flow both ways: the client drives sessions, the runtime calls
//! back for tool execution, permissions and hooks.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ai::runtime::RuntimeEvent;
use crate::ai::types::ModelInfo;

pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;

/// Client -> runtime request
#[derive(Debug, Serialize)]
pub struct RpcRequest {
    pub jsonrpc: &'static str,
    pub id: i64,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl RpcRequest {
    pub fn new(id: i64, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method: method.into(),
            params,
        }
    }
}

/// Client -> runtime answer to a runtime-initiated request
#[derive(Debug, Serialize)]
pub struct RpcReply {
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl RpcReply {
    pub fn ok(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn err(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(RpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Any message read from the runtime
#[derive(Debug, Deserialize)]
struct RawMessage {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    params: Option<Value>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

/// A decoded runtime message
#[derive(Debug)]
pub enum Incoming {
    /// Answer to one of our requests
    Response {
        id: i64,
        result: std::result::Result<Value, RpcError>,
    },
    /// The runtime wants something from us
    Request {
        id: Value,
        method: String,
        params: Value,
    },
    Notification { method: String, params: Value },
}

impl Incoming {
    pub fn parse(line: &str) -> Result<Self> {
        let raw: RawMessage = serde_json::from_str(line)?;
        let params = raw.params.unwrap_or(Value::Null);

        match (raw.id, raw.method) {
            (Some(id), Some(method)) => Ok(Incoming::Request { id, method, params }),
            (None, Some(method)) => Ok(Incoming::Notification { method, params }),
            (Some(id), None) => {
                let id = id
                    .as_i64()
                    .ok_or_else(|| anyhow!("response with non-numeric id: {}", id))?;
                let result = match raw.error {
                    Some(error) => Err(error),
                    None => Ok(raw.result.unwrap_or(Value::Null)),
                };
                Ok(Incoming::Response { id, result })
            }
            (None, None) => Err(anyhow!("message has neither id nor method")),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ModelsListResult {
    #[serde(default)]
    pub models: Vec<ModelInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCreateResult {
    pub session_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSendParams<'a> {
    pub session_id: &'a str,
    pub prompt: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRef<'a> {
    pub session_id: &'a str,
}

/// `session.event` notification body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEventParams {
    pub session_id: String,
    pub event: WireEvent,
}

#[derive(Debug, Deserialize)]
pub struct WireEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub data: Value,
}

impl WireEvent {
    /// Map to a `RuntimeEvent`; event types the orchestrator ignores yield `None`.
    pub fn to_runtime_event(&self) -> Option<RuntimeEvent> {
        let text = |key: &str| {
            self.data
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        let event = match self.event_type.as_str() {
            "assistant.message_delta" => RuntimeEvent::MessageDelta(text("deltaContent")),
            "assistant.message" => RuntimeEvent::Message(text("content")),
            "assistant.reasoning_delta" => RuntimeEvent::ReasoningDelta(text("deltaContent")),
            "assistant.reasoning" => RuntimeEvent::Reasoning(text("content")),
            "tool.execution_start" => RuntimeEvent::ToolStart(text("toolName")),
            "tool.execution_complete" => RuntimeEvent::ToolComplete(text("toolName")),
            "session.error" => RuntimeEvent::Error(text("message")),
            "session.idle" => RuntimeEvent::Idle,
            _ => return None,
        };
        Some(event)
    }
}

/// `tool.call` request body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallParams {
    pub session_id: String,
    #[serde(default)]
    pub tool_call_id: String,
    pub tool_name: String,
    #[serde(default)]
    pub arguments: Value,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallResponse {
    pub text_result_for_llm: String,
    /// "success" or "failure"
    pub result_type: &'static str,
}

/// `hooks.invoke` request body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookInvocation {
    #[serde(default)]
    pub session_id: String,
    pub hook_type: String,
    #[serde(default)]
    pub input: Value,
}
