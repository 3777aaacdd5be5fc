//! JSON-RPC client for the agent runtime
//!
//! One background receive loop per connection routes responses to waiting
//! requests, fans `session.event` notifications out to subscribers, and
//! serves the runtime's callbacks (tool calls, permissions, hooks) on their
//! own tasks so a slow tool never stalls event delivery.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use super::protocol::{
    HookInvocation, Incoming, ModelsListResult, RpcReply, RpcRequest, SessionCreateResult,
    SessionEventParams, SessionRef, SessionSendParams, ToolCallParams, ToolCallResponse,
    INVALID_PARAMS, METHOD_NOT_FOUND,
};
use super::transport::LineTransport;
use crate::ai::runtime::{
    AgentRuntime, RuntimeEvent, RuntimeSession, SessionConfig, Subscription,
    EVENT_CHANNEL_CAPACITY,
};
use crate::ai::types::ModelInfo;
use crate::tools::{execute_tool, ToolContext, ToolHandle, ToolResult};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

type PendingMap = HashMap<i64, oneshot::Sender<Result<Value>>>;

/// In-flight turn of one session
struct Turn {
    last_message: Option<String>,
    done: oneshot::Sender<Result<Option<String>>>,
}

struct SessionState {
    id: String,
    tools: Vec<ToolHandle>,
    subscribers: Mutex<Vec<(u64, mpsc::Sender<RuntimeEvent>)>>,
    next_subscriber: AtomicU64,
    turn: Mutex<Option<Turn>>,
}

impl SessionState {
    fn new(id: String, tools: Vec<ToolHandle>) -> Self {
        Self {
            id,
            tools,
            subscribers: Mutex::new(Vec::new()),
            next_subscriber: AtomicU64::new(0),
            turn: Mutex::new(None),
        }
    }

    /// Fan an event out, then advance the turn it belongs to
    async fn dispatch(&self, event: RuntimeEvent) {
        let senders: Vec<_> = self
            .subscribers
            .lock()
            .iter()
            .map(|(_, tx)| tx.clone())
            .collect();
        for tx in senders {
            let _ = tx.send(event.clone()).await;
        }

        match event {
            RuntimeEvent::Message(text) if !text.is_empty() => {
                if let Some(turn) = self.turn.lock().as_mut() {
                    turn.last_message = Some(text);
                }
            }
            RuntimeEvent::Error(message) => {
                self.finish_turn(Err(anyhow!("{}", message)));
            }
            RuntimeEvent::Idle => {
                let turn = self.turn.lock().take();
                if let Some(turn) = turn {
                    let _ = turn.done.send(Ok(turn.last_message));
                }
            }
            _ => {}
        }
    }

    fn finish_turn(&self, outcome: Result<Option<String>>) {
        let turn = self.turn.lock().take();
        if let Some(turn) = turn {
            let _ = turn.done.send(outcome);
        }
    }
}

/// State shared by the client, its sessions, and the receive loop
struct Shared {
    transport: Arc<LineTransport>,
    next_id: AtomicI64,
    pending: Mutex<PendingMap>,
    sessions: RwLock<HashMap<String, Arc<SessionState>>>,
}

impl Shared {
    async fn request<R: DeserializeOwned>(&self, method: &str, params: Option<Value>) -> Result<R> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let json = serde_json::to_string(&RpcRequest::new(id, method, params))?;
        debug!("Runtime request [{}]: {}", id, method);

        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, tx);

        if let Err(e) = self.transport.send(&json).await {
            self.pending.lock().remove(&id);
            return Err(e.context(format!("{} not sent", method)));
        }

        match tokio::time::timeout(REQUEST_TIMEOUT, rx).await {
            Ok(Ok(Ok(value))) => serde_json::from_value(value)
                .with_context(|| format!("unexpected {} result", method)),
            Ok(Ok(Err(e))) => Err(e.context(method.to_string())),
            Ok(Err(_)) => Err(anyhow!("{}: request cancelled", method)),
            Err(_) => {
                self.pending.lock().remove(&id);
                Err(anyhow!(
                    "{}: request timed out after {}s",
                    method,
                    REQUEST_TIMEOUT.as_secs()
                ))
            }
        }
    }

    async fn reply(&self, reply: RpcReply) {
        match serde_json::to_string(&reply) {
            Ok(json) => {
                if let Err(e) = self.transport.send(&json).await {
                    warn!("Failed to answer runtime request: {}", e);
                }
            }
            Err(e) => error!("Failed to encode runtime reply: {}", e),
        }
    }

    fn session(&self, id: &str) -> Option<Arc<SessionState>> {
        self.sessions.read().get(id).cloned()
    }

    /// Fail everything waiting on the connection
    fn fail_all(&self, reason: &str) {
        let pending: Vec<_> = self.pending.lock().drain().collect();
        for (_, tx) in pending {
            let _ = tx.send(Err(anyhow!("{}", reason)));
        }
        let sessions: Vec<_> = self.sessions.write().drain().map(|(_, s)| s).collect();
        for session in sessions {
            session.finish_turn(Err(anyhow!("{}", reason)));
        }
    }

    async fn handle_message(self: &Arc<Self>, message: &str) -> Result<()> {
        match Incoming::parse(message)? {
            Incoming::Response { id, result } => {
                let tx = self.pending.lock().remove(&id);
                match tx {
                    Some(tx) => {
                        let _ = tx.send(
                            result.map_err(|e| anyhow!("runtime error {}: {}", e.code, e.message)),
                        );
                    }
                    None => debug!("Response for unknown request {}", id),
                }
            }
            Incoming::Notification { method, params } => {
                if method != "session.event" {
                    debug!("Runtime notification: {}", method);
                    return Ok(());
                }
                let params: SessionEventParams = serde_json::from_value(params)?;
                let Some(event) = params.event.to_runtime_event() else {
                    return Ok(());
                };
                match self.session(&params.session_id) {
                    Some(session) => session.dispatch(event).await,
                    None => debug!(session_id = %params.session_id, "Event for unknown session"),
                }
            }
            Incoming::Request { id, method, params } => {
                let shared = Arc::clone(self);
                tokio::spawn(async move {
                    let reply = shared.serve(id, &method, params).await;
                    shared.reply(reply).await;
                });
            }
        }
        Ok(())
    }

    /// Answer a runtime-initiated request
    async fn serve(&self, id: Value, method: &str, params: Value) -> RpcReply {
        match method {
            "tool.call" => match serde_json::from_value::<ToolCallParams>(params) {
                Ok(call) => {
                    let response = self.call_tool(call).await;
                    RpcReply::ok(id, serde_json::to_value(response).unwrap_or_default())
                }
                Err(e) => RpcReply::err(id, INVALID_PARAMS, e.to_string()),
            },
            // Every tool is read-only
            "permission.request" => RpcReply::ok(id, json!({ "kind": "approved" })),
            "hooks.invoke" => match serde_json::from_value::<HookInvocation>(params) {
                Ok(hook) => RpcReply::ok(id, hook_output(&hook)),
                Err(e) => RpcReply::err(id, INVALID_PARAMS, e.to_string()),
            },
            other => {
                warn!("Unhandled runtime request: {}", other);
                RpcReply::err(id, METHOD_NOT_FOUND, format!("unknown method: {}", other))
            }
        }
    }

    async fn call_tool(&self, call: ToolCallParams) -> ToolCallResponse {
        let result = match self.session(&call.session_id) {
            Some(session) => {
                let ctx = ToolContext::for_call(&call.session_id, &call.tool_call_id);
                execute_tool(&session.tools, &call.tool_name, call.arguments, &ctx)
                    .await
                    .unwrap_or_else(|| {
                        ToolResult::error_with_code(
                            "unknown_tool",
                            format!("Unknown tool: {}", call.tool_name),
                        )
                    })
            }
            None => ToolResult::error(format!("Unknown session: {}", call.session_id)),
        };

        ToolCallResponse {
            text_result_for_llm: result.output,
            result_type: if result.is_error { "failure" } else { "success" },
        }
    }
}

/// Session hooks: allow every tool unchanged, retry after errors.
fn hook_output(hook: &HookInvocation) -> Value {
    let tool = hook
        .input
        .get("toolName")
        .and_then(Value::as_str)
        .unwrap_or_default();

    match hook.hook_type.as_str() {
        "preToolUse" => {
            debug!(tool, session_id = %hook.session_id, "Tool invoked");
            json!({
                "permissionDecision": "allow",
                "modifiedArgs": hook.input.get("toolArgs").cloned().unwrap_or(Value::Null),
            })
        }
        "postToolUse" => {
            debug!(tool, session_id = %hook.session_id, "Tool completed");
            json!({})
        }
        "errorOccurred" => {
            let context = hook
                .input
                .get("errorContext")
                .and_then(|v| v.as_str())
                .unwrap_or_default();
            let message = hook
                .input
                .get("error")
                .and_then(|v| v.as_str())
                .unwrap_or_default();
            error!(context, error = message, "Session error");
            json!({ "errorHandling": "retry" })
        }
        _ => json!({}),
    }
}

/// Connection to one runtime process
pub struct RuntimeClient {
    shared: Arc<Shared>,
    shutdown_tx: Mutex<Option<mpsc::Sender<()>>>,
}

impl RuntimeClient {
    /// Start the receive loop over `transport`
    pub fn connect(transport: LineTransport) -> Self {
        let shared = Arc::new(Shared {
            transport: Arc::new(transport),
            next_id: AtomicI64::new(1),
            pending: Mutex::new(HashMap::new()),
            sessions: RwLock::new(HashMap::new()),
        });

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let recv_shared = Arc::clone(&shared);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        debug!("Runtime client shutting down receive loop");
                        break;
                    }
                    result = recv_shared.transport.receive() => {
                        match result {
                            Ok(message) => {
                                if let Err(e) = recv_shared.handle_message(&message).await {
                                    error!("Runtime message error: {}", e);
                                }
                            }
                            Err(e) => {
                                error!("Runtime receive error: {:#}", e);
                                recv_shared.fail_all("agent runtime connection lost");
                                break;
                            }
                        }
                    }
                }
            }
        });

        Self {
            shared,
            shutdown_tx: Mutex::new(Some(shutdown_tx)),
        }
    }

    /// Round-trip check that the runtime is answering
    pub async fn ping(&self) -> Result<()> {
        let _: Value = self.shared.request("ping", Some(json!({}))).await?;
        Ok(())
    }

    /// Whether the runtime process is still running
    pub async fn is_alive(&self) -> bool {
        self.shared.transport.is_alive().await
    }
}

impl Drop for RuntimeClient {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.lock().take() {
            let _ = tx.try_send(());
        }
    }
}

#[async_trait]
impl AgentRuntime for RuntimeClient {
    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let result: ModelsListResult = self.shared.request("models.list", None).await?;
        Ok(result.models)
    }

    async fn create_session(
        &self,
        config: SessionConfig,
        tools: Vec<ToolHandle>,
    ) -> Result<Arc<dyn RuntimeSession>> {
        let params = serde_json::to_value(&config)?;
        let created: SessionCreateResult =
            self.shared.request("session.create", Some(params)).await?;
        info!(
            session_id = %created.session_id,
            model = %config.model,
            tools = tools.len(),
            "Runtime session created"
        );

        let state = Arc::new(SessionState::new(created.session_id.clone(), tools));
        self.shared
            .sessions
            .write()
            .insert(created.session_id, Arc::clone(&state));

        Ok(Arc::new(ClientSession {
            state,
            shared: Arc::clone(&self.shared),
        }))
    }

    async fn stop(&self) -> Result<()> {
        let shutdown = self.shutdown_tx.lock().take();
        if let Some(tx) = shutdown {
            let _ = tx.send(()).await;
        }
        self.shared.fail_all("agent runtime stopped");
        self.shared.transport.shutdown().await;
        Ok(())
    }
}

/// Session handle returned by `RuntimeClient::create_session`
struct ClientSession {
    state: Arc<SessionState>,
    shared: Arc<Shared>,
}

#[async_trait]
impl RuntimeSession for ClientSession {
    fn id(&self) -> &str {
        &self.state.id
    }

    fn subscribe(&self) -> (Subscription, mpsc::Receiver<RuntimeEvent>) {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let key = self.state.next_subscriber.fetch_add(1, Ordering::SeqCst);
        self.state.subscribers.lock().push((key, tx));

        let state = Arc::clone(&self.state);
        let subscription = Subscription::new(move || {
            state.subscribers.lock().retain(|(k, _)| *k != key);
        });
        (subscription, rx)
    }

    async fn send_and_wait(&self, prompt: &str) -> Result<Option<String>> {
        let (tx, rx) = oneshot::channel();
        *self.state.turn.lock() = Some(Turn {
            last_message: None,
            done: tx,
        });

        let params = serde_json::to_value(SessionSendParams {
            session_id: &self.state.id,
            prompt,
        })?;
        if let Err(e) = self
            .shared
            .request::<Value>("session.send", Some(params))
            .await
        {
            self.state.turn.lock().take();
            return Err(e);
        }

        rx.await
            .map_err(|_| anyhow!("agent runtime connection lost"))?
    }

    async fn destroy(&self) -> Result<()> {
        self.shared.sessions.write().remove(&self.state.id);
        self.state.finish_turn(Err(anyhow!("session destroyed")));

        let params = serde_json::to_value(SessionRef {
            session_id: &self.state.id,
        })?;
        let _: Value = self
            .shared
            .request("session.destroy", Some(params))
            .await?;
        debug!(session_id = %self.state.id, "Runtime session destroyed");
        Ok(())
    }
}
