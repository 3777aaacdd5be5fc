//! In-memory runtime, launcher and listener for orchestrator tests

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{mpsc, Notify};

use super::events::Listener;
use super::runtime::{
    AgentRuntime, LaunchOptions, RuntimeEvent, RuntimeLauncher, RuntimeSession, SessionConfig,
    Subscription, EVENT_CHANNEL_CAPACITY,
};
use super::types::ModelInfo;
use crate::error::AiError;
use crate::tools::ToolHandle;

/// How a fake session answers `send_and_wait`
#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    Empty,
    Fail(String),
    /// Never answers
    Hang,
    /// Answers with the text once notified; fails if destroyed first
    Held(Arc<Notify>, String),
}

type Subscribers = Arc<Mutex<Vec<(u64, mpsc::Sender<RuntimeEvent>)>>>;

pub struct FakeSession {
    id: String,
    events: Vec<RuntimeEvent>,
    reply: Reply,
    tools: Vec<ToolHandle>,
    subscribers: Subscribers,
    next_subscriber: AtomicU64,
    prompts: Arc<Mutex<Vec<String>>>,
    destroyed: Arc<Mutex<Vec<String>>>,
    killed: Notify,
}

#[async_trait]
impl RuntimeSession for FakeSession {
    fn id(&self) -> &str {
        &self.id
    }

    fn subscribe(&self) -> (Subscription, mpsc::Receiver<RuntimeEvent>) {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let key = self.next_subscriber.fetch_add(1, Ordering::SeqCst);
        self.subscribers.lock().push((key, tx));
        let subscribers = self.subscribers.clone();
        let subscription = Subscription::new(move || {
            subscribers.lock().retain(|(k, _)| *k != key);
        });
        (subscription, rx)
    }

    async fn send_and_wait(&self, prompt: &str) -> Result<Option<String>> {
        self.prompts.lock().push(prompt.to_string());
        let senders: Vec<_> = self
            .subscribers
            .lock()
            .iter()
            .map(|(_, tx)| tx.clone())
            .collect();
        for event in &self.events {
            for tx in &senders {
                let _ = tx.send(event.clone()).await;
            }
        }
        drop(senders);

        match &self.reply {
            Reply::Text(text) => Ok(Some(text.clone())),
            Reply::Empty => Ok(None),
            Reply::Fail(message) => Err(anyhow!("{}", message)),
            Reply::Hang => std::future::pending().await,
            Reply::Held(release, text) => tokio::select! {
                _ = release.notified() => Ok(Some(text.clone())),
                _ = self.killed.notified() => Err(anyhow!("session destroyed")),
            },
        }
    }

    async fn destroy(&self) -> Result<()> {
        self.destroyed.lock().push(self.id.clone());
        self.killed.notify_one();
        Ok(())
    }
}

pub struct FakeRuntime {
    script: Mutex<(Vec<RuntimeEvent>, Reply)>,
    created: Mutex<Vec<SessionConfig>>,
    sessions: Mutex<Vec<Arc<FakeSession>>>,
    prompts: Arc<Mutex<Vec<String>>>,
    destroyed: Arc<Mutex<Vec<String>>>,
    models: Mutex<Vec<ModelInfo>>,
    fail_models: AtomicBool,
    creation_delay: Mutex<Option<Duration>>,
    stops: AtomicUsize,
    next_id: AtomicUsize,
}

impl Default for FakeRuntime {
    fn default() -> Self {
        Self {
            script: Mutex::new((Vec::new(), Reply::Text("ok".into()))),
            created: Mutex::new(Vec::new()),
            sessions: Mutex::new(Vec::new()),
            prompts: Arc::new(Mutex::new(Vec::new())),
            destroyed: Arc::new(Mutex::new(Vec::new())),
            models: Mutex::new(Vec::new()),
            fail_models: AtomicBool::new(false),
            creation_delay: Mutex::new(None),
            stops: AtomicUsize::new(0),
            next_id: AtomicUsize::new(1),
        }
    }
}

impl FakeRuntime {
    /// Events and reply for sessions created from now on
    pub fn script(&self, events: Vec<RuntimeEvent>, reply: Reply) {
        *self.script.lock() = (events, reply);
    }

    pub fn set_models(&self, models: Vec<ModelInfo>) {
        *self.models.lock() = models;
    }

    pub fn fail_list_models(&self, fail: bool) {
        self.fail_models.store(fail, Ordering::SeqCst);
    }

    pub fn delay_creation(&self, delay: Duration) {
        *self.creation_delay.lock() = Some(delay);
    }

    pub fn created_configs(&self) -> Vec<SessionConfig> {
        self.created.lock().clone()
    }

    pub fn destroyed(&self) -> Vec<String> {
        self.destroyed.lock().clone()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }

    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    /// Subscriptions still registered across all sessions
    pub fn live_subscribers(&self) -> usize {
        self.sessions
            .lock()
            .iter()
            .map(|s| s.subscribers.lock().len())
            .sum()
    }

    /// Tool handlers given to the most recent session
    pub fn live_tool_count(&self) -> usize {
        self.sessions
            .lock()
            .last()
            .map(|s| s.tools.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl AgentRuntime for FakeRuntime {
    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        if self.fail_models.load(Ordering::SeqCst) {
            return Err(anyhow!("models.list: unauthorized"));
        }
        Ok(self.models.lock().clone())
    }

    async fn create_session(
        &self,
        config: SessionConfig,
        tools: Vec<ToolHandle>,
    ) -> Result<Arc<dyn RuntimeSession>> {
        let delay = *self.creation_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.created.lock().push(config);

        let (events, reply) = self.script.lock().clone();
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let session = Arc::new(FakeSession {
            id: format!("session-{}", id),
            events,
            reply,
            tools,
            subscribers: Arc::new(Mutex::new(Vec::new())),
            next_subscriber: AtomicU64::new(0),
            prompts: self.prompts.clone(),
            destroyed: self.destroyed.clone(),
            killed: Notify::new(),
        });
        self.sessions.lock().push(session.clone());
        Ok(session)
    }

    async fn stop(&self) -> Result<()> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct FakeLauncher {
    runtime: Arc<FakeRuntime>,
    launches: AtomicUsize,
    failing_launches: AtomicUsize,
    fail_resolve: AtomicBool,
    last_options: Mutex<Option<LaunchOptions>>,
}

impl FakeLauncher {
    pub fn new(runtime: Arc<FakeRuntime>) -> Self {
        Self {
            runtime,
            launches: AtomicUsize::new(0),
            failing_launches: AtomicUsize::new(0),
            fail_resolve: AtomicBool::new(false),
            last_options: Mutex::new(None),
        }
    }

    pub fn fail_next_launches(&self, count: usize) {
        self.failing_launches.store(count, Ordering::SeqCst);
    }

    pub fn fail_resolve(&self, fail: bool) {
        self.fail_resolve.store(fail, Ordering::SeqCst);
    }

    pub fn launch_count(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn last_options(&self) -> Option<LaunchOptions> {
        self.last_options.lock().clone()
    }
}

#[async_trait]
impl RuntimeLauncher for FakeLauncher {
    async fn resolve_cli(&self) -> Result<Option<PathBuf>> {
        if self.fail_resolve.load(Ordering::SeqCst) {
            return Err(anyhow!("unsupported platform: plan9/mips"));
        }
        Ok(Some(PathBuf::from("/opt/fake/copilot")))
    }

    async fn launch(&self, options: LaunchOptions) -> Result<Arc<dyn AgentRuntime>> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        *self.last_options.lock() = Some(options);
        let failing = self.failing_launches.load(Ordering::SeqCst);
        if failing > 0 {
            self.failing_launches.store(failing - 1, Ordering::SeqCst);
            return Err(anyhow!("launch failed"));
        }
        Ok(self.runtime.clone())
    }
}

/// Records every callback as a short label
#[derive(Default)]
pub struct RecordingListener {
    calls: Mutex<Vec<String>>,
}

impl RecordingListener {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn push(&self, call: String) {
        self.calls.lock().push(call);
    }
}

impl Listener for RecordingListener {
    fn response_start(&self) {
        self.push("start".into());
    }

    fn response_delta(&self, text: &str) {
        self.push(format!("delta:{}", text));
    }

    fn response_complete(&self, text: &str) {
        self.push(format!("complete:{}", text));
    }

    fn response_failed(&self, error: &AiError) {
        self.push(format!("failed:{}", error));
    }

    fn reasoning_delta(&self, text: &str) {
        self.push(format!("reasoning_delta:{}", text));
    }

    fn reasoning_complete(&self, text: &str) {
        self.push(format!("reasoning_complete:{}", text));
    }

    fn tool_start(&self, tool: &str) {
        self.push(format!("tool_start:{}", tool));
    }

    fn tool_complete(&self, tool: &str) {
        self.push(format!("tool_complete:{}", tool));
    }
}
