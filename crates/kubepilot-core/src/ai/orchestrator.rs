//! AI session orchestrator
//!
//! Owns the runtime connection and the single live session. State lives
//! behind one `RwLock` that is never held across an `.await`: each operation
//! snapshots what it needs, releases the lock, does the network call, then
//! re-takes the lock to commit. A generation counter detects model/skill
//! switches that happened while a session was being created. A session
//! detached while a turn is still running on it is destroyed once that
//! turn ends.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use parking_lot::RwLock;
use tokio::sync::Mutex;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, error, info, warn};

use super::events::{relay, Listener, SessionEvent};
use super::prompt::compose_system_message;
use super::runtime::{
    AgentRuntime, AzureProviderOptions, InfiniteSessionConfig, LaunchOptions, ProviderOverride,
    RuntimeLauncher, RuntimeSession, SessionConfig,
};
use super::types::ModelInfo;
use crate::config::AiConfig;
use crate::error::AiError;
use crate::skills::SkillRegistry;
use crate::tools::{describe, ToolHandle};

/// Overall deadline for one turn
pub const DEFAULT_TURN_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Session creations retried when configuration keeps changing underneath
const MAX_CREATE_ATTEMPTS: usize = 3;

struct State {
    config: AiConfig,
    initialized: bool,
    runtime: Option<Arc<dyn AgentRuntime>>,
    session: Option<Arc<dyn RuntimeSession>>,
    all_tools: Vec<ToolHandle>,
    /// `all_tools` filtered by the active skill
    tools: Vec<ToolHandle>,
    /// Bumped whenever a live session must not survive
    generation: u64,
    /// Running turns per session id
    in_flight: HashMap<String, usize>,
    /// Detached sessions waiting for their turns to end
    retired: Vec<Arc<dyn RuntimeSession>>,
}

impl State {
    fn take_session(&mut self) -> Option<Arc<dyn RuntimeSession>> {
        self.generation += 1;
        self.session.take()
    }

    /// Detach the live session. It comes back for destruction only when no
    /// turn is running on it; otherwise it waits in `retired`.
    fn detach_session(&mut self) -> Option<Arc<dyn RuntimeSession>> {
        let session = self.take_session()?;
        if self.in_flight.contains_key(session.id()) {
            debug!(session_id = session.id(), "Session retired until its turn ends");
            self.retired.push(session);
            return None;
        }
        Some(session)
    }

    /// Claim `session` for a turn if it is still the live one
    fn begin_turn(&mut self, session: &Arc<dyn RuntimeSession>) -> bool {
        match &self.session {
            Some(live) if live.id() == session.id() => {
                *self.in_flight.entry(session.id().to_string()).or_default() += 1;
                true
            }
            _ => false,
        }
    }

    /// Release a turn; yields the session if it was retired and is now idle
    fn end_turn(&mut self, id: &str) -> Option<Arc<dyn RuntimeSession>> {
        let count = self.in_flight.get_mut(id)?;
        *count -= 1;
        if *count > 0 {
            return None;
        }
        self.in_flight.remove(id);
        let index = self.retired.iter().position(|s| s.id() == id)?;
        Some(self.retired.swap_remove(index))
    }
}

/// Everything session creation needs, captured under the lock
struct SessionPlan {
    runtime: Arc<dyn AgentRuntime>,
    config: SessionConfig,
    tools: Vec<ToolHandle>,
    generation: u64,
}

pub struct AiOrchestrator {
    state: RwLock<State>,
    /// Serializes `init` so concurrent callers start one runtime
    init_gate: Mutex<()>,
    skills: SkillRegistry,
    launcher: Arc<dyn RuntimeLauncher>,
    turn_timeout: Duration,
}

impl AiOrchestrator {
    pub fn new(config: AiConfig, launcher: Arc<dyn RuntimeLauncher>) -> Self {
        Self {
            state: RwLock::new(State {
                config,
                initialized: false,
                runtime: None,
                session: None,
                all_tools: Vec::new(),
                tools: Vec::new(),
                generation: 0,
                in_flight: HashMap::new(),
                retired: Vec::new(),
            }),
            init_gate: Mutex::new(()),
            skills: SkillRegistry::new(),
            launcher,
            turn_timeout: DEFAULT_TURN_TIMEOUT,
        }
    }

    /// Replace the skill catalog
    pub fn with_skills(mut self, skills: SkillRegistry) -> Self {
        self.skills = skills;
        let state = self.state.get_mut();
        state.tools = self.skills.filter_tools(&state.config.active_skill, &state.all_tools);
        self
    }

    pub fn with_turn_timeout(mut self, timeout: Duration) -> Self {
        self.turn_timeout = timeout;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.state.read().config.is_enabled()
    }

    pub fn is_initialized(&self) -> bool {
        self.state.read().initialized
    }

    /// Start the runtime. No-op when disabled or already running; a failure
    /// leaves the orchestrator uninitialized so the next call retries.
    pub async fn init(&self) -> Result<(), AiError> {
        let _gate = self.init_gate.lock().await;

        let (enabled, initialized, github_token) = {
            let state = self.state.read();
            (
                state.config.is_enabled(),
                state.initialized,
                state.config.resolve_github_token(),
            )
        };
        if !enabled {
            info!("AI features disabled");
            return Ok(());
        }
        if initialized {
            return Ok(());
        }

        info!("Initializing AI runtime integration");

        let cli_path = self.launcher.resolve_cli().await.map_err(|e| {
            warn!("Agent runtime unavailable: {:#}", e);
            AiError::Unavailable(e)
        })?;

        let options = LaunchOptions {
            cli_path,
            use_logged_in_user: github_token.is_none(),
            github_token,
        };
        debug!(?options, "Launching agent runtime");

        let runtime = self.launcher.launch(options).await.map_err(|e| {
            error!("Failed to start agent runtime: {:#}", e);
            AiError::NotReady(e.context("runtime start failed"))
        })?;

        {
            let mut state = self.state.write();
            state.runtime = Some(runtime);
            state.initialized = true;
        }
        info!("AI runtime integration ready");
        Ok(())
    }

    /// Tear down the session, then the runtime. Safe to call repeatedly.
    pub async fn stop(&self) {
        let (sessions, runtime) = {
            let mut state = self.state.write();
            state.initialized = false;
            state.in_flight.clear();
            let mut sessions: Vec<_> = state.retired.drain(..).collect();
            sessions.extend(state.take_session());
            (sessions, state.runtime.take())
        };

        for session in sessions {
            destroy_session(Some(session)).await;
        }
        if let Some(runtime) = runtime {
            if let Err(e) = runtime.stop().await {
                warn!("Failed to stop agent runtime: {:#}", e);
            }
            info!("AI runtime integration stopped");
        }
    }

    /// Install the full tool set and re-filter for the active skill.
    pub fn set_tools(&self, tools: Vec<ToolHandle>) {
        let mut state = self.state.write();
        state.tools = self.skills.filter_tools(&state.config.active_skill, &tools);
        state.all_tools = tools;
    }

    pub fn skills(&self) -> &SkillRegistry {
        &self.skills
    }

    /// Tools the next session will be offered
    pub fn active_tools(&self) -> Vec<ToolHandle> {
        self.state.read().tools.clone()
    }

    /// Switch skill. The live session is discarded; a turn already running
    /// on it finishes first.
    pub async fn set_skill(&self, name: &str) {
        let session = {
            let mut state = self.state.write();
            state.config.active_skill = name.trim().to_string();
            state.tools = self.skills.filter_tools(&state.config.active_skill, &state.all_tools);
            state.detach_session()
        };
        debug!(skill = name, "Active skill changed");
        destroy_session(session).await;
    }

    pub fn active_skill(&self) -> String {
        self.state.read().config.active_skill.clone()
    }

    /// Switch model; the live session is discarded like in `set_skill`.
    pub async fn set_model(&self, model: &str) {
        let session = {
            let mut state = self.state.write();
            state.config.model = model.to_string();
            state.detach_session()
        };
        debug!(model, "Active model changed");
        destroy_session(session).await;
    }

    pub fn active_model(&self) -> String {
        self.state.read().config.model.clone()
    }

    pub async fn list_models(&self) -> Result<Vec<ModelInfo>, AiError> {
        if !self.is_initialized() {
            self.init().await?;
        }

        let runtime = self
            .state
            .read()
            .runtime
            .clone()
            .ok_or(AiError::NotInitialized)?;

        runtime.list_models().await.map_err(AiError::ListModels)
    }

    /// The live session, creating one from the current configuration if needed.
    pub async fn ensure_session(&self) -> Result<Arc<dyn RuntimeSession>, AiError> {
        for _ in 0..MAX_CREATE_ATTEMPTS {
            let plan = match self.plan_session()? {
                Ok(session) => return Ok(session),
                Err(plan) => plan,
            };

            debug!(
                model = %plan.config.model,
                tools = plan.tools.len(),
                "Creating AI session"
            );
            let session = plan
                .runtime
                .create_session(plan.config, plan.tools)
                .await
                .map_err(AiError::SessionCreate)?;

            // Commit only if nothing changed while we were away.
            let (winner, stale) = {
                let mut state = self.state.write();
                if state.generation != plan.generation || !state.initialized {
                    (None, Some(session))
                } else if let Some(existing) = &state.session {
                    (Some(existing.clone()), Some(session))
                } else {
                    state.session = Some(session.clone());
                    (Some(session), None)
                }
            };

            if let Some(stale) = stale {
                debug!(session_id = stale.id(), "Discarding superseded session");
                destroy_session(Some(stale)).await;
            }
            if let Some(session) = winner {
                return Ok(session);
            }
        }

        Err(AiError::SessionCreate(anyhow!(
            "configuration changed during session creation"
        )))
    }

    /// The live session, claimed for one turn. Pair with `finish_turn`.
    async fn claim_session(&self) -> Result<Arc<dyn RuntimeSession>, AiError> {
        for _ in 0..MAX_CREATE_ATTEMPTS {
            let session = self.ensure_session().await?;
            if self.state.write().begin_turn(&session) {
                return Ok(session);
            }
            debug!(session_id = session.id(), "Session switched before the turn began");
        }

        Err(AiError::SessionCreate(anyhow!(
            "configuration changed during session creation"
        )))
    }

    async fn finish_turn(&self, session: &dyn RuntimeSession) {
        let retired = self.state.write().end_turn(session.id());
        destroy_session(retired).await;
    }

    /// Either the live session or a plan for creating one.
    #[allow(clippy::type_complexity)]
    fn plan_session(&self) -> Result<Result<Arc<dyn RuntimeSession>, SessionPlan>, AiError> {
        let state = self.state.read();
        if let Some(session) = &state.session {
            return Ok(Ok(session.clone()));
        }
        let runtime = match (&state.runtime, state.initialized) {
            (Some(runtime), true) => runtime.clone(),
            _ => return Err(AiError::NotInitialized),
        };
        Ok(Err(SessionPlan {
            runtime,
            config: build_session_config(&state.config, &self.skills, &state.tools),
            tools: state.tools.clone(),
            generation: state.generation,
        }))
    }

    /// Run one prompt turn, streaming progress to `listener`.
    pub async fn send(&self, prompt: &str, listener: &dyn Listener) -> Result<(), AiError> {
        if !self.is_enabled() {
            return Err(AiError::Disabled);
        }

        if !self.is_initialized() {
            if let Err(e) = self.init().await {
                return Err(fail(listener, e));
            }
        }

        let deadline = Instant::now() + self.turn_timeout;

        let session = match timeout_at(deadline, self.claim_session()).await {
            Ok(Ok(session)) => session,
            Ok(Err(e)) => return Err(fail(listener, e)),
            Err(_) => return Err(fail(listener, AiError::Timeout(self.turn_timeout))),
        };

        SessionEvent::ResponseStart.deliver(listener);

        let outcome = match timeout_at(deadline, run_turn(session.as_ref(), prompt, listener)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(AiError::Timeout(self.turn_timeout)),
        };

        let result = match outcome {
            Ok(text) => {
                debug!(content_len = text.len(), "Turn completed");
                SessionEvent::ResponseComplete(text).deliver(listener);
                Ok(())
            }
            Err(e) => {
                error!("Turn failed: {}", e);
                Err(fail(listener, e))
            }
        };
        self.finish_turn(session.as_ref()).await;
        result
    }

    /// Drop the live session; configuration is untouched.
    pub async fn reset_session(&self) {
        let session = self.state.write().detach_session();
        destroy_session(session).await;
    }
}

/// Report `err` to the listener and hand it back for the caller.
fn fail(listener: &dyn Listener, err: AiError) -> AiError {
    listener.response_failed(&err);
    err
}

/// Subscribe, submit, and drain the live channel. The subscription is
/// dropped when the submission finishes, which closes the channel, so the
/// relay has delivered every event before this returns.
async fn run_turn(
    session: &dyn RuntimeSession,
    prompt: &str,
    listener: &dyn Listener,
) -> Result<String, AiError> {
    let (subscription, mut events) = session.subscribe();

    let submit = async move {
        debug!(session_id = session.id(), prompt_len = prompt.len(), "Sending prompt");
        let reply = session.send_and_wait(prompt).await;
        drop(subscription);
        reply
    };
    let drain = async {
        while let Some(event) = events.recv().await {
            relay(event, listener);
        }
    };

    let (reply, ()) = tokio::join!(submit, drain);
    reply
        .map(Option::unwrap_or_default)
        .map_err(AiError::Send)
}

async fn destroy_session(session: Option<Arc<dyn RuntimeSession>>) {
    if let Some(session) = session {
        if let Err(e) = session.destroy().await {
            warn!(session_id = session.id(), "Failed to destroy session: {:#}", e);
        }
    }
}

/// Session configuration for the current settings and filtered tools
pub fn build_session_config(
    config: &AiConfig,
    skills: &SkillRegistry,
    tools: &[ToolHandle],
) -> SessionConfig {
    SessionConfig {
        model: config.model.clone(),
        streaming: config.streaming,
        reasoning_effort: config.reasoning_effort.as_option().map(str::to_string),
        system_message: compose_system_message(skills.system_message_suffix(&config.active_skill)),
        tools: tools.iter().map(|t| describe(t.as_ref())).collect(),
        provider: config.byok_provider().map(|p| ProviderOverride {
            provider_type: p.provider_type.clone(),
            base_url: p.base_url.clone(),
            api_key: p.resolve_api_key(),
            bearer_token: p.resolve_bearer_token(),
            wire_api: Some(p.wire_api.clone()).filter(|w| !w.is_empty()),
            azure: p
                .azure
                .as_ref()
                .filter(|a| !a.api_version.is_empty())
                .map(|a| AzureProviderOptions {
                    api_version: a.api_version.clone(),
                }),
        }),
        infinite_sessions: InfiniteSessionConfig::default(),
    }
}
