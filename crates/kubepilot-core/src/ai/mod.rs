//! AI session layer
//!
//! `AiOrchestrator` owns the agent runtime connection and the single live
//! session, scopes tools through the active skill, and relays each turn's
//! events to a `Listener`.

pub mod events;
pub mod orchestrator;
pub mod prompt;
pub mod runtime;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use events::{Listener, SessionEvent};
pub use orchestrator::{build_session_config, AiOrchestrator, DEFAULT_TURN_TIMEOUT};
pub use runtime::{
    AgentRuntime, LaunchOptions, RuntimeEvent, RuntimeLauncher, RuntimeSession, SessionConfig,
    Subscription,
};
pub use types::{AiTool, ModelInfo};
