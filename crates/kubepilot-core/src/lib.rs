//! kubepilot-core - conversational cluster diagnostics
//!
//! - `ai` - session orchestrator, listener contract, prompts
//! - `skills` - named tool subsets with prompt addenda
//! - `tools` - read-only cluster tools exposed to the agent runtime
//! - `runtime` - agent runtime binary resolution and the stdio JSON-RPC client
//! - `config` - AI configuration surface and credential resolution

pub mod ai;
pub mod config;
pub mod error;
pub mod paths;
pub mod runtime;
pub mod skills;
pub mod tools;

pub use ai::{AiOrchestrator, Listener, ModelInfo};
pub use config::AiConfig;
pub use error::AiError;
