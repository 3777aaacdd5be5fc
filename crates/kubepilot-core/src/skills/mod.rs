//! Skills: named, restricted views of the tool set
//!
//! A skill pairs a tool-name allowlist with a system prompt addendum that
//! focuses the agent on one category of work. Three skills ship built in:
//!
//! - `diagnostics` - root-cause analysis of unhealthy workloads
//! - `security` - RBAC auditing and security posture
//! - `optimization` - resource requests/limits against observed usage
//!
//! # Usage
//!
//! ```rust,ignore
//! use kubepilot_core::skills::SkillRegistry;
//!
//! let registry = SkillRegistry::new();
//! let scoped = registry.filter_tools("security", &all_tools);
//! let suffix = registry.system_message_suffix("security");
//! ```
//!
//! Unknown or empty skill names never restrict anything: filtering returns the
//! input unchanged and the suffix is empty.

mod builtin;
mod registry;
mod skill;

pub use registry::SkillRegistry;
pub use skill::{NamedTool, Skill};
