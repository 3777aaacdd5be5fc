//! Skill definition

use serde::Serialize;

/// A named group of tools and a specialized system message suffix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Skill {
    pub name: String,
    pub description: String,
    /// Tools the agent may call while this skill is active.
    pub tool_names: Vec<String>,
    /// Appended to the base system prompt.
    pub system_suffix: String,
}

impl Skill {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        tool_names: &[&str],
        system_suffix: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            tool_names: tool_names.iter().map(|n| n.to_string()).collect(),
            system_suffix: system_suffix.into(),
        }
    }

    pub fn allows(&self, tool_name: &str) -> bool {
        self.tool_names.iter().any(|n| n == tool_name)
    }
}

/// Anything that can be filtered by a skill's allowlist.
pub trait NamedTool {
    fn tool_name(&self) -> &str;
}
