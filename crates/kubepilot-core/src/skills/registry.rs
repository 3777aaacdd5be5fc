//! Skill registry

use std::collections::HashMap;

use tracing::debug;

use super::builtin::builtin_skills;
use super::skill::{NamedTool, Skill};

/// Catalog of skills, keyed by name. Pre-loaded with the built-ins.
#[derive(Debug, Clone)]
pub struct SkillRegistry {
    skills: HashMap<String, Skill>,
}

impl Default for SkillRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SkillRegistry {
    pub fn new() -> Self {
        let mut registry = Self::empty();
        for skill in builtin_skills() {
            registry.register(skill);
        }
        registry
    }

    /// Registry with no skills at all
    pub fn empty() -> Self {
        Self {
            skills: HashMap::new(),
        }
    }

    /// Insert or overwrite by name
    pub fn register(&mut self, skill: Skill) {
        debug!("Registered skill: {}", skill.name);
        self.skills.insert(skill.name.clone(), skill);
    }

    pub fn get(&self, name: &str) -> Option<&Skill> {
        self.skills.get(name)
    }

    /// Registered skill names, sorted
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.skills.keys().cloned().collect();
        names.sort();
        names
    }

    /// All skills, sorted by name
    pub fn all(&self) -> Vec<&Skill> {
        let mut skills: Vec<&Skill> = self.skills.values().collect();
        skills.sort_by(|a, b| a.name.cmp(&b.name));
        skills
    }

    /// Tools allowed by `skill_name`, preserving input order.
    ///
    /// Empty or unknown names return the input unchanged.
    pub fn filter_tools<T: NamedTool + Clone>(&self, skill_name: &str, tools: &[T]) -> Vec<T> {
        let Some(skill) = self.lookup(skill_name) else {
            return tools.to_vec();
        };

        tools
            .iter()
            .filter(|t| skill.allows(t.tool_name()))
            .cloned()
            .collect()
    }

    /// Prompt suffix for `skill_name`; empty if the name is empty or unknown.
    pub fn system_message_suffix(&self, skill_name: &str) -> &str {
        self.lookup(skill_name)
            .map(|s| s.system_suffix.as_str())
            .unwrap_or("")
    }

    fn lookup(&self, skill_name: &str) -> Option<&Skill> {
        if skill_name.is_empty() {
            return None;
        }
        self.skills.get(skill_name)
    }
}
