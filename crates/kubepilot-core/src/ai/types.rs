//! Shared AI types

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tool descriptor as the agent runtime sees it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiTool {
    pub name: String,
    pub description: String,
    #[serde(rename = "parameters")]
    pub input_schema: Value,
}

/// A model available to the caller's account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

impl ModelInfo {
    /// Display label, falling back to the id
    pub fn label(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}
