//! AI configuration surface
//!
//! Mirrors the `ai:` block of the host configuration file. Credentials resolve
//! with precedence: explicit value > environment > ambient CLI login.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_MODEL: &str = "gpt-4.1";
pub const DEFAULT_MAX_CONTEXT_LINES: i64 = 500;

/// Environment variables consulted (in order) for the runtime's GitHub token.
const GITHUB_TOKEN_VARS: &[&str] = &["COPILOT_GITHUB_TOKEN", "GH_TOKEN", "GITHUB_TOKEN"];
const PROVIDER_BEARER_TOKEN_VAR: &str = "KUBEPILOT_PROVIDER_BEARER_TOKEN";

/// Reasoning effort hint passed through to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ReasoningEffort {
    #[default]
    Unset,
    Low,
    Medium,
    High,
    XHigh,
}

impl ReasoningEffort {
    /// Parse a configured value; anything unrecognized normalizes to `Unset`.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Self::Low,
            "medium" => Self::Medium,
            "high" => Self::High,
            "xhigh" => Self::XHigh,
            _ => Self::Unset,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unset => "",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::XHigh => "xhigh",
        }
    }

    /// The wire value, `None` when unset.
    pub fn as_option(self) -> Option<&'static str> {
        match self {
            Self::Unset => None,
            other => Some(other.as_str()),
        }
    }
}

impl From<String> for ReasoningEffort {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<ReasoningEffort> for String {
    fn from(value: ReasoningEffort) -> Self {
        value.as_str().to_string()
    }
}

/// Azure-specific provider options
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AzureOptions {
    #[serde(default)]
    pub api_version: String,
}

/// BYOK (bring your own key) provider configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    /// Provider type: "openai", "azure", "anthropic"
    #[serde(default, rename = "type")]
    pub provider_type: String,
    #[serde(default, rename = "baseURL", alias = "baseUrl")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub bearer_token: String,
    /// Wire protocol override ("completions" or "responses")
    #[serde(default)]
    pub wire_api: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azure: Option<AzureOptions>,
}

impl ProviderConfig {
    /// A provider block only overrides the runtime when it names an endpoint.
    pub fn is_configured(&self) -> bool {
        !self.base_url.trim().is_empty()
    }

    pub fn resolve_api_key(&self) -> Option<String> {
        self.resolve_api_key_with(env_lookup)
    }

    pub fn resolve_api_key_with(&self, env: impl Fn(&str) -> Option<String>) -> Option<String> {
        if !self.api_key.is_empty() {
            return Some(self.api_key.clone());
        }
        let var = match self.provider_type.to_ascii_lowercase().as_str() {
            "openai" => "OPENAI_API_KEY",
            "azure" => "AZURE_OPENAI_API_KEY",
            "anthropic" => "ANTHROPIC_API_KEY",
            _ => return None,
        };
        non_empty(env(var))
    }

    pub fn resolve_bearer_token(&self) -> Option<String> {
        self.resolve_bearer_token_with(env_lookup)
    }

    pub fn resolve_bearer_token_with(
        &self,
        env: impl Fn(&str) -> Option<String>,
    ) -> Option<String> {
        if !self.bearer_token.is_empty() {
            return Some(self.bearer_token.clone());
        }
        non_empty(env(PROVIDER_BEARER_TOKEN_VAR))
    }
}

/// AI/agent configuration options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AiConfig {
    pub enabled: bool,
    pub model: String,
    pub streaming: bool,
    pub max_context_lines: i64,
    pub auto_diagnose: bool,
    pub reasoning_effort: ReasoningEffort,
    /// Active skill name; empty means all tools.
    pub active_skill: String,
    /// Explicit GitHub token for the agent runtime.
    pub github_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderConfig>,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            model: DEFAULT_MODEL.to_string(),
            streaming: true,
            max_context_lines: DEFAULT_MAX_CONTEXT_LINES,
            auto_diagnose: false,
            reasoning_effort: ReasoningEffort::Unset,
            active_skill: String::new(),
            github_token: String::new(),
            provider: None,
        }
    }
}

impl AiConfig {
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Fill in defaults for values that would otherwise be unusable.
    pub fn validate(mut self) -> Self {
        if self.model.trim().is_empty() {
            self.model = DEFAULT_MODEL.to_string();
        }
        if self.max_context_lines <= 0 {
            self.max_context_lines = DEFAULT_MAX_CONTEXT_LINES;
        }
        self.active_skill = self.active_skill.trim().to_string();
        self
    }

    /// The provider override, only when it names an endpoint.
    pub fn byok_provider(&self) -> Option<&ProviderConfig> {
        self.provider.as_ref().filter(|p| p.is_configured())
    }

    /// GitHub token for the runtime; `None` means rely on the ambient CLI login.
    pub fn resolve_github_token(&self) -> Option<String> {
        self.resolve_github_token_with(env_lookup)
    }

    pub fn resolve_github_token_with(
        &self,
        env: impl Fn(&str) -> Option<String>,
    ) -> Option<String> {
        if !self.github_token.is_empty() {
            return Some(self.github_token.clone());
        }
        GITHUB_TOKEN_VARS
            .iter()
            .find_map(|var| non_empty(env(var)))
    }

    /// Load from a YAML file. Accepts either a bare AI block or a document
    /// with a top-level `ai:` key. A missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No config at {:?}, using defaults", path);
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_yaml(&raw).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        let doc: serde_yaml::Value = serde_yaml::from_str(raw)?;
        let block = match doc.get("ai") {
            Some(ai) => ai.clone(),
            None if doc.is_null() => return Ok(Self::default()),
            None => doc,
        };
        let config: AiConfig = serde_yaml::from_value(block)?;
        Ok(config.validate())
    }
}

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let cfg = AiConfig::default();
        assert!(!cfg.is_enabled());
        assert_eq!(cfg.model, "gpt-4.1");
        assert!(cfg.streaming);
        assert_eq!(cfg.max_context_lines, 500);
        assert_eq!(cfg.reasoning_effort, ReasoningEffort::Unset);
    }

    #[test]
    fn test_validate_fills_defaults() {
        let cfg = AiConfig {
            model: "  ".into(),
            max_context_lines: -3,
            active_skill: " security ".into(),
            ..Default::default()
        }
        .validate();
        assert_eq!(cfg.model, DEFAULT_MODEL);
        assert_eq!(cfg.max_context_lines, DEFAULT_MAX_CONTEXT_LINES);
        assert_eq!(cfg.active_skill, "security");
    }

    #[test]
    fn test_reasoning_effort_normalizes_invalid() {
        assert_eq!(ReasoningEffort::parse("HIGH"), ReasoningEffort::High);
        assert_eq!(ReasoningEffort::parse("xhigh"), ReasoningEffort::XHigh);
        assert_eq!(ReasoningEffort::parse("extreme"), ReasoningEffort::Unset);
        assert_eq!(ReasoningEffort::parse(""), ReasoningEffort::Unset);
        assert_eq!(ReasoningEffort::Unset.as_option(), None);
        assert_eq!(ReasoningEffort::Low.as_option(), Some("low"));
    }

    #[test]
    fn test_from_yaml_with_ai_key() {
        let raw = r#"
ai:
  enabled: true
  model: claude-sonnet-4
  reasoningEffort: bogus
  activeSkill: diagnostics
  provider:
    type: openai
    baseURL: https://example.test/v1
    wireApi: responses
    azure:
      apiVersion: "2024-10-21"
"#;
        let cfg = AiConfig::from_yaml(raw).unwrap();
        assert!(cfg.enabled);
        assert_eq!(cfg.model, "claude-sonnet-4");
        assert_eq!(cfg.reasoning_effort, ReasoningEffort::Unset);
        assert_eq!(cfg.active_skill, "diagnostics");
        assert!(cfg.streaming);
        let provider = cfg.byok_provider().unwrap();
        assert_eq!(provider.provider_type, "openai");
        assert_eq!(provider.wire_api, "responses");
        assert_eq!(provider.azure.as_ref().unwrap().api_version, "2024-10-21");
    }

    #[test]
    fn test_from_yaml_bare_block_and_empty() {
        let cfg = AiConfig::from_yaml("enabled: true\nreasoningEffort: medium\n").unwrap();
        assert!(cfg.enabled);
        assert_eq!(cfg.reasoning_effort, ReasoningEffort::Medium);

        let cfg = AiConfig::from_yaml("").unwrap();
        assert_eq!(cfg, AiConfig::default());
    }

    #[test]
    fn test_load_missing_file_is_default() {
        let temp = tempfile::tempdir().unwrap();
        let cfg = AiConfig::load(&temp.path().join("nope.yaml")).unwrap();
        assert_eq!(cfg, AiConfig::default());
    }

    #[test]
    fn test_provider_without_endpoint_is_not_byok() {
        let cfg = AiConfig {
            provider: Some(ProviderConfig {
                provider_type: "openai".into(),
                api_key: "sk-test".into(),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(cfg.byok_provider().is_none());
    }

    #[test]
    fn test_github_token_precedence() {
        let env = env_from(&[("GH_TOKEN", "from-gh"), ("GITHUB_TOKEN", "from-github")]);

        let explicit = AiConfig {
            github_token: "explicit".into(),
            ..Default::default()
        };
        assert_eq!(
            explicit.resolve_github_token_with(&env).as_deref(),
            Some("explicit")
        );

        let cfg = AiConfig::default();
        assert_eq!(cfg.resolve_github_token_with(&env).as_deref(), Some("from-gh"));
        assert_eq!(cfg.resolve_github_token_with(env_from(&[])), None);
    }

    #[test]
    fn test_provider_credentials_precedence() {
        let env = env_from(&[
            ("OPENAI_API_KEY", "env-key"),
            ("KUBEPILOT_PROVIDER_BEARER_TOKEN", "env-bearer"),
        ]);
        let mut provider = ProviderConfig {
            provider_type: "OpenAI".into(),
            base_url: "https://example.test".into(),
            ..Default::default()
        };
        assert_eq!(provider.resolve_api_key_with(&env).as_deref(), Some("env-key"));
        assert_eq!(
            provider.resolve_bearer_token_with(&env).as_deref(),
            Some("env-bearer")
        );

        provider.api_key = "cfg-key".into();
        assert_eq!(provider.resolve_api_key_with(&env).as_deref(), Some("cfg-key"));

        provider.provider_type = "custom".into();
        provider.api_key.clear();
        assert_eq!(provider.resolve_api_key_with(&env), None);
    }
}
