//! Starts the agent runtime as a child process

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use super::client::RuntimeClient;
use super::resolver::RuntimeResolver;
use super::transport::LineTransport;
use crate::ai::runtime::{AgentRuntime, LaunchOptions, RuntimeLauncher};

const DEFAULT_PROGRAM: &str = "copilot";
const SERVER_ARGS: &[&str] = &["--server", "--stdio", "--log-level", "error"];
const TOKEN_ENV: &str = "GITHUB_TOKEN";

/// Launcher that resolves the runtime binary and talks to it over stdio
pub struct StdioLauncher {
    resolver: RuntimeResolver,
}

impl Default for StdioLauncher {
    fn default() -> Self {
        Self::new(RuntimeResolver::new())
    }
}

impl StdioLauncher {
    pub fn new(resolver: RuntimeResolver) -> Self {
        Self { resolver }
    }
}

#[async_trait]
impl RuntimeLauncher for StdioLauncher {
    async fn resolve_cli(&self) -> Result<Option<PathBuf>> {
        let path = self.resolver.resolve().await?;
        Ok(Some(path))
    }

    async fn launch(&self, options: LaunchOptions) -> Result<Arc<dyn AgentRuntime>> {
        let program = options
            .cli_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_PROGRAM));

        let mut env = Vec::new();
        if let Some(token) = &options.github_token {
            env.push((TOKEN_ENV, token.clone()));
        } else if options.use_logged_in_user {
            info!("No GitHub token configured, using the runtime's logged-in user");
        }

        let transport = LineTransport::spawn(&program, SERVER_ARGS, &env).await?;
        let client = RuntimeClient::connect(transport);
        if let Err(e) = client.ping().await {
            if client.is_alive().await {
                return Err(e.context("agent runtime did not answer"));
            }
            return Err(e.context("agent runtime exited during startup"));
        }
        Ok(Arc::new(client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_launch_missing_binary_fails() {
        let launcher = StdioLauncher::new(RuntimeResolver::new().with_download(false));
        let options = LaunchOptions {
            cli_path: Some(PathBuf::from("/nonexistent/kubepilot-test-runtime")),
            github_token: Some("ghp_abcdefghijklmnop".into()),
            use_logged_in_user: false,
        };
        let err = launcher.launch(options).await.err().unwrap();
        assert!(err.to_string().contains("kubepilot-test-runtime"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_launch_runtime_that_exits_fails() {
        let Ok(program) = which::which("true") else {
            return;
        };
        let launcher = StdioLauncher::new(RuntimeResolver::new().with_download(false));
        let options = LaunchOptions {
            cli_path: Some(program.clone()),
            github_token: None,
            use_logged_in_user: true,
        };
        let err = launcher.launch(options).await.err().unwrap();
        assert!(format!("{:#}", err).contains("agent runtime"), "{:#}", err);

        let transport = LineTransport::spawn(&program, SERVER_ARGS, &[]).await.unwrap();
        let client = RuntimeClient::connect(transport);
        let mut alive = true;
        for _ in 0..50 {
            alive = client.is_alive().await;
            if !alive {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        }
        assert!(!alive);
    }

    #[tokio::test]
    async fn test_resolve_cli_reports_resolver_error() {
        let temp = tempfile::tempdir().unwrap();
        let resolver = RuntimeResolver::new()
            .with_path_override(None)
            .without_path_lookup()
            .with_cache_dir(temp.path())
            .with_download(false);
        let err = StdioLauncher::new(resolver).resolve_cli().await.unwrap_err();
        assert!(err.to_string().contains("download is disabled"));
    }
}
