//! Stdio transport for the agent runtime
//!
//! Newline-delimited JSON: one message per line in each direction.

use std::path::Path;
use std::process::Stdio;

use anyhow::{anyhow, Result};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;

use crate::ai::runtime::mask_secret;

type Reader = BufReader<Box<dyn AsyncRead + Send + Unpin>>;
type Writer = Box<dyn AsyncWrite + Send + Unpin>;

pub struct LineTransport {
    writer: Mutex<Writer>,
    reader: Mutex<Reader>,
    child: Option<Mutex<Child>>,
}

impl LineTransport {
    /// Spawn the runtime process with piped stdio
    pub async fn spawn(program: &Path, args: &[&str], env: &[(&str, String)]) -> Result<Self> {
        tracing::info!("Spawning agent runtime: {} {:?}", program.display(), args);
        for (key, value) in env {
            tracing::info!("  env {}={}", key, mask_secret(value));
        }

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        for (key, value) in env {
            cmd.env(key, value);
        }

        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                anyhow!(
                    "Command not found: {}. Is it installed and in PATH?",
                    program.display()
                )
            } else {
                anyhow!("Failed to spawn {}: {}", program.display(), e)
            }
        })?;

        let stdin = child.stdin.take().ok_or_else(|| anyhow!("No stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| anyhow!("No stdout"))?;

        Ok(Self {
            writer: Mutex::new(Box::new(stdin)),
            reader: Mutex::new(BufReader::new(Box::new(stdout))),
            child: Some(Mutex::new(child)),
        })
    }

    /// Transport over arbitrary streams (in-process peers)
    pub fn from_io(
        reader: impl AsyncRead + Send + Unpin + 'static,
        writer: impl AsyncWrite + Send + Unpin + 'static,
    ) -> Self {
        Self {
            writer: Mutex::new(Box::new(writer)),
            reader: Mutex::new(BufReader::new(Box::new(reader))),
            child: None,
        }
    }

    pub async fn send(&self, message: &str) -> Result<()> {
        let mut writer = self.writer.lock().await;
        writer.write_all(message.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        tracing::debug!("Sent: {}", message);
        Ok(())
    }

    /// Next JSON line. Non-JSON lines (stray diagnostics) are skipped.
    pub async fn receive(&self) -> Result<String> {
        let mut reader = self.reader.lock().await;

        loop {
            let mut line = String::new();
            let bytes = reader.read_line(&mut line).await?;

            if bytes == 0 {
                return Err(self.closed_error().await);
            }

            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if line.starts_with('{') {
                tracing::debug!("Received: {}", line);
                return Ok(line.to_string());
            }
            tracing::debug!("Skipping non-JSON line: {}", line);
        }
    }

    async fn closed_error(&self) -> anyhow::Error {
        let Some(child) = &self.child else {
            return anyhow!("agent runtime closed the connection");
        };
        match child.lock().await.try_wait() {
            Ok(Some(status)) => anyhow!("agent runtime exited with {}", status),
            Ok(None) => anyhow!("agent runtime closed stdout unexpectedly"),
            Err(e) => anyhow!("Error checking agent runtime status: {}", e),
        }
    }

    pub async fn is_alive(&self) -> bool {
        match &self.child {
            Some(child) => matches!(child.lock().await.try_wait(), Ok(None)),
            None => true,
        }
    }

    /// Kill the process, if there is one
    pub async fn shutdown(&self) {
        if let Some(child) = &self.child {
            let mut child = child.lock().await;
            if let Err(e) = child.kill().await {
                tracing::debug!("Agent runtime kill: {}", e);
            }
        }
    }
}
