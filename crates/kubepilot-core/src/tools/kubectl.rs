//! `ClusterAccess` backed by the `kubectl` binary
//!
//! Every call shells out once and reads JSON (`-o json`) where kubectl can
//! produce it. Logs are streamed from the child's stdout.

use std::path::PathBuf;
use std::pin::Pin;
use std::process::Stdio;
use std::task::{Context as TaskContext, Poll};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncRead, ReadBuf};
use tokio::process::{Child, ChildStdout, Command};
use tracing::debug;

use super::cluster::{ClusterAccess, Gvr, LogRequest, LogStream};

/// Cluster access through `kubectl`
#[derive(Debug, Clone)]
pub struct KubectlCluster {
    binary: PathBuf,
    context: Option<String>,
    kubeconfig: Option<PathBuf>,
}

impl Default for KubectlCluster {
    fn default() -> Self {
        Self::new()
    }
}

impl KubectlCluster {
    pub fn new() -> Self {
        Self {
            binary: PathBuf::from("kubectl"),
            context: None,
            kubeconfig: None,
        }
    }

    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Pin every call to a kubeconfig context
    pub fn with_context(mut self, context: Option<String>) -> Self {
        self.context = context.filter(|c| !c.is_empty());
        self
    }

    pub fn with_kubeconfig(mut self, kubeconfig: Option<PathBuf>) -> Self {
        self.kubeconfig = kubeconfig;
        self
    }

    /// Global flags prepended to every invocation
    fn global_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(kubeconfig) = &self.kubeconfig {
            args.push(format!("--kubeconfig={}", kubeconfig.display()));
        }
        if let Some(context) = &self.context {
            args.push(format!("--context={}", context));
        }
        args
    }

    fn command(&self, args: &[String]) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.args(self.global_args()).args(args);
        cmd.stdin(Stdio::null());
        cmd.kill_on_drop(true);
        cmd
    }

    async fn run(&self, args: &[String]) -> Result<String> {
        debug!("kubectl {}", args.join(" "));
        let output = self
            .command(args)
            .output()
            .await
            .with_context(|| format!("Failed to run {}", self.binary.display()))?;

        if !output.status.success() {
            return Err(anyhow!(
                "kubectl {} failed: {}",
                args.first().map(String::as_str).unwrap_or(""),
                command_error_detail(&output.stdout, &output.stderr)
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn run_json(&self, args: &[String]) -> Result<Value> {
        let stdout = self.run(args).await?;
        serde_json::from_str(&stdout).context("kubectl returned invalid JSON")
    }
}

fn command_error_detail(stdout: &[u8], stderr: &[u8]) -> String {
    let stderr = String::from_utf8_lossy(stderr).trim().to_string();
    if !stderr.is_empty() {
        return stderr;
    }
    let stdout = String::from_utf8_lossy(stdout).trim().to_string();
    if stdout.is_empty() {
        "no output".to_string()
    } else {
        stdout
    }
}

fn namespace_args(args: &mut Vec<String>, namespace: Option<&str>, all_when_none: bool) {
    match namespace {
        Some(ns) => args.push(format!("--namespace={}", ns)),
        None if all_when_none => args.push("--all-namespaces".to_string()),
        None => {}
    }
}

fn get_args(gvr: &Gvr, namespace: Option<&str>, name: &str) -> Vec<String> {
    let mut args = vec!["get".to_string(), gvr.kubectl_resource(), name.to_string()];
    namespace_args(&mut args, namespace, false);
    args.push("--output=json".to_string());
    args
}

fn list_args(gvr: &Gvr, namespace: Option<&str>, label_selector: Option<&str>) -> Vec<String> {
    let mut args = vec!["get".to_string(), gvr.kubectl_resource()];
    namespace_args(&mut args, namespace, true);
    if let Some(selector) = label_selector {
        args.push(format!("--selector={}", selector));
    }
    args.push("--output=json".to_string());
    args
}

fn describe_args(gvr: &Gvr, namespace: Option<&str>, name: &str) -> Vec<String> {
    let mut args = vec!["describe".to_string(), gvr.kubectl_resource(), name.to_string()];
    namespace_args(&mut args, namespace, false);
    args
}

fn logs_args(request: &LogRequest) -> Vec<String> {
    let mut args = vec![
        "logs".to_string(),
        request.pod.clone(),
        format!("--namespace={}", request.namespace),
        format!("--tail={}", request.tail_lines),
    ];
    if let Some(container) = &request.container {
        args.push(format!("--container={}", container));
    }
    if request.previous {
        args.push("--previous".to_string());
    }
    args
}

fn events_args(namespace: Option<&str>, involved_name: Option<&str>) -> Vec<String> {
    let mut args = vec!["get".to_string(), "events".to_string()];
    namespace_args(&mut args, namespace, true);
    if let Some(name) = involved_name {
        args.push(format!("--field-selector=involvedObject.name={}", name));
    }
    args.push("--output=json".to_string());
    args
}

fn can_i_args(namespace: Option<&str>, verb: &str, resource: &str) -> Vec<String> {
    let mut args = vec![
        "auth".to_string(),
        "can-i".to_string(),
        verb.to_string(),
        resource.to_string(),
    ];
    namespace_args(&mut args, namespace, false);
    args
}

/// `items` of a kubectl list document
fn list_items(doc: Value) -> Vec<Value> {
    match doc {
        Value::Object(mut map) => match map.remove("items") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

/// Parse `kubectl auth can-i` output (`yes` / `no`, possibly with a reason).
fn parse_can_i(stdout: &str) -> Option<bool> {
    match stdout.split_whitespace().next()? {
        "yes" => Some(true),
        "no" => Some(false),
        _ => None,
    }
}

/// Child stdout that keeps the process alive while it is read
struct ChildLogStream {
    _child: Child,
    stdout: ChildStdout,
}

impl AsyncRead for ChildLogStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut TaskContext<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.stdout).poll_read(cx, buf)
    }
}

#[async_trait]
impl ClusterAccess for KubectlCluster {
    async fn get(&self, gvr: &Gvr, namespace: Option<&str>, name: &str) -> Result<Value> {
        self.run_json(&get_args(gvr, namespace, name)).await
    }

    async fn list(
        &self,
        gvr: &Gvr,
        namespace: Option<&str>,
        label_selector: Option<&str>,
    ) -> Result<Vec<Value>> {
        let doc = self
            .run_json(&list_args(gvr, namespace, label_selector))
            .await?;
        Ok(list_items(doc))
    }

    async fn describe(&self, gvr: &Gvr, namespace: Option<&str>, name: &str) -> Result<String> {
        self.run(&describe_args(gvr, namespace, name)).await
    }

    async fn logs(&self, request: &LogRequest) -> Result<LogStream> {
        let args = logs_args(request);
        debug!("kubectl {}", args.join(" "));
        let mut child = self
            .command(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("Failed to run {}", self.binary.display()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("kubectl logs produced no stdout handle"))?;
        Ok(Box::pin(ChildLogStream {
            _child: child,
            stdout,
        }))
    }

    async fn events(
        &self,
        namespace: Option<&str>,
        involved_name: Option<&str>,
    ) -> Result<Vec<Value>> {
        let doc = self.run_json(&events_args(namespace, involved_name)).await?;
        Ok(list_items(doc))
    }

    async fn server_version(&self) -> Result<String> {
        let doc = self
            .run_json(&["version".to_string(), "--output=json".to_string()])
            .await?;
        doc.pointer("/serverVersion/gitVersion")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| anyhow!("server version not reported"))
    }

    async fn can_i(&self, namespace: Option<&str>, verb: &str, resource: &str) -> Result<bool> {
        // `auth can-i` exits non-zero for "no", so read stdout regardless of status
        let args = can_i_args(namespace, verb, resource);
        let output = self
            .command(&args)
            .output()
            .await
            .with_context(|| format!("Failed to run {}", self.binary.display()))?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_can_i(&stdout).ok_or_else(|| {
            anyhow!(
                "kubectl auth can-i failed: {}",
                command_error_detail(&output.stdout, &output.stderr)
            )
        })
    }
}
