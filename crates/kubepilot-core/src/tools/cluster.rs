//! Cluster access seam
//!
//! The tools never talk to the API server directly; they go through
//! `ClusterAccess`, which the host supplies. Objects are exchanged in their
//! unstructured JSON form.

use std::fmt;
use std::pin::Pin;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use tokio::io::AsyncRead;

/// Group/version/resource identifier, e.g. `v1/pods` or `apps/v1/deployments`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Gvr {
    pub group: String,
    pub version: String,
    pub resource: String,
}

impl Gvr {
    /// Parse `resource`, `version/resource` or `group/version/resource`.
    pub fn parse(raw: &str) -> Self {
        let parts: Vec<&str> = raw
            .trim()
            .trim_matches('/')
            .split('/')
            .filter(|p| !p.is_empty())
            .collect();
        let (group, version, resource) = match parts.as_slice() {
            [] => ("", "", ""),
            [resource] => ("", "", *resource),
            [version, resource] => ("", *version, *resource),
            [group, version, resource, ..] => (*group, *version, *resource),
        };
        Self {
            group: group.to_string(),
            version: version.to_string(),
            resource: resource.to_ascii_lowercase(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.resource.is_empty()
    }

    /// Resource argument understood by `kubectl` (`deployments.v1.apps`, `pods`).
    pub fn kubectl_resource(&self) -> String {
        match (self.group.is_empty(), self.version.is_empty()) {
            (true, _) => self.resource.clone(),
            (false, true) => format!("{}.{}", self.resource, self.group),
            (false, false) => format!("{}.{}.{}", self.resource, self.version, self.group),
        }
    }
}

impl fmt::Display for Gvr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<&str> = [
            self.group.as_str(),
            self.version.as_str(),
            self.resource.as_str(),
        ]
        .into_iter()
        .filter(|p| !p.is_empty())
        .collect();
        write!(f, "{}", parts.join("/"))
    }
}

/// Pod log request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRequest {
    pub namespace: String,
    pub pod: String,
    pub container: Option<String>,
    pub tail_lines: i64,
    pub previous: bool,
}

/// Streamed log body
pub type LogStream = Pin<Box<dyn AsyncRead + Send>>;

/// Read-only view of a cluster.
///
/// Namespaces and selectors are `None` when absent; implementations must treat
/// that as "no filter".
#[async_trait]
pub trait ClusterAccess: Send + Sync {
    async fn get(&self, gvr: &Gvr, namespace: Option<&str>, name: &str) -> Result<Value>;

    async fn list(
        &self,
        gvr: &Gvr,
        namespace: Option<&str>,
        label_selector: Option<&str>,
    ) -> Result<Vec<Value>>;

    /// kubectl-style human description
    async fn describe(&self, gvr: &Gvr, namespace: Option<&str>, name: &str) -> Result<String>;

    async fn logs(&self, request: &LogRequest) -> Result<LogStream>;

    /// Events, optionally narrowed to an involved object name.
    async fn events(&self, namespace: Option<&str>, involved_name: Option<&str>)
        -> Result<Vec<Value>>;

    async fn server_version(&self) -> Result<String>;

    /// Whether the current identity may perform `verb` on `resource`.
    async fn can_i(&self, namespace: Option<&str>, verb: &str, resource: &str) -> Result<bool>;
}

/// `Some(s)` for non-blank input
pub fn optional(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
