//! In-memory cluster used by tool tests

use std::collections::HashMap;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use super::cluster::{ClusterAccess, Gvr, LogRequest, LogStream};

#[derive(Default)]
pub struct FakeCluster {
    /// Objects keyed by plural resource name
    pub objects: HashMap<String, Vec<Value>>,
    pub description: String,
    pub logs: Vec<u8>,
    pub events: Vec<Value>,
    pub server_version: Option<String>,
    pub rbac_allowed: bool,
    /// When set, every call fails with this message
    pub fail_with: Option<String>,
    pub last_log_request: Mutex<Option<LogRequest>>,
    pub last_events_query: Mutex<Option<(Option<String>, Option<String>)>>,
    pub last_can_i: Mutex<Option<(Option<String>, String, String)>>,
    pub last_list: Mutex<Option<(Option<String>, Option<String>)>>,
}

impl FakeCluster {
    pub fn with_objects(resource: &str, objects: Vec<Value>) -> Self {
        let mut cluster = Self::default();
        cluster.objects.insert(resource.to_string(), objects);
        cluster
    }

    fn check(&self) -> Result<()> {
        match &self.fail_with {
            Some(msg) => Err(anyhow!("{}", msg)),
            None => Ok(()),
        }
    }
}

fn in_namespace(obj: &Value, namespace: Option<&str>) -> bool {
    match namespace {
        None => true,
        Some(ns) => obj.pointer("/metadata/namespace").and_then(Value::as_str) == Some(ns),
    }
}

fn matches_selector(obj: &Value, selector: Option<&str>) -> bool {
    let Some(selector) = selector else {
        return true;
    };
    selector.split(',').all(|term| {
        let Some((key, want)) = term.split_once('=') else {
            return false;
        };
        obj.pointer("/metadata/labels")
            .and_then(|labels| labels.get(key.trim()))
            .and_then(Value::as_str)
            == Some(want.trim())
    })
}

#[async_trait]
impl ClusterAccess for FakeCluster {
    async fn get(&self, gvr: &Gvr, namespace: Option<&str>, name: &str) -> Result<Value> {
        self.check()?;
        self.objects
            .get(&gvr.resource)
            .and_then(|objs| {
                objs.iter().find(|o| {
                    in_namespace(o, namespace)
                        && o.pointer("/metadata/name").and_then(Value::as_str) == Some(name)
                })
            })
            .cloned()
            .ok_or_else(|| anyhow!("{} \"{}\" not found", gvr.resource, name))
    }

    async fn list(
        &self,
        gvr: &Gvr,
        namespace: Option<&str>,
        label_selector: Option<&str>,
    ) -> Result<Vec<Value>> {
        self.check()?;
        *self.last_list.lock() = Some((
            namespace.map(str::to_string),
            label_selector.map(str::to_string),
        ));
        Ok(self
            .objects
            .get(&gvr.resource)
            .map(|objs| {
                objs.iter()
                    .filter(|o| in_namespace(o, namespace) && matches_selector(o, label_selector))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn describe(&self, _gvr: &Gvr, _namespace: Option<&str>, _name: &str) -> Result<String> {
        self.check()?;
        Ok(self.description.clone())
    }

    async fn logs(&self, request: &LogRequest) -> Result<LogStream> {
        self.check()?;
        *self.last_log_request.lock() = Some(request.clone());
        Ok(Box::pin(std::io::Cursor::new(self.logs.clone())))
    }

    async fn events(
        &self,
        namespace: Option<&str>,
        involved_name: Option<&str>,
    ) -> Result<Vec<Value>> {
        self.check()?;
        *self.last_events_query.lock() = Some((
            namespace.map(str::to_string),
            involved_name.map(str::to_string),
        ));
        Ok(self.events.clone())
    }

    async fn server_version(&self) -> Result<String> {
        self.check()?;
        self.server_version
            .clone()
            .ok_or_else(|| anyhow!("version endpoint unavailable"))
    }

    async fn can_i(&self, namespace: Option<&str>, verb: &str, resource: &str) -> Result<bool> {
        self.check()?;
        *self.last_can_i.lock() = Some((
            namespace.map(str::to_string),
            verb.to_string(),
            resource.to_string(),
        ));
        Ok(self.rbac_allowed)
    }
}

/// Parse a tool's JSON envelope
pub fn envelope(result: &super::ToolResult) -> Value {
    serde_json::from_str(&result.output).unwrap_or(Value::Null)
}
