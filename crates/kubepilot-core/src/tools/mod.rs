//! Read-only cluster tools exposed to the agent runtime
//!
//! Every tool is a thin adapter over one `ClusterAccess` call and answers with
//! a JSON envelope: `{"ok":true,"data":...}` or `{"ok":false,"error":{...}}`.

pub mod cluster;
pub mod format;
pub mod implementations;
pub mod kubectl;
pub mod registry;

#[cfg(test)]
pub(crate) mod testing;

pub use cluster::{ClusterAccess, Gvr, LogRequest, LogStream};
pub use implementations::{cluster_tools, register_cluster_tools};
pub use kubectl::KubectlCluster;
pub use registry::{
    describe, execute_tool, parse_params, Tool, ToolContext, ToolHandle, ToolRegistry, ToolResult,
};
