//! Agent runtime process: binary resolution and the stdio JSON-RPC client

pub mod client;
pub mod launcher;
pub mod protocol;
pub mod resolver;
pub mod transport;

pub use client::RuntimeClient;
pub use launcher::StdioLauncher;
pub use resolver::{ResolveError, RuntimeResolver, RUNTIME_VERSION};
pub use transport::LineTransport;
