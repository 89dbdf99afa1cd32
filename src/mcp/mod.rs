//! Remote-protocol (MCP-style) tool adapter: HTTP JSON-RPC discovery and
//! invocation, with a supervising manager that persists the provider set.

pub mod client;
pub mod manager;
pub mod proxy;

pub use client::{McpClient, RemoteCallOutcome, RemoteToolDescriptor};
pub use manager::{McpManager, McpServerConfig, McpServerInfo};
pub use proxy::RemoteToolProxy;
