//! Gantry — the tool-execution substrate for an autonomous LLM agent
//! gateway.
//!
//! The reasoning loop decomposes a user task into tool calls; this crate
//! dispatches each call to the right backend (sandboxed subprocess,
//! remote JSON-RPC provider, language-server process, media sender,
//! delegated sub-agent), enforces policy, and returns the results. It also
//! assembles the layered system prompt the loop runs under.
//!
//! The LLM client, conversation store, and chat transports live outside
//! this crate, behind the [`agent::AgentRunner`] and
//! [`tools::MediaChannel`] seams.

pub mod agent;
pub mod config;
pub mod error;
pub mod lsp;
pub mod mcp;
pub mod memory;
pub mod plan;
pub mod plugins;
pub mod policy;
pub mod prompts;
pub mod sandbox;
pub mod skills;
pub mod tools;

/// Convenience re-exports for the most commonly used types.
pub mod prelude {
    pub use crate::agent::{AgentOutcome, AgentRequest, AgentRunner};
    pub use crate::config::GatewayPaths;
    pub use crate::error::ToolError;
    pub use crate::lsp::LspManager;
    pub use crate::mcp::McpManager;
    pub use crate::memory::{DailyMemory, MemoryStore};
    pub use crate::plan::PlanStore;
    pub use crate::policy::{PolicyRules, ToolPolicy};
    pub use crate::prompts::{PromptContext, PromptEngine};
    pub use crate::sandbox::{Sandbox, SandboxConfig};
    pub use crate::tools::{
        ExecutionContext, Tool, ToolCall, ToolExecutor, ToolInfo, ToolKind, ToolRegistry,
        ToolResult, register_builtin_tools,
    };
}
