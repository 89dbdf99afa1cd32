//! The tool substrate: trait, registry, executor, and the built-in family.

pub mod args;
pub mod context;
pub mod display;
pub mod edit;
pub mod executor;
pub mod file_ops;
pub mod git;
pub mod lint;
pub mod media;
pub mod memory_tool;
pub mod patch;
pub mod plan_tool;
pub mod registry;
pub mod repo_map;
pub mod search;
pub mod shell;
pub mod spawn;
pub mod traits;
pub mod web;

use std::sync::Arc;

use crate::agent::AgentRunner;
use crate::lsp::{LspManager, LspTool};
use crate::memory::{DailyMemory, MemoryStore};
use crate::plan::PlanStore;
use crate::sandbox::Sandbox;

pub use context::ExecutionContext;
pub use edit::EditFileTool;
pub use executor::ToolExecutor;
pub use file_ops::{ListDirTool, ReadFileTool, WriteFileTool};
pub use git::GitTool;
pub use lint::LintFixTool;
pub use media::{MediaChannel, SendDocumentTool, SendMediaGroupTool, SendPhotoTool};
pub use memory_tool::SaveMemoryTool;
pub use patch::ApplyPatchTool;
pub use plan_tool::UpdatePlanTool;
pub use registry::ToolRegistry;
pub use repo_map::RepoMapTool;
pub use search::{GlobTool, GrepSearchTool};
pub use shell::BashTool;
pub use spawn::SpawnAgentTool;
pub use traits::{Tool, ToolCall, ToolInfo, ToolKind, ToolResult};
pub use web::WebFetchTool;

/// Dependencies needed to register the built-in tool family.
pub struct BuiltinToolContext {
    pub sandbox: Arc<Sandbox>,
    pub plan_store: Arc<PlanStore>,
    pub memory_store: Arc<MemoryStore>,
    pub daily_memory: Arc<DailyMemory>,
    /// Media tools are only registered when a transport exists.
    pub media: Option<Arc<dyn MediaChannel>>,
    /// The sub-agent tool is only registered when the host wires a runner.
    pub agent_runner: Option<Arc<dyn AgentRunner>>,
    /// The `lsp` tool is only registered when a workspace is open.
    pub lsp: Option<Arc<LspManager>>,
}

/// Register every built-in tool whose dependencies are available.
pub fn register_builtin_tools(registry: &ToolRegistry, ctx: BuiltinToolContext) {
    registry.register(Arc::new(BashTool::new(ctx.sandbox.clone())));
    registry.register(Arc::new(ReadFileTool));
    registry.register(Arc::new(WriteFileTool));
    registry.register(Arc::new(EditFileTool));
    registry.register(Arc::new(ListDirTool));
    registry.register(Arc::new(GrepSearchTool));
    registry.register(Arc::new(GlobTool));
    registry.register(Arc::new(ApplyPatchTool));
    registry.register(Arc::new(WebFetchTool::new()));
    registry.register(Arc::new(GitTool::new(ctx.sandbox.clone())));
    registry.register(Arc::new(LintFixTool::new(ctx.sandbox.clone())));
    registry.register(Arc::new(RepoMapTool));
    registry.register(Arc::new(UpdatePlanTool::new(ctx.plan_store)));
    registry.register(Arc::new(SaveMemoryTool::new(
        ctx.memory_store,
        ctx.daily_memory,
    )));
    if let Some(media) = ctx.media {
        registry.register(Arc::new(SendPhotoTool::new(media.clone())));
        registry.register(Arc::new(SendDocumentTool::new(media.clone())));
        registry.register(Arc::new(SendMediaGroupTool::new(media)));
    }
    if let Some(runner) = ctx.agent_runner {
        registry.register(Arc::new(SpawnAgentTool::new(runner)));
    }
    if let Some(lsp) = ctx.lsp {
        registry.register(Arc::new(LspTool::new(lsp)));
    }
}
