//! Per-call execution context carried into every tool.
//!
//! The context threads three things through the substrate: cooperative
//! cancellation, the sub-agent depth counter, and ambient call metadata
//! (originating channel, workspace, call id). Tools never mutate it; the
//! executor and the sub-agent tool derive new contexts instead.

use std::path::PathBuf;

use tokio_util::sync::CancellationToken;

/// Context for a single tool execution.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    cancel: CancellationToken,
    /// Sub-agent nesting depth. The root loop runs at depth 0.
    pub depth: u8,
    /// Channel identifier of the conversation (e.g. a chat id). Media tools
    /// require it; everything else ignores it.
    pub channel: Option<String>,
    /// Workspace the agent is operating in, when one is open.
    pub workspace: Option<PathBuf>,
    /// Identifier of the originating [`super::ToolCall`], set by the executor.
    pub call_id: Option<String>,
}

impl ExecutionContext {
    /// A fresh root context (depth 0, its own cancellation token).
    pub fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
            depth: 0,
            channel: None,
            workspace: None,
            call_id: None,
        }
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    pub fn with_workspace(mut self, workspace: impl Into<PathBuf>) -> Self {
        self.workspace = Some(workspace.into());
        self
    }

    /// Clone of the cancellation token, for `select!`-style awaiting.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// True once [`ExecutionContext::cancel`] has been called on this context
    /// or any ancestor.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Cancel this context and every child derived from it.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Derive the context handed to a specific tool call.
    pub(crate) fn for_call(&self, call_id: &str) -> Self {
        let mut ctx = self.clone();
        ctx.call_id = Some(call_id.to_string());
        ctx
    }

    /// Derive a child context for a sub-agent: depth + 1, child token.
    ///
    /// Cancelling the parent cancels the child; cancelling the child leaves
    /// the parent running.
    pub fn child(&self) -> Self {
        Self {
            cancel: self.cancel.child_token(),
            depth: self.depth + 1,
            channel: self.channel.clone(),
            workspace: self.workspace.clone(),
            call_id: None,
        }
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}
