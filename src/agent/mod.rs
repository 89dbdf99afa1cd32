//! The sub-agent delegation seam.
//!
//! The substrate does not own the reasoning loop — the hosting gateway
//! implements [`AgentRunner`] over its LLM client and this crate's
//! [`crate::tools::ToolExecutor`]. The `spawn_agent` tool re-enters that
//! loop with a child execution context, a deadline, and the depth bound.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::ToolError;
use crate::tools::context::ExecutionContext;

/// Deepest context at which an agent may still run. The root loop is depth
/// 0; its sub-agents run at depth 1; anything deeper never starts.
pub const MAX_AGENT_DEPTH: u8 = 2;

/// What a sub-agent is asked to do.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRequest {
    pub task: String,
    /// Override for the system prompt; `None` uses the runner's default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    /// Cap on reasoning iterations; `None` uses the runner's default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_steps: Option<u32>,
}

/// Progress events emitted while a sub-agent runs. The parent drains these
/// (recording which tools were used) without forwarding them upstream.
#[derive(Debug, Clone)]
pub enum AgentEvent {
    StepStarted { step: u32 },
    ToolInvoked { tool: String },
    Note { text: String },
}

/// Final summary of one agent run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentOutcome {
    pub final_content: String,
    pub total_steps: u32,
    pub total_tokens: u64,
    pub model_used: String,
}

/// A runnable reasoning loop. Implementations share the substrate's
/// executor, so sub-agent tool calls obey the same policy and sandbox.
#[async_trait]
pub trait AgentRunner: Send + Sync {
    /// Run the loop to completion, streaming [`AgentEvent`]s through
    /// `events`. Implementations must honor `ctx` cancellation between
    /// steps.
    async fn run(
        &self,
        ctx: &ExecutionContext,
        request: AgentRequest,
        events: mpsc::Sender<AgentEvent>,
    ) -> Result<AgentOutcome, ToolError>;
}
