//! The `spawn_agent` tool: bounded recursive re-entry into the agent loop.

use std::{collections::BTreeSet, sync::Arc, time::Duration};

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::mpsc;

use crate::agent::{AgentEvent, AgentRequest, AgentRunner, MAX_AGENT_DEPTH};
use crate::error::ToolError;

use super::args::{optional_str, optional_u64, required_str};
use super::context::ExecutionContext;
use super::traits::{Tool, ToolKind, ToolResult};

/// Wall-clock budget for one sub-agent run.
const DEFAULT_SUBAGENT_TIMEOUT: Duration = Duration::from_secs(180);

pub struct SpawnAgentTool {
    runner: Arc<dyn AgentRunner>,
    timeout: Duration,
}

impl SpawnAgentTool {
    pub fn new(runner: Arc<dyn AgentRunner>) -> Self {
        Self {
            runner,
            timeout: DEFAULT_SUBAGENT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Tool for SpawnAgentTool {
    fn name(&self) -> &str {
        "spawn_agent"
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Execute
    }

    fn description(&self) -> &str {
        "Delegate a self-contained task to a fresh sub-agent sharing this \
         session's tools. Returns the sub-agent's final answer and a run \
         summary. Nesting is bounded; sub-agents of sub-agents are refused."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "task": { "type": "string", "description": "What the sub-agent should accomplish." },
                "system_prompt": {
                    "type": "string",
                    "description": "Optional system prompt override for the sub-agent."
                },
                "max_steps": {
                    "type": "integer",
                    "description": "Optional cap on reasoning iterations.",
                    "minimum": 1
                }
            },
            "required": ["task"]
        })
    }

    async fn execute(
        &self,
        ctx: &ExecutionContext,
        args: Value,
    ) -> Result<ToolResult, ToolError> {
        let task = match required_str(&args, "task") {
            Ok(t) => t.to_string(),
            Err(e) => return Ok(ToolResult::invalid_arg(e)),
        };

        // Depth check before any work: entering from depth d runs the child
        // at d + 1, which must stay below MAX_AGENT_DEPTH.
        if ctx.depth + 1 >= MAX_AGENT_DEPTH {
            return Err(ToolError::DepthExceeded(MAX_AGENT_DEPTH));
        }

        let request = AgentRequest {
            task: task.clone(),
            system_prompt: optional_str(&args, "system_prompt").map(str::to_string),
            max_steps: optional_u64(&args, "max_steps").map(|n| n as u32),
        };

        let child_ctx = ctx.child();
        let (tx, mut rx) = mpsc::channel::<AgentEvent>(64);

        // Drain events concurrently, recording the tool names used. Nothing
        // is forwarded upstream; the parent sees only the summary.
        let drain = tokio::spawn(async move {
            let mut tools_used = BTreeSet::new();
            let mut last_step = 0u32;
            while let Some(event) = rx.recv().await {
                match event {
                    AgentEvent::ToolInvoked { tool } => {
                        tools_used.insert(tool);
                    }
                    AgentEvent::StepStarted { step } => last_step = step,
                    AgentEvent::Note { .. } => {}
                }
            }
            (tools_used, last_step)
        });

        let run = self.runner.run(&child_ctx, request, tx);
        let outcome = tokio::time::timeout(self.timeout, run).await;
        // Stop the child's tools if the run was abandoned.
        let outcome = match outcome {
            Ok(result) => result,
            Err(_) => {
                child_ctx.cancel();
                let (tools_used, _) = drain.await.unwrap_or_default();
                return Ok(ToolResult::fail(format!(
                    "sub-agent timed out after {:?}",
                    self.timeout
                ))
                .with_metadata(json!({
                    "timed_out": true,
                    "tools_used": tools_used.into_iter().collect::<Vec<_>>(),
                })));
            }
        };
        let (tools_used, _) = drain.await.unwrap_or_default();

        let outcome = match outcome {
            Ok(o) => o,
            Err(e) => {
                return Ok(ToolResult::fail(format!("sub-agent failed: {e}")));
            }
        };

        let tools_list: Vec<String> = tools_used.into_iter().collect();
        let summary = format!(
            "Sub-agent completed.\n  Task: {task}\n  Model: {}\n  Steps: {}  Tokens: {}\n  Tools used: {}\n---\n{}",
            outcome.model_used,
            outcome.total_steps,
            outcome.total_tokens,
            if tools_list.is_empty() {
                "none".to_string()
            } else {
                tools_list.join(", ")
            },
            outcome.final_content,
        );

        Ok(ToolResult::ok(summary).with_metadata(json!({
            "total_steps": outcome.total_steps,
            "total_tokens": outcome.total_tokens,
            "model_used": outcome.model_used,
            "tools_used": tools_list,
            "depth": child_ctx.depth,
        })))
    }
}
