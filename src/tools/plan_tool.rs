//! The `update_plan` tool: create and advance the session plan.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::error::ToolError;
use crate::plan::{PlanStore, StepStatus};

use super::args::{optional_str, optional_u64, required_str, string_array};
use super::context::ExecutionContext;
use super::traits::{Tool, ToolKind, ToolResult};

pub struct UpdatePlanTool {
    store: Arc<PlanStore>,
}

impl UpdatePlanTool {
    pub fn new(store: Arc<PlanStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for UpdatePlanTool {
    fn name(&self) -> &str {
        "update_plan"
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Think
    }

    fn description(&self) -> &str {
        "Track the work plan. action='create' starts a new plan from a goal \
         and a list of steps; action='update' sets one step's status \
         (pending, in_progress, done, error, skipped) with optional notes."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "enum": ["create", "update"],
                    "description": "Create a new plan or update a step."
                },
                "goal":  { "type": "string", "description": "Plan goal (create)." },
                "steps": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Ordered step titles (create)."
                },
                "step_id": { "type": "integer", "description": "Step to update (1-indexed)." },
                "status": {
                    "type": "string",
                    "enum": ["pending", "in_progress", "done", "error", "skipped"],
                    "description": "New status for the step (update)."
                },
                "notes": { "type": "string", "description": "Optional notes for the step." }
            },
            "required": ["action"]
        })
    }

    async fn execute(
        &self,
        _ctx: &ExecutionContext,
        args: Value,
    ) -> Result<ToolResult, ToolError> {
        let action = match required_str(&args, "action") {
            Ok(a) => a,
            Err(e) => return Ok(ToolResult::invalid_arg(e)),
        };

        let plan = match action {
            "create" => {
                let goal = match required_str(&args, "goal") {
                    Ok(g) => g,
                    Err(e) => return Ok(ToolResult::invalid_arg(e)),
                };
                let steps = match string_array(&args, "steps") {
                    Ok(s) if !s.is_empty() => s,
                    Ok(_) => {
                        return Ok(ToolResult::invalid_arg("'steps' must not be empty"));
                    }
                    Err(e) => return Ok(ToolResult::invalid_arg(e)),
                };
                self.store.create(goal, steps)?
            }
            "update" => {
                let step_id = match optional_u64(&args, "step_id") {
                    Some(id) => id as usize,
                    None => {
                        return Ok(ToolResult::invalid_arg(
                            "missing required argument 'step_id'",
                        ));
                    }
                };
                let status = match required_str(&args, "status")
                    .ok()
                    .and_then(StepStatus::parse)
                {
                    Some(s) => s,
                    None => {
                        return Ok(ToolResult::invalid_arg(
                            "'status' must be one of pending, in_progress, done, error, skipped",
                        ));
                    }
                };
                let notes = optional_str(&args, "notes").map(str::to_string);
                match self.store.update_step(step_id, status, notes) {
                    Ok(plan) => plan,
                    Err(ToolError::InvalidArg(msg)) => {
                        return Ok(ToolResult::invalid_arg(msg));
                    }
                    Err(e) => return Err(e),
                }
            }
            other => {
                return Ok(ToolResult::invalid_arg(format!(
                    "unknown action '{other}': expected 'create' or 'update'"
                )));
            }
        };

        let rendered = plan.render();
        Ok(ToolResult::ok(rendered.clone())
            .with_display(rendered)
            .with_metadata(json!({
                "progress_percent": plan.progress_percent(),
                "steps": plan.steps.len(),
            })))
    }
}
