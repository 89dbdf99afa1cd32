//! Apply unified diff patches with the `diffy` crate.

use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::error::ToolError;

use super::args::{optional_bool, required_path, required_str};
use super::context::ExecutionContext;
use super::traits::{Tool, ToolKind, ToolResult};

/// Applies a unified diff to a single file, reporting conflicts instead of
/// partially applying.
pub struct ApplyPatchTool;

#[async_trait]
impl Tool for ApplyPatchTool {
    fn name(&self) -> &str {
        "apply_patch"
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Edit
    }

    fn description(&self) -> &str {
        "Apply a unified diff to a file. Reports a conflict when the patch \
         does not apply cleanly; set dry_run=true to validate only."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "File to patch." },
                "diff": { "type": "string", "description": "Unified diff content." },
                "dry_run": {
                    "type": "boolean",
                    "description": "Validate without writing (default false)."
                }
            },
            "required": ["path", "diff"]
        })
    }

    async fn execute(
        &self,
        _ctx: &ExecutionContext,
        args: Value,
    ) -> Result<ToolResult, ToolError> {
        let path = match required_path(&args, "path") {
            Ok(p) => p,
            Err(e) => return Ok(ToolResult::invalid_arg(e)),
        };
        let diff = match required_str(&args, "diff") {
            Ok(d) => d.to_string(),
            Err(e) => return Ok(ToolResult::invalid_arg(e)),
        };
        let dry_run = optional_bool(&args, "dry_run").unwrap_or(false);

        Ok(apply_patch(&path, &diff, dry_run))
    }
}

fn apply_patch(path: &PathBuf, diff: &str, dry_run: bool) -> ToolResult {
    let original = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => return ToolResult::fail(format!("failed to read '{}': {e}", path.display())),
    };

    let patch = match diffy::Patch::from_str(diff) {
        Ok(p) => p,
        Err(e) => return ToolResult::fail(format!("failed to parse diff: {e}")),
    };

    match diffy::apply(&original, &patch) {
        Ok(patched) => {
            if dry_run {
                return ToolResult::ok(format!(
                    "patch would apply cleanly to '{}' (dry run)",
                    path.display()
                ))
                .with_metadata(json!({"dry_run": true}));
            }
            if let Err(e) = std::fs::write(path, &patched) {
                return ToolResult::fail(format!("failed to write '{}': {e}", path.display()));
            }
            ToolResult::ok(format!("patch applied to '{}'", path.display()))
                .with_metadata(json!({"conflicts": false}))
        }
        Err(e) => ToolResult::fail(format!("patch conflict in '{}': {e}", path.display()))
            .with_metadata(json!({"conflicts": true})),
    }
}
