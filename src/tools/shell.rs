use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::error::ToolError;
use crate::sandbox::Sandbox;

use super::args::required_str;
use super::context::ExecutionContext;
use super::traits::{Tool, ToolKind, ToolResult};

/// Executes arbitrary shell commands through the sandbox (`bash -c`).
///
/// Non-allowed binaries and expired deadlines surface as failed results;
/// success mirrors the exit code.
pub struct BashTool {
    sandbox: Arc<Sandbox>,
}

impl BashTool {
    pub fn new(sandbox: Arc<Sandbox>) -> Self {
        Self { sandbox }
    }
}

#[async_trait]
impl Tool for BashTool {
    fn name(&self) -> &str {
        "bash"
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Execute
    }

    fn description(&self) -> &str {
        "Execute a shell command line via bash and return its captured \
         stdout/stderr. The command's binary must be in the sandbox \
         allow-list and the run is bounded by the sandbox deadline."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The shell command line to execute."
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(
        &self,
        ctx: &ExecutionContext,
        args: Value,
    ) -> Result<ToolResult, ToolError> {
        let command = match required_str(&args, "command") {
            Ok(c) => c.to_string(),
            Err(e) => return Ok(ToolResult::invalid_arg(e)),
        };

        let outcome = match self.sandbox.execute_shell(ctx, &command).await {
            Ok(outcome) => outcome,
            Err(ToolError::NotAllowed(what)) => {
                return Ok(ToolResult::fail(format!("{what} is not allowed")));
            }
            Err(e) => return Err(e),
        };

        let display = outcome.render_display(&command);
        let mut result = if outcome.success() {
            ToolResult::ok(outcome.combined_output())
        } else if outcome.killed {
            ToolResult::fail(outcome.combined_output())
        } else {
            let mut r = ToolResult::fail(format!(
                "command exited with status {}",
                outcome.exit_code
            ));
            r.output = outcome.combined_output();
            r
        };
        result = result.with_display(display).with_metadata(outcome.metadata());
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::SandboxConfig;

    fn tool() -> BashTool {
        BashTool::new(Arc::new(Sandbox::new(SandboxConfig::new(
            std::env::temp_dir(),
        ))))
    }

    #[tokio::test]
    async fn echo_roundtrip() {
        let r = tool()
            .execute(&ExecutionContext::new(), json!({"command": "echo hello"}))
            .await
            .unwrap();
        assert!(r.success);
        assert_eq!(r.output, "hello\n");
        assert_eq!(r.metadata.unwrap()["exit_code"], 0);
    }

    #[tokio::test]
    async fn nonzero_exit_fails() {
        let r = tool()
            .execute(&ExecutionContext::new(), json!({"command": "exit 7"}))
            .await
            .unwrap();
        assert!(!r.success);
        assert_eq!(r.metadata.unwrap()["exit_code"], 7);
    }

    #[tokio::test]
    async fn missing_command_is_invalid_arg() {
        let r = tool()
            .execute(&ExecutionContext::new(), json!({}))
            .await
            .unwrap();
        assert!(!r.success);
        assert!(r.error.unwrap().contains("command"));
    }

    #[tokio::test]
    async fn display_has_status_line() {
        let r = tool()
            .execute(&ExecutionContext::new(), json!({"command": "echo hi"}))
            .await
            .unwrap();
        let display = r.display.unwrap();
        assert!(display.starts_with("✅ echo hi"));
    }
}
