//! Git tool with a whitelisted subcommand surface.
//!
//! Only `status`, `diff`, `log`, `commit`, and `show` are reachable.
//! `commit` stages everything first (`git add -A`). History-rewriting and
//! remote-mutating commands (`push`, `reset`, `rebase`, ...) are not
//! whitelisted and never run.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::error::ToolError;
use crate::sandbox::Sandbox;

use super::args::{optional_str, required_str};
use super::context::ExecutionContext;
use super::traits::{Tool, ToolKind, ToolResult};

const ALLOWED_ACTIONS: &[&str] = &["status", "diff", "log", "commit", "show"];

pub struct GitTool {
    sandbox: Arc<Sandbox>,
}

impl GitTool {
    pub fn new(sandbox: Arc<Sandbox>) -> Self {
        Self { sandbox }
    }
}

#[async_trait]
impl Tool for GitTool {
    fn name(&self) -> &str {
        "git"
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Execute
    }

    fn description(&self) -> &str {
        "Run a whitelisted git subcommand: status, diff, log, commit, or \
         show. commit stages all changes first and requires a message."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "enum": ALLOWED_ACTIONS,
                    "description": "The git subcommand to run."
                },
                "message": {
                    "type": "string",
                    "description": "Commit message (required for 'commit')."
                },
                "target": {
                    "type": "string",
                    "description": "Optional path, ref, or revision passed to diff/log/show."
                }
            },
            "required": ["action"]
        })
    }

    async fn execute(
        &self,
        ctx: &ExecutionContext,
        args: Value,
    ) -> Result<ToolResult, ToolError> {
        let action = match required_str(&args, "action") {
            Ok(a) => a,
            Err(e) => return Ok(ToolResult::invalid_arg(e)),
        };
        if !ALLOWED_ACTIONS.contains(&action) {
            return Ok(ToolResult::fail(format!(
                "git action '{action}' is not permitted; allowed: {}",
                ALLOWED_ACTIONS.join(", ")
            )));
        }
        let target = optional_str(&args, "target");

        let mut git_args: Vec<&str> = Vec::new();
        match action {
            "status" => git_args.extend(["status", "--short"]),
            "diff" => {
                git_args.push("diff");
                if let Some(t) = target {
                    git_args.push(t);
                }
            }
            "log" => {
                git_args.extend(["log", "--oneline", "-20"]);
                if let Some(t) = target {
                    git_args.push(t);
                }
            }
            "show" => {
                git_args.push("show");
                git_args.push(target.unwrap_or("HEAD"));
            }
            "commit" => {
                let message = match required_str(&args, "message") {
                    Ok(m) => m,
                    Err(_) => {
                        return Ok(ToolResult::invalid_arg(
                            "'commit' requires a 'message' argument",
                        ));
                    }
                };
                // Stage everything before committing.
                let staged = self.sandbox.execute(ctx, "git", &["add", "-A"]).await?;
                if !staged.success() {
                    return Ok(ToolResult::fail(format!(
                        "git add -A failed: {}",
                        staged.combined_output()
                    )));
                }
                git_args.extend(["commit", "-m", message]);
            }
            _ => unreachable!("action validated above"),
        }

        let outcome = self.sandbox.execute(ctx, "git", &git_args).await?;
        let header = format!("git {}", git_args.join(" "));
        let display = outcome.render_display(&header);
        let mut result = if outcome.success() {
            ToolResult::ok(outcome.combined_output())
        } else {
            let mut r = ToolResult::fail(format!(
                "git {action} exited with status {}",
                outcome.exit_code
            ));
            r.output = outcome.combined_output();
            r
        };
        result = result
            .with_display(display)
            .with_metadata(outcome.metadata());
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;
    use crate::sandbox::SandboxConfig;

    async fn init_repo() -> (TempDir, GitTool, ExecutionContext) {
        let dir = TempDir::new().unwrap();
        let sandbox = Arc::new(Sandbox::new(SandboxConfig::new(dir.path())));
        let ctx = ExecutionContext::new();
        for line in [
            "git init -q",
            "git config user.email gantry@test",
            "git config user.name gantry",
        ] {
            let out = sandbox.execute_shell(&ctx, line).await.unwrap();
            assert!(out.success(), "setup failed: {}", out.combined_output());
        }
        let tool = GitTool::new(sandbox);
        (dir, tool, ctx)
    }

    #[tokio::test]
    async fn status_reports_untracked_file() {
        let (dir, tool, ctx) = init_repo().await;
        fs::write(dir.path().join("x"), "contents").unwrap();

        let r = tool.execute(&ctx, json!({"action": "status"})).await.unwrap();
        assert!(r.success);
        assert!(r.output.contains("?? x"));
    }

    #[tokio::test]
    async fn commit_stages_everything() {
        let (dir, tool, ctx) = init_repo().await;
        fs::write(dir.path().join("a.txt"), "one").unwrap();

        let r = tool
            .execute(&ctx, json!({"action": "commit", "message": "add a"}))
            .await
            .unwrap();
        assert!(r.success, "{}", r.output);

        let r = tool.execute(&ctx, json!({"action": "status"})).await.unwrap();
        assert_eq!(r.output.trim(), "");
    }

    #[tokio::test]
    async fn push_is_rejected() {
        let (_dir, tool, ctx) = init_repo().await;
        let r = tool.execute(&ctx, json!({"action": "push"})).await.unwrap();
        assert!(!r.success);
        assert!(r.error.unwrap().contains("not permitted"));
    }

    #[tokio::test]
    async fn commit_without_message_is_invalid() {
        let (_dir, tool, ctx) = init_repo().await;
        let r = tool.execute(&ctx, json!({"action": "commit"})).await.unwrap();
        assert!(!r.success);
        assert!(r.error.unwrap().contains("message"));
    }
}
