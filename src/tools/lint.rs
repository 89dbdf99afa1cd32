//! Language-aware lint/test/build dispatch.
//!
//! The project language is detected from marker files in the working
//! directory; each (language, action) pair maps to one fixed command line
//! executed through the sandbox.

use std::{path::Path, sync::Arc};

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::error::ToolError;
use crate::sandbox::Sandbox;

use super::args::required_str;
use super::context::ExecutionContext;
use super::traits::{Tool, ToolKind, ToolResult};

/// Marker files checked in order; the first hit wins.
const MARKERS: &[(&str, &str)] = &[
    ("go.mod", "go"),
    ("Cargo.toml", "rust"),
    ("pyproject.toml", "python"),
    ("package.json", "javascript"),
];

fn command_for(language: &str, action: &str) -> Option<&'static str> {
    Some(match (language, action) {
        ("go", "lint") => "golangci-lint run ./...",
        ("go", "test") => "go test ./...",
        ("go", "build") => "go build ./...",
        ("rust", "lint") => "cargo clippy --quiet",
        ("rust", "test") => "cargo test --quiet",
        ("rust", "build") => "cargo build --quiet",
        ("python", "lint") => "ruff check .",
        ("python", "test") => "pytest -q",
        ("python", "build") => "python3 -m compileall -q .",
        ("javascript", "lint") => "npx eslint .",
        ("javascript", "test") => "npm test --silent",
        ("javascript", "build") => "npm run build --silent",
        _ => return None,
    })
}

/// Detect the project language from marker files in `dir`.
pub fn detect_language(dir: &Path) -> Option<&'static str> {
    MARKERS
        .iter()
        .find(|(marker, _)| dir.join(marker).is_file())
        .map(|(_, language)| *language)
}

pub struct LintFixTool {
    sandbox: Arc<Sandbox>,
}

impl LintFixTool {
    pub fn new(sandbox: Arc<Sandbox>) -> Self {
        Self { sandbox }
    }
}

#[async_trait]
impl Tool for LintFixTool {
    fn name(&self) -> &str {
        "lint_fix"
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Edit
    }

    fn description(&self) -> &str {
        "Run the project's lint, test, or build command. The language is \
         detected from marker files (go.mod, Cargo.toml, pyproject.toml, \
         package.json) in the sandbox working directory."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "enum": ["lint", "test", "build"],
                    "description": "Which project command to run."
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
        if !matches!(action, "lint" | "test" | "build") {
            return Ok(ToolResult::invalid_arg(format!(
                "unknown action '{action}': expected lint, test, or build"
            )));
        }

        let workdir = self.sandbox.workdir();
        let Some(language) = detect_language(&workdir) else {
            return Ok(ToolResult::fail(format!(
                "could not detect a project language in '{}' (no go.mod, \
                 Cargo.toml, pyproject.toml, or package.json)",
                workdir.display()
            )));
        };
        let Some(command) = command_for(language, action) else {
            return Ok(ToolResult::fail(format!(
                "no {action} command configured for {language}"
            )));
        };

        log::info!("lint_fix: running '{command}' ({language}/{action})");
        let outcome = self.sandbox.execute_shell(ctx, command).await?;
        let display = outcome.render_display(command);
        let mut result = if outcome.success() {
            ToolResult::ok(outcome.combined_output())
        } else {
            let mut r = ToolResult::fail(format!(
                "'{command}' exited with status {}",
                outcome.exit_code
            ));
            r.output = outcome.combined_output();
            r
        };
        result = result
            .with_display(display)
            .with_metadata(outcome.metadata());
        result.annotate("language", json!(language));
        result.annotate("action", json!(action));
        Ok(result)
    }
}
