//! Content and filename search tools.
//!
//! Both tools walk the tree with the `ignore` crate (gitignore-aware, skips
//! hidden entries) instead of shelling out, so results are deterministic
//! across hosts with and without `fd`/`rg` installed.

use std::path::PathBuf;

use async_trait::async_trait;
use globset::{Glob, GlobSetBuilder};
use ignore::WalkBuilder;
use serde_json::{Value, json};

use crate::error::ToolError;

use super::args::{optional_bool, optional_str, required_str};
use super::context::ExecutionContext;
use super::traits::{Tool, ToolKind, ToolResult};

/// Maximum matches returned by `grep_search`.
const MAX_GREP_MATCHES: usize = 50;
/// Maximum results returned by `glob`.
const MAX_GLOB_RESULTS: usize = 100;

fn base_dir(ctx: &ExecutionContext, args: &Value) -> PathBuf {
    optional_str(args, "path")
        .map(PathBuf::from)
        .or_else(|| ctx.workspace.clone())
        .unwrap_or_else(|| PathBuf::from("."))
}

// ─── GrepSearchTool ──────────────────────────────────────────────────────────

/// Regex search over file contents.
pub struct GrepSearchTool;

#[async_trait]
impl Tool for GrepSearchTool {
    fn name(&self) -> &str {
        "grep_search"
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Search
    }

    fn description(&self) -> &str {
        "Search file contents with a regular expression. Returns \
         path:line:text matches, at most 50."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "pattern": { "type": "string", "description": "Regular expression to search for." },
                "path": { "type": "string", "description": "File or directory to search (default: workspace)." },
                "recursive": { "type": "boolean", "description": "Descend into subdirectories (default true)." },
                "case_insensitive": { "type": "boolean", "description": "Ignore case (default false)." }
            },
            "required": ["pattern"]
        })
    }

    async fn execute(
        &self,
        ctx: &ExecutionContext,
        args: Value,
    ) -> Result<ToolResult, ToolError> {
        let pattern = match required_str(&args, "pattern") {
            Ok(p) => p,
            Err(e) => return Ok(ToolResult::invalid_arg(e)),
        };
        let case_insensitive = optional_bool(&args, "case_insensitive").unwrap_or(false);
        let recursive = optional_bool(&args, "recursive").unwrap_or(true);
        let base = base_dir(ctx, &args);

        let regex = match regex::RegexBuilder::new(pattern)
            .case_insensitive(case_insensitive)
            .build()
        {
            Ok(r) => r,
            Err(e) => return Ok(ToolResult::fail(format!("invalid pattern: {e}"))),
        };

        let mut walker = WalkBuilder::new(&base);
        if !recursive {
            walker.max_depth(Some(1));
        }
        let mut matches = Vec::new();
        let mut truncated = false;
        'outer: for entry in walker.build().flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Ok(content) = std::fs::read_to_string(path) else {
                continue; // binary or unreadable
            };
            for (lineno, line) in content.lines().enumerate() {
                if regex.is_match(line) {
                    if matches.len() >= MAX_GREP_MATCHES {
                        truncated = true;
                        break 'outer;
                    }
                    let rel = path.strip_prefix(&base).unwrap_or(path);
                    matches.push(format!("{}:{}: {}", rel.display(), lineno + 1, line));
                }
            }
        }

        if matches.is_empty() {
            return Ok(
                ToolResult::ok(format!("no matches for '{pattern}'"))
                    .with_metadata(json!({"count": 0})),
            );
        }
        let mut output = matches.join("\n");
        if truncated {
            output.push_str(&format!("\n... truncated at {MAX_GREP_MATCHES} matches ..."));
        }
        Ok(ToolResult::ok(output).with_metadata(json!({
            "count": matches.len(),
            "truncated": truncated,
        })))
    }
}

// ─── GlobTool ────────────────────────────────────────────────────────────────

/// Filename matching with glob patterns (`**/*.rs`, `src/*.toml`, ...).
pub struct GlobTool;

#[async_trait]
impl Tool for GlobTool {
    fn name(&self) -> &str {
        "glob"
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Search
    }

    fn description(&self) -> &str {
        "Find files whose relative path matches a glob pattern. Returns at \
         most 100 paths."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "pattern": { "type": "string", "description": "Glob pattern, e.g. \"**/*.rs\"." },
                "path": { "type": "string", "description": "Directory to search (default: workspace)." }
            },
            "required": ["pattern"]
        })
    }

    async fn execute(
        &self,
        ctx: &ExecutionContext,
        args: Value,
    ) -> Result<ToolResult, ToolError> {
        let pattern = match required_str(&args, "pattern") {
            Ok(p) => p,
            Err(e) => return Ok(ToolResult::invalid_arg(e)),
        };
        let base = base_dir(ctx, &args);

        let glob = match Glob::new(pattern) {
            Ok(g) => g,
            Err(e) => return Ok(ToolResult::fail(format!("invalid glob: {e}"))),
        };
        let mut builder = GlobSetBuilder::new();
        builder.add(glob);
        let set = match builder.build() {
            Ok(s) => s,
            Err(e) => return Ok(ToolResult::fail(format!("invalid glob: {e}"))),
        };

        let mut results = Vec::new();
        let mut truncated = false;
        for entry in WalkBuilder::new(&base).build().flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let rel = path.strip_prefix(&base).unwrap_or(path);
            if set.is_match(rel) {
                if results.len() >= MAX_GLOB_RESULTS {
                    truncated = true;
                    break;
                }
                results.push(rel.display().to_string());
            }
        }
        results.sort();

        if results.is_empty() {
            return Ok(
                ToolResult::ok(format!("no files match '{pattern}'"))
                    .with_metadata(json!({"count": 0})),
            );
        }
        let mut output = results.join("\n");
        if truncated {
            output.push_str(&format!("\n... truncated at {MAX_GLOB_RESULTS} results ..."));
        }
        Ok(ToolResult::ok(output).with_metadata(json!({
            "count": results.len(),
            "truncated": truncated,
        })))
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    fn fixture() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("main.rs"), "fn main() {\n    run();\n}\n").unwrap();
        let sub = dir.path().join("src");
        fs::create_dir(&sub).unwrap();
        fs::write(sub.join("lib.rs"), "pub fn run() {}\npub fn stop() {}\n").unwrap();
        fs::write(sub.join("notes.txt"), "run the tests\n").unwrap();
        dir
    }

    #[tokio::test]
    async fn grep_finds_matches_with_line_numbers() {
        let dir = fixture();
        let r = GrepSearchTool
            .execute(
                &ExecutionContext::new(),
                json!({"pattern": "fn run", "path": dir.path().display().to_string()}),
            )
            .await
            .unwrap();
        assert!(r.success);
        assert!(r.output.contains("lib.rs:1:"));
    }

    #[tokio::test]
    async fn grep_non_recursive_stays_shallow() {
        let dir = fixture();
        let r = GrepSearchTool
            .execute(
                &ExecutionContext::new(),
                json!({
                    "pattern": "run",
                    "path": dir.path().display().to_string(),
                    "recursive": false
                }),
            )
            .await
            .unwrap();
        assert!(r.output.contains("main.rs"));
        assert!(!r.output.contains("lib.rs"));
    }

    #[tokio::test]
    async fn grep_caps_matches() {
        let dir = TempDir::new().unwrap();
        let body = "hit\n".repeat(80);
        fs::write(dir.path().join("big.txt"), body).unwrap();
        let r = GrepSearchTool
            .execute(
                &ExecutionContext::new(),
                json!({"pattern": "hit", "path": dir.path().display().to_string()}),
            )
            .await
            .unwrap();
        assert_eq!(r.metadata.unwrap()["count"], 50);
        assert!(r.output.contains("truncated at 50 matches"));
    }

    #[tokio::test]
    async fn grep_invalid_regex_fails_cleanly() {
        let r = GrepSearchTool
            .execute(&ExecutionContext::new(), json!({"pattern": "("}))
            .await
            .unwrap();
        assert!(!r.success);
    }

    #[tokio::test]
    async fn glob_matches_nested_paths() {
        let dir = fixture();
        let r = GlobTool
            .execute(
                &ExecutionContext::new(),
                json!({"pattern": "**/*.rs", "path": dir.path().display().to_string()}),
            )
            .await
            .unwrap();
        assert!(r.output.contains("main.rs"));
        assert!(r.output.contains("src/lib.rs"));
        assert!(!r.output.contains("notes.txt"));
    }

    #[tokio::test]
    async fn glob_no_match_reports_cleanly() {
        let dir = fixture();
        let r = GlobTool
            .execute(
                &ExecutionContext::new(),
                json!({"pattern": "**/*.go", "path": dir.path().display().to_string()}),
            )
            .await
            .unwrap();
        assert!(r.success);
        assert!(r.output.contains("no files match"));
    }
}
