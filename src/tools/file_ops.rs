use std::{fs, path::Path};

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::error::ToolError;

use super::args::{optional_bool, optional_u64, required_path};
use super::context::ExecutionContext;
use super::traits::{Tool, ToolKind, ToolResult};

/// Recursive listings stop at this depth below the requested directory.
const MAX_LIST_DEPTH: usize = 3;
/// Recursive listings return at most this many entries.
const MAX_LIST_ENTRIES: usize = 100;

// ─── ReadFileTool ────────────────────────────────────────────────────────────

/// Reads a file, optionally restricted to a 1-indexed line range.
pub struct ReadFileTool;

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Read
    }

    fn description(&self) -> &str {
        "Read the contents of a file. Pass start_line/end_line (1-indexed, \
         inclusive) to read a slice of a large file."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "Path to the file." },
                "start_line": {
                    "type": "integer",
                    "description": "First line to return (1-indexed).",
                    "minimum": 1
                },
                "end_line": {
                    "type": "integer",
                    "description": "Last line to return (inclusive). Omit to read to the end.",
                    "minimum": 1
                }
            },
            "required": ["path"]
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
        let start = optional_u64(&args, "start_line").map(|n| n as usize);
        let end = optional_u64(&args, "end_line").map(|n| n as usize);

        let contents = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) => {
                return Ok(ToolResult::fail(format!(
                    "failed to read '{}': {e}",
                    path.display()
                )));
            }
        };

        let output = match (start, end) {
            (None, None) => contents,
            (start, end) => {
                let start = start.unwrap_or(1).max(1);
                let lines: Vec<&str> = contents.lines().collect();
                if start > lines.len() {
                    return Ok(ToolResult::fail(format!(
                        "start_line {start} is past the end of the file ({} lines)",
                        lines.len()
                    )));
                }
                let end = end.unwrap_or(lines.len()).min(lines.len());
                lines[start - 1..end].join("\n")
            }
        };

        let line_count = output.lines().count();
        Ok(ToolResult::ok(output).with_metadata(json!({
            "path": path.display().to_string(),
            "lines": line_count,
        })))
    }
}

// ─── WriteFileTool ───────────────────────────────────────────────────────────

/// Overwrites (or creates) a file with the caller-supplied body.
pub struct WriteFileTool;

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Edit
    }

    fn description(&self) -> &str {
        "Write content to a file, creating it if it does not exist and \
         overwriting it if it does. Parent directories are created."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path":    { "type": "string", "description": "Path to write." },
                "content": { "type": "string", "description": "Full file body." }
            },
            "required": ["path", "content"]
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
        let content = match args.get("content").and_then(Value::as_str) {
            Some(c) => c,
            None => return Ok(ToolResult::invalid_arg("missing required argument 'content'")),
        };

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && let Err(e) = fs::create_dir_all(parent)
        {
            return Ok(ToolResult::fail(format!(
                "failed to create parent directories: {e}"
            )));
        }

        let bytes = content.len();
        if let Err(e) = fs::write(&path, content) {
            return Ok(ToolResult::fail(format!(
                "failed to write '{}': {e}",
                path.display()
            )));
        }

        Ok(
            ToolResult::ok(format!("wrote {bytes} bytes to '{}'", path.display()))
                .with_metadata(json!({
                    "path": path.display().to_string(),
                    "bytes": bytes,
                })),
        )
    }
}

// ─── ListDirTool ─────────────────────────────────────────────────────────────

/// Lists a directory, flat (with file sizes) or shallow-recursive.
pub struct ListDirTool;

#[async_trait]
impl Tool for ListDirTool {
    fn name(&self) -> &str {
        "list_dir"
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Read
    }

    fn description(&self) -> &str {
        "List the contents of a directory. With recursive=true, descends up \
         to three levels and returns at most 100 entries."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "Directory to list." },
                "recursive": {
                    "type": "boolean",
                    "description": "Descend into subdirectories (default false)."
                }
            },
            "required": ["path"]
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
        let recursive = optional_bool(&args, "recursive").unwrap_or(false);

        if !path.is_dir() {
            return Ok(ToolResult::fail(format!(
                "'{}' is not a directory",
                path.display()
            )));
        }

        let mut entries = Vec::new();
        let truncated = if recursive {
            collect_recursive(&path, &path, 0, &mut entries)
        } else {
            match collect_flat(&path, &mut entries) {
                Ok(()) => false,
                Err(e) => {
                    return Ok(ToolResult::fail(format!(
                        "failed to list '{}': {e}",
                        path.display()
                    )));
                }
            }
        };
        entries.sort();

        let mut output = entries.join("\n");
        if truncated {
            output.push_str(&format!("\n... truncated at {MAX_LIST_ENTRIES} entries ..."));
        }
        Ok(ToolResult::ok(output).with_metadata(json!({
            "count": entries.len(),
            "truncated": truncated,
        })))
    }
}

fn collect_flat(dir: &Path, out: &mut Vec<String>) -> std::io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let meta = entry.metadata()?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if meta.is_dir() {
            out.push(format!("{name}/"));
        } else {
            out.push(format!("{name}  ({} bytes)", meta.len()));
        }
    }
    Ok(())
}

/// Returns true when the entry cap was hit.
fn collect_recursive(root: &Path, dir: &Path, depth: usize, out: &mut Vec<String>) -> bool {
    if depth > MAX_LIST_DEPTH {
        return false;
    }
    let Ok(entries) = fs::read_dir(dir) else {
        return false;
    };
    for entry in entries.flatten() {
        if out.len() >= MAX_LIST_ENTRIES {
            return true;
        }
        let path = entry.path();
        let rel = path
            .strip_prefix(root)
            .unwrap_or(&path)
            .to_string_lossy()
            .into_owned();
        if path.is_dir() {
            out.push(format!("{rel}/"));
            if collect_recursive(root, &path, depth + 1, out) {
                return true;
            }
        } else {
            out.push(rel);
        }
    }
    false
}
