//! The `lsp` tool: six language-server operations behind one schema.

use std::{path::PathBuf, sync::Arc};

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::error::ToolError;
use crate::tools::args::{optional_u64, required_str};
use crate::tools::context::ExecutionContext;
use crate::tools::traits::{Tool, ToolKind, ToolResult};

use super::client::{LspManager, path_to_uri, uri_to_path};
use super::languages::recipe_for;

const ACTIONS: &[&str] = &[
    "definition",
    "references",
    "hover",
    "diagnostics",
    "symbols",
    "completion",
];

pub struct LspTool {
    manager: Arc<LspManager>,
}

impl LspTool {
    pub fn new(manager: Arc<LspManager>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl Tool for LspTool {
    fn name(&self) -> &str {
        "lsp"
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Read
    }

    fn description(&self) -> &str {
        "Query a language server about a source file: definition, \
         references, hover, diagnostics, symbols, or completion. Line and \
         column are 1-indexed. The right server is started on first use."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "enum": ACTIONS,
                    "description": "Which query to run."
                },
                "file":   { "type": "string", "description": "Source file to query." },
                "line":   { "type": "integer", "minimum": 1, "description": "1-indexed line (position queries)." },
                "column": { "type": "integer", "minimum": 1, "description": "1-indexed column (position queries)." }
            },
            "required": ["action", "file"]
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
        if !ACTIONS.contains(&action) {
            return Ok(ToolResult::invalid_arg(format!(
                "unknown action '{action}'; expected one of {}",
                ACTIONS.join(", ")
            )));
        }
        let file = match required_str(&args, "file") {
            Ok(f) => f,
            Err(e) => return Ok(ToolResult::invalid_arg(e)),
        };
        let path = resolve_path(ctx, file);
        if !path.is_file() {
            return Ok(ToolResult::fail(format!(
                "'{}' does not exist",
                path.display()
            )));
        }

        let Some(recipe) = recipe_for(&path) else {
            return Ok(ToolResult::fail(format!(
                "no language server is configured for '{}'",
                path.display()
            )));
        };

        let server = match self.manager.get_or_start(recipe).await {
            Ok(s) => s,
            // Missing binary (install hint) and handshake failures are
            // model-visible; the model may pick another tool.
            Err(e) => return Ok(ToolResult::fail(e.to_string())),
        };
        if let Err(e) = server.ensure_open(&path).await {
            return Ok(ToolResult::fail(e.to_string()));
        }

        let uri = path_to_uri(&path);
        let needs_position = matches!(action, "definition" | "references" | "hover" | "completion");
        let position = if needs_position {
            let line = optional_u64(&args, "line");
            let column = optional_u64(&args, "column");
            match (line, column) {
                (Some(l), Some(c)) if l >= 1 && c >= 1 => {
                    // 1-indexed externally, 0-indexed on the wire.
                    Some(json!({"line": l - 1, "character": c - 1}))
                }
                _ => {
                    return Ok(ToolResult::invalid_arg(format!(
                        "action '{action}' requires 1-indexed 'line' and 'column'"
                    )));
                }
            }
        } else {
            None
        };

        let output = match run_action(&server, action, &uri, &path, position).await {
            Ok(output) => output,
            // Server-side failures are something the model can react to.
            Err(
                e @ (ToolError::ExecutionFailure(_)
                | ToolError::Transport(_)
                | ToolError::Timeout(_)),
            ) => return Ok(ToolResult::fail(e.to_string())),
            Err(e) => return Err(e),
        };

        Ok(ToolResult::ok(output).with_metadata(json!({
            "action": action,
            "language": server.language_id(),
        })))
    }
}

async fn run_action(
    server: &std::sync::Arc<super::client::LspServer>,
    action: &str,
    uri: &str,
    path: &std::path::Path,
    position: Option<Value>,
) -> Result<String, ToolError> {
    let output = match action {
        "definition" => {
            let result = server
                .request(
                    "textDocument/definition",
                    json!({"textDocument": {"uri": uri}, "position": position}),
                )
                .await?;
            let locations = format_locations(&result);
            if locations.is_empty() {
                "no definition found".to_string()
            } else {
                locations.join("\n")
            }
        }
        "references" => {
            let result = server
                .request(
                    "textDocument/references",
                    json!({
                        "textDocument": {"uri": uri},
                        "position": position,
                        "context": {"includeDeclaration": true}
                    }),
                )
                .await?;
            let locations = format_locations(&result);
            if locations.is_empty() {
                "no references found".to_string()
            } else {
                locations.join("\n")
            }
        }
        "hover" => {
            let result = server
                .request(
                    "textDocument/hover",
                    json!({"textDocument": {"uri": uri}, "position": position}),
                )
                .await?;
            let text = format_hover(&result);
            if text.is_empty() {
                "no hover information".to_string()
            } else {
                text
            }
        }
        "symbols" => {
            let result = server
                .request(
                    "textDocument/documentSymbol",
                    json!({"textDocument": {"uri": uri}}),
                )
                .await?;
            let symbols = format_symbols(&result);
            if symbols.is_empty() {
                "no symbols found".to_string()
            } else {
                symbols.join("\n")
            }
        }
        "completion" => {
            let result = server
                .request(
                    "textDocument/completion",
                    json!({"textDocument": {"uri": uri}, "position": position}),
                )
                .await?;
            let items = format_completions(&result);
            if items.is_empty() {
                "no completions".to_string()
            } else {
                items.join("\n")
            }
        }
        "diagnostics" => {
            // Push cache first; pull only when nothing has arrived.
            match server.cached_diagnostics(path) {
                Some(diags) => {
                    let lines = format_diagnostics(&diags);
                    if lines.is_empty() {
                        "no diagnostics for this file".to_string()
                    } else {
                        lines.join("\n")
                    }
                }
                None => match server
                    .request(
                        "textDocument/diagnostic",
                        json!({"textDocument": {"uri": uri}}),
                    )
                    .await
                {
                    Ok(result) => {
                        let items = result.get("items").cloned().unwrap_or(Value::Null);
                        let lines = format_diagnostics(&items);
                        if lines.is_empty() {
                            "no diagnostics for this file".to_string()
                        } else {
                            lines.join("\n")
                        }
                    }
                    Err(_) => "no diagnostics reported yet; the server may \
                               still be analyzing or may not support pull \
                               diagnostics"
                        .to_string(),
                },
            }
        }
        _ => unreachable!("action validated above"),
    };
    Ok(output)
}

fn resolve_path(ctx: &ExecutionContext, file: &str) -> PathBuf {
    let path = PathBuf::from(file);
    if path.is_absolute() {
        return path;
    }
    match &ctx.workspace {
        Some(ws) => ws.join(path),
        None => path,
    }
}

// ─── Response formatting ─────────────────────────────────────────────────────
// Wire positions are 0-indexed; everything shown is 1-indexed.

fn format_location(loc: &Value) -> Option<String> {
    // Location {uri, range} or LocationLink {targetUri, targetRange}.
    let uri = loc
        .get("uri")
        .or_else(|| loc.get("targetUri"))
        .and_then(Value::as_str)?;
    let range = loc.get("range").or_else(|| loc.get("targetRange"))?;
    let start = range.get("start")?;
    let line = start.get("line").and_then(Value::as_u64)? + 1;
    let column = start.get("character").and_then(Value::as_u64)? + 1;
    Some(format!("{}:{line}:{column}", uri_to_path(uri).display()))
}

pub fn format_locations(result: &Value) -> Vec<String> {
    match result {
        Value::Array(items) => items.iter().filter_map(format_location).collect(),
        Value::Object(_) => format_location(result).into_iter().collect(),
        _ => Vec::new(),
    }
}

pub fn format_hover(result: &Value) -> String {
    let contents = match result.get("contents") {
        Some(c) => c,
        None => return String::new(),
    };
    fn one(value: &Value) -> Option<String> {
        match value {
            Value::String(s) => Some(s.clone()),
            Value::Object(map) => map.get("value").and_then(Value::as_str).map(str::to_string),
            _ => None,
        }
    }
    match contents {
        Value::Array(items) => items
            .iter()
            .filter_map(one)
            .collect::<Vec<_>>()
            .join("\n"),
        other => one(other).unwrap_or_default(),
    }
}

fn symbol_kind_name(kind: u64) -> &'static str {
    match kind {
        2 => "module",
        5 => "class",
        6 => "method",
        8 => "field",
        9 => "constructor",
        10 => "enum",
        11 => "interface",
        12 => "function",
        13 => "variable",
        14 => "constant",
        23 => "struct",
        _ => "symbol",
    }
}

pub fn format_symbols(result: &Value) -> Vec<String> {
    let Value::Array(items) = result else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| {
            let name = item.get("name").and_then(Value::as_str)?;
            let kind = item.get("kind").and_then(Value::as_u64).unwrap_or(0);
            // DocumentSymbol has `range`; SymbolInformation nests it in `location`.
            let range = item
                .get("range")
                .or_else(|| item.get("location").and_then(|l| l.get("range")))?;
            let line = range
                .get("start")
                .and_then(|s| s.get("line"))
                .and_then(Value::as_u64)?
                + 1;
            Some(format!("{} {} ({})", symbol_kind_name(kind), name, line))
        })
        .collect()
}

pub fn format_completions(result: &Value) -> Vec<String> {
    let items = match result {
        Value::Array(items) => items.clone(),
        Value::Object(map) => map
            .get("items")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default(),
        _ => Vec::new(),
    };
    items
        .iter()
        .take(20)
        .filter_map(|item| item.get("label").and_then(Value::as_str))
        .map(str::to_string)
        .collect()
}

pub fn format_diagnostics(diagnostics: &Value) -> Vec<String> {
    let Value::Array(items) = diagnostics else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|diag| {
            let message = diag.get("message").and_then(Value::as_str)?;
            let severity = match diag.get("severity").and_then(Value::as_u64) {
                Some(1) => "error",
                Some(2) => "warning",
                Some(3) => "info",
                Some(4) => "hint",
                _ => "diagnostic",
            };
            let (line, column) = diag
                .get("range")
                .and_then(|r| r.get("start"))
                .map(|start| {
                    (
                        start.get("line").and_then(Value::as_u64).unwrap_or(0) + 1,
                        start.get("character").and_then(Value::as_u64).unwrap_or(0) + 1,
                    )
                })
                .unwrap_or((1, 1));
            Some(format!("{severity} {line}:{column} {message}"))
        })
        .collect()
}
