//! Repository map: a bounded symbol outline of the workspace.
//!
//! Walks the tree (skipping hidden entries, `vendor`, `node_modules`, and
//! `__pycache__`), extracts top-level symbols per source file — via the
//! tree-sitter AST for Rust, line-based patterns for Go/Python/JS/TS — and
//! renders an indented outline capped at 100 files and ~32 000 characters.

use std::{
    path::{Path, PathBuf},
    sync::{LazyLock, Mutex},
};

use async_trait::async_trait;
use ignore::WalkBuilder;
use regex::Regex;
use serde_json::{Value, json};

use crate::error::ToolError;

use super::args::optional_str;
use super::context::ExecutionContext;
use super::traits::{Tool, ToolKind, ToolResult};

const MAX_FILES: usize = 100;
const MAX_OUTPUT_CHARS: usize = 32_000;
const MAX_DEPTH: usize = 8;
const SKIP_DIRS: &[&str] = &["vendor", "node_modules", "__pycache__", "target"];

// ─── Symbol extraction ───────────────────────────────────────────────────────

/// One extracted symbol: display text plus its 1-indexed line.
#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub text: String,
    pub line: usize,
}

static RUST_PARSER: LazyLock<Mutex<tree_sitter::Parser>> = LazyLock::new(|| {
    let mut parser = tree_sitter::Parser::new();
    let lang: tree_sitter::Language = tree_sitter_rust::LANGUAGE.into();
    parser
        .set_language(&lang)
        .expect("rust grammar must load");
    Mutex::new(parser)
});

/// Full-AST extraction for Rust sources.
pub fn rust_symbols(source: &str) -> Vec<Symbol> {
    let mut parser = RUST_PARSER.lock().unwrap_or_else(|e| e.into_inner());
    let Some(tree) = parser.parse(source, None) else {
        return Vec::new();
    };
    let root = tree.root_node();
    let mut symbols = Vec::new();
    let mut cursor = root.walk();
    for node in root.children(&mut cursor) {
        let label = match node.kind() {
            "function_item" => "fn",
            "struct_item" => "struct",
            "enum_item" => "enum",
            "trait_item" => "trait",
            "mod_item" => "mod",
            "impl_item" => "impl",
            _ => continue,
        };
        let name = if node.kind() == "impl_item" {
            node.child_by_field_name("type")
                .and_then(|n| n.utf8_text(source.as_bytes()).ok())
                .map(str::to_string)
        } else {
            node.child_by_field_name("name")
                .and_then(|n| n.utf8_text(source.as_bytes()).ok())
                .map(str::to_string)
        };
        if let Some(name) = name {
            symbols.push(Symbol {
                text: format!("{label} {name}"),
                line: node.start_position().row + 1,
            });
        }
    }
    symbols
}

static GO_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:func|type)\s+(?:\([^)]*\)\s*)?([A-Za-z_][A-Za-z0-9_]*)")
        .expect("static regex")
});
static PY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:def|class)\s+([A-Za-z_][A-Za-z0-9_]*)").expect("static regex")
});
static JS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:export\s+)?(?:async\s+)?(?:function|class)\s+([A-Za-z_$][A-Za-z0-9_$]*)",
    )
    .expect("static regex")
});

/// Line-pattern extraction for languages without an AST parser here.
pub fn pattern_symbols(source: &str, regex: &Regex) -> Vec<Symbol> {
    let mut symbols = Vec::new();
    for (idx, line) in source.lines().enumerate() {
        if regex.is_match(line) {
            let head = line.trim_end().trim_end_matches('{').trim_end();
            symbols.push(Symbol {
                text: head.to_string(),
                line: idx + 1,
            });
        }
    }
    symbols
}

fn symbols_for(path: &Path, source: &str) -> Option<Vec<Symbol>> {
    let ext = path.extension()?.to_str()?;
    let symbols = match ext {
        "rs" => rust_symbols(source),
        "go" => pattern_symbols(source, &GO_RE),
        "py" => pattern_symbols(source, &PY_RE),
        "js" | "jsx" | "ts" | "tsx" => pattern_symbols(source, &JS_RE),
        _ => return None,
    };
    Some(symbols)
}

// ─── The tool ────────────────────────────────────────────────────────────────

pub struct RepoMapTool;

#[async_trait]
impl Tool for RepoMapTool {
    fn name(&self) -> &str {
        "repo_map"
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Read
    }

    fn description(&self) -> &str {
        "Build a symbol outline of the repository: one entry per source \
         file listing its top-level functions and types. Bounded to 100 \
         files and ~32000 characters."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "Root to map (default: workspace)." }
            }
        })
    }

    async fn execute(
        &self,
        ctx: &ExecutionContext,
        args: Value,
    ) -> Result<ToolResult, ToolError> {
        let root = optional_str(&args, "path")
            .map(PathBuf::from)
            .or_else(|| ctx.workspace.clone())
            .unwrap_or_else(|| PathBuf::from("."));
        if !root.is_dir() {
            return Ok(ToolResult::fail(format!(
                "'{}' is not a directory",
                root.display()
            )));
        }

        let walker = WalkBuilder::new(&root)
            .max_depth(Some(MAX_DEPTH))
            .filter_entry(|entry| {
                let name = entry.file_name().to_string_lossy();
                !SKIP_DIRS.contains(&name.as_ref())
            })
            .build();

        let mut sections = Vec::new();
        let mut file_count = 0usize;
        let mut total_chars = 0usize;
        let mut truncated = false;
        for entry in walker.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Ok(source) = std::fs::read_to_string(path) else {
                continue;
            };
            let Some(symbols) = symbols_for(path, &source) else {
                continue;
            };
            if file_count >= MAX_FILES || total_chars >= MAX_OUTPUT_CHARS {
                truncated = true;
                break;
            }
            file_count += 1;

            let rel = path.strip_prefix(&root).unwrap_or(path);
            let mut section = format!("{}:", rel.display());
            for symbol in &symbols {
                section.push_str(&format!("\n  {} ({})", symbol.text, symbol.line));
            }
            total_chars += section.len();
            sections.push(section);
        }

        if sections.is_empty() {
            return Ok(ToolResult::ok("no source files found").with_metadata(json!({"files": 0})));
        }
        let mut output = sections.join("\n");
        if truncated {
            output.push_str("\n... map truncated ...");
        }
        Ok(ToolResult::ok(output).with_metadata(json!({
            "files": file_count,
            "truncated": truncated,
        })))
    }
}
