//! Search-and-replace file editing with fuzzy self-repair.
//!
//! Matching runs in three phases:
//! 1. exact — `old_text` occurs verbatim exactly once;
//! 2. fuzzy — a whitespace-normalized line-window comparison finds exactly
//!    one matching region (model output often mangles trailing whitespace);
//! 3. report — no match; the closest candidate window is returned so the
//!    model can retry with corrected text.
//!
//! Two or more matches in either phase fail without touching the file.
//! The replacement is always `new_text` verbatim.

use std::fs;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::error::ToolError;

use super::args::{required_path, required_str};
use super::context::ExecutionContext;
use super::traits::{Tool, ToolKind, ToolResult};

pub struct EditFileTool;

#[async_trait]
impl Tool for EditFileTool {
    fn name(&self) -> &str {
        "edit_file"
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Edit
    }

    fn description(&self) -> &str {
        "Replace one occurrence of old_text with new_text in a file. \
         old_text must match a unique region; near-matches that differ only \
         in whitespace are repaired automatically."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path":     { "type": "string", "description": "File to edit." },
                "old_text": { "type": "string", "description": "Text to replace. Must be unique in the file." },
                "new_text": { "type": "string", "description": "Replacement text, inserted verbatim." }
            },
            "required": ["path", "old_text", "new_text"]
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
        let old_text = match required_str(&args, "old_text") {
            Ok(s) => s,
            Err(e) => return Ok(ToolResult::invalid_arg(e)),
        };
        let new_text = match required_str(&args, "new_text") {
            Ok(s) => s,
            Err(e) => return Ok(ToolResult::invalid_arg(e)),
        };
        if old_text.is_empty() {
            return Ok(ToolResult::invalid_arg("old_text must not be empty"));
        }

        let content = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) => {
                return Ok(ToolResult::fail(format!(
                    "failed to read '{}': {e}",
                    path.display()
                )));
            }
        };

        let (edited, match_kind) = match apply_edit(&content, old_text, new_text) {
            EditOutcome::Replaced { content, kind } => (content, kind),
            EditOutcome::Ambiguous { count, kind } => {
                return Ok(ToolResult::fail(format!(
                    "old_text matches {count} regions ({kind}); it must be unique. \
                     Include more surrounding context and retry."
                )));
            }
            EditOutcome::NoMatch { closest } => {
                let hint = match closest {
                    Some((line, window)) => format!(
                        "old_text was not found. Closest candidate starts at line {line}:\n{window}"
                    ),
                    None => "old_text was not found in the file".to_string(),
                };
                return Ok(ToolResult::fail(hint));
            }
        };

        if let Err(e) = fs::write(&path, &edited) {
            return Ok(ToolResult::fail(format!(
                "failed to write '{}': {e}",
                path.display()
            )));
        }

        Ok(ToolResult::ok(format!(
            "replaced 1 occurrence in '{}' ({match_kind} match)",
            path.display()
        ))
        .with_metadata(json!({
            "path": path.display().to_string(),
            "match": match_kind,
        })))
    }
}

// ─── Matching ────────────────────────────────────────────────────────────────

enum EditOutcome {
    Replaced { content: String, kind: &'static str },
    Ambiguous { count: usize, kind: &'static str },
    /// 1-indexed start line of the closest window, plus its text.
    NoMatch { closest: Option<(usize, String)> },
}

fn apply_edit(content: &str, old_text: &str, new_text: &str) -> EditOutcome {
    // Phase 1: exact.
    let exact: Vec<usize> = content
        .match_indices(old_text)
        .map(|(idx, _)| idx)
        .collect();
    match exact.len() {
        1 => {
            let idx = exact[0];
            let mut edited = String::with_capacity(content.len());
            edited.push_str(&content[..idx]);
            edited.push_str(new_text);
            edited.push_str(&content[idx + old_text.len()..]);
            return EditOutcome::Replaced {
                content: edited,
                kind: "exact",
            };
        }
        n if n > 1 => {
            return EditOutcome::Ambiguous {
                count: n,
                kind: "exact",
            };
        }
        _ => {}
    }

    // Phase 2: whitespace-normalized window comparison.
    let old_lines: Vec<String> = old_text.lines().map(normalize_line).collect();
    if old_lines.is_empty() {
        return EditOutcome::NoMatch { closest: None };
    }
    let spans = line_spans(content);
    if spans.len() < old_lines.len() {
        return EditOutcome::NoMatch { closest: None };
    }
    let norm_lines: Vec<String> = spans
        .iter()
        .map(|&(start, end)| normalize_line(&content[start..end]))
        .collect();

    let window = old_lines.len();
    let mut fuzzy_starts = Vec::new();
    let mut best: Option<(usize, usize)> = None; // (score, start line index)
    for start in 0..=(norm_lines.len() - window) {
        let candidate = &norm_lines[start..start + window];
        if candidate == old_lines.as_slice() {
            fuzzy_starts.push(start);
        }
        let score = candidate
            .iter()
            .zip(&old_lines)
            .filter(|(a, b)| a == b)
            .count();
        if best.map(|(s, _)| score > s).unwrap_or(score > 0) {
            best = Some((score, start));
        }
    }

    match fuzzy_starts.len() {
        1 => {
            let start = fuzzy_starts[0];
            let begin = spans[start].0;
            let end = spans[start + window - 1].1;
            let mut edited = String::with_capacity(content.len());
            edited.push_str(&content[..begin]);
            edited.push_str(new_text);
            edited.push_str(&content[end..]);
            EditOutcome::Replaced {
                content: edited,
                kind: "fuzzy",
            }
        }
        0 => EditOutcome::NoMatch {
            closest: best.map(|(_, start)| {
                let begin = spans[start].0;
                let end = spans[(start + window - 1).min(spans.len() - 1)].1;
                (start + 1, content[begin..end].to_string())
            }),
        },
        n => EditOutcome::Ambiguous {
            count: n,
            kind: "fuzzy",
        },
    }
}

/// Collapse runs of whitespace and trim both ends.
fn normalize_line(line: &str) -> String {
    line.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Byte spans of each line, excluding the terminating newline.
fn line_spans(content: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start = 0;
    for (idx, byte) in content.bytes().enumerate() {
        if byte == b'\n' {
            spans.push((start, idx));
            start = idx + 1;
        }
    }
    if start < content.len() {
        spans.push((start, content.len()));
    }
    spans
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    async fn run_edit(content: &str, old: &str, new: &str) -> (ToolResult, String) {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("f.txt");
        fs::write(&file, content).unwrap();
        let r = EditFileTool
            .execute(
                &ExecutionContext::new(),
                json!({
                    "path": file.display().to_string(),
                    "old_text": old,
                    "new_text": new
                }),
            )
            .await
            .unwrap();
        let after = fs::read_to_string(&file).unwrap();
        (r, after)
    }

    #[tokio::test]
    async fn exact_unique_replaces() {
        let (r, after) = run_edit("fn a() {}\nfn b() {}\n", "fn a() {}", "fn a() { done() }").await;
        assert!(r.success);
        assert_eq!(r.metadata.unwrap()["match"], "exact");
        assert_eq!(after, "fn a() { done() }\nfn b() {}\n");
    }

    #[tokio::test]
    async fn duplicate_occurrences_fail_without_modifying() {
        let content = "x = 1\ny = 2\nx = 1\n";
        let (r, after) = run_edit(content, "x = 1", "x = 9").await;
        assert!(!r.success);
        assert!(r.error.unwrap().contains("must be unique"));
        assert_eq!(after, content);
    }

    #[tokio::test]
    async fn trailing_whitespace_repairs_as_fuzzy() {
        let content = "line one  \nline two\t\nline three\n";
        let (r, after) = run_edit(content, "line one\nline two", "replaced").await;
        assert!(r.success);
        assert_eq!(r.metadata.unwrap()["match"], "fuzzy");
        assert_eq!(after, "replaced\nline three\n");
    }

    #[tokio::test]
    async fn indentation_drift_repairs_as_fuzzy() {
        let content = "    if ready {\n        go()\n    }\n";
        let (r, after) = run_edit(content, "if ready {\n    go()\n}", "start()").await;
        assert!(r.success);
        assert_eq!(r.metadata.unwrap()["match"], "fuzzy");
        assert_eq!(after, "start()\n");
    }

    #[tokio::test]
    async fn no_match_reports_closest_window() {
        let content = "alpha\nbeta\ngamma\n";
        let (r, after) = run_edit(content, "alpha\nBETA-X", "x").await;
        assert!(!r.success);
        let msg = r.error.unwrap();
        assert!(msg.contains("Closest candidate"));
        assert!(msg.contains("alpha"));
        assert_eq!(after, content);
    }

    #[tokio::test]
    async fn ambiguous_fuzzy_fails() {
        let content = "a  \nb\na\t\nb\n";
        let (r, after) = run_edit(content, "a\nb", "z").await;
        assert!(!r.success);
        assert!(r.error.unwrap().contains("must be unique"));
        assert_eq!(after, content);
    }

    #[tokio::test]
    async fn empty_old_text_rejected() {
        let (r, _) = run_edit("abc\n", "", "x").await;
        assert!(!r.success);
    }
}
