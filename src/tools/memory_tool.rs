//! The `save_memory` tool: persist a fact into long-term memory.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::error::ToolError;
use crate::memory::{DailyMemory, FactCategory, MemoryStore, SaveDisposition};

use super::args::{optional_f64, optional_str, required_str};
use super::context::ExecutionContext;
use super::traits::{Tool, ToolKind, ToolResult};

pub struct SaveMemoryTool {
    store: Arc<MemoryStore>,
    daily: Arc<DailyMemory>,
}

impl SaveMemoryTool {
    pub fn new(store: Arc<MemoryStore>, daily: Arc<DailyMemory>) -> Self {
        Self { store, daily }
    }
}

#[async_trait]
impl Tool for SaveMemoryTool {
    fn name(&self) -> &str {
        "save_memory"
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Think
    }

    fn description(&self) -> &str {
        "Save a fact to long-term memory. Near-duplicate facts in the same \
         category are updated in place rather than duplicated. The fact is \
         also noted in today's daily log."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "content": { "type": "string", "description": "The fact to remember." },
                "category": {
                    "type": "string",
                    "enum": ["preference", "knowledge", "context", "behavior", "goal"],
                    "description": "Kind of fact."
                },
                "confidence": {
                    "type": "number",
                    "description": "How certain the fact is, 0.0–1.0 (default 0.8).",
                    "minimum": 0.0,
                    "maximum": 1.0
                }
            },
            "required": ["content", "category"]
        })
    }

    async fn execute(
        &self,
        ctx: &ExecutionContext,
        args: Value,
    ) -> Result<ToolResult, ToolError> {
        let content = match required_str(&args, "content") {
            Ok(c) => c,
            Err(e) => return Ok(ToolResult::invalid_arg(e)),
        };
        let category = match required_str(&args, "category")
            .ok()
            .and_then(FactCategory::parse)
        {
            Some(c) => c,
            None => {
                return Ok(ToolResult::invalid_arg(
                    "'category' must be one of preference, knowledge, context, behavior, goal",
                ));
            }
        };
        let confidence = optional_f64(&args, "confidence").unwrap_or(0.8);
        let source = ctx
            .channel
            .clone()
            .or_else(|| optional_str(&args, "source").map(str::to_string));

        let disposition = self
            .store
            .save_fact(content, category, confidence, source)?;
        if let Err(e) = self.daily.append(content) {
            log::warn!("failed to append daily memory entry: {e}");
        }

        let verb = match disposition {
            SaveDisposition::Appended => "saved",
            SaveDisposition::Updated => "updated existing",
        };
        Ok(ToolResult::ok(format!("{verb} memory: {content}")).with_metadata(json!({
            "deduplicated": disposition == SaveDisposition::Updated,
        })))
    }
}
