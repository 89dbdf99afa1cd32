use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ToolError;

use super::context::ExecutionContext;

/// Coarse semantic tag on a tool, used for policy defaults and UI grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    Read,
    Search,
    Fetch,
    Edit,
    Execute,
    Communicate,
    Think,
}

impl ToolKind {
    /// All kinds, in a stable order.
    pub const ALL: [ToolKind; 7] = [
        ToolKind::Read,
        ToolKind::Search,
        ToolKind::Fetch,
        ToolKind::Edit,
        ToolKind::Execute,
        ToolKind::Communicate,
        ToolKind::Think,
    ];
}

/// One tool invocation requested by the model. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Caller-assigned identifier, echoed back on the result.
    pub id: String,
    /// Registered tool name.
    pub name: String,
    /// Open-ended argument bag produced by the LLM.
    pub arguments: Value,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// The result of executing a [`Tool`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// Raw output fed back to the model, preserved verbatim.
    pub output: String,
    /// Optional human-oriented rendering (truncated, status-prefixed) for a
    /// display channel. `None` means the raw output is fine to show.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
    /// Whether the tool considered the execution successful.
    pub success: bool,
    /// Failure summary when `success == false`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Optional structured metadata (exit code, duration, match kind, ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl ToolResult {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            display: None,
            success: true,
            error: None,
            metadata: None,
        }
    }

    /// A user-facing failure the model should see and act on.
    pub fn fail(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            output: message.clone(),
            display: None,
            success: false,
            error: Some(message),
            metadata: None,
        }
    }

    /// Failure for a missing or mistyped argument.
    pub fn invalid_arg(message: impl std::fmt::Display) -> Self {
        Self::fail(format!("invalid argument: {message}"))
    }

    pub fn with_display(mut self, display: impl Into<String>) -> Self {
        self.display = Some(display.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Merge extra keys into the metadata object, creating it if absent.
    pub fn annotate(&mut self, key: &str, value: Value) {
        match &mut self.metadata {
            Some(Value::Object(map)) => {
                map.insert(key.to_string(), value);
            }
            _ => {
                self.metadata = Some(serde_json::json!({ key: value }));
            }
        }
    }
}

/// A capability the reasoning loop can invoke.
///
/// Implementations must be `Send + Sync` (they are shared as
/// `Arc<dyn Tool>`) and re-entrant: the contract permits concurrent calls to
/// the same tool instance.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Stable machine identifier (snake_case), e.g. `"read_file"`.
    fn name(&self) -> &str;

    /// Semantic kind, used for policy defaults and grouping.
    fn kind(&self) -> ToolKind;

    /// Human-readable description used in LLM tool payloads.
    fn description(&self) -> &str;

    /// JSON Schema object describing the tool's accepted arguments.
    fn schema(&self) -> Value;

    /// Execute the tool.
    ///
    /// Failures the model should see return `Ok` with `success == false`;
    /// `Err` is reserved for programmer and transport errors.
    async fn execute(&self, ctx: &ExecutionContext, args: Value)
    -> Result<ToolResult, ToolError>;
}

/// Summary of a registered tool, suitable for prompt assembly and LLM
/// tool-advertisement payloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub kind: ToolKind,
    pub description: String,
    pub schema: Value,
}
