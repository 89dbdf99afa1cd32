//! Error types for the tool-execution substrate.

use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by the executor, the sandbox, and the adapters.
///
/// Tool-level failures the model is expected to see and react to (a missing
/// argument, a non-zero exit, a patch conflict) are *not* errors: they are
/// encoded as [`crate::tools::ToolResult`] with `success == false`. A
/// `ToolError` means the call could not be carried out at all — policy denial,
/// unknown tool, broken transport, or a violated invariant.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The active policy denies this tool.
    #[error("tool '{0}' is not allowed by the active policy")]
    NotAllowed(String),

    /// No tool with this name is registered.
    #[error("tool '{0}' is not registered")]
    NotFound(String),

    /// A required argument is missing or has the wrong type.
    #[error("invalid argument: {0}")]
    InvalidArg(String),

    /// The per-execution deadline expired.
    #[error("deadline expired after {0:?}")]
    Timeout(Duration),

    /// A subprocess or remote call failed in a way the caller cannot retry.
    #[error("execution failed: {0}")]
    ExecutionFailure(String),

    /// stdio/HTTP failure, corrupt framing, or a crashed server.
    #[error("transport error: {0}")]
    Transport(String),

    /// Sub-agent nesting limit reached; the child never started.
    #[error("sub-agent nesting limit ({0}) exceeded")]
    DepthExceeded(u8),

    /// Invariant violation. Surfaces to the operator, not the model.
    #[error("internal error: {0}")]
    Internal(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_tool_name() {
        let e = ToolError::NotAllowed("bash".into());
        assert!(e.to_string().contains("bash"));
        let e = ToolError::NotFound("nope".into());
        assert!(e.to_string().contains("nope"));
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let e: ToolError = io.into();
        assert!(matches!(e, ToolError::Io(_)));
    }
}
