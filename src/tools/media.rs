//! Media sender tools: photos, documents, and media groups.
//!
//! The actual transport (Telegram, CLI, ...) lives outside the substrate
//! behind the [`MediaChannel`] trait; these tools validate the request —
//! a channel identifier must be present in the execution context, files
//! must exist, groups carry 2–10 items — and hand it off.

use std::{path::PathBuf, sync::Arc};

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::error::ToolError;

use super::args::{optional_str, required_str, string_array};
use super::context::ExecutionContext;
use super::traits::{Tool, ToolKind, ToolResult};

/// Outbound media transport, implemented by the hosting gateway.
#[async_trait]
pub trait MediaChannel: Send + Sync {
    async fn send_photo(
        &self,
        channel: &str,
        path: &PathBuf,
        caption: Option<&str>,
    ) -> Result<(), String>;

    async fn send_document(
        &self,
        channel: &str,
        path: &PathBuf,
        caption: Option<&str>,
    ) -> Result<(), String>;

    async fn send_media_group(
        &self,
        channel: &str,
        paths: &[PathBuf],
        caption: Option<&str>,
    ) -> Result<(), String>;
}

fn require_channel(ctx: &ExecutionContext) -> Result<&str, ToolResult> {
    ctx.channel.as_deref().ok_or_else(|| {
        ToolResult::fail(
            "no channel is attached to this conversation; media can only be \
             sent from a chat context",
        )
    })
}

fn require_file(args: &Value) -> Result<PathBuf, ToolResult> {
    let path = match required_str(args, "path") {
        Ok(p) => PathBuf::from(p),
        Err(e) => return Err(ToolResult::invalid_arg(e)),
    };
    if !path.is_file() {
        return Err(ToolResult::fail(format!(
            "'{}' does not exist or is not a file",
            path.display()
        )));
    }
    Ok(path)
}

// ─── SendPhotoTool ───────────────────────────────────────────────────────────

pub struct SendPhotoTool {
    channel: Arc<dyn MediaChannel>,
}

impl SendPhotoTool {
    pub fn new(channel: Arc<dyn MediaChannel>) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl Tool for SendPhotoTool {
    fn name(&self) -> &str {
        "send_photo"
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Communicate
    }

    fn description(&self) -> &str {
        "Send an image file to the current chat channel, with an optional caption."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path":    { "type": "string", "description": "Path to the image file." },
                "caption": { "type": "string", "description": "Optional caption." }
            },
            "required": ["path"]
        })
    }

    async fn execute(
        &self,
        ctx: &ExecutionContext,
        args: Value,
    ) -> Result<ToolResult, ToolError> {
        let channel = match require_channel(ctx) {
            Ok(c) => c,
            Err(r) => return Ok(r),
        };
        let path = match require_file(&args) {
            Ok(p) => p,
            Err(r) => return Ok(r),
        };
        let caption = optional_str(&args, "caption");

        match self.channel.send_photo(channel, &path, caption).await {
            Ok(()) => Ok(ToolResult::ok(format!(
                "photo '{}' sent to {channel}",
                path.display()
            ))),
            Err(e) => Ok(ToolResult::fail(format!("failed to send photo: {e}"))),
        }
    }
}

// ─── SendDocumentTool ────────────────────────────────────────────────────────

pub struct SendDocumentTool {
    channel: Arc<dyn MediaChannel>,
}

impl SendDocumentTool {
    pub fn new(channel: Arc<dyn MediaChannel>) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl Tool for SendDocumentTool {
    fn name(&self) -> &str {
        "send_document"
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Communicate
    }

    fn description(&self) -> &str {
        "Send a file as a document to the current chat channel, with an optional caption."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path":    { "type": "string", "description": "Path to the file." },
                "caption": { "type": "string", "description": "Optional caption." }
            },
            "required": ["path"]
        })
    }

    async fn execute(
        &self,
        ctx: &ExecutionContext,
        args: Value,
    ) -> Result<ToolResult, ToolError> {
        let channel = match require_channel(ctx) {
            Ok(c) => c,
            Err(r) => return Ok(r),
        };
        let path = match require_file(&args) {
            Ok(p) => p,
            Err(r) => return Ok(r),
        };
        let caption = optional_str(&args, "caption");

        match self.channel.send_document(channel, &path, caption).await {
            Ok(()) => Ok(ToolResult::ok(format!(
                "document '{}' sent to {channel}",
                path.display()
            ))),
            Err(e) => Ok(ToolResult::fail(format!("failed to send document: {e}"))),
        }
    }
}

// ─── SendMediaGroupTool ──────────────────────────────────────────────────────

pub struct SendMediaGroupTool {
    channel: Arc<dyn MediaChannel>,
}

impl SendMediaGroupTool {
    pub fn new(channel: Arc<dyn MediaChannel>) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl Tool for SendMediaGroupTool {
    fn name(&self) -> &str {
        "send_media_group"
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Communicate
    }

    fn description(&self) -> &str {
        "Send 2–10 media files to the current chat channel as one album."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "paths": {
                    "type": "array",
                    "items": { "type": "string" },
                    "minItems": 2,
                    "maxItems": 10,
                    "description": "Paths of the media files (2–10)."
                },
                "caption": { "type": "string", "description": "Optional album caption." }
            },
            "required": ["paths"]
        })
    }

    async fn execute(
        &self,
        ctx: &ExecutionContext,
        args: Value,
    ) -> Result<ToolResult, ToolError> {
        let channel = match require_channel(ctx) {
            Ok(c) => c,
            Err(r) => return Ok(r),
        };
        let paths = match string_array(&args, "paths") {
            Ok(p) => p,
            Err(e) => return Ok(ToolResult::invalid_arg(e)),
        };
        if paths.len() < 2 || paths.len() > 10 {
            return Ok(ToolResult::fail(format!(
                "a media group needs 2–10 items, got {}",
                paths.len()
            )));
        }
        let mut resolved = Vec::with_capacity(paths.len());
        for raw in &paths {
            let path = PathBuf::from(raw);
            if !path.is_file() {
                return Ok(ToolResult::fail(format!(
                    "'{raw}' does not exist or is not a file"
                )));
            }
            resolved.push(path);
        }
        let caption = optional_str(&args, "caption");

        match self
            .channel
            .send_media_group(channel, &resolved, caption)
            .await
        {
            Ok(()) => Ok(ToolResult::ok(format!(
                "media group of {} items sent to {channel}",
                resolved.len()
            ))),
            Err(e) => Ok(ToolResult::fail(format!("failed to send media group: {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use tempfile::TempDir;

    use super::*;

    #[derive(Default)]
    struct RecordingChannel {
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl MediaChannel for RecordingChannel {
        async fn send_photo(
            &self,
            channel: &str,
            path: &PathBuf,
            _caption: Option<&str>,
        ) -> Result<(), String> {
            self.sent
                .lock()
                .unwrap()
                .push(format!("photo:{channel}:{}", path.display()));
            Ok(())
        }
        async fn send_document(
            &self,
            channel: &str,
            path: &PathBuf,
            _caption: Option<&str>,
        ) -> Result<(), String> {
            self.sent
                .lock()
                .unwrap()
                .push(format!("doc:{channel}:{}", path.display()));
            Ok(())
        }
        async fn send_media_group(
            &self,
            channel: &str,
            paths: &[PathBuf],
            _caption: Option<&str>,
        ) -> Result<(), String> {
            self.sent
                .lock()
                .unwrap()
                .push(format!("group:{channel}:{}", paths.len()));
            Ok(())
        }
    }

    #[tokio::test]
    async fn photo_requires_channel() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("p.png");
        std::fs::write(&file, "img").unwrap();
        let tool = SendPhotoTool::new(Arc::new(RecordingChannel::default()));

        let r = tool
            .execute(
                &ExecutionContext::new(),
                json!({"path": file.display().to_string()}),
            )
            .await
            .unwrap();
        assert!(!r.success);
        assert!(r.error.unwrap().contains("channel"));
    }

    #[tokio::test]
    async fn photo_sends_with_channel() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("p.png");
        std::fs::write(&file, "img").unwrap();
        let channel = Arc::new(RecordingChannel::default());
        let tool = SendPhotoTool::new(channel.clone());

        let r = tool
            .execute(
                &ExecutionContext::new().with_channel("tg:1"),
                json!({"path": file.display().to_string()}),
            )
            .await
            .unwrap();
        assert!(r.success);
        assert_eq!(channel.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn missing_file_fails() {
        let tool = SendDocumentTool::new(Arc::new(RecordingChannel::default()));
        let r = tool
            .execute(
                &ExecutionContext::new().with_channel("tg:1"),
                json!({"path": "/tmp/__gantry_missing__.pdf"}),
            )
            .await
            .unwrap();
        assert!(!r.success);
    }

    #[tokio::test]
    async fn media_group_bounds_enforced() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.png");
        std::fs::write(&file, "img").unwrap();
        let tool = SendMediaGroupTool::new(Arc::new(RecordingChannel::default()));
        let ctx = ExecutionContext::new().with_channel("tg:1");

        let r = tool
            .execute(&ctx, json!({"paths": [file.display().to_string()]}))
            .await
            .unwrap();
        assert!(!r.success);
        assert!(r.error.unwrap().contains("2–10"));

        let eleven: Vec<String> = (0..11).map(|_| file.display().to_string()).collect();
        let r = tool.execute(&ctx, json!({"paths": eleven})).await.unwrap();
        assert!(!r.success);
    }

    #[tokio::test]
    async fn media_group_sends_album() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.png");
        let b = dir.path().join("b.png");
        std::fs::write(&a, "x").unwrap();
        std::fs::write(&b, "y").unwrap();
        let channel = Arc::new(RecordingChannel::default());
        let tool = SendMediaGroupTool::new(channel.clone());

        let r = tool
            .execute(
                &ExecutionContext::new().with_channel("tg:1"),
                json!({"paths": [a.display().to_string(), b.display().to_string()]}),
            )
            .await
            .unwrap();
        assert!(r.success);
        assert_eq!(channel.sent.lock().unwrap()[0], "group:tg:1:2");
    }
}
