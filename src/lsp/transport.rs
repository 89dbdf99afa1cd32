//! JSON-RPC 2.0 over stdio with `Content-Length` framing, plus the
//! response router that correlates server replies with waiting callers.
//!
//! The router replaces a shared response channel with per-request oneshot
//! slots: the background reader completes the slot whose id matches the
//! frame, so replies can never be delivered to the wrong caller, and
//! closing the router (reader exit) fails every in-flight caller with a
//! deterministic closed-connection error.

use std::{
    collections::HashMap,
    sync::{
        Mutex,
        atomic::{AtomicBool, Ordering},
    },
};

use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::error::ToolError;

// ─── Framing ─────────────────────────────────────────────────────────────────

/// Write one framed message: `Content-Length: N\r\n\r\n<body>`.
pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    payload: &Value,
) -> Result<(), ToolError> {
    let body = serde_json::to_vec(payload)?;
    let header = format!("Content-Length: {}\r\n\r\n", body.len());
    writer
        .write_all(header.as_bytes())
        .await
        .map_err(|e| ToolError::Transport(format!("write failed: {e}")))?;
    writer
        .write_all(&body)
        .await
        .map_err(|e| ToolError::Transport(format!("write failed: {e}")))?;
    writer
        .flush()
        .await
        .map_err(|e| ToolError::Transport(format!("flush failed: {e}")))?;
    Ok(())
}

/// Read one framed message. `Ok(None)` means clean EOF.
pub async fn read_frame<R: AsyncBufRead + Unpin>(
    reader: &mut R,
) -> Result<Option<Value>, ToolError> {
    let mut content_length: Option<usize> = None;
    loop {
        let mut line = String::new();
        let n = reader
            .read_line(&mut line)
            .await
            .map_err(|e| ToolError::Transport(format!("read failed: {e}")))?;
        if n == 0 {
            return Ok(None);
        }
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some(rest) = line.strip_prefix("Content-Length:") {
            content_length = rest.trim().parse().ok();
        }
        // Other headers (Content-Type) are ignored.
    }
    let len = content_length
        .ok_or_else(|| ToolError::Transport("frame missing Content-Length header".into()))?;
    let mut body = vec![0u8; len];
    reader
        .read_exact(&mut body)
        .await
        .map_err(|e| ToolError::Transport(format!("truncated frame: {e}")))?;
    let value = serde_json::from_slice(&body)
        .map_err(|e| ToolError::Transport(format!("corrupt frame: {e}")))?;
    Ok(Some(value))
}

// ─── Router ──────────────────────────────────────────────────────────────────

pub const PUBLISH_DIAGNOSTICS: &str = "textDocument/publishDiagnostics";

/// Correlates responses by id and caches pushed diagnostics.
#[derive(Debug)]
pub struct Router {
    pending: Mutex<HashMap<i64, oneshot::Sender<Value>>>,
    diagnostics: Mutex<HashMap<String, Value>>,
    closed: AtomicBool,
}

impl Router {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            diagnostics: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Reserve a response slot for `id`. Must be called before the request
    /// is written so the reply cannot race the registration.
    pub fn register(&self, id: i64) -> Result<oneshot::Receiver<Value>, ToolError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ToolError::Transport("connection closed".into()));
        }
        let (tx, rx) = oneshot::channel();
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, tx);
        Ok(rx)
    }

    fn complete(&self, id: i64, message: Value) {
        let sender = self
            .pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&id);
        match sender {
            Some(tx) => {
                let _ = tx.send(message);
            }
            None => log::debug!("lsp: dropping response for unknown id {id}"),
        }
    }

    fn cache_diagnostics(&self, uri: String, diagnostics: Value) {
        self.diagnostics
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(uri, diagnostics);
    }

    /// Pushed diagnostics for a URI, if any have arrived.
    pub fn diagnostics_for(&self, uri: &str) -> Option<Value> {
        self.diagnostics
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(uri)
            .cloned()
    }

    /// Fail every in-flight caller; further registrations are refused.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        // Dropping the senders wakes the receivers with RecvError.
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

/// The background reader: one per server. Consumes frames until the stop
/// token fires or the stream ends/errors, then closes the router.
pub async fn read_loop<R: AsyncBufRead + Unpin>(
    mut reader: R,
    router: std::sync::Arc<Router>,
    stop: CancellationToken,
) {
    loop {
        let frame = tokio::select! {
            _ = stop.cancelled() => break,
            frame = read_frame(&mut reader) => frame,
        };
        match frame {
            Ok(Some(message)) => classify(&router, message),
            Ok(None) => {
                log::debug!("lsp: server closed its stdout");
                break;
            }
            Err(e) => {
                log::warn!("lsp: reader error: {e}");
                break;
            }
        }
    }
    router.close();
}

fn classify(router: &Router, message: Value) {
    let id = message.get("id").and_then(Value::as_i64);
    let has_reply = message.get("result").is_some() || message.get("error").is_some();
    if let Some(id) = id
        && has_reply
    {
        router.complete(id, message);
        return;
    }
    if message.get("method").and_then(Value::as_str) == Some(PUBLISH_DIAGNOSTICS) {
        if let Some(params) = message.get("params")
            && let Some(uri) = params.get("uri").and_then(Value::as_str)
        {
            let diagnostics = params.get("diagnostics").cloned().unwrap_or(Value::Null);
            router.cache_diagnostics(uri.to_string(), diagnostics);
        }
        return;
    }
    // Unhandled notification or server-to-client request: dropped.
    log::trace!(
        "lsp: dropping frame method={:?}",
        message.get("method").and_then(Value::as_str)
    );
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use tokio::io::BufReader;

    use super::*;

    #[tokio::test]
    async fn frame_roundtrip() {
        let (mut client, server) = tokio::io::duplex(4096);
        let payload = json!({"jsonrpc": "2.0", "id": 1, "method": "ping"});
        write_frame(&mut client, &payload).await.unwrap();
        drop(client);

        let mut reader = BufReader::new(server);
        let got = read_frame(&mut reader).await.unwrap().unwrap();
        assert_eq!(got, payload);
        // Then clean EOF.
        assert!(read_frame(&mut reader).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn missing_content_length_is_transport_error() {
        let (mut client, server) = tokio::io::duplex(4096);
        client.write_all(b"X-Custom: 1\r\n\r\n").await.unwrap();
        drop(client);
        let mut reader = BufReader::new(server);
        let err = read_frame(&mut reader).await.unwrap_err();
        assert!(matches!(err, ToolError::Transport(_)));
    }

    #[tokio::test]
    async fn interleaved_responses_reach_the_right_callers() {
        let (client_side, server_side) = tokio::io::duplex(1 << 20);
        let (client_read, _client_write) = tokio::io::split(client_side);
        let (_server_read, mut server_write) = tokio::io::split(server_side);

        let router = Arc::new(Router::new());
        let stop = CancellationToken::new();
        let reader_task = tokio::spawn(read_loop(
            BufReader::new(client_read),
            router.clone(),
            stop.clone(),
        ));

        // 100 callers register before any response arrives.
        let mut receivers = Vec::new();
        for id in 1..=100i64 {
            receivers.push((id, router.register(id).unwrap()));
        }
        // The server replies in reverse order.
        for id in (1..=100i64).rev() {
            let response = json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": {"echo": id}
            });
            write_frame(&mut server_write, &response).await.unwrap();
        }

        for (id, rx) in receivers {
            let message = rx.await.unwrap();
            assert_eq!(message["id"], id);
            assert_eq!(message["result"]["echo"], id);
        }

        stop.cancel();
        reader_task.await.unwrap();
    }

    #[tokio::test]
    async fn publish_diagnostics_lands_in_cache() {
        let (client_side, server_side) = tokio::io::duplex(4096);
        let (client_read, _cw) = tokio::io::split(client_side);
        let (_sr, mut server_write) = tokio::io::split(server_side);

        let router = Arc::new(Router::new());
        let stop = CancellationToken::new();
        let reader_task = tokio::spawn(read_loop(
            BufReader::new(client_read),
            router.clone(),
            stop.clone(),
        ));

        let notification = json!({
            "jsonrpc": "2.0",
            "method": PUBLISH_DIAGNOSTICS,
            "params": {
                "uri": "file:///tmp/x.rs",
                "diagnostics": [
                    {"message": "unused variable", "range": {"start": {"line": 2, "character": 4}}},
                    {"message": "missing semicolon", "range": {"start": {"line": 5, "character": 0}}}
                ]
            }
        });
        write_frame(&mut server_write, &notification).await.unwrap();

        // The cache fills shortly after the reader consumes the frame.
        let mut cached = None;
        for _ in 0..50 {
            cached = router.diagnostics_for("file:///tmp/x.rs");
            if cached.is_some() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        let diags = cached.expect("diagnostics cached");
        assert_eq!(diags.as_array().unwrap().len(), 2);

        stop.cancel();
        reader_task.await.unwrap();
    }

    #[tokio::test]
    async fn reader_exit_fails_in_flight_callers() {
        let (client_side, server_side) = tokio::io::duplex(4096);
        let (client_read, _cw) = tokio::io::split(client_side);

        let router = Arc::new(Router::new());
        let stop = CancellationToken::new();
        let reader_task = tokio::spawn(read_loop(
            BufReader::new(client_read),
            router.clone(),
            stop.clone(),
        ));

        let rx = router.register(7).unwrap();
        // Server hangs up.
        drop(server_side);
        reader_task.await.unwrap();

        assert!(rx.await.is_err());
        assert!(router.is_closed());
        assert!(router.register(8).is_err());
    }

    #[tokio::test]
    async fn unknown_notifications_are_dropped() {
        let router = Router::new();
        classify(
            &router,
            json!({"jsonrpc": "2.0", "method": "window/logMessage", "params": {"message": "hi"}}),
        );
        // Nothing cached, nothing pending, no panic.
        assert!(router.diagnostics_for("file:///x").is_none());
    }
}
