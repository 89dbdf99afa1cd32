//! Language-server process management.
//!
//! One [`LspServer`] per (language, workspace), started on first use and
//! pooled by the [`LspManager`]. Lifecycle:
//!
//! ```text
//! absent --first request--> starting --init ok--> ready
//! ready  --write/read error | stop--> shutdown (terminal)
//! ready  --process exited--> absent   (next request restarts)
//! ```

use std::{
    collections::{HashMap, HashSet},
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex,
        atomic::{AtomicI64, Ordering},
    },
    time::Duration,
};

use serde_json::{Value, json};
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;

use crate::error::ToolError;

use super::languages::ServerRecipe;
use super::transport::{Router, read_loop, write_frame};

/// Per-request reply deadline.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Best-effort budget for the `shutdown` request during teardown.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

// ─── Uri helpers ─────────────────────────────────────────────────────────────

pub fn path_to_uri(path: &Path) -> String {
    format!("file://{}", path.display())
}

pub fn uri_to_path(uri: &str) -> PathBuf {
    PathBuf::from(uri.strip_prefix("file://").unwrap_or(uri))
}

// ─── LspServer ───────────────────────────────────────────────────────────────

/// A running language server and its background reader.
#[derive(Debug)]
pub struct LspServer {
    language_id: String,
    child: tokio::sync::Mutex<tokio::process::Child>,
    /// Held for the duration of one request write.
    writer: tokio::sync::Mutex<tokio::process::ChildStdin>,
    router: Arc<Router>,
    /// Monotonic; never reused for the lifetime of this server.
    next_id: AtomicI64,
    opened: Mutex<HashSet<String>>,
    stop: CancellationToken,
    reader_handle: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl LspServer {
    /// Spawn the server and complete the `initialize` handshake.
    pub async fn start(recipe: &ServerRecipe, workspace: &Path) -> Result<Arc<Self>, ToolError> {
        if which::which(recipe.command).is_err() {
            return Err(ToolError::ExecutionFailure(format!(
                "'{}' is not installed — {}",
                recipe.command, recipe.install_hint
            )));
        }

        let mut child = tokio::process::Command::new(recipe.command)
            .args(recipe.args)
            .current_dir(workspace)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ToolError::Transport(format!("failed to start '{}': {e}", recipe.command))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ToolError::Internal("language server child has no stdin".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ToolError::Internal("language server child has no stdout".into()))?;

        let router = Arc::new(Router::new());
        let stop = CancellationToken::new();
        let reader_handle = tokio::spawn(read_loop(
            BufReader::new(stdout),
            router.clone(),
            stop.clone(),
        ));

        let server = Arc::new(Self {
            language_id: recipe.language_id.to_string(),
            child: tokio::sync::Mutex::new(child),
            writer: tokio::sync::Mutex::new(stdin),
            router,
            next_id: AtomicI64::new(1),
            opened: Mutex::new(HashSet::new()),
            stop,
            reader_handle: Mutex::new(Some(reader_handle)),
        });

        server.initialize(workspace).await?;
        log::info!(
            "lsp: {} server ready for workspace {}",
            server.language_id,
            workspace.display()
        );
        Ok(server)
    }

    async fn initialize(&self, workspace: &Path) -> Result<(), ToolError> {
        let params = json!({
            "processId": std::process::id(),
            "rootUri": path_to_uri(workspace),
            "capabilities": {
                "textDocument": {
                    "hover": {},
                    "definition": {},
                    "references": {},
                    "documentSymbol": {},
                    "completion": {},
                    "diagnostic": {},
                    "publishDiagnostics": {},
                    "synchronization": {}
                }
            }
        });
        self.request("initialize", params).await?;
        self.notify("initialized", json!({})).await?;
        Ok(())
    }

    pub fn language_id(&self) -> &str {
        &self.language_id
    }

    /// False once the child has exited or the reader closed the router.
    pub async fn is_alive(&self) -> bool {
        if self.router.is_closed() {
            return false;
        }
        let mut child = self.child.lock().await;
        matches!(child.try_wait(), Ok(None))
    }

    /// Send a request and wait for the matching response's `result`.
    pub async fn request(&self, method: &str, params: Value) -> Result<Value, ToolError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let rx = self.router.register(id)?;
        let frame = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        {
            let mut writer = self.writer.lock().await;
            write_frame(&mut *writer, &frame).await?;
        }
        let message = match tokio::time::timeout(REQUEST_TIMEOUT, rx).await {
            Ok(Ok(message)) => message,
            Ok(Err(_)) => return Err(ToolError::Transport("connection closed".into())),
            Err(_) => return Err(ToolError::Timeout(REQUEST_TIMEOUT)),
        };
        if let Some(error) = message.get("error") {
            let code = error.get("code").and_then(Value::as_i64).unwrap_or(0);
            let text = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            return Err(ToolError::ExecutionFailure(format!(
                "language server error {code}: {text}"
            )));
        }
        Ok(message.get("result").cloned().unwrap_or(Value::Null))
    }

    /// Send a notification (no id, no reply).
    pub async fn notify(&self, method: &str, params: Value) -> Result<(), ToolError> {
        let frame = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
        });
        let mut writer = self.writer.lock().await;
        write_frame(&mut *writer, &frame).await
    }

    /// Send `textDocument/didOpen` for `path` at most once per server.
    pub async fn ensure_open(&self, path: &Path) -> Result<(), ToolError> {
        let uri = path_to_uri(path);
        // Claim the slot before sending so concurrent callers cannot both
        // open the same file.
        {
            let mut opened = self.opened.lock().unwrap_or_else(|e| e.into_inner());
            if !opened.insert(uri.clone()) {
                return Ok(());
            }
        }
        let result = async {
            let text = tokio::fs::read_to_string(path).await.map_err(|e| {
                ToolError::InvalidArg(format!("cannot read '{}': {e}", path.display()))
            })?;
            self.notify(
                "textDocument/didOpen",
                json!({
                    "textDocument": {
                        "uri": uri.clone(),
                        "languageId": self.language_id,
                        "version": 1,
                        "text": text,
                    }
                }),
            )
            .await
        }
        .await;
        if result.is_err() {
            self.opened
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .remove(&uri);
        }
        result
    }

    /// Diagnostics pushed by the server for `path`, if any.
    pub fn cached_diagnostics(&self, path: &Path) -> Option<Value> {
        self.router.diagnostics_for(&path_to_uri(path))
    }

    /// `shutdown` + `exit` best effort, then kill and drain the reader.
    pub async fn shutdown(&self) {
        let _ = tokio::time::timeout(SHUTDOWN_TIMEOUT, self.request("shutdown", Value::Null)).await;
        let _ = self.notify("exit", Value::Null).await;
        self.stop.cancel();
        {
            let mut child = self.child.lock().await;
            let _ = child.kill().await;
            let _ = child.wait().await;
        }
        let handle = self
            .reader_handle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        log::info!("lsp: {} server shut down", self.language_id);
    }
}

// ─── LspManager ──────────────────────────────────────────────────────────────

/// Pools one server per language for a workspace; restarts dead servers on
/// the next request.
pub struct LspManager {
    workspace: PathBuf,
    servers: tokio::sync::Mutex<HashMap<String, Arc<LspServer>>>,
}

impl LspManager {
    pub fn new(workspace: impl Into<PathBuf>) -> Self {
        Self {
            workspace: workspace.into(),
            servers: tokio::sync::Mutex::new(HashMap::new()),
        }
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    /// Running server for this recipe, starting (or restarting) as needed.
    pub async fn get_or_start(
        &self,
        recipe: &'static ServerRecipe,
    ) -> Result<Arc<LspServer>, ToolError> {
        let mut servers = self.servers.lock().await;
        if let Some(server) = servers.get(recipe.language_id) {
            if server.is_alive().await {
                return Ok(server.clone());
            }
            log::warn!(
                "lsp: {} server died; restarting on demand",
                recipe.language_id
            );
            servers.remove(recipe.language_id);
        }
        let server = LspServer::start(recipe, &self.workspace).await?;
        servers.insert(recipe.language_id.to_string(), server.clone());
        Ok(server)
    }

    /// Shut every pooled server down (process exit path).
    pub async fn shutdown_all(&self) {
        let servers: Vec<Arc<LspServer>> = {
            let mut map = self.servers.lock().await;
            map.drain().map(|(_, s)| s).collect()
        };
        for server in servers {
            server.shutdown().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uri_roundtrip() {
        let path = Path::new("/tmp/ws/src/main.rs");
        let uri = path_to_uri(path);
        assert_eq!(uri, "file:///tmp/ws/src/main.rs");
        assert_eq!(uri_to_path(&uri), path);
    }

    #[test]
    fn uri_without_scheme_passes_through() {
        assert_eq!(uri_to_path("/plain/path"), PathBuf::from("/plain/path"));
    }

    #[tokio::test]
    async fn missing_binary_yields_install_hint() {
        let recipe = &super::super::languages::ServerRecipe {
            language_id: "nope",
            command: "gantry-no-such-language-server",
            args: &[],
            install_hint: "install it from example.com",
        };
        let err = LspServer::start(recipe, Path::new("/tmp")).await.unwrap_err();
        let text = err.to_string();
        assert!(text.contains("not installed"));
        assert!(text.contains("example.com"));
    }
}
