//! JSON-RPC 2.0 over HTTP POST to a remote tool provider.
//!
//! Discovery is `tools/list`; invocation is `tools/call`. One request per
//! HTTP POST, with a per-client monotonic id counter (ids live and die with
//! the provider they belong to).

use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use url::Url;

use crate::error::ToolError;

/// Pooled-client timeout for remote tool calls.
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

// ─── Wire types ──────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct JsonRpcRequest {
    jsonrpc: &'static str,
    id: u64,
    method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// A tool advertised by a provider via `tools/list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteToolDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "inputSchema", default)]
    pub input_schema: Value,
}

/// Outcome of one `tools/call`: the concatenated text fragments and the
/// provider's error flag.
#[derive(Debug, Clone)]
pub struct RemoteCallOutcome {
    pub text: String,
    pub is_error: bool,
}

// ─── Client ──────────────────────────────────────────────────────────────────

/// HTTP JSON-RPC client for one remote provider.
pub struct McpClient {
    name: String,
    endpoint: Url,
    http: reqwest::Client,
    next_id: AtomicU64,
}

impl McpClient {
    pub fn new(name: impl Into<String>, endpoint: Url) -> Self {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .user_agent("gantry/0.1")
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            name: name.into(),
            endpoint,
            http,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn call(&self, method: &str, params: Option<Value>) -> Result<Value, ToolError> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method: method.to_string(),
            params,
        };
        let response = self
            .http
            .post(self.endpoint.clone())
            .json(&request)
            .send()
            .await
            .map_err(|e| ToolError::Transport(format!("POST {method} failed: {e}")))?;
        if !response.status().is_success() {
            return Err(ToolError::Transport(format!(
                "provider '{}' returned HTTP {}",
                self.name,
                response.status()
            )));
        }
        let parsed: JsonRpcResponse = response
            .json()
            .await
            .map_err(|e| ToolError::Transport(format!("bad JSON-RPC response: {e}")))?;
        if let Some(error) = parsed.error {
            return Err(ToolError::ExecutionFailure(format!(
                "provider '{}' error {}: {}",
                self.name, error.code, error.message
            )));
        }
        Ok(parsed.result.unwrap_or(Value::Null))
    }

    /// `tools/list` discovery.
    pub async fn list_tools(&self) -> Result<Vec<RemoteToolDescriptor>, ToolError> {
        let result = self.call("tools/list", None).await?;
        let tools = result
            .get("tools")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| serde_json::from_value(item.clone()).ok())
                    .collect()
            })
            .unwrap_or_default();
        Ok(tools)
    }

    /// `tools/call {name, arguments}`.
    pub async fn call_tool(
        &self,
        tool: &str,
        arguments: Value,
    ) -> Result<RemoteCallOutcome, ToolError> {
        let result = self
            .call(
                "tools/call",
                Some(json!({"name": tool, "arguments": arguments})),
            )
            .await?;

        let is_error = result
            .get("isError")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let text = result
            .get("content")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter(|item| item.get("type").and_then(Value::as_str) == Some("text"))
                    .filter_map(|item| item.get("text").and_then(Value::as_str))
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();
        Ok(RemoteCallOutcome { text, is_error })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_deserializes_with_defaults() {
        let d: RemoteToolDescriptor =
            serde_json::from_str(r#"{"name": "echo"}"#).unwrap();
        assert_eq!(d.name, "echo");
        assert!(d.description.is_empty());
        assert!(d.input_schema.is_null());
    }

    #[test]
    fn request_omits_empty_params() {
        let req = JsonRpcRequest {
            jsonrpc: "2.0",
            id: 1,
            method: "tools/list".into(),
            params: None,
        };
        let raw = serde_json::to_string(&req).unwrap();
        assert!(raw.contains("\"jsonrpc\":\"2.0\""));
        assert!(!raw.contains("params"));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_transport_error() {
        let client = McpClient::new(
            "dead",
            Url::parse("http://127.0.0.1:9/rpc").unwrap(),
        );
        let err = client.list_tools().await.unwrap_err();
        assert!(matches!(err, ToolError::Transport(_)));
    }
}
