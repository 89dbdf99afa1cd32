//! Registry adapter for remote tools: each discovered tool becomes a
//! `Tool` named `<provider>_<tool>` that forwards to the provider.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::error::ToolError;
use crate::tools::context::ExecutionContext;
use crate::tools::traits::{Tool, ToolKind, ToolResult};

use super::client::{McpClient, RemoteToolDescriptor};

pub struct RemoteToolProxy {
    /// `<provider>_<tool>`.
    full_name: String,
    /// Name as the provider knows it.
    remote_name: String,
    description: String,
    schema: Value,
    client: Arc<McpClient>,
}

impl RemoteToolProxy {
    pub fn new(descriptor: &RemoteToolDescriptor, client: Arc<McpClient>) -> Self {
        Self {
            full_name: format!("{}_{}", client.name(), descriptor.name),
            remote_name: descriptor.name.clone(),
            description: if descriptor.description.is_empty() {
                format!("Remote tool '{}' from provider '{}'.", descriptor.name, client.name())
            } else {
                descriptor.description.clone()
            },
            schema: if descriptor.input_schema.is_null() {
                json!({"type": "object"})
            } else {
                descriptor.input_schema.clone()
            },
            client,
        }
    }
}

#[async_trait]
impl Tool for RemoteToolProxy {
    fn name(&self) -> &str {
        &self.full_name
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Fetch
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn schema(&self) -> Value {
        self.schema.clone()
    }

    async fn execute(
        &self,
        ctx: &ExecutionContext,
        args: Value,
    ) -> Result<ToolResult, ToolError> {
        let cancel = ctx.cancellation();
        let outcome = tokio::select! {
            outcome = self.client.call_tool(&self.remote_name, args) => outcome?,
            _ = cancel.cancelled() => {
                return Ok(ToolResult::fail("remote call cancelled"));
            }
        };
        let mut result = if outcome.is_error {
            ToolResult::fail(outcome.text)
        } else {
            ToolResult::ok(outcome.text)
        };
        result.annotate("provider", json!(self.client.name()));
        result.annotate("remote_tool", json!(self.remote_name));
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use url::Url;

    use super::*;

    #[test]
    fn proxy_name_is_provider_prefixed() {
        let client = Arc::new(McpClient::new(
            "charts",
            Url::parse("https://example.com/rpc").unwrap(),
        ));
        let descriptor = RemoteToolDescriptor {
            name: "render".into(),
            description: "Render a chart".into(),
            input_schema: json!({"type": "object"}),
        };
        let proxy = RemoteToolProxy::new(&descriptor, client);
        assert_eq!(proxy.name(), "charts_render");
        assert_eq!(proxy.description(), "Render a chart");
    }

    #[test]
    fn null_schema_becomes_empty_object() {
        let client = Arc::new(McpClient::new(
            "p",
            Url::parse("https://example.com/rpc").unwrap(),
        ));
        let descriptor = RemoteToolDescriptor {
            name: "t".into(),
            description: String::new(),
            input_schema: Value::Null,
        };
        let proxy = RemoteToolProxy::new(&descriptor, client);
        assert_eq!(proxy.schema()["type"], "object");
        assert!(proxy.description().contains("provider 'p'"));
    }
}
