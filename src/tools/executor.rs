//! The executor: registry lookup, policy gate, dispatch, result annotation.
//!
//! Prompt assembly advertises [`ToolExecutor::filtered_list`]; the executor
//! re-checks the policy at call time anyway, so a stale advertisement can
//! never run a denied tool.

use std::{sync::Arc, time::Instant};

use serde_json::json;

use crate::error::ToolError;
use crate::policy::{PolicyDecision, ToolPolicy};

use super::context::ExecutionContext;
use super::registry::ToolRegistry;
use super::traits::{ToolCall, ToolInfo, ToolResult};

/// Executes [`ToolCall`]s against the registry under the policy gate.
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    policy: Arc<ToolPolicy>,
}

impl ToolExecutor {
    pub fn new(registry: Arc<ToolRegistry>, policy: Arc<ToolPolicy>) -> Self {
        Self { registry, policy }
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub fn policy(&self) -> &Arc<ToolPolicy> {
        &self.policy
    }

    /// Registered tools filtered by the active policy. This is what prompt
    /// assembly advertises to the model.
    pub fn filtered_list(&self) -> Vec<ToolInfo> {
        self.registry
            .list()
            .into_iter()
            .filter(|info| self.policy.is_allowed(&info.name, info.kind))
            .collect()
    }

    /// Names of the advertised tools, sorted.
    pub fn filtered_names(&self) -> Vec<String> {
        self.filtered_list().into_iter().map(|i| i.name).collect()
    }

    /// Execute one call.
    ///
    /// Returns `Err(NotAllowed)` iff the policy denies the tool, and
    /// `Err(NotFound)` for unregistered names. Ask-mode confirmations come
    /// back as an unsuccessful [`ToolResult`] tagged
    /// `needs_confirmation: true` for upstream to act on.
    pub async fn execute(
        &self,
        ctx: &ExecutionContext,
        call: &ToolCall,
    ) -> Result<ToolResult, ToolError> {
        let tool = self
            .registry
            .get(&call.name)
            .ok_or_else(|| ToolError::NotFound(call.name.clone()))?;

        let decision = self.policy.decide(&call.name, tool.kind());
        self.policy.record(&call.name, decision);
        match decision {
            PolicyDecision::Denied => {
                log::warn!("policy denied tool '{}' (call {})", call.name, call.id);
                return Err(ToolError::NotAllowed(call.name.clone()));
            }
            PolicyDecision::NeedsConfirmation => {
                return Ok(ToolResult::fail(format!(
                    "tool '{}' requires user confirmation before it can run",
                    call.name
                ))
                .with_metadata(json!({
                    "needs_confirmation": true,
                    "call_id": call.id,
                    "tool": call.name,
                })));
            }
            PolicyDecision::Allowed => {}
        }

        let call_ctx = ctx.for_call(&call.id);
        let started = Instant::now();
        let mut result = tool.execute(&call_ctx, call.arguments.clone()).await?;
        let elapsed = started.elapsed();

        result.annotate("call_id", json!(call.id));
        result.annotate("tool", json!(call.name));
        result.annotate("duration_ms", json!(elapsed.as_millis() as u64));
        log::debug!(
            "tool '{}' (call {}) finished in {:?} success={}",
            call.name,
            call.id,
            elapsed,
            result.success
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::{Value, json};

    use super::*;
    use crate::policy::{PolicyAction, PolicyRules};
    use crate::tools::traits::{Tool, ToolKind};

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn kind(&self) -> ToolKind {
            ToolKind::Execute
        }
        fn description(&self) -> &str {
            "echoes its message argument"
        }
        fn schema(&self) -> Value {
            json!({"type": "object", "properties": {"msg": {"type": "string"}}})
        }
        async fn execute(
            &self,
            _ctx: &ExecutionContext,
            args: Value,
        ) -> Result<ToolResult, ToolError> {
            let msg = args.get("msg").and_then(Value::as_str).unwrap_or_default();
            Ok(ToolResult::ok(msg))
        }
    }

    fn executor(rules: PolicyRules) -> ToolExecutor {
        let registry = Arc::new(ToolRegistry::new());
        registry.register(Arc::new(EchoTool));
        ToolExecutor::new(registry, Arc::new(ToolPolicy::new(rules)))
    }

    #[tokio::test]
    async fn dispatch_annotates_call_id() {
        let exec = executor(PolicyRules::allow_all());
        let ctx = ExecutionContext::new();
        let call = ToolCall::new("c1", "echo", json!({"msg": "hi"}));
        let r = exec.execute(&ctx, &call).await.unwrap();
        assert!(r.success);
        assert_eq!(r.output, "hi");
        let meta = r.metadata.unwrap();
        assert_eq!(meta["call_id"], "c1");
        assert_eq!(meta["tool"], "echo");
    }

    #[tokio::test]
    async fn denied_tool_returns_not_allowed() {
        let exec = executor(PolicyRules::default().with_denied("echo"));
        let ctx = ExecutionContext::new();
        let call = ToolCall::new("c1", "echo", json!({}));
        let err = exec.execute(&ctx, &call).await.unwrap_err();
        assert!(matches!(err, ToolError::NotAllowed(name) if name == "echo"));
    }

    #[tokio::test]
    async fn unknown_tool_returns_not_found() {
        let exec = executor(PolicyRules::allow_all());
        let ctx = ExecutionContext::new();
        let call = ToolCall::new("c1", "missing", json!({}));
        let err = exec.execute(&ctx, &call).await.unwrap_err();
        assert!(matches!(err, ToolError::NotFound(_)));
    }

    #[tokio::test]
    async fn ask_mode_surfaces_confirmation() {
        let exec = executor(PolicyRules::default().with_ask_mode(true));
        let ctx = ExecutionContext::new();
        let call = ToolCall::new("c9", "echo", json!({"msg": "hi"}));
        let r = exec.execute(&ctx, &call).await.unwrap();
        assert!(!r.success);
        assert_eq!(r.metadata.unwrap()["needs_confirmation"], true);
    }

    /// Policy totality: execute returns `NotAllowed` exactly when
    /// `is_allowed` is false, for every policy shape.
    #[tokio::test]
    async fn policy_totality() {
        let shapes = vec![
            PolicyRules::allow_all(),
            PolicyRules::default().with_denied("echo"),
            PolicyRules::default().with_default_action(PolicyAction::Deny),
            PolicyRules::default()
                .with_default_action(PolicyAction::Deny)
                .with_allowed("echo"),
            PolicyRules::default().with_kind_default(ToolKind::Execute, PolicyAction::Deny),
            PolicyRules::default().with_ask_mode(true),
        ];
        for rules in shapes {
            let exec = executor(rules);
            let allowed = exec.policy().is_allowed("echo", ToolKind::Execute);
            let ctx = ExecutionContext::new();
            let call = ToolCall::new("c", "echo", json!({}));
            let outcome = exec.execute(&ctx, &call).await;
            let got_not_allowed =
                matches!(&outcome, Err(ToolError::NotAllowed(_)));
            assert_eq!(got_not_allowed, !allowed);
        }
    }

    #[tokio::test]
    async fn filtered_list_respects_policy() {
        let exec = executor(PolicyRules::default().with_denied("echo"));
        assert!(exec.filtered_list().is_empty());
        let exec = executor(PolicyRules::allow_all());
        assert_eq!(exec.filtered_names(), vec!["echo"]);
    }
}
