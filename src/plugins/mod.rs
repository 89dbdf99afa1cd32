//! Plugin-exported tools and deterministic unloading.
//!
//! Plugins register tools at runtime; the extension registry remembers
//! which names belong to which plugin so that unloading removes exactly
//! those tools and nothing else.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use crate::error::ToolError;
use crate::tools::{Tool, ToolRegistry};

pub struct ExtensionRegistry {
    registry: Arc<ToolRegistry>,
    /// plugin id → tool names it owns.
    owners: Mutex<HashMap<String, Vec<String>>>,
}

impl ExtensionRegistry {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            owners: Mutex::new(HashMap::new()),
        }
    }

    /// Register a tool on behalf of `plugin`.
    pub fn register_tool(&self, plugin: &str, tool: Arc<dyn Tool>) -> Result<(), ToolError> {
        let name = tool.name().to_string();
        self.registry.register_dynamic(tool)?;
        self.owners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(plugin.to_string())
            .or_default()
            .push(name);
        Ok(())
    }

    /// Remove exactly the tools `plugin` registered. Returns how many were
    /// unregistered.
    pub fn unload_plugin(&self, plugin: &str) -> usize {
        let names = self
            .owners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(plugin)
            .unwrap_or_default();
        let mut removed = 0;
        for name in &names {
            if self.registry.unregister_dynamic(name) {
                removed += 1;
            }
        }
        log::info!("plugins: unloaded '{plugin}' ({removed} tools removed)");
        removed
    }

    /// Plugin ids with their tool counts, sorted by id.
    pub fn list_plugins(&self) -> Vec<(String, usize)> {
        let owners = self.owners.lock().unwrap_or_else(|e| e.into_inner());
        let mut list: Vec<(String, usize)> = owners
            .iter()
            .map(|(plugin, tools)| (plugin.clone(), tools.len()))
            .collect();
        list.sort();
        list
    }

    /// Names owned by one plugin.
    pub fn tools_of(&self, plugin: &str) -> Vec<String> {
        self.owners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(plugin)
            .cloned()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::{Value, json};

    use super::*;
    use crate::tools::context::ExecutionContext;
    use crate::tools::traits::{ToolKind, ToolResult};

    struct PluginTool(String);

    #[async_trait]
    impl Tool for PluginTool {
        fn name(&self) -> &str {
            &self.0
        }
        fn kind(&self) -> ToolKind {
            ToolKind::Think
        }
        fn description(&self) -> &str {
            "plugin-exported"
        }
        fn schema(&self) -> Value {
            json!({"type": "object"})
        }
        async fn execute(
            &self,
            _ctx: &ExecutionContext,
            _args: Value,
        ) -> Result<ToolResult, ToolError> {
            Ok(ToolResult::ok("plugin ran"))
        }
    }

    #[test]
    fn unload_removes_exactly_owned_tools() {
        let registry = Arc::new(ToolRegistry::new());
        let extensions = ExtensionRegistry::new(registry.clone());

        extensions
            .register_tool("alpha", Arc::new(PluginTool("alpha_one".into())))
            .unwrap();
        extensions
            .register_tool("alpha", Arc::new(PluginTool("alpha_two".into())))
            .unwrap();
        extensions
            .register_tool("beta", Arc::new(PluginTool("beta_one".into())))
            .unwrap();
        assert_eq!(registry.len(), 3);

        let removed = extensions.unload_plugin("alpha");
        assert_eq!(removed, 2);
        assert!(registry.get("alpha_one").is_none());
        assert!(registry.get("alpha_two").is_none());
        assert!(registry.get("beta_one").is_some());
    }

    #[test]
    fn unload_unknown_plugin_is_a_noop() {
        let registry = Arc::new(ToolRegistry::new());
        let extensions = ExtensionRegistry::new(registry);
        assert_eq!(extensions.unload_plugin("ghost"), 0);
    }

    #[test]
    fn listing_reports_counts() {
        let registry = Arc::new(ToolRegistry::new());
        let extensions = ExtensionRegistry::new(registry);
        extensions
            .register_tool("alpha", Arc::new(PluginTool("alpha_one".into())))
            .unwrap();
        assert_eq!(extensions.list_plugins(), vec![("alpha".to_string(), 1)]);
        assert_eq!(extensions.tools_of("alpha"), vec!["alpha_one"]);
    }
}
