use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use crate::error::ToolError;

use super::traits::{Tool, ToolInfo};

struct Entry {
    tool: Arc<dyn Tool>,
    /// Dynamic entries (plugin- and remote-discovered tools) may be
    /// replaced and unregistered at runtime; static ones are permanent.
    dynamic: bool,
}

/// Central registry of available tools.
///
/// Lookups take the read lock only long enough to clone an `Arc`;
/// registrations serialize on the write lock. Names are unique:
/// re-registering a name replaces the entry only when the existing entry is
/// dynamic.
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Entry>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: RwLock::new(HashMap::new()),
        }
    }

    /// Register a permanent (built-in) tool. Replaces a previous static
    /// entry with the same name.
    pub fn register(&self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(
                name,
                Entry {
                    tool,
                    dynamic: false,
                },
            );
    }

    /// Register a dynamic tool (plugin-exported or remote-discovered).
    ///
    /// Fails if the name is already taken by a static tool; replaces a
    /// previous dynamic entry silently.
    pub fn register_dynamic(&self, tool: Arc<dyn Tool>) -> Result<(), ToolError> {
        let name = tool.name().to_string();
        let mut tools = self.tools.write().unwrap_or_else(|e| e.into_inner());
        if let Some(existing) = tools.get(&name)
            && !existing.dynamic
        {
            return Err(ToolError::Internal(format!(
                "dynamic tool '{name}' collides with a built-in tool"
            )));
        }
        tools.insert(name, Entry {
            tool,
            dynamic: true,
        });
        Ok(())
    }

    /// Remove a dynamic tool. Static tools are never removed; returns
    /// whether an entry was actually dropped.
    pub fn unregister_dynamic(&self, name: &str) -> bool {
        let mut tools = self.tools.write().unwrap_or_else(|e| e.into_inner());
        match tools.get(name) {
            Some(entry) if entry.dynamic => {
                tools.remove(name);
                true
            }
            _ => false,
        }
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .map(|e| e.tool.clone())
    }

    /// Summaries of every registered tool, sorted by name.
    pub fn list(&self) -> Vec<ToolInfo> {
        let mut infos: Vec<ToolInfo> = self
            .tools
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .map(|e| ToolInfo {
                name: e.tool.name().to_string(),
                kind: e.tool.kind(),
                description: e.tool.description().to_string(),
                schema: e.tool.schema(),
            })
            .collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        infos
    }

    /// Registered tool names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .tools
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::{Value, json};

    use super::*;
    use crate::tools::context::ExecutionContext;
    use crate::tools::traits::{ToolKind, ToolResult};

    struct DummyTool(&'static str);

    #[async_trait]
    impl Tool for DummyTool {
        fn name(&self) -> &str {
            self.0
        }
        fn kind(&self) -> ToolKind {
            ToolKind::Read
        }
        fn description(&self) -> &str {
            "a test tool"
        }
        fn schema(&self) -> Value {
            json!({"type": "object"})
        }
        async fn execute(
            &self,
            _ctx: &ExecutionContext,
            _args: Value,
        ) -> Result<ToolResult, ToolError> {
            Ok(ToolResult::ok("done"))
        }
    }

    #[test]
    fn register_and_get() {
        let reg = ToolRegistry::new();
        reg.register(Arc::new(DummyTool("dummy")));
        assert!(reg.get("dummy").is_some());
        assert!(reg.get("nope").is_none());
    }

    #[test]
    fn dynamic_cannot_shadow_static() {
        let reg = ToolRegistry::new();
        reg.register(Arc::new(DummyTool("bash")));
        let err = reg.register_dynamic(Arc::new(DummyTool("bash")));
        assert!(err.is_err());
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn dynamic_replace_and_unregister() {
        let reg = ToolRegistry::new();
        reg.register_dynamic(Arc::new(DummyTool("srv_echo"))).unwrap();
        reg.register_dynamic(Arc::new(DummyTool("srv_echo"))).unwrap();
        assert_eq!(reg.len(), 1);
        assert!(reg.unregister_dynamic("srv_echo"));
        assert!(reg.get("srv_echo").is_none());
    }

    #[test]
    fn static_survives_unregister() {
        let reg = ToolRegistry::new();
        reg.register(Arc::new(DummyTool("bash")));
        assert!(!reg.unregister_dynamic("bash"));
        assert!(reg.get("bash").is_some());
    }

    #[test]
    fn list_is_sorted() {
        let reg = ToolRegistry::new();
        reg.register(Arc::new(DummyTool("zeta")));
        reg.register(Arc::new(DummyTool("alpha")));
        let names: Vec<String> = reg.list().into_iter().map(|i| i.name).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }
}
