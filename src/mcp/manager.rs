//! Supervises remote tool providers: discovery, registration, persistence.
//!
//! Adding a provider runs `tools/list`, wraps each discovered tool as a
//! [`RemoteToolProxy`] registered under `<provider>_<tool>`, and persists
//! the provider set to `mcp.json`. Removing unregisters every tool carrying
//! the provider's prefix and rewrites the file.

use std::{collections::HashMap, path::PathBuf, sync::Arc};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ToolError;
use crate::tools::ToolRegistry;
use crate::tools::traits::Tool;

use super::client::McpClient;
use super::proxy::RemoteToolProxy;

// ─── Persisted config ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServerConfig {
    pub name: String,
    pub endpoint: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct McpConfigFile {
    #[serde(default)]
    servers: Vec<McpServerConfig>,
}

/// Introspection row for `list_servers`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServerInfo {
    pub name: String,
    pub endpoint: String,
    pub enabled: bool,
    pub tool_count: usize,
}

struct ProviderEntry {
    client: Arc<McpClient>,
    enabled: bool,
    /// Fully-prefixed names currently registered for this provider.
    tool_names: Vec<String>,
}

// ─── Manager ─────────────────────────────────────────────────────────────────

pub struct McpManager {
    registry: Arc<ToolRegistry>,
    config_path: PathBuf,
    providers: tokio::sync::Mutex<HashMap<String, ProviderEntry>>,
}

impl McpManager {
    pub fn new(registry: Arc<ToolRegistry>, config_path: impl Into<PathBuf>) -> Self {
        Self {
            registry,
            config_path: config_path.into(),
            providers: tokio::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Load `mcp.json` and bring up every enabled provider. Providers that
    /// fail discovery are kept in the config but carry no tools.
    pub async fn load(&self) -> Result<(), ToolError> {
        let config = self.read_config();
        for server in config.servers {
            if !server.enabled {
                let mut providers = self.providers.lock().await;
                let endpoint = match Url::parse(&server.endpoint) {
                    Ok(u) => u,
                    Err(e) => {
                        log::warn!("mcp: skipping '{}': bad endpoint: {e}", server.name);
                        continue;
                    }
                };
                providers.insert(server.name.clone(), ProviderEntry {
                    client: Arc::new(McpClient::new(server.name.clone(), endpoint)),
                    enabled: false,
                    tool_names: Vec::new(),
                });
                continue;
            }
            if let Err(e) = self.connect(&server.name, &server.endpoint).await {
                log::warn!("mcp: provider '{}' failed to load: {e}", server.name);
            }
        }
        Ok(())
    }

    /// Add a provider: discover, register, persist.
    pub async fn add_server(&self, name: &str, endpoint: &str) -> Result<usize, ToolError> {
        {
            let providers = self.providers.lock().await;
            if providers.contains_key(name) {
                return Err(ToolError::InvalidArg(format!(
                    "provider '{name}' already exists"
                )));
            }
        }
        let count = self.connect(name, endpoint).await?;
        self.persist().await?;
        Ok(count)
    }

    /// Discovery + registration, without persistence.
    async fn connect(&self, name: &str, endpoint: &str) -> Result<usize, ToolError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| ToolError::InvalidArg(format!("invalid endpoint: {e}")))?;
        let client = Arc::new(McpClient::new(name.to_string(), endpoint));
        let descriptors = client.list_tools().await?;

        let mut tool_names = Vec::with_capacity(descriptors.len());
        for descriptor in &descriptors {
            let proxy = Arc::new(RemoteToolProxy::new(descriptor, client.clone()));
            let full_name = proxy.name().to_string();
            match self.registry.register_dynamic(proxy) {
                Ok(()) => tool_names.push(full_name),
                Err(e) => log::warn!("mcp: skipping tool '{full_name}': {e}"),
            }
        }
        let count = tool_names.len();
        log::info!("mcp: provider '{name}' registered {count} tool(s)");

        let mut providers = self.providers.lock().await;
        providers.insert(name.to_string(), ProviderEntry {
            client,
            enabled: true,
            tool_names,
        });
        Ok(count)
    }

    /// Remove a provider and every tool registered under its prefix.
    pub async fn remove_server(&self, name: &str) -> Result<(), ToolError> {
        let entry = {
            let mut providers = self.providers.lock().await;
            providers
                .remove(name)
                .ok_or_else(|| ToolError::NotFound(format!("provider '{name}'")))?
        };
        for tool_name in &entry.tool_names {
            self.registry.unregister_dynamic(tool_name);
        }
        log::info!(
            "mcp: provider '{name}' removed ({} tools unregistered)",
            entry.tool_names.len()
        );
        self.persist().await
    }

    /// Re-run discovery for one provider, replacing its tool set.
    pub async fn refresh_server(&self, name: &str) -> Result<usize, ToolError> {
        let (client, old_names) = {
            let providers = self.providers.lock().await;
            let entry = providers
                .get(name)
                .ok_or_else(|| ToolError::NotFound(format!("provider '{name}'")))?;
            (entry.client.clone(), entry.tool_names.clone())
        };
        let descriptors = client.list_tools().await?;

        for old in &old_names {
            self.registry.unregister_dynamic(old);
        }
        let mut tool_names = Vec::with_capacity(descriptors.len());
        for descriptor in &descriptors {
            let proxy = Arc::new(RemoteToolProxy::new(descriptor, client.clone()));
            let full_name = proxy.name().to_string();
            if self.registry.register_dynamic(proxy).is_ok() {
                tool_names.push(full_name);
            }
        }
        let count = tool_names.len();
        let mut providers = self.providers.lock().await;
        if let Some(entry) = providers.get_mut(name) {
            entry.tool_names = tool_names;
        }
        Ok(count)
    }

    pub async fn list_servers(&self) -> Vec<McpServerInfo> {
        let providers = self.providers.lock().await;
        let mut infos: Vec<McpServerInfo> = providers
            .iter()
            .map(|(name, entry)| McpServerInfo {
                name: name.clone(),
                endpoint: entry.client.endpoint().to_string(),
                enabled: entry.enabled,
                tool_count: entry.tool_names.len(),
            })
            .collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        infos
    }

    // ── Persistence ──────────────────────────────────────────────────────

    fn read_config(&self) -> McpConfigFile {
        std::fs::read_to_string(&self.config_path)
            .ok()
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default()
    }

    async fn persist(&self) -> Result<(), ToolError> {
        let servers: Vec<McpServerConfig> = {
            let providers = self.providers.lock().await;
            let mut servers: Vec<McpServerConfig> = providers
                .iter()
                .map(|(name, entry)| McpServerConfig {
                    name: name.clone(),
                    endpoint: entry.client.endpoint().to_string(),
                    enabled: entry.enabled,
                })
                .collect();
            servers.sort_by(|a, b| a.name.cmp(&b.name));
            servers
        };
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string_pretty(&McpConfigFile { servers })?;
        std::fs::write(&self.config_path, raw)?;
        Ok(())
    }
}
