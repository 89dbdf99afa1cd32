//! On-disk layout of the substrate's persistent state.
//!
//! Everything lives under one user root (default `~/.gantry`):
//!
//! ```text
//! ~/.gantry/
//!   mcp.json              remote tool providers
//!   current_plan.json     the active plan
//!   memory.json           structured memory store
//!   memory/YYYY-MM-DD.md  daily logs
//!   soul.md, prompts/     prompt components (see prompts::engine)
//!   skills/               installed skills
//! ```
//!
//! A workspace overlays prompt components (and a memory file) under its
//! own `.gantry/` directory.

use std::path::PathBuf;

/// Name of the per-workspace overlay directory.
pub const SYS_DIRNAME: &str = ".gantry";

#[derive(Debug, Clone)]
pub struct GatewayPaths {
    pub user_root: PathBuf,
}

impl GatewayPaths {
    pub fn new(user_root: impl Into<PathBuf>) -> Self {
        Self {
            user_root: user_root.into(),
        }
    }

    /// `~/.gantry`, or a temp-dir fallback when no home is known.
    pub fn default_root() -> Self {
        let root = dirs::home_dir()
            .map(|h| h.join(SYS_DIRNAME))
            .unwrap_or_else(|| std::env::temp_dir().join("gantry"));
        Self::new(root)
    }

    pub fn mcp_config(&self) -> PathBuf {
        self.user_root.join("mcp.json")
    }

    pub fn plan_file(&self) -> PathBuf {
        self.user_root.join("current_plan.json")
    }

    pub fn memory_file(&self) -> PathBuf {
        self.user_root.join("memory.json")
    }

    pub fn memory_dir(&self) -> PathBuf {
        self.user_root.join("memory")
    }

    /// The prompt engine's system root is the user root itself
    /// (`soul.md`, `prompts/`, channel overlays).
    pub fn prompt_root(&self) -> PathBuf {
        self.user_root.clone()
    }

    pub fn skills_dir(&self) -> PathBuf {
        self.user_root.join("skills")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_hang_off_the_root() {
        let paths = GatewayPaths::new("/tmp/gantry-test");
        assert_eq!(paths.mcp_config(), PathBuf::from("/tmp/gantry-test/mcp.json"));
        assert_eq!(
            paths.plan_file(),
            PathBuf::from("/tmp/gantry-test/current_plan.json")
        );
        assert_eq!(
            paths.memory_dir(),
            PathBuf::from("/tmp/gantry-test/memory")
        );
        assert_eq!(paths.prompt_root(), PathBuf::from("/tmp/gantry-test"));
    }
}
