//! TOML manifest for an on-disk skill.
//!
//! Each skill lives in `<skill-root>/<name>/` and carries:
//!
//! ```toml
//! [skill]
//! name = "charting"
//! version = "0.1.0"
//! description = "Render stock charts"
//! capabilities = ["render candlestick charts", "export PNG"]
//! ```
//!
//! plus a `scripts/` directory whose `.py`/`.sh` entries are promoted to
//! tools.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ToolError;

pub const MANIFEST_FILE: &str = "manifest.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillManifest {
    pub skill: SkillSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillSection {
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub description: String,
    /// Human-readable capabilities this skill advertises.
    #[serde(default)]
    pub capabilities: Vec<String>,
}

impl SkillManifest {
    /// Load `manifest.toml` from a skill directory.
    pub fn load(skill_dir: &Path) -> Result<Self, ToolError> {
        let path = skill_dir.join(MANIFEST_FILE);
        let raw = std::fs::read_to_string(&path).map_err(|e| {
            ToolError::InvalidArg(format!("cannot read '{}': {e}", path.display()))
        })?;
        toml::from_str(&raw)
            .map_err(|e| ToolError::InvalidArg(format!("bad manifest '{}': {e}", path.display())))
    }
}
