//! Skill discovery, install/uninstall, and promotion to tools.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::error::ToolError;
use crate::sandbox::Sandbox;
use crate::tools::ToolRegistry;
use crate::tools::args::string_array;
use crate::tools::context::ExecutionContext;
use crate::tools::traits::{Tool, ToolKind, ToolResult};

use super::manifest::{MANIFEST_FILE, SkillManifest};

// ─── Skill model ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Skill {
    pub name: String,
    pub dir: PathBuf,
    pub manifest: SkillManifest,
    /// Promotable scripts found under `scripts/`.
    pub scripts: Vec<PathBuf>,
}

impl Skill {
    /// One line per capability for a human listing.
    pub fn describe(&self) -> String {
        let mut out = format!("{} — {}", self.name, self.manifest.skill.description);
        for capability in &self.manifest.skill.capabilities {
            out.push_str(&format!("\n  - {capability}"));
        }
        out
    }
}

// ─── Manager ─────────────────────────────────────────────────────────────────

/// Scans the skill root (following symlinks), installs/uninstalls skills,
/// and promotes their scripts into the tool registry.
pub struct SkillManager {
    root: PathBuf,
}

impl SkillManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Scan the skill root. Directories (and symlinked directories) with a
    /// readable manifest become skills; anything else is skipped with a log
    /// line.
    pub fn scan(&self) -> Vec<Skill> {
        let Ok(entries) = std::fs::read_dir(&self.root) else {
            return Vec::new();
        };
        let mut skills = Vec::new();
        for entry in entries.flatten() {
            let dir = entry.path();
            // `is_dir` follows symlinks.
            if !dir.is_dir() {
                continue;
            }
            let manifest = match SkillManifest::load(&dir) {
                Ok(m) => m,
                Err(e) => {
                    log::warn!("skills: skipping '{}': {e}", dir.display());
                    continue;
                }
            };
            let scripts = find_scripts(&dir.join("scripts"));
            skills.push(Skill {
                name: manifest.skill.name.clone(),
                dir,
                manifest,
                scripts,
            });
        }
        skills.sort_by(|a, b| a.name.cmp(&b.name));
        skills
    }

    /// Install a skill by symlinking its source directory under the root.
    pub fn install(&self, source: &Path) -> Result<Skill, ToolError> {
        let manifest = SkillManifest::load(source)?;
        let name = manifest.skill.name.clone();
        std::fs::create_dir_all(&self.root)?;
        let link = self.root.join(&name);
        if link.exists() {
            return Err(ToolError::InvalidArg(format!(
                "skill '{name}' is already installed"
            )));
        }
        let source = source
            .canonicalize()
            .map_err(|e| ToolError::InvalidArg(format!("bad skill source: {e}")))?;
        #[cfg(unix)]
        std::os::unix::fs::symlink(&source, &link)?;
        #[cfg(not(unix))]
        return Err(ToolError::Internal(
            "skill install requires symlink support".into(),
        ));
        log::info!("skills: installed '{name}' -> {}", source.display());
        Ok(Skill {
            name,
            dir: link,
            scripts: find_scripts(&source.join("scripts")),
            manifest,
        })
    }

    /// Uninstall a skill installed via [`SkillManager::install`].
    pub fn uninstall(&self, name: &str) -> Result<(), ToolError> {
        let link = self.root.join(name);
        let meta = std::fs::symlink_metadata(&link)
            .map_err(|_| ToolError::NotFound(format!("skill '{name}'")))?;
        if !meta.file_type().is_symlink() {
            return Err(ToolError::InvalidArg(format!(
                "skill '{name}' was not installed by the manager; remove it manually"
            )));
        }
        std::fs::remove_file(&link)?;
        log::info!("skills: uninstalled '{name}'");
        Ok(())
    }

    /// Promote every skill script to a registered tool named
    /// `<skill>_<script-stem>`. Returns the registered names.
    pub fn promote_tools(
        &self,
        registry: &ToolRegistry,
        sandbox: Arc<Sandbox>,
    ) -> Vec<String> {
        let mut registered = Vec::new();
        for skill in self.scan() {
            for script in &skill.scripts {
                let Some(tool) = ScriptTool::for_script(&skill, script, sandbox.clone()) else {
                    continue;
                };
                let name = tool.name().to_string();
                match registry.register_dynamic(Arc::new(tool)) {
                    Ok(()) => registered.push(name),
                    Err(e) => log::warn!("skills: cannot register '{name}': {e}"),
                }
            }
        }
        registered
    }
}

/// `.py` and `.sh` files directly under `scripts/`, sorted.
fn find_scripts(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut scripts: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e == "py" || e == "sh")
        })
        .collect();
    scripts.sort();
    scripts
}

// ─── ScriptTool ──────────────────────────────────────────────────────────────

/// A promoted skill script. The execution recipe is fixed per extension:
/// `python3` for `.py`, `bash` for `.sh`.
pub struct ScriptTool {
    name: String,
    description: String,
    interpreter: &'static str,
    script: PathBuf,
    sandbox: Arc<Sandbox>,
}

impl ScriptTool {
    fn for_script(skill: &Skill, script: &Path, sandbox: Arc<Sandbox>) -> Option<Self> {
        let stem = script.file_stem()?.to_str()?;
        let interpreter = match script.extension()?.to_str()? {
            "py" => "python3",
            "sh" => "bash",
            _ => return None,
        };
        Some(Self {
            name: format!("{}_{stem}", skill.name),
            description: format!(
                "Skill script '{stem}' from '{}': {}",
                skill.name, skill.manifest.skill.description
            ),
            interpreter,
            script: script.to_path_buf(),
            sandbox,
        })
    }
}

#[async_trait]
impl Tool for ScriptTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Execute
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "args": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Positional arguments passed to the script."
                }
            }
        })
    }

    async fn execute(
        &self,
        ctx: &ExecutionContext,
        args: Value,
    ) -> Result<ToolResult, ToolError> {
        let script_args = match args.get("args") {
            Some(_) => match string_array(&args, "args") {
                Ok(a) => a,
                Err(e) => return Ok(ToolResult::invalid_arg(e)),
            },
            None => Vec::new(),
        };
        let script = self.script.to_string_lossy().into_owned();
        let mut argv: Vec<&str> = vec![&script];
        argv.extend(script_args.iter().map(String::as_str));

        let outcome = self.sandbox.execute(ctx, self.interpreter, &argv).await?;
        let header = format!("{} {script}", self.interpreter);
        let display = outcome.render_display(&header);
        let mut result = if outcome.success() {
            ToolResult::ok(outcome.combined_output())
        } else {
            let mut r = ToolResult::fail(format!(
                "script exited with status {}",
                outcome.exit_code
            ));
            r.output = outcome.combined_output();
            r
        };
        result = result
            .with_display(display)
            .with_metadata(outcome.metadata());
        Ok(result)
    }
}
