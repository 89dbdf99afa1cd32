//! Layered system-prompt assembly.
//!
//! Components are discovered from a filesystem tree:
//!
//! ```text
//! <system-root>/
//!   soul.md               always-on persona
//!   prompts/*.md          conditional components
//!   prompts/variants/*.md model-keyed overrides
//!   <channel>/soul.md     per-channel overlay
//!   <channel>/prompts/*.md
//! <workspace>/<sys-dirname>/   same layout; overrides global by name
//! ```
//!
//! Assembly is deterministic: sections in a fixed order joined by a `---`
//! separator. The component-selection step (variant match plus
//! requirement-filtered, priority-sorted components) is memoized per
//! `channel|model|intent|tool-set`; the dynamic tail (runtime block,
//! memory, focus, user rules) is rebuilt on every call, so memory edits
//! are always visible. Discovery invalidates the cache.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, RwLock},
};

use notify::{RecursiveMode, Watcher};

use crate::error::ToolError;
use crate::memory::DailyMemory;

use super::component::{PromptComponent, parse_component};
use super::intent::detect_intent;

const SEPARATOR: &str = "\n\n---\n\n";
/// Name of the workspace memory file inside the overlay dir.
const WORKSPACE_MEMORY_FILE: &str = "MEMORY.md";
/// Env var naming a Python environment root for the runtime block.
pub const PYTHON_ENV_VAR: &str = "GANTRY_PYTHON_ENV";

// ─── Context ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct FocusFile {
    pub path: String,
    pub snippet: Option<String>,
}

/// Everything upstream knows about the current turn.
#[derive(Debug, Clone, Default)]
pub struct PromptContext {
    pub registered_tools: Vec<String>,
    pub model: String,
    pub user_message: String,
    pub channel: Option<String>,
    pub workspace: Option<PathBuf>,
    pub focus_files: Vec<FocusFile>,
    pub focus_context: Option<String>,
    pub user_rules: Option<String>,
    /// 0 disables the budget.
    pub max_token_budget: usize,
}

// ─── Engine state ────────────────────────────────────────────────────────────

#[derive(Default)]
struct EngineState {
    core_soul: Option<String>,
    channel_souls: HashMap<String, String>,
    /// Shared components, merged across layers (last layer wins by name).
    components: HashMap<String, PromptComponent>,
    /// Channel-scoped components: channel → name → component.
    channel_components: HashMap<String, HashMap<String, PromptComponent>>,
    /// Model variants by file stem.
    variants: HashMap<String, String>,
    /// Workspace used at last discovery (for watcher-driven reloads).
    workspace: Option<PathBuf>,
}

pub struct PromptEngine {
    system_root: PathBuf,
    /// Overlay directory name inside a workspace (e.g. `.gantry`).
    sys_dirname: String,
    state: RwLock<EngineState>,
    /// Memoized component selection keyed by `channel|model|intent|tools`.
    selection: Mutex<HashMap<String, Selection>>,
    daily: Option<Arc<DailyMemory>>,
}

#[derive(Clone, Default)]
struct Selection {
    variant: Option<String>,
    component_bodies: Vec<String>,
}

impl PromptEngine {
    pub fn new(system_root: impl Into<PathBuf>, sys_dirname: impl Into<String>) -> Self {
        Self {
            system_root: system_root.into(),
            sys_dirname: sys_dirname.into(),
            state: RwLock::new(EngineState::default()),
            selection: Mutex::new(HashMap::new()),
            daily: None,
        }
    }

    /// Attach the daily-memory source for the memory envelopes.
    pub fn with_daily(mut self, daily: Arc<DailyMemory>) -> Self {
        self.daily = Some(daily);
        self
    }

    // ── Discovery ────────────────────────────────────────────────────────

    /// Re-read every layer from disk, resetting all internal state.
    /// Creates missing directories on the way.
    pub fn discover(&self, workspace: Option<&Path>) -> Result<(), ToolError> {
        std::fs::create_dir_all(self.system_root.join("prompts").join("variants"))?;

        let mut state = EngineState {
            workspace: workspace.map(Path::to_path_buf),
            ..EngineState::default()
        };
        load_layer(&self.system_root, &mut state);
        if let Some(ws) = workspace {
            load_layer(&ws.join(&self.sys_dirname), &mut state);
        }

        let component_count = state.components.len();
        *self.state.write().unwrap_or_else(|e| e.into_inner()) = state;
        // Discovery always invalidates the selection cache.
        self.selection
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
        log::info!("prompt engine discovered {component_count} component(s)");
        Ok(())
    }

    /// Watch the system root and reload on changes. The returned watcher
    /// must be kept alive by the caller.
    pub fn start_watcher(
        self: &Arc<Self>,
    ) -> Result<notify::RecommendedWatcher, ToolError> {
        let engine = Arc::clone(self);
        let mut watcher = notify::recommended_watcher(move |event: notify::Result<notify::Event>| {
            if let Ok(event) = event
                && matches!(
                    event.kind,
                    notify::EventKind::Modify(_)
                        | notify::EventKind::Create(_)
                        | notify::EventKind::Remove(_)
                )
            {
                let workspace = engine
                    .state
                    .read()
                    .unwrap_or_else(|e| e.into_inner())
                    .workspace
                    .clone();
                if let Err(e) = engine.discover(workspace.as_deref()) {
                    log::warn!("prompt reload failed: {e}");
                }
            }
        })
        .map_err(|e| ToolError::Internal(format!("failed to create watcher: {e}")))?;
        watcher
            .watch(&self.system_root, RecursiveMode::Recursive)
            .map_err(|e| ToolError::Internal(format!("failed to watch prompt dir: {e}")))?;
        Ok(watcher)
    }

    // ── Assembly ─────────────────────────────────────────────────────────

    /// Build the system prompt for one turn.
    pub fn assemble(&self, ctx: &PromptContext) -> String {
        let intent = detect_intent(&ctx.user_message);
        let selection = self.select_components(ctx, intent);
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());

        let mut sections: Vec<String> = Vec::new();

        // 1. Core soul.
        if let Some(soul) = &state.core_soul {
            sections.push(soul.clone());
        }
        // 2. Channel soul.
        if let Some(channel) = &ctx.channel
            && let Some(soul) = state.channel_souls.get(channel)
        {
            sections.push(soul.clone());
        }
        // 3. Runtime environment block.
        sections.push(runtime_block(ctx));
        // 4. Tooling section.
        if !ctx.registered_tools.is_empty() {
            sections.push(tooling_section(&ctx.registered_tools));
        }
        // 5. Model variant.
        if let Some(variant) = &selection.variant {
            sections.push(variant.clone());
        }
        // 6. Shared components (requirements already applied).
        sections.extend(selection.component_bodies.iter().cloned());
        // 7. Long-term memory envelopes.
        sections.extend(self.memory_sections(ctx));
        // 8. Focus.
        if let Some(focus) = focus_section(ctx) {
            sections.push(focus);
        }
        // 9. User custom rules, verbatim.
        if let Some(rules) = &ctx.user_rules
            && !rules.is_empty()
        {
            sections.push(rules.clone());
        }

        drop(state);
        let prompt = sections.join(SEPARATOR);
        apply_token_budget(prompt, ctx.max_token_budget)
    }

    /// Memoized variant + component selection.
    fn select_components(&self, ctx: &PromptContext, intent: &str) -> Selection {
        let key = format!(
            "{}|{}|{}|{}",
            ctx.channel.as_deref().unwrap_or(""),
            ctx.model,
            intent,
            ctx.registered_tools.join(",")
        );
        {
            let cache = self.selection.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(hit) = cache.get(&key) {
                return hit.clone();
            }
        }

        let state = self.state.read().unwrap_or_else(|e| e.into_inner());

        // Longest-substring model variant, falling back to `default`.
        let variant = state
            .variants
            .iter()
            .filter(|(stem, _)| !ctx.model.is_empty() && ctx.model.contains(stem.as_str()))
            .max_by_key(|(stem, _)| stem.len())
            .map(|(_, body)| body.clone())
            .or_else(|| state.variants.get("default").cloned());

        // Shared components intersected with channel overrides by name.
        let channel_overrides = ctx
            .channel
            .as_deref()
            .and_then(|c| state.channel_components.get(c));
        let mut chosen: Vec<&PromptComponent> = state
            .components
            .values()
            .map(|component| {
                channel_overrides
                    .and_then(|m| m.get(&component.name))
                    .unwrap_or(component)
            })
            .filter(|c| c.requires.met(&ctx.registered_tools, intent, &ctx.model))
            .collect();
        chosen.sort_by(|a, b| a.priority.cmp(&b.priority).then(a.name.cmp(&b.name)));

        let selection = Selection {
            variant,
            component_bodies: chosen.into_iter().map(|c| c.body.clone()).collect(),
        };
        drop(state);

        self.selection
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key, selection.clone());
        selection
    }

    fn memory_sections(&self, ctx: &PromptContext) -> Vec<String> {
        let mut sections = Vec::new();
        if let Some(daily) = &self.daily {
            for (date, content) in daily.recent() {
                sections.push(format!("<MEMORY[daily:{date}]>\n{content}\n</MEMORY>"));
            }
        }
        if let Some(ws) = &ctx.workspace {
            let path = ws.join(&self.sys_dirname).join(WORKSPACE_MEMORY_FILE);
            if let Ok(content) = std::fs::read_to_string(&path) {
                sections.push(format!("<MEMORY[workspace]>\n{content}\n</MEMORY>"));
            }
        }
        sections
    }
}

// ─── Layer loading ───────────────────────────────────────────────────────────

fn load_layer(root: &Path, state: &mut EngineState) {
    if !root.is_dir() {
        return;
    }
    // Soul.
    if let Ok(soul) = std::fs::read_to_string(root.join("soul.md")) {
        state.core_soul = Some(soul.trim().to_string());
    }
    // Shared components.
    load_components(&root.join("prompts"), &mut state.components);
    // Model variants.
    if let Ok(entries) = std::fs::read_dir(root.join("prompts").join("variants")) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_some_and(|e| e == "md")
                && let Some(stem) = path.file_stem().map(|s| s.to_string_lossy().into_owned())
                && let Ok(body) = std::fs::read_to_string(&path)
            {
                state.variants.insert(stem, body.trim().to_string());
            }
        }
    }
    // Channel overlays: any subdirectory with a soul.md or prompts/.
    let Ok(entries) = std::fs::read_dir(root) else {
        return;
    };
    for entry in entries.flatten() {
        let dir = entry.path();
        if !dir.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name == "prompts" || name.starts_with('.') {
            continue;
        }
        let has_soul = dir.join("soul.md").is_file();
        let has_prompts = dir.join("prompts").is_dir();
        if !has_soul && !has_prompts {
            continue;
        }
        if has_soul
            && let Ok(soul) = std::fs::read_to_string(dir.join("soul.md"))
        {
            state.channel_souls.insert(name.clone(), soul.trim().to_string());
        }
        if has_prompts {
            let bucket = state.channel_components.entry(name).or_default();
            load_components(&dir.join("prompts"), bucket);
        }
    }
}

fn load_components(dir: &Path, into: &mut HashMap<String, PromptComponent>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() || path.extension().is_none_or(|e| e != "md") {
            continue;
        }
        let Ok(content) = std::fs::read_to_string(&path) else {
            continue;
        };
        let component = parse_component(&content, &path);
        into.insert(component.name.clone(), component);
    }
}

// ─── Dynamic sections ────────────────────────────────────────────────────────

fn hostname() -> String {
    #[cfg(unix)]
    {
        if let Ok(name) = nix::unistd::gethostname() {
            return name.to_string_lossy().into_owned();
        }
    }
    std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string())
}

fn python_discovery() -> String {
    if let Ok(root) = std::env::var(PYTHON_ENV_VAR) {
        return format!("{root}/bin/python3");
    }
    match which::which("python3") {
        Ok(path) => path.display().to_string(),
        Err(_) => "not available".to_string(),
    }
}

fn runtime_block(ctx: &PromptContext) -> String {
    let home = dirs::home_dir()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "-".to_string());
    format!(
        "## Runtime Environment\n\
         - OS: {}/{}\n\
         - Host: {}\n\
         - User: {}\n\
         - Home: {home}\n\
         - Time (UTC): {}\n\
         - Channel: {}\n\
         - Model: {}\n\
         - Shell: {}\n\
         - Python: {}\n\
         - Workspace: {}",
        std::env::consts::OS,
        std::env::consts::ARCH,
        hostname(),
        std::env::var("USER").unwrap_or_else(|_| "unknown".to_string()),
        chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        ctx.channel.as_deref().unwrap_or("cli"),
        if ctx.model.is_empty() {
            "-"
        } else {
            ctx.model.as_str()
        },
        std::env::var("SHELL").unwrap_or_else(|_| "/bin/bash".to_string()),
        python_discovery(),
        ctx.workspace
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "-".to_string()),
    )
}

fn tooling_section(tools: &[String]) -> String {
    let mut out = String::from("## Tools\nYou can call the following tools:\n");
    for tool in tools {
        out.push_str(&format!("- {tool}\n"));
    }
    out.push_str(
        "\nInvoke a tool by emitting a tool call with its name and a JSON \
         argument object matching its schema. Wait for each result before \
         deciding the next step.",
    );
    out
}

fn focus_section(ctx: &PromptContext) -> Option<String> {
    if ctx.focus_files.is_empty() && ctx.focus_context.is_none() {
        return None;
    }
    let mut out = String::from("## Focus\n");
    for file in &ctx.focus_files {
        out.push_str(&format!("### {}\n", file.path));
        if let Some(snippet) = &file.snippet {
            out.push_str(snippet);
            out.push('\n');
        }
    }
    if let Some(context) = &ctx.focus_context {
        out.push_str(context);
    }
    Some(out.trim_end().to_string())
}

/// Conservative byte budget: 3 bytes per token covers CJK-heavy prompts.
fn apply_token_budget(prompt: String, budget: usize) -> String {
    if budget == 0 {
        return prompt;
    }
    let limit = budget.saturating_mul(3);
    if prompt.len() <= limit {
        return prompt;
    }
    let mut cut = limit;
    while cut > 0 && !prompt.is_char_boundary(cut) {
        cut -= 1;
    }
    log::warn!(
        "system prompt truncated from {} to {} bytes to fit the token budget",
        prompt.len(),
        cut
    );
    format!("{}\n[System prompt truncated to fit token budget]", &prompt[..cut])
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    fn engine(root: &TempDir) -> PromptEngine {
        PromptEngine::new(root.path(), ".gantry")
    }

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn minimal_assembly_shape() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "soul.md", "CORE");
        write(dir.path(), "prompts/x.md", "X");
        let engine = engine(&dir);
        engine.discover(None).unwrap();

        let prompt = engine.assemble(&PromptContext::default());
        assert!(prompt.starts_with("CORE\n\n---\n\n"));
        assert!(prompt.ends_with("\n\n---\n\nX"));
        assert!(prompt.contains("## Runtime Environment"));
        // No tools registered, so no tooling section.
        assert!(!prompt.contains("## Tools"));
        // Exactly three sections.
        assert_eq!(prompt.matches("\n\n---\n\n").count(), 2);
    }

    #[test]
    fn workspace_component_overrides_system_layer() {
        let dir = TempDir::new().unwrap();
        let ws = TempDir::new().unwrap();
        write(dir.path(), "soul.md", "CORE");
        write(dir.path(), "prompts/greet.md", "---\nname: greet\n---\nglobal greeting");
        write(
            ws.path(),
            ".gantry/prompts/greet.md",
            "---\nname: greet\n---\nworkspace greeting",
        );
        let engine = engine(&dir);
        engine.discover(Some(ws.path())).unwrap();

        let prompt = engine.assemble(&PromptContext::default());
        assert!(prompt.contains("workspace greeting"));
        assert!(!prompt.contains("global greeting"));
    }

    #[test]
    fn components_sort_by_priority() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "prompts/late.md", "---\nname: late\npriority: 90\n---\nLATE");
        write(dir.path(), "prompts/early.md", "---\nname: early\npriority: 10\n---\nEARLY");
        let engine = engine(&dir);
        engine.discover(None).unwrap();

        let prompt = engine.assemble(&PromptContext::default());
        let early = prompt.find("EARLY").unwrap();
        let late = prompt.find("LATE").unwrap();
        assert!(early < late);
    }

    #[test]
    fn requirements_gate_components() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "prompts/fin.md",
            "---\nname: fin\nrequires:\n  intent: [finance]\n  tools: [web_fetch]\n---\nFINANCE-HELP",
        );
        let engine = engine(&dir);
        engine.discover(None).unwrap();

        // Wrong intent.
        let prompt = engine.assemble(&PromptContext {
            registered_tools: vec!["web_fetch".into()],
            user_message: "hello".into(),
            ..Default::default()
        });
        assert!(!prompt.contains("FINANCE-HELP"));

        // Right intent, missing tool.
        let prompt = engine.assemble(&PromptContext {
            user_message: "看看这只股票".into(),
            ..Default::default()
        });
        assert!(!prompt.contains("FINANCE-HELP"));

        // Both satisfied.
        let prompt = engine.assemble(&PromptContext {
            registered_tools: vec!["web_fetch".into()],
            user_message: "看看这只股票".into(),
            ..Default::default()
        });
        assert!(prompt.contains("FINANCE-HELP"));
    }

    #[test]
    fn longest_variant_substring_wins() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "prompts/variants/claude.md", "CLAUDE-VARIANT");
        write(dir.path(), "prompts/variants/claude-sonnet.md", "SONNET-VARIANT");
        write(dir.path(), "prompts/variants/default.md", "DEFAULT-VARIANT");
        let engine = engine(&dir);
        engine.discover(None).unwrap();

        let prompt = engine.assemble(&PromptContext {
            model: "claude-sonnet-4".into(),
            ..Default::default()
        });
        assert!(prompt.contains("SONNET-VARIANT"));
        assert!(!prompt.contains("CLAUDE-VARIANT"));

        let prompt = engine.assemble(&PromptContext {
            model: "gpt-4o".into(),
            ..Default::default()
        });
        assert!(prompt.contains("DEFAULT-VARIANT"));
    }

    #[test]
    fn channel_soul_and_components_overlay() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "soul.md", "CORE");
        write(dir.path(), "telegram/soul.md", "TG-SOUL");
        write(
            dir.path(),
            "telegram/prompts/greet.md",
            "---\nname: greet\n---\nTG-GREET",
        );
        write(dir.path(), "prompts/greet.md", "---\nname: greet\n---\nPLAIN-GREET");
        let engine = engine(&dir);
        engine.discover(None).unwrap();

        let prompt = engine.assemble(&PromptContext {
            channel: Some("telegram".into()),
            ..Default::default()
        });
        assert!(prompt.contains("TG-SOUL"));
        assert!(prompt.contains("TG-GREET"));
        assert!(!prompt.contains("PLAIN-GREET"));

        // Without the channel, the shared component is used.
        let prompt = engine.assemble(&PromptContext::default());
        assert!(!prompt.contains("TG-SOUL"));
        assert!(prompt.contains("PLAIN-GREET"));
    }

    #[test]
    fn tooling_section_lists_tools() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        engine.discover(None).unwrap();
        let prompt = engine.assemble(&PromptContext {
            registered_tools: vec!["bash".into(), "read_file".into()],
            ..Default::default()
        });
        assert!(prompt.contains("## Tools"));
        assert!(prompt.contains("- bash"));
        assert!(prompt.contains("- read_file"));
    }

    #[test]
    fn token_budget_truncates_with_marker() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "soul.md", &"長".repeat(5000));
        let engine = engine(&dir);
        engine.discover(None).unwrap();
        let prompt = engine.assemble(&PromptContext {
            max_token_budget: 100,
            ..Default::default()
        });
        assert!(prompt.len() < 1000);
        assert!(prompt.ends_with("[System prompt truncated to fit token budget]"));
    }

    #[test]
    fn memory_envelopes_appear() {
        let dir = TempDir::new().unwrap();
        let memdir = TempDir::new().unwrap();
        let daily = Arc::new(DailyMemory::new(memdir.path()));
        daily.append("remembered thing").unwrap();

        let engine = PromptEngine::new(dir.path(), ".gantry").with_daily(daily);
        engine.discover(None).unwrap();
        let prompt = engine.assemble(&PromptContext::default());
        assert!(prompt.contains("<MEMORY[daily:"));
        assert!(prompt.contains("remembered thing"));
        assert!(prompt.contains("</MEMORY>"));
    }

    #[test]
    fn workspace_memory_file_is_enveloped() {
        let dir = TempDir::new().unwrap();
        let ws = TempDir::new().unwrap();
        write(ws.path(), ".gantry/MEMORY.md", "project facts");
        let engine = engine(&dir);
        engine.discover(Some(ws.path())).unwrap();
        let prompt = engine.assemble(&PromptContext {
            workspace: Some(ws.path().to_path_buf()),
            ..Default::default()
        });
        assert!(prompt.contains("<MEMORY[workspace]>\nproject facts\n</MEMORY>"));
    }

    #[test]
    fn focus_section_renders_files_and_context() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        engine.discover(None).unwrap();
        let prompt = engine.assemble(&PromptContext {
            focus_files: vec![FocusFile {
                path: "src/main.rs".into(),
                snippet: Some("fn main() {}".into()),
            }],
            focus_context: Some("user is editing main".into()),
            ..Default::default()
        });
        assert!(prompt.contains("## Focus"));
        assert!(prompt.contains("### src/main.rs"));
        assert!(prompt.contains("fn main() {}"));
        assert!(prompt.contains("user is editing main"));
    }

    #[test]
    fn discovery_resets_previous_state() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "prompts/a.md", "AAA");
        let engine = engine(&dir);
        engine.discover(None).unwrap();
        assert!(engine.assemble(&PromptContext::default()).contains("AAA"));

        fs::remove_file(dir.path().join("prompts/a.md")).unwrap();
        engine.discover(None).unwrap();
        assert!(!engine.assemble(&PromptContext::default()).contains("AAA"));
    }

    #[test]
    fn discovery_creates_missing_directories() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("fresh");
        let engine = PromptEngine::new(&root, ".gantry");
        engine.discover(None).unwrap();
        assert!(root.join("prompts").join("variants").is_dir());
    }
}
