//! Prompt components: text files with an optional bracketed header.
//!
//! ```text
//! ---
//! name: finance-helper
//! priority: 30
//! requires:
//!   tools: [bash, web_fetch]
//!   any_tool: [send_photo]
//!   intent: [finance]
//!   model: [gpt, claude]
//! ---
//! body text ...
//! ```
//!
//! A file without a header is named after its stem, gets priority 50, and
//! has no requirements (always on).

use std::path::Path;

/// Default priority when the header omits one. Lower sorts earlier.
pub const DEFAULT_PRIORITY: i32 = 50;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Requirements {
    /// ALL of these tools must be registered.
    pub tools: Vec<String>,
    /// ANY of these tools must be registered.
    pub any_tool: Vec<String>,
    /// Detected intent must be one of these.
    pub intent: Vec<String>,
    /// Model name must contain one of these substrings.
    pub model: Vec<String>,
}

impl Requirements {
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
            && self.any_tool.is_empty()
            && self.intent.is_empty()
            && self.model.is_empty()
    }

    /// Check every requirement against the runtime context.
    pub fn met(&self, registered_tools: &[String], intent: &str, model: &str) -> bool {
        if !self.tools.iter().all(|t| registered_tools.contains(t)) {
            return false;
        }
        if !self.any_tool.is_empty()
            && !self.any_tool.iter().any(|t| registered_tools.contains(t))
        {
            return false;
        }
        if !self.intent.is_empty() && !self.intent.iter().any(|i| i == intent) {
            return false;
        }
        if !self.model.is_empty() && !self.model.iter().any(|m| model.contains(m.as_str())) {
            return false;
        }
        true
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PromptComponent {
    pub name: String,
    pub priority: i32,
    pub body: String,
    pub requires: Requirements,
}

/// Parse one component file. `path` supplies the fallback name.
pub fn parse_component(content: &str, path: &Path) -> PromptComponent {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "component".to_string());

    let Some((header, body)) = split_header(content) else {
        return PromptComponent {
            name: stem,
            priority: DEFAULT_PRIORITY,
            body: content.trim().to_string(),
            requires: Requirements::default(),
        };
    };

    let mut name = stem;
    let mut priority = DEFAULT_PRIORITY;
    let mut requires = Requirements::default();
    let mut in_requires = false;

    for line in header.lines() {
        let indented = line.starts_with(' ') || line.starts_with('\t');
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim();
        let value = value.trim();
        if indented && in_requires {
            let values = parse_list(value);
            match key {
                "tools" => requires.tools = values,
                "any_tool" => requires.any_tool = values,
                "intent" => requires.intent = values,
                "model" => requires.model = values,
                _ => {}
            }
            continue;
        }
        in_requires = false;
        match key {
            "name" if !value.is_empty() => name = value.to_string(),
            "priority" => {
                if let Ok(p) = value.parse() {
                    priority = p;
                }
            }
            "requires" => in_requires = true,
            _ => {}
        }
    }

    PromptComponent {
        name,
        priority,
        body: body.trim().to_string(),
        requires,
    }
}

/// Split a leading `---`-delimited header from the body.
fn split_header(content: &str) -> Option<(&str, &str)> {
    let rest = content.strip_prefix("---")?;
    let rest = rest.strip_prefix('\n').or_else(|| rest.strip_prefix("\r\n"))?;
    let end = rest.find("\n---")?;
    let header = &rest[..end];
    let body = &rest[end + 4..];
    let body = body.strip_prefix('\r').unwrap_or(body);
    let body = body.strip_prefix('\n').unwrap_or(body);
    Some((header, body))
}

/// `[a, b, c]` or a bare scalar.
fn parse_list(value: &str) -> Vec<String> {
    let inner = value
        .strip_prefix('[')
        .and_then(|v| v.strip_suffix(']'))
        .unwrap_or(value);
    inner
        .split(',')
        .map(|s| s.trim().trim_matches('"').trim_matches('\''))
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headerless_file_uses_stem_and_defaults() {
        let c = parse_component("just text", Path::new("prompts/helper.md"));
        assert_eq!(c.name, "helper");
        assert_eq!(c.priority, DEFAULT_PRIORITY);
        assert_eq!(c.body, "just text");
        assert!(c.requires.is_empty());
    }

    #[test]
    fn full_header_parses() {
        let raw = "---\nname: fin\npriority: 10\nrequires:\n  tools: [bash, web_fetch]\n  any_tool: [send_photo]\n  intent: [finance]\n  model: [gpt]\n---\nbody here\n";
        let c = parse_component(raw, Path::new("x.md"));
        assert_eq!(c.name, "fin");
        assert_eq!(c.priority, 10);
        assert_eq!(c.body, "body here");
        assert_eq!(c.requires.tools, vec!["bash", "web_fetch"]);
        assert_eq!(c.requires.any_tool, vec!["send_photo"]);
        assert_eq!(c.requires.intent, vec!["finance"]);
        assert_eq!(c.requires.model, vec!["gpt"]);
    }

    #[test]
    fn requirements_all_of_tools() {
        let mut r = Requirements::default();
        r.tools = vec!["a".into(), "b".into()];
        assert!(r.met(&["a".into(), "b".into(), "c".into()], "general", "m"));
        assert!(!r.met(&["a".into()], "general", "m"));
    }

    #[test]
    fn requirements_any_of_tools() {
        let mut r = Requirements::default();
        r.any_tool = vec!["x".into(), "y".into()];
        assert!(r.met(&["y".into()], "general", "m"));
        assert!(!r.met(&["z".into()], "general", "m"));
    }

    #[test]
    fn requirements_intent_and_model_substring() {
        let mut r = Requirements::default();
        r.intent = vec!["coding".into()];
        r.model = vec!["claude".into()];
        assert!(r.met(&[], "coding", "claude-sonnet-4"));
        assert!(!r.met(&[], "finance", "claude-sonnet-4"));
        assert!(!r.met(&[], "coding", "gpt-4o"));
    }

    #[test]
    fn priority_defaults_on_parse_failure() {
        let raw = "---\npriority: soon\n---\nbody";
        let c = parse_component(raw, Path::new("p.md"));
        assert_eq!(c.priority, DEFAULT_PRIORITY);
    }
}
