//! Tool policy gate: allow/deny enforcement over the registry.
//!
//! The policy answers one question — may this tool run right now — from
//! three knobs: an explicit deny list, an explicit allow list, and a
//! default action (optionally specialized per [`ToolKind`]). An additional
//! ask-mode flag turns implicit allows into confirmation requests that the
//! executor surfaces upstream; the gate itself never talks to a user.
//!
//! Rules are hot-swappable behind a write lock. Every decision is appended
//! to an in-memory audit trail.

use std::{
    collections::{HashMap, HashSet},
    sync::{Mutex, RwLock},
};

use serde::{Deserialize, Serialize};

use crate::tools::ToolKind;

// ─── Decisions ───────────────────────────────────────────────────────────────

/// Default action applied when neither list names the tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PolicyAction {
    #[default]
    Allow,
    Deny,
}

/// Outcome of gating one tool call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyDecision {
    /// Run it.
    Allowed,
    /// Never run it.
    Denied,
    /// Run only after upstream confirmation (ask-mode).
    NeedsConfirmation,
}

// ─── Rules ───────────────────────────────────────────────────────────────────

/// The swappable rule set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyRules {
    /// When true, tools that are only *implicitly* allowed (by kind default
    /// or the global default action) require confirmation. Explicitly
    /// allow-listed tools still run unprompted.
    #[serde(default)]
    pub ask_mode: bool,
    /// Tools that never run. Beats everything else.
    #[serde(default)]
    pub deny: HashSet<String>,
    /// Tools that always run (unless denied).
    #[serde(default)]
    pub allow: HashSet<String>,
    /// Per-kind default overriding the global default action.
    #[serde(default)]
    pub kind_defaults: HashMap<ToolKind, PolicyAction>,
    /// Fallback when nothing above matches.
    #[serde(default)]
    pub default_action: PolicyAction,
}

impl PolicyRules {
    /// Permissive rules: everything allowed, no confirmations.
    pub fn allow_all() -> Self {
        Self::default()
    }

    pub fn with_denied(mut self, name: impl Into<String>) -> Self {
        self.deny.insert(name.into());
        self
    }

    pub fn with_allowed(mut self, name: impl Into<String>) -> Self {
        self.allow.insert(name.into());
        self
    }

    pub fn with_kind_default(mut self, kind: ToolKind, action: PolicyAction) -> Self {
        self.kind_defaults.insert(kind, action);
        self
    }

    pub fn with_ask_mode(mut self, ask: bool) -> Self {
        self.ask_mode = ask;
        self
    }

    pub fn with_default_action(mut self, action: PolicyAction) -> Self {
        self.default_action = action;
        self
    }
}

// ─── Audit trail ─────────────────────────────────────────────────────────────

/// One gating decision, recorded for the operator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyAuditEntry {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub tool_name: String,
    pub decision: String,
}

// ─── ToolPolicy ──────────────────────────────────────────────────────────────

/// Thread-safe policy gate. Share as `Arc<ToolPolicy>`.
pub struct ToolPolicy {
    rules: RwLock<PolicyRules>,
    audit: Mutex<Vec<PolicyAuditEntry>>,
}

impl ToolPolicy {
    pub fn new(rules: PolicyRules) -> Self {
        Self {
            rules: RwLock::new(rules),
            audit: Mutex::new(Vec::new()),
        }
    }

    /// Permissive policy: everything allowed.
    pub fn allow_all() -> Self {
        Self::new(PolicyRules::allow_all())
    }

    /// Replace the rule set atomically (hot swap).
    pub fn replace(&self, rules: PolicyRules) {
        *self.rules.write().unwrap_or_else(|e| e.into_inner()) = rules;
        log::info!("tool policy replaced");
    }

    /// Decide whether `name` (of `kind`) may run.
    pub fn decide(&self, name: &str, kind: ToolKind) -> PolicyDecision {
        let rules = self.rules.read().unwrap_or_else(|e| e.into_inner());
        if rules.deny.contains(name) {
            return PolicyDecision::Denied;
        }
        if rules.allow.contains(name) {
            return PolicyDecision::Allowed;
        }
        let action = rules
            .kind_defaults
            .get(&kind)
            .copied()
            .unwrap_or(rules.default_action);
        match action {
            PolicyAction::Deny => PolicyDecision::Denied,
            PolicyAction::Allow if rules.ask_mode => PolicyDecision::NeedsConfirmation,
            PolicyAction::Allow => PolicyDecision::Allowed,
        }
    }

    /// True unless the tool is denied outright. Confirmation-gated tools are
    /// still "allowed" — they appear in listings and the executor surfaces
    /// the confirmation request instead of refusing.
    pub fn is_allowed(&self, name: &str, kind: ToolKind) -> bool {
        self.decide(name, kind) != PolicyDecision::Denied
    }

    /// Record a decision in the audit trail.
    pub fn record(&self, tool_name: &str, decision: PolicyDecision) {
        let decision = match decision {
            PolicyDecision::Allowed => "allowed",
            PolicyDecision::Denied => "denied",
            PolicyDecision::NeedsConfirmation => "needs_confirmation",
        };
        self.audit
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(PolicyAuditEntry {
                timestamp: chrono::Utc::now(),
                tool_name: tool_name.to_string(),
                decision: decision.to_string(),
            });
    }

    /// Snapshot of the audit trail, oldest first.
    pub fn audit_log(&self) -> Vec<PolicyAuditEntry> {
        self.audit
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl Default for ToolPolicy {
    fn default() -> Self {
        Self::allow_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deny_list_beats_allow_list() {
        let p = ToolPolicy::new(
            PolicyRules::default()
                .with_allowed("bash")
                .with_denied("bash"),
        );
        assert_eq!(p.decide("bash", ToolKind::Execute), PolicyDecision::Denied);
        assert!(!p.is_allowed("bash", ToolKind::Execute));
    }

    #[test]
    fn default_action_deny_blocks_unlisted() {
        let p = ToolPolicy::new(
            PolicyRules::default()
                .with_default_action(PolicyAction::Deny)
                .with_allowed("read_file"),
        );
        assert_eq!(
            p.decide("read_file", ToolKind::Read),
            PolicyDecision::Allowed
        );
        assert_eq!(p.decide("bash", ToolKind::Execute), PolicyDecision::Denied);
    }

    #[test]
    fn kind_default_overrides_global_default() {
        let p = ToolPolicy::new(
            PolicyRules::default().with_kind_default(ToolKind::Execute, PolicyAction::Deny),
        );
        assert_eq!(p.decide("bash", ToolKind::Execute), PolicyDecision::Denied);
        assert_eq!(
            p.decide("read_file", ToolKind::Read),
            PolicyDecision::Allowed
        );
    }

    #[test]
    fn ask_mode_gates_implicit_allows_only() {
        let p = ToolPolicy::new(
            PolicyRules::default()
                .with_ask_mode(true)
                .with_allowed("read_file"),
        );
        assert_eq!(
            p.decide("bash", ToolKind::Execute),
            PolicyDecision::NeedsConfirmation
        );
        assert_eq!(
            p.decide("read_file", ToolKind::Read),
            PolicyDecision::Allowed
        );
        // Confirmation-gated is still "allowed" for listing purposes.
        assert!(p.is_allowed("bash", ToolKind::Execute));
    }

    #[test]
    fn hot_swap_changes_decisions() {
        let p = ToolPolicy::allow_all();
        assert!(p.is_allowed("bash", ToolKind::Execute));
        p.replace(PolicyRules::default().with_denied("bash"));
        assert!(!p.is_allowed("bash", ToolKind::Execute));
    }

    #[test]
    fn audit_records_decisions() {
        let p = ToolPolicy::allow_all();
        p.record("bash", PolicyDecision::Allowed);
        p.record("rmrf", PolicyDecision::Denied);
        let log = p.audit_log();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].tool_name, "bash");
        assert_eq!(log[1].decision, "denied");
    }
}
