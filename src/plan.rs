//! The session plan: a goal, ordered steps, and per-step status.
//!
//! At most one plan exists per session. It is persisted to
//! `current_plan.json` under the user root and mutated only through
//! [`PlanStore`], whose mutex serializes writers; readers get a snapshot.

use std::{
    path::PathBuf,
    sync::Mutex,
};

use serde::{Deserialize, Serialize};

use crate::error::ToolError;

// ─── Types ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    InProgress,
    Done,
    Error,
    Skipped,
}

impl StepStatus {
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "pending" => Self::Pending,
            "in_progress" => Self::InProgress,
            "done" => Self::Done,
            "error" => Self::Error,
            "skipped" => Self::Skipped,
            _ => return None,
        })
    }

    fn marker(self) -> &'static str {
        match self {
            Self::Pending => "[ ]",
            Self::InProgress => "[~]",
            Self::Done => "[x]",
            Self::Error => "[!]",
            Self::Skipped => "[-]",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanStep {
    /// 1-indexed, stable for the plan's lifetime.
    pub id: usize,
    pub title: String,
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub goal: String,
    pub steps: Vec<PlanStep>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl Plan {
    pub fn new(goal: impl Into<String>, step_titles: Vec<String>) -> Self {
        let now = chrono::Utc::now();
        Self {
            goal: goal.into(),
            steps: step_titles
                .into_iter()
                .enumerate()
                .map(|(idx, title)| PlanStep {
                    id: idx + 1,
                    title,
                    status: StepStatus::Pending,
                    notes: None,
                })
                .collect(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Percentage of steps that are done or skipped.
    pub fn progress_percent(&self) -> u32 {
        if self.steps.is_empty() {
            return 0;
        }
        let finished = self
            .steps
            .iter()
            .filter(|s| matches!(s.status, StepStatus::Done | StepStatus::Skipped))
            .count();
        (finished * 100 / self.steps.len()) as u32
    }

    /// Checklist rendering with a progress header.
    pub fn render(&self) -> String {
        let mut out = format!("Plan: {} ({}%)\n", self.goal, self.progress_percent());
        for step in &self.steps {
            out.push_str(&format!("{} {}. {}", step.status.marker(), step.id, step.title));
            if let Some(notes) = &step.notes {
                out.push_str(&format!(" — {notes}"));
            }
            out.push('\n');
        }
        out.trim_end().to_string()
    }
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// Owns the zero-or-one active plan and its on-disk copy.
pub struct PlanStore {
    path: PathBuf,
    current: Mutex<Option<Plan>>,
}

impl PlanStore {
    /// Open the store, loading a previously persisted plan if one exists.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let current = std::fs::read_to_string(&path)
            .ok()
            .and_then(|raw| serde_json::from_str(&raw).ok());
        Self {
            path,
            current: Mutex::new(current),
        }
    }

    /// Replace the active plan.
    pub fn create(&self, goal: &str, steps: Vec<String>) -> Result<Plan, ToolError> {
        let plan = Plan::new(goal, steps);
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        self.persist(&plan)?;
        *current = Some(plan.clone());
        Ok(plan)
    }

    /// Update one step's status (and optionally notes).
    pub fn update_step(
        &self,
        step_id: usize,
        status: StepStatus,
        notes: Option<String>,
    ) -> Result<Plan, ToolError> {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        let plan = current
            .as_mut()
            .ok_or_else(|| ToolError::InvalidArg("no active plan; create one first".into()))?;
        let step = plan
            .steps
            .iter_mut()
            .find(|s| s.id == step_id)
            .ok_or_else(|| ToolError::InvalidArg(format!("no step with id {step_id}")))?;
        step.status = status;
        if notes.is_some() {
            step.notes = notes;
        }
        plan.updated_at = chrono::Utc::now();
        let snapshot = plan.clone();
        self.persist(&snapshot)?;
        Ok(snapshot)
    }

    /// Snapshot of the active plan.
    pub fn current(&self) -> Option<Plan> {
        self.current
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn persist(&self, plan: &Plan) -> Result<(), ToolError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string_pretty(plan)?;
        std::fs::write(&self.path, raw)?;
        Ok(())
    }
}
