//! Structured long-term memory: facts with category and confidence.
//!
//! The store is persisted as a single JSON document (`memory.json` under
//! the user root). Writers serialize on an internal mutex and flush to disk
//! before releasing it; readers take a consistent snapshot.
//!
//! Deduplication: a new fact is compared against every existing fact of the
//! same category using longest-common-substring similarity; above 0.8 the
//! existing fact is updated in place (new content wins), otherwise the fact
//! is appended.

use std::{path::PathBuf, sync::Mutex};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ToolError;

/// Similarity above which two same-category facts are considered the same.
const DEDUP_THRESHOLD: f64 = 0.8;

// ─── Types ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactCategory {
    Preference,
    Knowledge,
    Context,
    Behavior,
    Goal,
}

impl FactCategory {
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "preference" => Self::Preference,
            "knowledge" => Self::Knowledge,
            "context" => Self::Context,
            "behavior" => Self::Behavior,
            "goal" => Self::Goal,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fact {
    pub id: String,
    pub content: String,
    pub category: FactCategory,
    /// 0.0–1.0.
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryDocument {
    #[serde(default)]
    pub context_summaries: Vec<String>,
    #[serde(default)]
    pub facts: Vec<Fact>,
}

/// What happened to a saved fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveDisposition {
    Appended,
    /// An existing near-duplicate was updated in place.
    Updated,
}

// ─── Store ───────────────────────────────────────────────────────────────────

pub struct MemoryStore {
    path: PathBuf,
    doc: Mutex<MemoryDocument>,
}

impl MemoryStore {
    /// Open the store, loading the persisted document if present.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let doc = std::fs::read_to_string(&path)
            .ok()
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default();
        Self {
            path,
            doc: Mutex::new(doc),
        }
    }

    /// Save a fact, deduplicating against same-category facts.
    pub fn save_fact(
        &self,
        content: &str,
        category: FactCategory,
        confidence: f64,
        source: Option<String>,
    ) -> Result<SaveDisposition, ToolError> {
        let confidence = confidence.clamp(0.0, 1.0);
        let mut doc = self.doc.lock().unwrap_or_else(|e| e.into_inner());

        let duplicate = doc
            .facts
            .iter()
            .enumerate()
            .filter(|(_, f)| f.category == category)
            .map(|(idx, f)| (idx, lcs_similarity(&f.content, content)))
            .filter(|(_, score)| *score > DEDUP_THRESHOLD)
            .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(idx, _)| idx);

        let disposition = if let Some(idx) = duplicate {
            let fact = &mut doc.facts[idx];
            fact.content = content.to_string();
            fact.confidence = confidence;
            fact.source = source;
            fact.timestamp = chrono::Utc::now();
            SaveDisposition::Updated
        } else {
            doc.facts.push(Fact {
                id: Uuid::new_v4().to_string(),
                content: content.to_string(),
                category,
                confidence,
                source,
                timestamp: chrono::Utc::now(),
            });
            SaveDisposition::Appended
        };

        self.persist(&doc)?;
        Ok(disposition)
    }

    /// Append a context summary.
    pub fn add_context_summary(&self, summary: &str) -> Result<(), ToolError> {
        let mut doc = self.doc.lock().unwrap_or_else(|e| e.into_inner());
        doc.context_summaries.push(summary.to_string());
        self.persist(&doc)
    }

    /// Consistent snapshot of the whole document.
    pub fn snapshot(&self) -> MemoryDocument {
        self.doc.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Facts in one category, newest last.
    pub fn facts_in(&self, category: FactCategory) -> Vec<Fact> {
        self.snapshot()
            .facts
            .into_iter()
            .filter(|f| f.category == category)
            .collect()
    }

    fn persist(&self, doc: &MemoryDocument) -> Result<(), ToolError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string_pretty(doc)?;
        std::fs::write(&self.path, raw)?;
        Ok(())
    }
}

// ─── Similarity ──────────────────────────────────────────────────────────────

/// Longest-common-substring similarity: `lcs_len / max(len_a, len_b)` over
/// characters. 1.0 for identical strings, 0.0 when nothing is shared.
pub fn lcs_similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    // Rolling-row DP over substring lengths.
    let mut prev = vec![0usize; b.len() + 1];
    let mut longest = 0usize;
    for &ca in &a {
        let mut row = vec![0usize; b.len() + 1];
        for (j, &cb) in b.iter().enumerate() {
            if ca == cb {
                row[j + 1] = prev[j] + 1;
                longest = longest.max(row[j + 1]);
            }
        }
        prev = row;
    }
    longest as f64 / a.len().max(b.len()) as f64
}
