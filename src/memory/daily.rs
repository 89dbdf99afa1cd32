//! Filesystem-backed daily memory logs.
//!
//! One Markdown file per calendar day under `<user-root>/memory/`:
//!
//! ```text
//! memory/
//!   2026-08-01.md     ← today
//!   2026-07-31.md     ← yesterday
//! ```
//!
//! Each entry is one bullet with an `HH:MM` prefix. Only today's and
//! yesterday's files are loaded into the prompt, each capped at ~2 000
//! trailing characters so a chatty day cannot crowd out the rest of the
//! system prompt.

use std::{fs, path::PathBuf};

use chrono::Local;

use crate::error::ToolError;

/// Trailing characters kept per daily file when loading for the prompt.
const DAILY_TAIL_CHARS: usize = 2_000;

pub struct DailyMemory {
    dir: PathBuf,
}

impl DailyMemory {
    /// Manage daily files in `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn day_path(&self, date: &str) -> PathBuf {
        self.dir.join(format!("{date}.md"))
    }

    /// Append one bulleted entry to today's file.
    pub fn append(&self, content: &str) -> Result<(), ToolError> {
        fs::create_dir_all(&self.dir)?;
        let now = Local::now();
        let date = now.format("%Y-%m-%d").to_string();
        let time = now.format("%H:%M").to_string();
        let entry = format!("- {time} {content}\n");
        use std::io::Write as _;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.day_path(&date))?;
        file.write_all(entry.as_bytes())?;
        Ok(())
    }

    /// Read one day's log (`YYYY-MM-DD`), or `None` when absent.
    pub fn read_day(&self, date: &str) -> Option<String> {
        fs::read_to_string(self.day_path(date)).ok()
    }

    /// Today's and yesterday's logs, labelled by date, tail-capped, absent
    /// days skipped. Order: today first.
    pub fn recent(&self) -> Vec<(String, String)> {
        let today = Local::now().format("%Y-%m-%d").to_string();
        let yesterday = (Local::now() - chrono::Duration::days(1))
            .format("%Y-%m-%d")
            .to_string();
        [today, yesterday]
            .into_iter()
            .filter_map(|date| {
                self.read_day(&date)
                    .map(|content| (date, tail_chars(&content, DAILY_TAIL_CHARS)))
            })
            .collect()
    }
}

/// Keep the trailing `max` characters, starting at a line boundary when
/// the cut lands mid-line.
fn tail_chars(content: &str, max: usize) -> String {
    let count = content.chars().count();
    if count <= max {
        return content.to_string();
    }
    let tail: String = content
        .chars()
        .skip(count - max)
        .collect();
    match tail.find('\n') {
        Some(idx) if idx + 1 < tail.len() => tail[idx + 1..].to_string(),
        _ => tail,
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn append_creates_bulleted_entries() {
        let dir = TempDir::new().unwrap();
        let daily = DailyMemory::new(dir.path());
        daily.append("met with the team").unwrap();
        daily.append("shipped the fix").unwrap();

        let today = Local::now().format("%Y-%m-%d").to_string();
        let content = daily.read_day(&today).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("- "));
        assert!(lines[0].contains("met with the team"));
        // `- HH:MM ` prefix.
        assert_eq!(&lines[1][4..5], ":");
    }

    #[test]
    fn recent_returns_today_entry() {
        let dir = TempDir::new().unwrap();
        let daily = DailyMemory::new(dir.path());
        daily.append("hello").unwrap();

        let recent = daily.recent();
        assert_eq!(recent.len(), 1);
        assert!(recent[0].1.contains("hello"));
    }

    #[test]
    fn recent_includes_yesterday_when_present() {
        let dir = TempDir::new().unwrap();
        let daily = DailyMemory::new(dir.path());
        let yesterday = (Local::now() - chrono::Duration::days(1))
            .format("%Y-%m-%d")
            .to_string();
        fs::create_dir_all(dir.path()).unwrap();
        fs::write(
            dir.path().join(format!("{yesterday}.md")),
            "- 09:00 old note\n",
        )
        .unwrap();
        daily.append("new note").unwrap();

        let recent = daily.recent();
        assert_eq!(recent.len(), 2);
        assert!(recent[0].1.contains("new note"));
        assert!(recent[1].1.contains("old note"));
    }

    #[test]
    fn long_days_are_tail_capped() {
        let dir = TempDir::new().unwrap();
        let daily = DailyMemory::new(dir.path());
        for i in 0..200 {
            daily.append(&format!("entry number {i}")).unwrap();
        }
        let recent = daily.recent();
        assert!(recent[0].1.chars().count() <= DAILY_TAIL_CHARS);
        // The tail keeps the newest entries.
        assert!(recent[0].1.contains("entry number 199"));
        assert!(!recent[0].1.contains("entry number 0\n"));
    }

    #[test]
    fn tail_cut_lands_on_line_boundary() {
        let content = "abcdef\nghij\nklmn\n";
        let tail = tail_chars(content, 10);
        assert!(tail.starts_with("klmn") || tail.starts_with("ghij"));
        assert!(!tail.starts_with("cdef"));
    }
}
