//! Human-oriented rendering of tool results.
//!
//! The raw `ToolResult::output` is always preserved verbatim for the model;
//! the display form is what a chat channel shows: an emoji status line, a
//! truncated command header, and a head+tail excerpt of the output.

/// Lines kept at each end of a long output.
const HEAD_LINES: usize = 5;
const TAIL_LINES: usize = 5;
/// Longest header shown before it is elided.
const MAX_HEADER_LEN: usize = 80;

/// Render the compact display form of a tool result.
pub fn render(header: &str, success: bool, output: &str) -> String {
    let status = if success { "✅" } else { "❌" };
    let header = truncate_header(header);
    let body = head_tail(output);
    if body.is_empty() {
        format!("{status} {header}")
    } else {
        format!("{status} {header}\n{body}")
    }
}

fn truncate_header(header: &str) -> String {
    let trimmed = header.trim().replace('\n', " ");
    if trimmed.chars().count() <= MAX_HEADER_LEN {
        trimmed
    } else {
        let cut: String = trimmed.chars().take(MAX_HEADER_LEN).collect();
        format!("{cut}…")
    }
}

/// First and last few lines with an omission banner in between.
pub fn head_tail(output: &str) -> String {
    let lines: Vec<&str> = output.lines().collect();
    if lines.len() <= HEAD_LINES + TAIL_LINES {
        return output.trim_end().to_string();
    }
    let omitted = lines.len() - HEAD_LINES - TAIL_LINES;
    let mut out = Vec::with_capacity(HEAD_LINES + TAIL_LINES + 1);
    out.extend_from_slice(&lines[..HEAD_LINES]);
    out.push(""); // placeholder replaced below
    out.extend_from_slice(&lines[lines.len() - TAIL_LINES..]);
    let banner = format!("... {omitted} lines omitted ...");
    let mut rendered: Vec<String> = out.iter().map(|s| s.to_string()).collect();
    rendered[HEAD_LINES] = banner;
    rendered.join("\n")
}
