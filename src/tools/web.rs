//! Web fetch tool: HTTP GET plus an inline HTML→text extractor.

use std::{sync::LazyLock, time::Duration};

use async_trait::async_trait;
use regex::Regex;
use reqwest::redirect::Policy;
use serde_json::{Value, json};
use url::Url;

use crate::error::ToolError;

use super::args::required_str;
use super::context::ExecutionContext;
use super::display;
use super::traits::{Tool, ToolKind, ToolResult};

/// Fetched text is capped at roughly this many characters.
const MAX_OUTPUT_CHARS: usize = 20_000;
/// Request timeout.
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Fetches a URL and reduces HTML responses to readable text.
pub struct WebFetchTool {
    client: reqwest::Client,
}

impl WebFetchTool {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .redirect(Policy::limited(5))
            .user_agent("gantry/0.1")
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client }
    }
}

impl Default for WebFetchTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for WebFetchTool {
    fn name(&self) -> &str {
        "web_fetch"
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Fetch
    }

    fn description(&self) -> &str {
        "Fetch a URL over HTTP(S) and return its content as text. HTML is \
         reduced to readable text; output is capped at ~20000 characters."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": { "type": "string", "description": "The http(s) URL to fetch." }
            },
            "required": ["url"]
        })
    }

    async fn execute(
        &self,
        ctx: &ExecutionContext,
        args: Value,
    ) -> Result<ToolResult, ToolError> {
        let raw_url = match required_str(&args, "url") {
            Ok(u) => u,
            Err(e) => return Ok(ToolResult::invalid_arg(e)),
        };
        let url = match Url::parse(raw_url) {
            Ok(u) if matches!(u.scheme(), "http" | "https") => u,
            Ok(u) => {
                return Ok(ToolResult::fail(format!(
                    "unsupported URL scheme '{}': only http and https are allowed",
                    u.scheme()
                )));
            }
            Err(e) => return Ok(ToolResult::fail(format!("invalid URL: {e}"))),
        };

        let cancel = ctx.cancellation();
        let response = tokio::select! {
            resp = self.client.get(url.clone()).send() => resp,
            _ = cancel.cancelled() => {
                return Ok(ToolResult::fail("fetch cancelled"));
            }
        };
        let response = match response {
            Ok(r) => r,
            Err(e) => return Ok(ToolResult::fail(format!("fetch failed: {e}"))),
        };

        let status = response.status();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let body = match response.text().await {
            Ok(b) => b,
            Err(e) => return Ok(ToolResult::fail(format!("failed to read body: {e}"))),
        };

        let text = if content_type.contains("html") || looks_like_html(&body) {
            html_to_text(&body)
        } else {
            body
        };
        let (text, truncated) = cap_chars(&text, MAX_OUTPUT_CHARS);

        let success = status.is_success();
        let header = format!("GET {url} -> {status}");
        let rendered = display::render(&header, success, &text);
        let mut result = if success {
            ToolResult::ok(text)
        } else {
            let mut r = ToolResult::fail(format!("server returned {status}"));
            r.output = text;
            r
        };
        result = result.with_display(rendered).with_metadata(json!({
            "status": status.as_u16(),
            "content_type": content_type,
            "truncated": truncated,
        }));
        Ok(result)
    }
}

fn looks_like_html(body: &str) -> bool {
    let head = body.trim_start().get(..256.min(body.trim_start().len()));
    head.map(|h| {
        let h = h.to_ascii_lowercase();
        h.starts_with("<!doctype html") || h.starts_with("<html")
    })
    .unwrap_or(false)
}

static SCRIPT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(script|style)\b.*?</(script|style)>").expect("static regex")
});
static BREAK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)</(p|div|h[1-6]|li|tr|section|article)>|<br\s*/?>").expect("static regex")
});
static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[^>]+>").expect("static regex"));

/// Strip scripts, styles, and tags; decode the common entities; collapse
/// blank runs.
pub fn html_to_text(html: &str) -> String {
    let without_blocks = SCRIPT_RE.replace_all(html, " ");
    // Block-level closers become line breaks so text keeps some shape.
    let with_breaks = BREAK_RE.replace_all(&without_blocks, "\n");
    let stripped = TAG_RE.replace_all(&with_breaks, " ");

    let decoded = stripped
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'");

    // Collapse horizontal whitespace per line and drop empty lines.
    let mut lines: Vec<String> = Vec::new();
    for line in decoded.lines() {
        let collapsed = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if !collapsed.is_empty() {
            lines.push(collapsed);
        }
    }
    lines.join("\n")
}

fn cap_chars(text: &str, max: usize) -> (String, bool) {
    if text.chars().count() <= max {
        return (text.to_string(), false);
    }
    let capped: String = text.chars().take(max).collect();
    (format!("{capped}\n... output truncated ..."), true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_to_text_strips_tags_and_scripts() {
        let html = r#"<!DOCTYPE html><html><head><style>p{color:red}</style>
            <script>alert("x")</script></head>
            <body><h1>Title</h1><p>First &amp; second</p><p>Next</p></body></html>"#;
        let text = html_to_text(html);
        assert!(text.contains("Title"));
        assert!(text.contains("First & second"));
        assert!(!text.contains("alert"));
        assert!(!text.contains("color:red"));
        assert!(!text.contains('<'));
    }

    #[test]
    fn block_closers_become_line_breaks() {
        let text = html_to_text("<p>one</p><p>two</p>");
        assert_eq!(text, "one\ntwo");
    }

    #[test]
    fn cap_chars_appends_banner() {
        let (text, truncated) = cap_chars(&"x".repeat(30_000), MAX_OUTPUT_CHARS);
        assert!(truncated);
        assert!(text.ends_with("... output truncated ..."));
    }

    #[tokio::test]
    async fn rejects_non_http_schemes() {
        let r = WebFetchTool::new()
            .execute(
                &ExecutionContext::new(),
                json!({"url": "file:///etc/passwd"}),
            )
            .await
            .unwrap();
        assert!(!r.success);
        assert!(r.error.unwrap().contains("scheme"));
    }

    #[tokio::test]
    async fn rejects_garbage_urls() {
        let r = WebFetchTool::new()
            .execute(&ExecutionContext::new(), json!({"url": "not a url"}))
            .await
            .unwrap();
        assert!(!r.success);
    }
}
