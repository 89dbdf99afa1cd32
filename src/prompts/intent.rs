//! Coarse intent detection over the user message.
//!
//! A keyword scan against five fixed vocabularies; the first vocabulary
//! with a hit wins, and everything else is `general`. Matching is
//! case-insensitive substring, which also covers the CJK terms.

pub const GENERAL: &str = "general";

const VOCABULARIES: &[(&str, &[&str])] = &[
    (
        "finance",
        &[
            "stock", "stocks", "ticker", "market", "invest", "portfolio", "dividend", "etf",
            "股票", "走势", "行情", "基金", "大盘", "涨", "跌", "finance", "earnings",
        ],
    ),
    (
        "coding",
        &[
            "code", "bug", "compile", "debug", "refactor", "implement", "function", "error",
            "fix", "test", "stack trace", "panic", "exception", "代码", "报错", "函数",
        ],
    ),
    (
        "research",
        &[
            "research", "investigate", "survey", "paper", "compare", "look up", "find out",
            "sources", "研究", "调研", "查一下",
        ],
    ),
    (
        "system",
        &[
            "install", "deploy", "server", "docker", "systemd", "configure", "setup", "shell",
            "permissions", "cron", "部署", "安装", "服务器",
        ],
    ),
    (
        "creative",
        &[
            "story", "poem", "creative", "draw", "lyrics", "design a", "brainstorm", "写诗",
            "故事", "文案",
        ],
    ),
];

/// Detect the intent of a user message.
pub fn detect_intent(message: &str) -> &'static str {
    let lowered = message.to_lowercase();
    for &(intent, keywords) in VOCABULARIES {
        if keywords.iter().any(|kw| lowered.contains(kw)) {
            return intent;
        }
    }
    GENERAL
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chinese_stock_query_is_finance() {
        assert_eq!(detect_intent("帮我看看 300383 今天 走势"), "finance");
    }

    #[test]
    fn compile_error_is_coding() {
        assert_eq!(detect_intent("fix the compile error"), "coding");
    }

    #[test]
    fn unmatched_is_general() {
        assert_eq!(detect_intent("random hello"), GENERAL);
    }

    #[test]
    fn first_vocabulary_wins() {
        // Contains both a finance and a coding keyword; finance is checked
        // first.
        assert_eq!(detect_intent("write code to chart this stock"), "finance");
    }

    #[test]
    fn matching_is_case_insensitive() {
        assert_eq!(detect_intent("Deploy the SERVER tonight"), "system");
    }

    #[test]
    fn creative_requests_detected() {
        assert_eq!(detect_intent("write a short poem about rain"), "creative");
    }
}
