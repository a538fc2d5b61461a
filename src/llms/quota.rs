//! Rewrites quota exhaustion errors into actionable text.

use std::sync::LazyLock;

use regex::Regex;

const QUOTA_EXCEEDED: &str = "⚠️ Quota Exceeded: The free tier for image generation models has been exhausted. \
Image generation models have very limited quota on the free tier.\n\n\
Options:\n\
1. Wait and try again later (quota resets daily)\n\
2. Upgrade your Google AI Studio plan for higher quotas\n\
3. Check your usage at: https://ai.dev/usage?tab=rate-limit\n\n\
For more information: https://ai.google.dev/gemini-api/docs/rate-limits";

static RETRY_IN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)retry in ([\d.]+)s").expect("retry pattern is valid"));

/// Rate limit status or a `RESOURCE_EXHAUSTED` marker in the raw error.
pub fn is_quota_error(status: u16, raw: &str) -> bool {
    status == 429 || raw.contains("RESOURCE_EXHAUSTED")
}

/// Multi-line explanation, with a retry estimate when the raw error has one.
pub fn describe(raw: &str) -> String {
    let mut message = QUOTA_EXCEEDED.to_string();
    if let Some(hint) = retry_hint(raw) {
        message.push_str("\n\n");
        message.push_str(&hint);
    }
    message
}

fn retry_hint(raw: &str) -> Option<String> {
    let caps = RETRY_IN.captures(raw)?;
    let seconds: f64 = caps[1].parse().ok()?;
    let minutes = (seconds / 60.0) as u64;
    let secs = (seconds % 60.0) as u64;
    Some(format!("Please retry in approximately {}m {}s", minutes, secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_quota_errors() {
        assert!(is_quota_error(429, ""));
        assert!(is_quota_error(400, r#"{"error":{"status":"RESOURCE_EXHAUSTED"}}"#));
        assert!(!is_quota_error(500, "internal"));
    }

    #[test]
    fn retry_delay_is_humanised() {
        let text = describe("Quota exceeded. Please retry in 125.7s.");
        assert!(text.starts_with("⚠️ Quota Exceeded"));
        assert!(text.contains("\n\nOptions:\n1. Wait"));
        assert!(text.ends_with("\n\nPlease retry in approximately 2m 5s"));
    }

    #[test]
    fn retry_match_is_case_insensitive() {
        assert!(describe("RETRY IN 30s").ends_with("approximately 0m 30s"));
    }

    #[test]
    fn no_hint_without_delay() {
        assert!(describe("RESOURCE_EXHAUSTED").ends_with("gemini-api/docs/rate-limits"));
    }
}
