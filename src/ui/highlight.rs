use std::collections::HashMap;
use std::sync::{Arc, LazyLock, Mutex};

use ratatui::style::Color;
use syntect::easy::HighlightLines;
use syntect::highlighting::{Style, ThemeSet};
use syntect::parsing::SyntaxSet;
use syntect::util::LinesWithEndings;

static SYNTAX_SET: LazyLock<SyntaxSet> = LazyLock::new(SyntaxSet::load_defaults_newlines);
static THEME_SET: LazyLock<ThemeSet> = LazyLock::new(ThemeSet::load_defaults);
pub type HighlightResult = Vec<Vec<(Color, String)>>;
static HIGHLIGHT_CACHE: LazyLock<Mutex<HashMap<(String, String), Arc<HighlightResult>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// Convert syntect color to ratatui color
fn to_ratatui_color(color: syntect::highlighting::Color) -> Color {
    Color::Rgb(color.r, color.g, color.b)
}

/// Highlight a fenced code block. `lang` is the fence info word.
/// Returns one `(color, text)` list per line.
pub fn highlight_code(lang: Option<&str>, lines: &[String]) -> Arc<HighlightResult> {
    let code = lines.join("\n");
    let cache_key = (lang.unwrap_or_default().to_string(), code);
    {
        let cache = HIGHLIGHT_CACHE.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(cached) = cache.get(&cache_key) {
            return Arc::clone(cached);
        }
    }

    let result = Arc::new(do_highlight(lang, &cache_key.1));

    {
        let mut cache = HIGHLIGHT_CACHE.lock().unwrap_or_else(|e| e.into_inner());
        // Streaming re-renders produce a new block body per delta
        if cache.len() > 50 {
            cache.clear();
        }
        cache.insert(cache_key, Arc::clone(&result));
    }

    result
}

fn do_highlight(lang: Option<&str>, code: &str) -> HighlightResult {
    let syntax = lang
        .and_then(|l| SYNTAX_SET.find_syntax_by_token(l))
        .unwrap_or_else(|| SYNTAX_SET.find_syntax_plain_text());
    let theme = &THEME_SET.themes["base16-ocean.dark"];

    let mut highlighter = HighlightLines::new(syntax, theme);
    let mut result = Vec::new();
    for line in LinesWithEndings::from(code) {
        let ranges: Vec<(Style, &str)> = highlighter.highlight_line(line, &SYNTAX_SET).unwrap_or_default();
        let spans = ranges
            .into_iter()
            .map(|(style, text)| (to_ratatui_color(style.foreground), text.trim_end_matches('\n').to_string()))
            .collect();
        result.push(spans);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_entry_per_line() {
        let lines = vec!["def f(x):".to_string(), "    return x".to_string()];
        let result = highlight_code(Some("python"), &lines);
        assert_eq!(result.len(), 2);
        let text: String = result[1].iter().map(|(_, t)| t.as_str()).collect();
        assert_eq!(text, "    return x");
    }

    #[test]
    fn unknown_language_is_plain_text() {
        let lines = vec!["$x$".to_string()];
        let result = highlight_code(Some("no-such-lang"), &lines);
        let text: String = result[0].iter().map(|(_, t)| t.as_str()).collect();
        assert_eq!(text, "$x$");
    }
}
