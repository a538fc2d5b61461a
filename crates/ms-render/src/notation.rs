//! Math notation scanner and placeholder protection.
//!
//! The scanner runs over the raw answer text before any markdown parsing.
//! Every recognised span is swapped for an opaque placeholder token so the
//! markdown pass can never rewrite `_`, `*` or `\` inside math, then the
//! placeholders are split back out of the finished tree.

use std::ops::Range;

pub const PLACEHOLDER_OPEN: char = '\u{E000}';
pub const PLACEHOLDER_CLOSE: char = '\u{E001}';
const PLACEHOLDER_TAG: char = 'M';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter {
    /// `$…$`
    Dollar,
    /// `$$…$$`
    DoubleDollar,
    /// `\(…\)`
    Paren,
    /// `\[…\]`
    Bracket,
}

impl Delimiter {
    pub fn open(self) -> &'static str {
        match self {
            Delimiter::Dollar => "$",
            Delimiter::DoubleDollar => "$$",
            Delimiter::Paren => "\\(",
            Delimiter::Bracket => "\\[",
        }
    }

    pub fn close(self) -> &'static str {
        match self {
            Delimiter::Dollar => "$",
            Delimiter::DoubleDollar => "$$",
            Delimiter::Paren => "\\)",
            Delimiter::Bracket => "\\]",
        }
    }

    pub fn is_display(self) -> bool {
        matches!(self, Delimiter::DoubleDollar | Delimiter::Bracket)
    }
}

/// A closed math span in the scanned text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotationSpan {
    pub delimiter: Delimiter,
    /// Byte range of the span, delimiters included
    pub range: Range<usize>,
}

impl NotationSpan {
    pub fn source<'a>(&self, text: &'a str) -> &'a str {
        &text[self.range.clone()]
    }

    /// Content between the delimiters.
    pub fn literal<'a>(&self, text: &'a str) -> &'a str {
        let start = self.range.start + self.delimiter.open().len();
        let end = self.range.end - self.delimiter.close().len();
        &text[start..end]
    }
}

/// Find every closed math span, left to right.
///
/// Openers without a closer are left in place and scanning resumes right
/// after them, so a delimiter at the tail of a growing buffer stays literal
/// until its closer arrives.
pub fn scan(text: &str) -> Vec<NotationSpan> {
    let b = text.as_bytes();
    let mut spans = Vec::new();
    let mut i = 0;

    while i < b.len() {
        if i == 0 || b[i - 1] == b'\n' {
            if let Some(end) = skip_fenced_block(text, i) {
                i = end;
                continue;
            }
        }

        match b[i] {
            b'\\' => match b.get(i + 1) {
                Some(b'(') => i = scan_bracketed(b, i, Delimiter::Paren, &mut spans),
                Some(b'[') => i = scan_bracketed(b, i, Delimiter::Bracket, &mut spans),
                // Escape: `\$`, `\\`, `\*` ... the next byte is never a delimiter
                Some(_) => i += 2,
                None => i += 1,
            },
            b'`' => i = skip_code_span(b, i),
            b'$' if b.get(i + 1) == Some(&b'$') => match find_double_close(b, i + 2) {
                Some(close) if close > i + 2 => {
                    spans.push(NotationSpan { delimiter: Delimiter::DoubleDollar, range: i..close + 2 });
                    i = close + 2;
                }
                _ => i += 2,
            },
            b'$' => match find_single_close(b, i) {
                Some(close) => {
                    spans.push(NotationSpan { delimiter: Delimiter::Dollar, range: i..close + 1 });
                    i = close + 1;
                }
                None => i += 1,
            },
            _ => i += 1,
        }
    }
    spans
}

/// A newline followed by a whitespace-only line ends inline constructs.
fn blank_line_follows(b: &[u8], newline: usize) -> bool {
    let mut k = newline + 1;
    while k < b.len() && matches!(b[k], b' ' | b'\t' | b'\r') {
        k += 1;
    }
    k < b.len() && b[k] == b'\n'
}

fn find_single_close(b: &[u8], open: usize) -> Option<usize> {
    let first = *b.get(open + 1)?;
    if first.is_ascii_whitespace() {
        return None;
    }
    let mut j = open + 1;
    while j < b.len() {
        match b[j] {
            b'\\' => j += 2,
            b'`' => return None,
            b'\n' if blank_line_follows(b, j) => return None,
            b'$' => {
                let after_space = b[j - 1].is_ascii_whitespace();
                let before_digit = b.get(j + 1).is_some_and(u8::is_ascii_digit);
                if !after_space && !before_digit {
                    return Some(j);
                }
                j += 1;
            }
            _ => j += 1,
        }
    }
    None
}

fn find_double_close(b: &[u8], from: usize) -> Option<usize> {
    let mut j = from;
    while j + 1 < b.len() {
        match b[j] {
            b'\\' => j += 2,
            b'`' => return None,
            b'\n' if blank_line_follows(b, j) => return None,
            b'$' if b[j + 1] == b'$' => return Some(j),
            _ => j += 1,
        }
    }
    None
}

/// `\(…\)` or `\[…\]` starting at `open`. Returns where scanning resumes.
fn scan_bracketed(b: &[u8], open: usize, delimiter: Delimiter, spans: &mut Vec<NotationSpan>) -> usize {
    let closer = delimiter.close().as_bytes()[1];
    let mut j = open + 2;
    while j + 1 < b.len() {
        match b[j] {
            b'\\' if b[j + 1] == closer => {
                if j == open + 2 {
                    return open + 2;
                }
                spans.push(NotationSpan { delimiter, range: open..j + 2 });
                return j + 2;
            }
            b'\\' => j += 2,
            b'\n' if blank_line_follows(b, j) => return open + 2,
            _ => j += 1,
        }
    }
    open + 2
}

/// Inline code span: a backtick run closed by a run of the same length on the
/// same line. An unmatched run is literal.
fn skip_code_span(b: &[u8], open: usize) -> usize {
    let run = backtick_run(b, open);
    let mut j = open + run;
    while j < b.len() && b[j] != b'\n' {
        if b[j] == b'`' {
            let closing = backtick_run(b, j);
            if closing == run {
                return j + closing;
            }
            j += closing;
        } else {
            j += 1;
        }
    }
    open + run
}

fn backtick_run(b: &[u8], from: usize) -> usize {
    b[from..].iter().take_while(|&&c| c == b'`').count()
}

/// If a fenced code block opens on the line starting at `line_start`, the
/// offset just past its closing fence (or the end of text when unclosed).
fn skip_fenced_block(text: &str, line_start: usize) -> Option<usize> {
    let line_end = text[line_start..].find('\n').map_or(text.len(), |p| line_start + p);
    let (ch, len) = fence_open(&text[line_start..line_end])?;

    let mut pos = line_end + 1;
    while pos < text.len() {
        let end = text[pos..].find('\n').map_or(text.len(), |p| pos + p);
        if fence_closes(&text[pos..end], ch, len) {
            return Some((end + 1).min(text.len()));
        }
        pos = end + 1;
    }
    Some(text.len())
}

/// Opening fence: three or more backticks or tildes, optionally indented.
/// Returns the fence character and run length.
pub(crate) fn fence_open(line: &str) -> Option<(char, usize)> {
    let trimmed = line.trim_start();
    let ch = trimmed.chars().next().filter(|c| *c == '`' || *c == '~')?;
    let len = trimmed.chars().take_while(|c| *c == ch).count();
    if len < 3 {
        return None;
    }
    // A backtick fence's info string may not contain backticks
    if ch == '`' && trimmed[len..].contains('`') {
        return None;
    }
    Some((ch, len))
}

pub(crate) fn fence_closes(line: &str, ch: char, len: usize) -> bool {
    let trimmed = line.trim();
    trimmed.chars().count() >= len && trimmed.chars().all(|c| c == ch)
}

// ─── Placeholders ───────────────────────────────────────────────────────

/// Working copy with every span swapped for a placeholder token.
#[derive(Debug, Clone)]
pub struct Protected {
    pub text: String,
    pub spans: Vec<NotationSpan>,
}

pub fn placeholder(index: usize) -> String {
    format!("{}{}{}{}", PLACEHOLDER_OPEN, PLACEHOLDER_TAG, index, PLACEHOLDER_CLOSE)
}

pub fn protect(text: &str) -> Protected {
    let spans = scan(text);
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for (index, span) in spans.iter().enumerate() {
        push_sanitized(&mut out, &text[last..span.range.start]);
        out.push_str(&placeholder(index));
        last = span.range.end;
    }
    push_sanitized(&mut out, &text[last..]);
    Protected { text: out, spans }
}

fn push_sanitized(out: &mut String, text: &str) {
    for c in text.chars() {
        if c == PLACEHOLDER_OPEN || c == PLACEHOLDER_CLOSE {
            out.push(char::REPLACEMENT_CHARACTER);
        } else {
            out.push(c);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    Text(&'a str),
    Span(usize),
}

/// Split text at placeholder tokens. Malformed tokens stay in the text.
pub fn split_placeholders(text: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut rest = text;
    let mut text_start = 0;
    let mut offset = 0;

    while let Some(pos) = rest.find(PLACEHOLDER_OPEN) {
        let token_start = offset + pos;
        let after_open = token_start + PLACEHOLDER_OPEN.len_utf8();
        match parse_token(&text[after_open..]) {
            Some((index, consumed)) => {
                if token_start > text_start {
                    segments.push(Segment::Text(&text[text_start..token_start]));
                }
                segments.push(Segment::Span(index));
                offset = after_open + consumed;
                text_start = offset;
            }
            None => offset = after_open,
        }
        rest = &text[offset..];
    }
    if text_start < text.len() {
        segments.push(Segment::Text(&text[text_start..]));
    }
    segments
}

/// `M<digits>` followed by the close marker. Returns the index and the bytes
/// consumed after the open marker.
fn parse_token(s: &str) -> Option<(usize, usize)> {
    let digits_and_rest = s.strip_prefix(PLACEHOLDER_TAG)?;
    let digits = digits_and_rest.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 || !digits_and_rest[digits..].starts_with(PLACEHOLDER_CLOSE) {
        return None;
    }
    let index = digits_and_rest[..digits].parse().ok()?;
    Some((index, PLACEHOLDER_TAG.len_utf8() + digits + PLACEHOLDER_CLOSE.len_utf8()))
}

/// Replace every placeholder with the source text of its span.
pub fn restore_source(text: &str, sources: &[String]) -> String {
    if !text.contains(PLACEHOLDER_OPEN) {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    for segment in split_placeholders(text) {
        match segment {
            Segment::Text(t) => out.push_str(t),
            Segment::Span(i) => match sources.get(i) {
                Some(source) => out.push_str(source),
                None => out.push_str(&placeholder(i)),
            },
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn literals(text: &str) -> Vec<&str> {
        scan(text).iter().map(|s| s.literal(text)).collect()
    }

    #[test]
    fn all_four_delimiters() {
        let text = r"a $x$ b $$y$$ c \(z\) d \[w\]";
        let spans = scan(text);
        let kinds: Vec<_> = spans.iter().map(|s| s.delimiter).collect();
        assert_eq!(
            kinds,
            vec![Delimiter::Dollar, Delimiter::DoubleDollar, Delimiter::Paren, Delimiter::Bracket]
        );
        assert_eq!(literals(text), vec!["x", "y", "z", "w"]);
        assert_eq!(spans[2].source(text), r"\(z\)");
    }

    #[test]
    fn literal_is_byte_exact() {
        let text = r"where $a_1 * b_2 \cdot \alpha_{i}$ holds";
        assert_eq!(literals(text), vec![r"a_1 * b_2 \cdot \alpha_{i}"]);
    }

    #[test]
    fn escaped_dollar_is_not_a_delimiter() {
        assert!(scan(r"costs \$5 and \$6").is_empty());
        assert_eq!(literals(r"\$ then $x$"), vec!["x"]);
    }

    #[test]
    fn currency_is_not_math() {
        assert!(scan("between $20,000 and $30,000").is_empty());
        assert!(scan("pay $ 5 now $").is_empty());
    }

    #[test]
    fn closer_must_follow_non_space() {
        assert_eq!(literals("$a $ b$"), vec!["a $ b"]);
    }

    #[test]
    fn unterminated_opener_is_skipped() {
        assert!(scan("the value $x").is_empty());
        assert_eq!(literals("the value $x^2 + 1$"), vec!["x^2 + 1"]);
        assert_eq!(literals("$$ open and $b$"), vec!["b"]);
    }

    #[test]
    fn math_does_not_cross_blank_lines() {
        assert!(scan("$a\n\nb$").is_empty());
        assert_eq!(literals("$$a\n+ b$$"), vec!["a\n+ b"]);
    }

    #[test]
    fn code_is_skipped() {
        assert!(scan("run `echo $HOME$` now").is_empty());
        assert!(scan("```sh\necho $a$\n```\n").is_empty());
        assert_eq!(literals("```\n$a$\n```\nafter $b$"), vec!["b"]);
        // Unclosed fence runs to the end
        assert!(scan("```\n$a$").is_empty());
        // Unmatched backtick is literal
        assert_eq!(literals("a ` b $c$"), vec!["c"]);
    }

    #[test]
    fn protect_replaces_spans() {
        let p = protect("a $x_1$ and $$y$$");
        assert_eq!(p.spans.len(), 2);
        assert_eq!(p.text, format!("a {} and {}", placeholder(0), placeholder(1)));
    }

    #[test]
    fn marker_chars_in_input_are_neutralised() {
        let p = protect("fake \u{E000}M0\u{E001} and $x$");
        assert_eq!(p.text, format!("fake \u{FFFD}M0\u{FFFD} and {}", placeholder(0)));
        let segments = split_placeholders(&p.text);
        assert_eq!(segments, vec![Segment::Text("fake \u{FFFD}M0\u{FFFD} and "), Segment::Span(0)]);
    }

    #[test]
    fn split_handles_adjacent_and_malformed_tokens() {
        let text = format!("{}{}x\u{E000}Mz", placeholder(3), placeholder(12));
        assert_eq!(
            split_placeholders(&text),
            vec![Segment::Span(3), Segment::Span(12), Segment::Text("x\u{E000}Mz")]
        );
    }

    #[test]
    fn restore_source_puts_delimiters_back() {
        let p = protect("see [$x$](u) now");
        let sources: Vec<String> = p.spans.iter().map(|s| s.source("see [$x$](u) now").to_string()).collect();
        assert_eq!(restore_source(&p.text, &sources), "see [$x$](u) now");
    }
}
