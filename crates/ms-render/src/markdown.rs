//! Generic markup pass.
//!
//! Runs over the protected working copy, so placeholder tokens pass through
//! as ordinary text and math content is never seen here.

use crate::notation::{fence_closes, fence_open};
use crate::tree::{Block, Emphasis, Inline, InlineLine, ListItem, ListMarker};

pub fn parse(text: &str) -> Vec<Block> {
    let lines: Vec<&str> = text.lines().collect();
    let mut blocks = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];
        if line.trim().is_empty() {
            i += 1;
            continue;
        }

        if let Some((ch, len)) = fence_open(line) {
            let indent = indent_of(line);
            let lang = line.trim_start()[len..].split_whitespace().next().map(str::to_string);
            let mut body = Vec::new();
            i += 1;
            // Unterminated fence runs to the end of the text
            while i < lines.len() && !fence_closes(lines[i], ch, len) {
                body.push(strip_indent(lines[i], indent).to_string());
                i += 1;
            }
            i += 1;
            blocks.push(Block::Code { lang, lines: body });
            continue;
        }

        if let Some((level, content)) = heading(line) {
            blocks.push(Block::Heading { level, content: parse_inline(content) });
            i += 1;
            continue;
        }

        if is_rule(line) {
            blocks.push(Block::Rule);
            i += 1;
            continue;
        }

        if is_table_start(&lines, i) {
            let header: Vec<InlineLine> = split_cells(line).into_iter().map(parse_inline).collect();
            i += 2;
            let mut rows: Vec<Vec<InlineLine>> = Vec::new();
            while i < lines.len() && !lines[i].trim().is_empty() && lines[i].contains('|') {
                rows.push(split_cells(lines[i]).into_iter().map(parse_inline).collect());
                i += 1;
            }
            blocks.push(Block::Table { header, rows });
            continue;
        }

        if quote_content(line).is_some() {
            let mut quoted = Vec::new();
            while let Some(content) = lines.get(i).copied().and_then(quote_content) {
                quoted.push(parse_inline(content.trim()));
                i += 1;
            }
            blocks.push(Block::Quote(quoted));
            continue;
        }

        if list_item(line).is_some() {
            let (items, next) = parse_list(&lines, i);
            blocks.push(Block::List(items));
            i = next;
            continue;
        }

        let mut paragraph = vec![parse_inline(line.trim())];
        i += 1;
        while i < lines.len() && !lines[i].trim().is_empty() && !starts_block(&lines, i) {
            paragraph.push(parse_inline(lines[i].trim()));
            i += 1;
        }
        blocks.push(Block::Paragraph(paragraph));
    }
    blocks
}

/// Leading spaces and tabs, in bytes. Other whitespace is content, so the
/// result is always a char boundary.
fn indent_of(line: &str) -> usize {
    line.bytes().take_while(|&b| b == b' ' || b == b'\t').count()
}

fn strip_indent(line: &str, indent: usize) -> &str {
    let strip = indent.min(indent_of(line));
    &line[strip..]
}

fn starts_block(lines: &[&str], i: usize) -> bool {
    let line = lines[i];
    fence_open(line).is_some()
        || heading(line).is_some()
        || is_rule(line)
        || quote_content(line).is_some()
        || list_item(line).is_some()
        || is_table_start(lines, i)
}

/// `#` through `######` followed by a space or end of line.
fn heading(line: &str) -> Option<(u8, &str)> {
    let trimmed = line.trim_start();
    let level = trimmed.chars().take_while(|&c| c == '#').count();
    if level == 0 || level > 6 {
        return None;
    }
    let rest = &trimmed[level..];
    if !rest.is_empty() && !rest.starts_with(' ') && !rest.starts_with('\t') {
        return None;
    }
    Some((level as u8, rest.trim()))
}

/// Three or more `-`, `*` or `_`, optionally separated by spaces.
fn is_rule(line: &str) -> bool {
    let mut marks = line.chars().filter(|c| !c.is_whitespace());
    let Some(first) = marks.next() else {
        return false;
    };
    if !matches!(first, '-' | '*' | '_') {
        return false;
    }
    let mut count = 1;
    for c in marks {
        if c != first {
            return false;
        }
        count += 1;
    }
    count >= 3
}

fn quote_content(line: &str) -> Option<&str> {
    let rest = line.trim_start().strip_prefix('>')?;
    Some(rest.strip_prefix(' ').unwrap_or(rest))
}

/// `-`, `*`, `+` or `1.` / `1)` followed by a space. Returns indent, marker
/// and item content.
fn list_item(line: &str) -> Option<(usize, ListMarker, &str)> {
    let indent = indent_of(line);
    let trimmed = line.trim_start();

    let mut chars = trimmed.chars();
    if let Some(c @ ('-' | '*' | '+')) = chars.next() {
        let rest = &trimmed[c.len_utf8()..];
        return rest.strip_prefix(' ').map(|content| (indent, ListMarker::Bullet, content));
    }

    let digits = trimmed.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 || digits > 9 {
        return None;
    }
    let rest = &trimmed[digits..];
    let rest = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')'))?;
    if !rest.is_empty() && !rest.starts_with(' ') {
        return None;
    }
    let number = trimmed[..digits].parse().ok()?;
    Some((indent, ListMarker::Ordered(number), rest.trim_start()))
}

/// Consecutive list items with continuation lines. Nesting depth comes from
/// indentation relative to earlier items.
fn parse_list(lines: &[&str], start: usize) -> (Vec<ListItem>, usize) {
    let mut items: Vec<ListItem> = Vec::new();
    let mut indents: Vec<usize> = Vec::new();
    let base = indent_of(lines[start]);
    let mut i = start;

    while i < lines.len() {
        let line = lines[i];

        if !is_rule(line) {
            if let Some((indent, marker, content)) = list_item(line) {
                while indents.last().is_some_and(|&top| top > indent) {
                    indents.pop();
                }
                if indents.last() != Some(&indent) {
                    indents.push(indent);
                }
                items.push(ListItem { depth: indents.len() - 1, marker, lines: vec![parse_inline(content.trim())] });
                i += 1;
                continue;
            }
        }

        if line.trim().is_empty() {
            // A blank line continues the list only if more of it follows
            let Some(next) = (i + 1..lines.len()).find(|&j| !lines[j].trim().is_empty()) else {
                break;
            };
            let continues = (list_item(lines[next]).is_some() && !is_rule(lines[next]))
                || (indent_of(lines[next]) > base && !starts_block(lines, next));
            if !continues {
                break;
            }
            i = next;
            continue;
        }

        if starts_block(lines, i) {
            break;
        }
        match items.last_mut() {
            Some(last) => last.lines.push(parse_inline(line.trim())),
            None => break,
        }
        i += 1;
    }
    (items, i)
}

fn is_table_start(lines: &[&str], i: usize) -> bool {
    lines[i].contains('|') && lines.get(i + 1).is_some_and(|next| is_table_separator(next))
}

fn is_table_separator(line: &str) -> bool {
    if !line.contains('-') || !line.contains('|') {
        return false;
    }
    split_cells(line)
        .iter()
        .all(|cell| !cell.is_empty() && cell.contains('-') && cell.chars().all(|c| matches!(c, '-' | ':' | ' ')))
}

fn split_cells(line: &str) -> Vec<&str> {
    let trimmed = line.trim();
    let inner = trimmed.strip_prefix('|').unwrap_or(trimmed);
    let inner = inner.strip_suffix('|').unwrap_or(inner);
    inner.split('|').map(str::trim).collect()
}

// ─── Inline ─────────────────────────────────────────────────────────────

/// Parse inline markup (code, strong, emphasis, links, escapes).
pub fn parse_inline(text: &str) -> InlineLine {
    let chars: Vec<char> = text.chars().collect();
    let mut out = Vec::new();
    parse_styled(&chars, Emphasis::PLAIN, 0, &mut out);
    out
}

/// Emphasis nested deeper than this is kept as literal markers.
const MAX_EMPHASIS_DEPTH: usize = 16;

fn parse_styled(chars: &[char], style: Emphasis, depth: usize, out: &mut InlineLine) {
    let mut current = String::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\\' if chars.get(i + 1).is_some_and(|&n| is_escapable(n)) => {
                current.push(chars[i + 1]);
                i += 2;
            }
            '`' => {
                let run = run_length(chars, i, '`');
                match find_code_close(chars, i + run, run) {
                    Some(close) => {
                        flush(&mut current, style, out);
                        let code: String = chars[i + run..close].iter().collect();
                        out.push(Inline::Code(strip_code_padding(code)));
                        i = close + run;
                    }
                    None => {
                        current.extend(std::iter::repeat_n('`', run));
                        i += run;
                    }
                }
            }
            '*' | '_' if chars.get(i + 1) == Some(&c) => match find_strong_close(chars, i + 2, c) {
                Some(close) if depth < MAX_EMPHASIS_DEPTH && opens(chars, i, 2) => {
                    flush(&mut current, style, out);
                    parse_styled(&chars[i + 2..close], style.with_strong(), depth + 1, out);
                    i = close + 2;
                }
                _ => {
                    current.push(c);
                    current.push(c);
                    i += 2;
                }
            },
            '*' | '_' => match find_emphasis_close(chars, i + 1, c) {
                Some(close) if depth < MAX_EMPHASIS_DEPTH && opens(chars, i, 1) => {
                    flush(&mut current, style, out);
                    parse_styled(&chars[i + 1..close], style.with_italic(), depth + 1, out);
                    i = close + 1;
                }
                _ => {
                    current.push(c);
                    i += 1;
                }
            },
            '[' => match parse_link(chars, i) {
                Some((text, url, end)) => {
                    flush(&mut current, style, out);
                    out.push(Inline::Link { text, url });
                    i = end;
                }
                None => {
                    current.push('[');
                    i += 1;
                }
            },
            _ => {
                current.push(c);
                i += 1;
            }
        }
    }
    flush(&mut current, style, out);
}

fn flush(current: &mut String, style: Emphasis, out: &mut InlineLine) {
    if current.is_empty() {
        return;
    }
    let text = std::mem::take(current);
    if let Some(Inline::Text { text: prev, style: prev_style }) = out.last_mut() {
        if *prev_style == style {
            prev.push_str(&text);
            return;
        }
    }
    out.push(Inline::Text { text, style });
}

/// ASCII punctuation other than brackets, which stay literal so an unclosed
/// `\(` or `\[` still shows its backslash.
fn is_escapable(c: char) -> bool {
    c.is_ascii_punctuation() && !matches!(c, '(' | ')' | '[' | ']')
}

fn run_length(chars: &[char], from: usize, c: char) -> usize {
    chars[from..].iter().take_while(|&&x| x == c).count()
}

fn find_code_close(chars: &[char], from: usize, run: usize) -> Option<usize> {
    let mut j = from;
    while j < chars.len() {
        if chars[j] == '`' {
            let len = run_length(chars, j, '`');
            if len == run {
                return Some(j);
            }
            j += len;
        } else {
            j += 1;
        }
    }
    None
}

fn strip_code_padding(code: String) -> String {
    if code.len() > 2 && code.starts_with(' ') && code.ends_with(' ') && !code.trim().is_empty() {
        code[1..code.len() - 1].to_string()
    } else {
        code
    }
}

/// An opening marker of `len` chars must be followed by non-space; `_`
/// additionally may not sit inside a word.
fn opens(chars: &[char], at: usize, len: usize) -> bool {
    let followed = chars.get(at + len).is_some_and(|c| !c.is_whitespace());
    let intraword = chars[at] == '_' && at > 0 && chars[at - 1].is_alphanumeric();
    followed && !intraword
}

fn closes(chars: &[char], at: usize, len: usize) -> bool {
    let preceded = at > 0 && !chars[at - 1].is_whitespace();
    let intraword = chars[at] == '_' && chars.get(at + len).is_some_and(|c| c.is_alphanumeric());
    preceded && !intraword
}

fn find_strong_close(chars: &[char], from: usize, marker: char) -> Option<usize> {
    let mut j = from;
    while j + 1 < chars.len() {
        match chars[j] {
            '\\' => j += 2,
            c if c == marker && chars[j + 1] == marker && j > from && closes(chars, j, 2) => return Some(j),
            _ => j += 1,
        }
    }
    None
}

fn find_emphasis_close(chars: &[char], from: usize, marker: char) -> Option<usize> {
    let mut j = from;
    while j < chars.len() {
        match chars[j] {
            '\\' => j += 2,
            // A doubled marker inside emphasis belongs to nested strong text
            c if c == marker && chars.get(j + 1) == Some(&marker) => j += 2,
            c if c == marker && j > from && closes(chars, j, 1) => return Some(j),
            _ => j += 1,
        }
    }
    None
}

/// `[text](url)` starting at `open`. Returns text, url and the index after.
fn parse_link(chars: &[char], open: usize) -> Option<(String, String, usize)> {
    let close_bracket = open + 1 + chars[open + 1..].iter().position(|&c| c == ']')?;
    if chars.get(close_bracket + 1) != Some(&'(') {
        return None;
    }
    let url_start = close_bracket + 2;
    let close_paren = url_start + chars[url_start..].iter().position(|&c| c == ')')?;
    let text: String = chars[open + 1..close_bracket].iter().collect();
    let url: String = chars[url_start..close_paren].iter().collect();
    Some((text, url.trim().to_string(), close_paren + 1))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn text(s: &str) -> Inline {
        Inline::plain(s)
    }

    fn styled(s: &str, strong: bool, italic: bool) -> Inline {
        Inline::Text { text: s.into(), style: Emphasis { strong, italic } }
    }

    #[test]
    fn inline_styles() {
        assert_eq!(
            parse_inline("a **b** *c* `d` [e](f)"),
            vec![
                text("a "),
                styled("b", true, false),
                text(" "),
                styled("c", false, true),
                text(" "),
                Inline::Code("d".into()),
                text(" "),
                Inline::Link { text: "e".into(), url: "f".into() },
            ]
        );
    }

    #[test]
    fn nested_emphasis_inside_strong() {
        assert_eq!(
            parse_inline("**bold *both* bold**"),
            vec![styled("bold ", true, false), styled("both", true, true), styled(" bold", true, false)]
        );
    }

    #[test]
    fn unmatched_markers_are_literal() {
        assert_eq!(parse_inline("2 * 3 = 6"), vec![text("2 * 3 = 6")]);
        assert_eq!(parse_inline("**open"), vec![text("**open")]);
        assert_eq!(parse_inline("snake_case_name"), vec![text("snake_case_name")]);
        assert_eq!(parse_inline("[not a link"), vec![text("[not a link")]);
        assert_eq!(parse_inline("tick ` alone"), vec![text("tick ` alone")]);
    }

    #[test]
    fn escapes() {
        assert_eq!(parse_inline(r"\*not\* \$5 \\"), vec![text(r"*not* $5 \")]);
        assert_eq!(parse_inline(r"\(x"), vec![text(r"\(x")]);
    }

    #[test]
    fn code_span_padding_and_runs() {
        assert_eq!(parse_inline("`` a`b ``"), vec![Inline::Code("a`b".into())]);
        assert_eq!(parse_inline("` x `"), vec![Inline::Code("x".into())]);
    }

    #[test]
    fn headings_and_rules() {
        let blocks = parse("# Title\n\n### Sub\n---\n#nospace");
        assert_eq!(blocks[0], Block::Heading { level: 1, content: vec![text("Title")] });
        assert_eq!(blocks[1], Block::Heading { level: 3, content: vec![text("Sub")] });
        assert_eq!(blocks[2], Block::Rule);
        assert_eq!(blocks[3], Block::Paragraph(vec![vec![text("#nospace")]]));
    }

    #[test]
    fn paragraphs_keep_line_structure() {
        let blocks = parse("one\ntwo\n\nthree");
        assert_eq!(
            blocks,
            vec![Block::Paragraph(vec![vec![text("one")], vec![text("two")]]), Block::Paragraph(vec![vec![text("three")]])]
        );
    }

    #[test]
    fn nested_lists() {
        let blocks = parse("1. first\n   - inner\n     more\n2) second\n\n- after blank");
        let Block::List(items) = &blocks[0] else { panic!("expected list, got {:?}", blocks[0]) };
        assert_eq!(blocks.len(), 1);
        let summary: Vec<_> = items.iter().map(|it| (it.depth, it.marker, it.lines.len())).collect();
        assert_eq!(
            summary,
            vec![
                (0, ListMarker::Ordered(1), 1),
                (1, ListMarker::Bullet, 2),
                (0, ListMarker::Ordered(2), 1),
                (0, ListMarker::Bullet, 1),
            ]
        );
    }

    #[test]
    fn bold_line_is_not_a_list() {
        assert_eq!(parse("**Answer:** 4"), vec![Block::Paragraph(vec![vec![styled("Answer:", true, false), text(" 4")]])]);
    }

    #[test]
    fn fenced_code() {
        let blocks = parse("```rust\nlet x = 1;\n```\nafter");
        assert_eq!(blocks[0], Block::Code { lang: Some("rust".into()), lines: vec!["let x = 1;".into()] });
        assert_eq!(blocks[1], Block::Paragraph(vec![vec![text("after")]]));

        let open = parse("~~~\nstill\ncode");
        assert_eq!(open, vec![Block::Code { lang: None, lines: vec!["still".into(), "code".into()] }]);
    }

    #[test]
    fn tables() {
        let blocks = parse("| a | b |\n|---|:-:|\n| 1 | *2* |\n\ntext");
        assert_eq!(
            blocks[0],
            Block::Table {
                header: vec![vec![text("a")], vec![text("b")]],
                rows: vec![vec![vec![text("1")], vec![styled("2", false, true)]]],
            }
        );
        assert_eq!(blocks.len(), 2);
    }

    #[test]
    fn quotes() {
        assert_eq!(parse("> a\n>b\nc"), vec![
            Block::Quote(vec![vec![text("a")], vec![text("b")]]),
            Block::Paragraph(vec![vec![text("c")]]),
        ]);
    }

    #[test]
    fn unicode_whitespace_in_fence_body_is_content() {
        let blocks = parse(" ```\n\u{00A0}x = 1\n ```");
        assert_eq!(blocks, vec![Block::Code { lang: None, lines: vec!["\u{00A0}x = 1".into()] }]);

        let blocks = parse("  ```\n\u{3000}step\n   indented\n  ```");
        assert_eq!(blocks, vec![Block::Code { lang: None, lines: vec!["\u{3000}step".into(), " indented".into()] }]);
    }

    #[test]
    fn deep_emphasis_nesting_stays_bounded() {
        let n = 2_000;
        let input = format!("{}x{}", "*_".repeat(n), "_*".repeat(n));
        let line = parse_inline(&input);
        let text: String = line
            .iter()
            .map(|node| match node {
                Inline::Text { text, .. } => text.as_str(),
                _ => "",
            })
            .collect();
        assert!(text.contains('x'));
        // Markers past the cap survive as text
        assert!(text.contains("*_"));
    }
}
