//! HTML serialisation of a display tree.
//!
//! Math is emitted as marked spans (`\(…\)` / `\[…\]` inside elements with a
//! `math` class) for a separate typesetting engine.

use crate::tree::{Block, DisplayTree, Emphasis, Inline, InlineLine, ListItem, ListMarker, MathNode};

const MATHJAX_SRC: &str = "https://cdn.jsdelivr.net/npm/mathjax@3/es5/tex-chtml.js";

impl DisplayTree {
    /// HTML fragment for the tree.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        for block in &self.blocks {
            write_block(&mut out, block);
        }
        out
    }

    /// Standalone page wrapping [`DisplayTree::to_html`], with a MathJax
    /// loader configured for the marked spans.
    pub fn to_html_document(&self, title: &str) -> String {
        format!(
            "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n\
             <script>window.MathJax = {{ tex: {{ inlineMath: [['\\\\(', '\\\\)']], displayMath: [['\\\\[', '\\\\]']] }} }};</script>\n\
             <script async src=\"{}\"></script>\n</head>\n<body>\n{}</body>\n</html>\n",
            escape(title),
            MATHJAX_SRC,
            self.to_html()
        )
    }
}

pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn write_block(out: &mut String, block: &Block) {
    match block {
        Block::Heading { level, content } => {
            out.push_str(&format!("<h{}>", level));
            write_line(out, content);
            out.push_str(&format!("</h{}>\n", level));
        }
        Block::Paragraph(lines) => {
            out.push_str("<p>");
            write_lines(out, lines);
            out.push_str("</p>\n");
        }
        Block::Quote(lines) => {
            out.push_str("<blockquote><p>");
            write_lines(out, lines);
            out.push_str("</p></blockquote>\n");
        }
        Block::List(items) => write_list(out, items),
        Block::Code { lang, lines } => {
            match lang {
                Some(lang) => out.push_str(&format!("<pre><code class=\"language-{}\">", escape(lang))),
                None => out.push_str("<pre><code>"),
            }
            out.push_str(&escape(&lines.join("\n")));
            out.push_str("</code></pre>\n");
        }
        Block::Table { header, rows } => {
            out.push_str("<table>\n<thead><tr>");
            for cell in header {
                out.push_str("<th>");
                write_line(out, cell);
                out.push_str("</th>");
            }
            out.push_str("</tr></thead>\n<tbody>\n");
            for row in rows {
                out.push_str("<tr>");
                for cell in row {
                    out.push_str("<td>");
                    write_line(out, cell);
                    out.push_str("</td>");
                }
                out.push_str("</tr>\n");
            }
            out.push_str("</tbody>\n</table>\n");
        }
        Block::Math(node) => {
            out.push_str(&format!("<div class=\"math display\">\\[{}\\]</div>\n", escape(&node.literal)));
        }
        Block::Rule => out.push_str("<hr>\n"),
    }
}

fn write_list(out: &mut String, items: &[ListItem]) {
    let mut open: Vec<&'static str> = Vec::new();
    for item in items {
        let depth = item.depth + 1;
        while open.len() > depth {
            if let Some(tag) = open.pop() {
                out.push_str(&format!("</li>\n</{}>\n", tag));
            }
        }
        if open.len() == depth {
            out.push_str("</li>\n");
        }
        while open.len() < depth {
            match item.marker {
                ListMarker::Ordered(start) if start != 1 => {
                    out.push_str(&format!("<ol start=\"{}\">\n", start));
                    open.push("ol");
                }
                ListMarker::Ordered(_) => {
                    out.push_str("<ol>\n");
                    open.push("ol");
                }
                ListMarker::Bullet => {
                    out.push_str("<ul>\n");
                    open.push("ul");
                }
            }
        }
        out.push_str("<li>");
        write_lines(out, &item.lines);
    }
    while let Some(tag) = open.pop() {
        out.push_str(&format!("</li>\n</{}>\n", tag));
    }
}

fn write_lines(out: &mut String, lines: &[InlineLine]) {
    for (i, line) in lines.iter().enumerate() {
        if i > 0 {
            out.push_str("<br>\n");
        }
        write_line(out, line);
    }
}

fn write_line(out: &mut String, line: &[Inline]) {
    for inline in line {
        match inline {
            Inline::Text { text, style } => write_text(out, text, *style),
            Inline::Code(code) => out.push_str(&format!("<code>{}</code>", escape(code))),
            Inline::Link { text, url } => {
                out.push_str(&format!("<a href=\"{}\">{}</a>", escape(url), escape(text)));
            }
            Inline::Math(node) => write_math(out, node),
        }
    }
}

fn write_text(out: &mut String, text: &str, style: Emphasis) {
    if style.strong {
        out.push_str("<strong>");
    }
    if style.italic {
        out.push_str("<em>");
    }
    out.push_str(&escape(text));
    if style.italic {
        out.push_str("</em>");
    }
    if style.strong {
        out.push_str("</strong>");
    }
}

fn write_math(out: &mut String, node: &MathNode) {
    if node.display {
        out.push_str(&format!("<span class=\"math display\">\\[{}\\]</span>", escape(&node.literal)));
    } else {
        out.push_str(&format!("<span class=\"math inline\">\\({}\\)</span>", escape(&node.literal)));
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::render;

    #[test]
    fn inline_math_is_marked_and_escaped() {
        let html = render("If $a<b$ then **done**").to_html();
        assert_eq!(html, "<p>If <span class=\"math inline\">\\(a&lt;b\\)</span> then <strong>done</strong></p>\n");
    }

    #[test]
    fn lone_display_math_is_a_div() {
        let html = render("$$x^2$$").to_html();
        assert_eq!(html, "<div class=\"math display\">\\[x^2\\]</div>\n");
    }

    #[test]
    fn nested_list_markup() {
        let html = render("1. a\n   - b\n2. c").to_html();
        assert_eq!(html, "<ol>\n<li>a<ul>\n<li>b</li>\n</ul>\n</li>\n<li>c</li>\n</ol>\n");
    }

    #[test]
    fn code_is_escaped() {
        let html = render("```html\n<b>\n```").to_html();
        assert_eq!(html, "<pre><code class=\"language-html\">&lt;b&gt;</code></pre>\n");
    }

    #[test]
    fn document_wraps_fragment() {
        let doc = render("# T").to_html_document("a & b");
        assert!(doc.starts_with("<!DOCTYPE html>"));
        assert!(doc.contains("<title>a &amp; b</title>"));
        assert!(doc.contains("<h1>T</h1>"));
    }
}
