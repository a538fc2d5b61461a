//! Notation-safe renderer.
//!
//! `render` turns the full accumulated answer text into a [`DisplayTree`].
//! Math spans are cut out before markdown runs and spliced back afterwards,
//! so their content reaches the tree byte-for-byte. The function is pure: the
//! same text always yields the same tree, and it is safe to call on every
//! prefix of a growing answer.

pub mod html;
pub mod markdown;
pub mod notation;
pub mod tree;
pub mod typeset;

use ms_base::render::Render;

use crate::notation::{NotationSpan, Segment, placeholder, restore_source, split_placeholders};
pub use crate::tree::{Block, DisplayTree, Emphasis, Inline, InlineLine, ListItem, ListMarker, MathNode};
pub use crate::typeset::TypesetError;

pub fn render(full_text: &str) -> DisplayTree {
    let protected = notation::protect(full_text);
    let nodes: Vec<MathNode> = protected.spans.iter().map(|span| math_node(full_text, span)).collect();
    let blocks = markdown::parse(&protected.text);

    tracing::trace!(bytes = full_text.len(), spans = nodes.len(), blocks = blocks.len(), "rendered");

    let restorer = Restorer { sources: nodes.iter().map(|n| n.source.clone()).collect(), nodes };
    DisplayTree { blocks: blocks.into_iter().map(|b| restorer.block(b)).collect() }
}

/// [`Render`] implementation for the stream accumulator.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotationRenderer;

impl Render for NotationRenderer {
    type Tree = DisplayTree;

    fn render(&self, full_text: &str) -> DisplayTree {
        render(full_text)
    }
}

fn math_node(text: &str, span: &NotationSpan) -> MathNode {
    let literal = span.literal(text).to_string();
    let typeset = match typeset::typeset(&literal) {
        Ok(t) => Some(t),
        Err(e) => {
            tracing::debug!(error = %e, literal = %literal, "math left untypeset");
            None
        }
    };
    MathNode { display: span.delimiter.is_display(), literal, source: span.source(text).to_string(), typeset }
}

/// Splits placeholder tokens back out of a parsed tree.
struct Restorer {
    nodes: Vec<MathNode>,
    sources: Vec<String>,
}

impl Restorer {
    fn block(&self, block: Block) -> Block {
        match block {
            Block::Heading { level, content } => Block::Heading { level, content: self.line(content) },
            Block::Paragraph(lines) => {
                let lines = self.lines(lines);
                match lone_display_math(&lines) {
                    Some(node) => Block::Math(node),
                    None => Block::Paragraph(lines),
                }
            }
            Block::Quote(lines) => Block::Quote(self.lines(lines)),
            Block::List(items) => Block::List(
                items.into_iter().map(|item| ListItem { lines: self.lines(item.lines), ..item }).collect(),
            ),
            Block::Code { lang, lines } => {
                Block::Code { lang, lines: lines.iter().map(|l| restore_source(l, &self.sources)).collect() }
            }
            Block::Table { header, rows } => Block::Table {
                header: self.lines(header),
                rows: rows.into_iter().map(|row| self.lines(row)).collect(),
            },
            other @ (Block::Math(_) | Block::Rule) => other,
        }
    }

    fn lines(&self, lines: Vec<InlineLine>) -> Vec<InlineLine> {
        lines.into_iter().map(|l| self.line(l)).collect()
    }

    fn line(&self, line: InlineLine) -> InlineLine {
        let mut out = Vec::with_capacity(line.len());
        for inline in line {
            match inline {
                Inline::Text { text, style } => {
                    for segment in split_placeholders(&text) {
                        match segment {
                            Segment::Text(t) => out.push(Inline::Text { text: t.to_string(), style }),
                            Segment::Span(i) => match self.nodes.get(i) {
                                Some(node) => out.push(Inline::Math(node.clone())),
                                None => out.push(Inline::Text { text: placeholder(i), style }),
                            },
                        }
                    }
                }
                Inline::Code(code) => out.push(Inline::Code(restore_source(&code, &self.sources))),
                Inline::Link { text, url } => out.push(Inline::Link {
                    text: restore_source(&text, &self.sources),
                    url: restore_source(&url, &self.sources),
                }),
                math @ Inline::Math(_) => out.push(math),
            }
        }
        out
    }
}

/// A paragraph that is one display-math span and nothing else.
fn lone_display_math(lines: &[InlineLine]) -> Option<MathNode> {
    let [line] = lines else {
        return None;
    };
    let mut found = None;
    for inline in line {
        match inline {
            Inline::Math(node) if node.display && found.is_none() => found = Some(node),
            Inline::Text { text, .. } if text.trim().is_empty() => {}
            _ => return None,
        }
    }
    found.cloned()
}
