//! Display tree produced by the renderer.

/// Inline emphasis flags. Nested markers combine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Emphasis {
    pub strong: bool,
    pub italic: bool,
}

impl Emphasis {
    pub const PLAIN: Emphasis = Emphasis { strong: false, italic: false };

    pub fn with_strong(self) -> Self {
        Self { strong: true, ..self }
    }

    pub fn with_italic(self) -> Self {
        Self { italic: true, ..self }
    }
}

/// A math span after restoration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MathNode {
    /// Block math (`$$…$$`, `\[…\]`) rather than inline
    pub display: bool,
    /// Content between the delimiters, byte-for-byte as received
    pub literal: String,
    /// The span including its delimiters
    pub source: String,
    /// Typeset rendition, `None` when typesetting failed
    pub typeset: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Inline {
    Text { text: String, style: Emphasis },
    Code(String),
    Link { text: String, url: String },
    Math(MathNode),
}

impl Inline {
    pub fn plain(text: impl Into<String>) -> Self {
        Inline::Text { text: text.into(), style: Emphasis::PLAIN }
    }
}

/// One display line made of inline nodes.
pub type InlineLine = Vec<Inline>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListMarker {
    Bullet,
    Ordered(u64),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListItem {
    /// Nesting depth, 0 for top level
    pub depth: usize,
    pub marker: ListMarker,
    /// First line plus any continuation lines
    pub lines: Vec<InlineLine>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Block {
    Heading { level: u8, content: InlineLine },
    Paragraph(Vec<InlineLine>),
    List(Vec<ListItem>),
    Quote(Vec<InlineLine>),
    Code { lang: Option<String>, lines: Vec<String> },
    Table { header: Vec<InlineLine>, rows: Vec<Vec<InlineLine>> },
    /// A paragraph consisting of a single display-math span
    Math(MathNode),
    Rule,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct DisplayTree {
    pub blocks: Vec<Block>,
}

impl DisplayTree {
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Every math node in document order.
    pub fn math_spans(&self) -> Vec<&MathNode> {
        let mut out = Vec::new();
        for block in &self.blocks {
            match block {
                Block::Heading { content, .. } => collect_math(content, &mut out),
                Block::Paragraph(lines) | Block::Quote(lines) => {
                    lines.iter().for_each(|l| collect_math(l, &mut out));
                }
                Block::List(items) => {
                    for item in items {
                        item.lines.iter().for_each(|l| collect_math(l, &mut out));
                    }
                }
                Block::Table { header, rows } => {
                    header.iter().for_each(|c| collect_math(c, &mut out));
                    for row in rows {
                        row.iter().for_each(|c| collect_math(c, &mut out));
                    }
                }
                Block::Math(node) => out.push(node),
                Block::Code { .. } | Block::Rule => {}
            }
        }
        out
    }
}

fn collect_math<'a>(line: &'a [Inline], out: &mut Vec<&'a MathNode>) {
    for inline in line {
        if let Inline::Math(node) = inline {
            out.push(node);
        }
    }
}
