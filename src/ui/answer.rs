//! Answer panel: display tree to styled terminal lines.

use ms_base::config::theme;
use ms_render::{Block, DisplayTree, Emphasis, Inline, InlineLine, ListItem, ListMarker, MathNode};
use ratatui::prelude::*;
use ratatui::widgets::{self, BorderType, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState, Wrap};
use unicode_width::UnicodeWidthStr;

use super::helpers::{count_wrapped_lines, rows_u16};
use super::highlight::highlight_code;
use crate::state::State;

const SPINNER: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// Lines built for one tree version at one width.
pub struct LineCache {
    version: u64,
    width: u16,
    lines: Vec<Line<'static>>,
    height: usize,
}

pub fn render_answer(frame: &mut Frame, state: &mut State, area: Rect) {
    let streaming = state.is_streaming();
    let title = if streaming { " Answer ● " } else { " Answer " };
    let block = widgets::Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(theme::border()))
        .style(Style::default().bg(theme::bg_surface()))
        .title(Span::styled(title, Style::default().fg(theme::accent()).bold()));
    let content_area = block.inner(area);
    frame.render_widget(block, area);

    let width = content_area.width.saturating_sub(1);
    let fresh = state.line_cache.as_ref().is_some_and(|c| c.version == state.tree_version && c.width == width);
    if !fresh {
        let lines = tree_lines(&state.tree, width as usize);
        let height = lines.iter().map(|l| count_wrapped_lines(l, width as usize)).sum();
        state.line_cache = Some(LineCache { version: state.tree_version, width, lines, height });
    }
    let Some(cache) = state.line_cache.as_ref() else {
        return;
    };

    let mut text = cache.lines.clone();
    let mut content_height = cache.height;
    if text.is_empty() {
        let hint = if streaming { "  Waiting for the first words…" } else { "  No answer yet. Press a to analyse." };
        text.push(Line::from(Span::styled(hint, Style::default().fg(theme::text_muted()).italic())));
        content_height = 1;
    }
    if streaming {
        let frame_char = SPINNER[state.spinner_frame % SPINNER.len()];
        text.push(Line::from(Span::styled(format!("  {}", frame_char), Style::default().fg(theme::accent()))));
        content_height += 1;
    }

    let viewport_height = content_area.height as usize;
    let max_scroll = rows_u16(content_height.saturating_sub(viewport_height));
    state.max_scroll = max_scroll;
    state.scroll_offset = state.scroll_offset.min(max_scroll);

    let paragraph = Paragraph::new(text).wrap(Wrap { trim: false }).scroll((state.scroll_offset, 0));
    frame.render_widget(paragraph, content_area);

    if content_height > viewport_height {
        let scrollbar = Scrollbar::default()
            .orientation(ScrollbarOrientation::VerticalRight)
            .style(Style::default().fg(theme::border()))
            .thumb_style(Style::default().fg(theme::accent_dim()));
        let mut scrollbar_state = ScrollbarState::new(max_scroll as usize).position(state.scroll_offset as usize);
        frame.render_stateful_widget(scrollbar, area.inner(Margin { horizontal: 0, vertical: 1 }), &mut scrollbar_state);
    }
}

/// Terminal lines for a whole tree, blocks separated by a blank line.
pub fn tree_lines(tree: &DisplayTree, width: usize) -> Vec<Line<'static>> {
    let mut out = Vec::new();
    for (i, block) in tree.blocks.iter().enumerate() {
        if i > 0 {
            out.push(Line::default());
        }
        block_lines(block, width, &mut out);
    }
    out
}

fn text_style() -> Style {
    Style::default().fg(theme::text())
}

fn block_lines(block: &Block, width: usize, out: &mut Vec<Line<'static>>) {
    match block {
        Block::Heading { level, content } => {
            let mut style = Style::default().fg(theme::accent()).bold();
            if *level == 1 {
                style = style.underlined();
            }
            out.push(Line::from(inline_spans(content, style)));
        }
        Block::Paragraph(lines) => {
            out.extend(lines.iter().map(|l| Line::from(inline_spans(l, text_style()))));
        }
        Block::Quote(lines) => {
            let style = Style::default().fg(theme::text_secondary()).italic();
            for line in lines {
                let mut spans = vec![Span::styled("│ ", Style::default().fg(theme::border()))];
                spans.extend(inline_spans(line, style));
                out.push(Line::from(spans));
            }
        }
        Block::List(items) => out.extend(items.iter().flat_map(list_item_lines)),
        Block::Code { lang, lines } => {
            if let Some(lang) = lang {
                out.push(Line::from(Span::styled(format!("  {}", lang), Style::default().fg(theme::text_muted()))));
            }
            let highlighted = highlight_code(lang.as_deref(), lines);
            let bg = Style::default().bg(theme::bg_base());
            for spans in highlighted.iter() {
                let mut line = vec![Span::styled("  ", bg)];
                line.extend(spans.iter().map(|(color, text)| Span::styled(text.clone(), bg.fg(*color))));
                out.push(Line::from(line));
            }
        }
        Block::Table { header, rows } => table_lines(header, rows, out),
        Block::Math(node) => {
            let style = Style::default().fg(theme::math());
            for line in math_text(node).lines() {
                out.push(Line::from(vec![Span::raw("    "), Span::styled(line.to_string(), style)]));
            }
        }
        Block::Rule => {
            out.push(Line::from(Span::styled("─".repeat(width.max(1)), Style::default().fg(theme::border()))));
        }
    }
}

fn list_item_lines(item: &ListItem) -> Vec<Line<'static>> {
    let marker = match item.marker {
        ListMarker::Bullet => "• ".to_string(),
        ListMarker::Ordered(n) => format!("{}. ", n),
    };
    let indent = "  ".repeat(item.depth);
    let hanging = " ".repeat(indent.width() + marker.width());

    let mut lines = Vec::with_capacity(item.lines.len());
    for (i, line) in item.lines.iter().enumerate() {
        let prefix = if i == 0 {
            Span::styled(format!("{}{}", indent, marker), Style::default().fg(theme::accent()))
        } else {
            Span::raw(hanging.clone())
        };
        let mut spans = vec![prefix];
        spans.extend(inline_spans(line, text_style()));
        lines.push(Line::from(spans));
    }
    lines
}

fn table_lines(header: &[InlineLine], rows: &[Vec<InlineLine>], out: &mut Vec<Line<'static>>) {
    let num_cols = rows.iter().map(Vec::len).chain(std::iter::once(header.len())).max().unwrap_or(0);
    let mut col_widths = vec![0usize; num_cols];
    for row in std::iter::once(header).chain(rows.iter().map(Vec::as_slice)) {
        for (col, cell) in row.iter().enumerate() {
            col_widths[col] = col_widths[col].max(cell_width(cell));
        }
    }

    let border = Style::default().fg(theme::border());
    let header_style = Style::default().fg(theme::accent()).bold();
    let row_line = |row: &[InlineLine], style: Style| {
        let mut spans = Vec::new();
        for (col, width) in col_widths.iter().enumerate() {
            if col > 0 {
                spans.push(Span::styled(" │ ", border));
            }
            let cell = row.get(col);
            let used = cell.map(|c| cell_width(c)).unwrap_or(0);
            if let Some(cell) = cell {
                spans.extend(inline_spans(cell, style));
            }
            let padding = width.saturating_sub(used);
            if padding > 0 {
                spans.push(Span::raw(" ".repeat(padding)));
            }
        }
        Line::from(spans)
    };

    out.push(row_line(header, header_style));
    let separator: Vec<String> = col_widths.iter().map(|w| "─".repeat(*w)).collect();
    out.push(Line::from(Span::styled(separator.join("─┼─"), border)));
    for row in rows {
        out.push(row_line(row.as_slice(), text_style()));
    }
}

fn cell_width(cell: &[Inline]) -> usize {
    inline_spans(cell, Style::default()).iter().map(|s| s.content.width()).sum()
}

/// Typeset rendition, or the delimited source when typesetting failed.
fn math_text(node: &MathNode) -> String {
    node.typeset.clone().unwrap_or_else(|| node.source.clone())
}

fn emphasis_style(base: Style, emphasis: Emphasis) -> Style {
    let mut style = base;
    if emphasis.strong {
        style = style.bold();
    }
    if emphasis.italic {
        style = style.italic();
    }
    style
}

pub fn inline_spans(line: &[Inline], base: Style) -> Vec<Span<'static>> {
    line.iter()
        .map(|inline| match inline {
            Inline::Text { text, style } => Span::styled(text.clone(), emphasis_style(base, *style)),
            Inline::Code(code) => {
                Span::styled(code.clone(), Style::default().fg(theme::code()).bg(theme::bg_base()))
            }
            Inline::Link { text, .. } => Span::styled(text.clone(), Style::default().fg(theme::accent()).underlined()),
            Inline::Math(node) => {
                // Multi-row typesetting (matrices, line breaks) is flattened inline
                let text = math_text(node).lines().collect::<Vec<_>>().join("; ");
                Span::styled(text, Style::default().fg(theme::math()))
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use ms_render::render;
    use pretty_assertions::assert_eq;

    use super::*;

    fn plain(lines: &[Line]) -> Vec<String> {
        lines.iter().map(|l| l.spans.iter().map(|s| s.content.as_ref()).collect()).collect()
    }

    #[test]
    fn math_is_shown_typeset_in_math_colour() {
        let lines = tree_lines(&render("Area $x^2$ here"), 40);
        let math = lines[0].spans.iter().find(|s| s.content == "x²").unwrap();
        assert_eq!(math.style.fg, Some(theme::math()));
    }

    #[test]
    fn untypesettable_math_shows_source() {
        let lines = tree_lines(&render(r"see $\unknowncommand{y}$"), 40);
        assert_eq!(plain(&lines), vec![r"see $\unknowncommand{y}$"]);
    }

    #[test]
    fn nested_list_is_indented() {
        let lines = tree_lines(&render("1. one\n   - two\n2. three"), 40);
        assert_eq!(plain(&lines), vec!["1. one", "  • two", "2. three"]);
    }

    #[test]
    fn table_columns_are_aligned() {
        let lines = tree_lines(&render("| a | bb |\n|---|----|\n| ccc | $x$ |"), 40);
        assert_eq!(plain(&lines), vec!["a   │ bb", "────┼───", "ccc │ x "]);
    }

    #[test]
    fn blocks_are_separated_by_blank_lines() {
        let lines = tree_lines(&render("# Title\n\ntext\n\n---"), 5);
        assert_eq!(plain(&lines), vec!["Title", "", "text", "", "─────"]);
    }
}
