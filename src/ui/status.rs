use ms_base::config::theme;
use ms_base::lifecycle::{RequestKind, RequestState};
use ratatui::prelude::*;
use ratatui::widgets::{self, BorderType, Borders, Paragraph, Wrap};

use super::helpers::{rows_u16, truncate_string};
use crate::state::State;

fn request_span(state: &State, kind: RequestKind) -> Span<'static> {
    let (label, color) = match state.lifecycle.state(kind) {
        RequestState::Idle => ("idle", theme::text_muted()),
        RequestState::InFlight => ("running", theme::warning()),
        RequestState::Succeeded => ("done", theme::success()),
        RequestState::Failed => ("failed", theme::error()),
    };
    Span::styled(format!("{}: {}", kind.label(), label), Style::default().fg(color))
}

pub fn render_header(frame: &mut Frame, state: &State, area: Rect) {
    let muted = Style::default().fg(theme::text_muted());
    let sep = Span::styled("  │  ", Style::default().fg(theme::border()));
    let name_width = (area.width as usize / 3).max(12);

    let mut spans = vec![
        Span::styled(" mathscribe ", Style::default().fg(theme::bg_base()).bg(theme::accent()).bold()),
        Span::raw(" "),
        Span::styled(truncate_string(&state.document.name, name_width), Style::default().fg(theme::text()).bold()),
        sep.clone(),
        Span::styled(state.model.display_name(), Style::default().fg(theme::text_secondary())),
        Span::styled(format!(" via {}", state.backend.label()), muted),
        sep.clone(),
        request_span(state, RequestKind::Primary),
        Span::raw("  "),
        request_span(state, RequestKind::Secondary),
    ];
    if let Some(sample) = &state.sample {
        spans.push(sep);
        spans.push(Span::styled(format!("sample: {}", truncate_string(&sample.name, 24)), muted));
    }

    let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().bg(theme::bg_base()));
    frame.render_widget(paragraph, area);
}

/// Rows the error panel needs, borders included.
pub fn error_height(state: &State, max: u16) -> u16 {
    match &state.error {
        Some(error) => rows_u16(error.lines().count().max(1)).saturating_add(2).min(max),
        None => 0,
    }
}

pub fn render_error(frame: &mut Frame, state: &State, area: Rect) {
    let Some(error) = &state.error else {
        return;
    };
    let block = widgets::Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(theme::error()))
        .title(Span::styled(" Error ", Style::default().fg(theme::error()).bold()));
    // Each line of the message stays its own line
    let lines: Vec<Line> = error
        .lines()
        .map(|l| Line::from(Span::styled(l.to_string(), Style::default().fg(theme::error()))))
        .collect();
    frame.render_widget(Paragraph::new(lines).block(block).wrap(Wrap { trim: false }), area);
}

pub fn render_status_bar(frame: &mut Frame, state: &State, area: Rect) {
    let key = Style::default().fg(theme::accent()).bold();
    let hint = Style::default().fg(theme::text_muted());

    let mut spans = Vec::new();
    let mut push = |k: &'static str, label: &'static str| {
        spans.push(Span::styled(format!(" {} ", k), key));
        spans.push(Span::styled(format!("{} ", label), hint));
    };
    if state.is_streaming() {
        push("Esc", "stop");
    } else {
        push("a", "analyse");
    }
    if state.lifecycle.can_begin_secondary() && state.sample.is_some() {
        push("h", "handwriting");
    }
    push("m", "model");
    push("e", "export");
    push("↑↓", "scroll");
    push("q", "quit");

    if let Some(notice) = &state.notice {
        let used: usize = spans.iter().map(|s| s.content.chars().count()).sum();
        let room = (area.width as usize).saturating_sub(used + 3);
        spans.push(Span::styled(" │ ", Style::default().fg(theme::border())));
        spans.push(Span::styled(truncate_string(notice, room), Style::default().fg(theme::success())));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)).style(Style::default().bg(theme::bg_surface())), area);
}
