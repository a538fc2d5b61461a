pub mod answer;
mod helpers;
mod highlight;
mod status;

use ms_base::config::theme;
use ratatui::prelude::*;
use ratatui::widgets;

use crate::state::State;

/// Tallest the error panel may get
const MAX_ERROR_HEIGHT: u16 = 12;

pub fn render(frame: &mut Frame, state: &mut State) {
    let area = frame.area();

    // Fill base background
    frame.render_widget(widgets::Block::default().style(Style::default().bg(theme::bg_base())), area);

    let error_height = status::error_height(state, MAX_ERROR_HEIGHT.min(area.height / 3));
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),            // Header
            Constraint::Min(3),               // Answer
            Constraint::Length(error_height), // Error
            Constraint::Length(1),            // Status bar
        ])
        .split(area);

    status::render_header(frame, state, layout[0]);
    answer::render_answer(frame, state, layout[1]);
    if error_height > 0 {
        status::render_error(frame, state, layout[2]);
    }
    status::render_status_bar(frame, state, layout[3]);
}
