use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ms_base::constants::{SCROLL_ARROW_AMOUNT, SCROLL_PAGE_AMOUNT};

use crate::app::actions::Action;
use crate::state::State;

/// Map a terminal event to an action. `None` means quit.
pub fn handle_event(event: &Event, state: &State) -> Option<Action> {
    match event {
        Event::Key(key) if key.kind != KeyEventKind::Release => handle_key(key, state),
        _ => Some(Action::None),
    }
}

fn handle_key(key: &KeyEvent, state: &State) -> Option<Action> {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return match key.code {
            KeyCode::Char('c') | KeyCode::Char('q') => None,
            _ => Some(Action::None),
        };
    }

    // Escape stops streaming
    if key.code == KeyCode::Esc && state.is_streaming() {
        return Some(Action::StopStreaming);
    }

    let action = match key.code {
        KeyCode::Char('q') => return None,
        KeyCode::Char('a') => Action::Analyze,
        KeyCode::Char('h') => Action::GenerateHandwriting,
        KeyCode::Char('m') => Action::CycleModel,
        KeyCode::Char('e') => Action::ExportHtml,
        KeyCode::Up | KeyCode::Char('k') => Action::ScrollUp(SCROLL_ARROW_AMOUNT),
        KeyCode::Down | KeyCode::Char('j') => Action::ScrollDown(SCROLL_ARROW_AMOUNT),
        KeyCode::PageUp => Action::ScrollUp(SCROLL_PAGE_AMOUNT),
        KeyCode::PageDown | KeyCode::Char(' ') => Action::ScrollDown(SCROLL_PAGE_AMOUNT),
        KeyCode::Home => Action::ScrollTop,
        KeyCode::End => Action::ScrollBottom,
        _ => Action::None,
    };
    Some(action)
}
