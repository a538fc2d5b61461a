use crate::state::State;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    None,
    Analyze,
    GenerateHandwriting,
    CycleModel,
    ExportHtml,
    StopStreaming,
    ScrollUp(u16),
    ScrollDown(u16),
    ScrollTop,
    ScrollBottom,
}

/// Work the app has to do after the state change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionResult {
    Nothing,
    StartAnalysis,
    StartHandwriting,
    StopStream,
    Export,
}

pub fn apply_action(state: &mut State, action: Action) -> ActionResult {
    match action {
        Action::None => ActionResult::Nothing,
        Action::Analyze => ActionResult::StartAnalysis,
        Action::GenerateHandwriting => ActionResult::StartHandwriting,
        Action::ExportHtml => ActionResult::Export,
        Action::StopStreaming => ActionResult::StopStream,
        Action::CycleModel => {
            state.model = state.model.next();
            state.notice = Some(format!("Model: {} (used by the next analysis)", state.model.display_name()));
            ActionResult::Nothing
        }
        Action::ScrollUp(amount) => {
            state.scroll_offset = state.scroll_offset.saturating_sub(amount);
            ActionResult::Nothing
        }
        Action::ScrollDown(amount) => {
            state.scroll_offset = state.scroll_offset.saturating_add(amount).min(state.max_scroll);
            ActionResult::Nothing
        }
        Action::ScrollTop => {
            state.scroll_offset = 0;
            ActionResult::Nothing
        }
        Action::ScrollBottom => {
            state.scroll_offset = state.max_scroll;
            ActionResult::Nothing
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use ms_base::document::Document;
    use ms_base::models::GeminiModel;

    use super::*;
    use crate::llms::Backend;

    fn state() -> State {
        let doc = Document::from_bytes("q.png", "image/png", vec![1]).unwrap();
        State::new(doc, None, Backend::Relay, GeminiModel::default(), PathBuf::from("."))
    }

    #[test]
    fn scroll_is_clamped() {
        let mut s = state();
        s.max_scroll = 10;
        apply_action(&mut s, Action::ScrollDown(20));
        assert_eq!(s.scroll_offset, 10);
        apply_action(&mut s, Action::ScrollUp(3));
        assert_eq!(s.scroll_offset, 7);
        apply_action(&mut s, Action::ScrollUp(30));
        assert_eq!(s.scroll_offset, 0);
        apply_action(&mut s, Action::ScrollBottom);
        assert_eq!(s.scroll_offset, 10);
    }

    #[test]
    fn cycle_model_changes_next_model_only() {
        let mut s = state();
        assert_eq!(apply_action(&mut s, Action::CycleModel), ActionResult::Nothing);
        assert_eq!(s.model, GeminiModel::default().next());
        assert!(s.notice.as_deref().is_some_and(|n| n.contains(s.model.display_name())));
    }

    #[test]
    fn request_actions_are_forwarded() {
        let mut s = state();
        assert_eq!(apply_action(&mut s, Action::Analyze), ActionResult::StartAnalysis);
        assert_eq!(apply_action(&mut s, Action::GenerateHandwriting), ActionResult::StartHandwriting);
        assert_eq!(apply_action(&mut s, Action::StopStreaming), ActionResult::StopStream);
    }
}
