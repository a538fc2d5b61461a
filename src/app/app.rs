use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::mpsc::{Receiver, Sender};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crossterm::event;
use ms_base::constants::{EVENT_POLL_MS, RENDER_THROTTLE_MS};
use ms_base::lifecycle::Ticket;
use ms_render::NotationRenderer;
use ms_stream::StreamAccumulator;
use ratatui::prelude::*;

use crate::app::actions::{Action, ActionResult, apply_action};
use crate::app::events::handle_event;
use crate::llms::{LlmClient, StreamEvent};
use crate::state::State;
use crate::ui;

/// Idle poll interval (milliseconds)
const IDLE_POLL_MS: u64 = 50;

/// Spinner frame interval (milliseconds)
const SPINNER_MS: u64 = 100;

pub(crate) fn now_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or(0)
}

pub struct App {
    pub state: State,
    pub(super) client: Arc<dyn LlmClient>,
    /// Accumulator of the analysis in flight
    pub(super) accumulator: Option<StreamAccumulator<NotationRenderer>>,
    /// Ticket of the current analysis, kept for cancellation
    pub(super) analysis_ticket: Option<Ticket>,
    /// Cancel flag handed to the current analysis worker
    pub(super) cancel: Arc<AtomicBool>,
    /// Where to write the HTML export once an analysis succeeds
    pub(super) export_path: Option<PathBuf>,
    last_render_ms: u64,
    last_spinner_ms: u64,
}

impl App {
    pub fn new(state: State, client: Arc<dyn LlmClient>, export_path: Option<PathBuf>) -> Self {
        Self {
            state,
            client,
            accumulator: None,
            analysis_ticket: None,
            cancel: Arc::new(AtomicBool::new(false)),
            export_path,
            last_render_ms: 0,
            last_spinner_ms: 0,
        }
    }

    pub fn run(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
        tx: Sender<StreamEvent>,
        rx: Receiver<StreamEvent>,
    ) -> io::Result<()> {
        // The document is analysed as soon as it is loaded
        self.start_analysis(&tx);

        loop {
            let current_ms = now_ms();

            // === INPUT FIRST ===
            if event::poll(Duration::ZERO)? {
                let evt = event::read()?;
                let Some(action) = handle_event(&evt, &self.state) else {
                    self.cancel_analysis();
                    break;
                };
                self.handle_action(action, &tx);

                // Render immediately after input
                if self.state.dirty {
                    terminal.draw(|frame| ui::render(frame, &mut self.state))?;
                    self.state.dirty = false;
                    self.last_render_ms = current_ms;
                }
            }

            // === BACKGROUND PROCESSING ===
            self.process_stream_events(&rx);
            self.update_spinner(current_ms);

            // Render if dirty and enough time has passed
            if self.state.dirty && current_ms.saturating_sub(self.last_render_ms) >= RENDER_THROTTLE_MS {
                terminal.draw(|frame| ui::render(frame, &mut self.state))?;
                self.state.dirty = false;
                self.last_render_ms = current_ms;
            }

            let poll_ms = if self.state.is_busy() || self.state.dirty { EVENT_POLL_MS } else { IDLE_POLL_MS };
            let _ = event::poll(Duration::from_millis(poll_ms))?;
        }

        Ok(())
    }

    fn handle_action(&mut self, action: Action, tx: &Sender<StreamEvent>) {
        // Any action triggers a re-render
        self.state.dirty = true;
        match apply_action(&mut self.state, action) {
            ActionResult::Nothing => {}
            ActionResult::StartAnalysis => self.start_analysis(tx),
            ActionResult::StartHandwriting => self.start_handwriting(tx),
            ActionResult::StopStream => self.cancel_analysis(),
            ActionResult::Export => self.export_html(None),
        }
    }

    fn update_spinner(&mut self, current_ms: u64) {
        if self.state.is_busy() && current_ms.saturating_sub(self.last_spinner_ms) >= SPINNER_MS {
            self.state.spinner_frame = self.state.spinner_frame.wrapping_add(1);
            self.last_spinner_ms = current_ms;
            self.state.dirty = true;
        }
    }
}
