//! Request orchestration: admission through the lifecycle, worker spawning,
//! and folding worker events back into the state.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, Sender};

use ms_base::document::extension_for;
use ms_base::lifecycle::{Admission, LifecycleError, RequestKind, Ticket};
use ms_render::NotationRenderer;
use ms_stream::StreamAccumulator;

use super::App;
use crate::llms::{self, AnalysisRequest, GeneratedImage, HandwritingRequest, LlmError, StreamEvent};

const NO_SAMPLE: &str = "Please provide a handwriting sample image first (--sample).";

fn timestamp() -> String {
    chrono::Local::now().format("%Y%m%d-%H%M%S%3f").to_string()
}

fn write_file(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, bytes)
}

impl App {
    /// Start (or re-run) the analysis. A run already in flight makes this a no-op.
    pub fn start_analysis(&mut self, tx: &Sender<StreamEvent>) {
        let ticket = match self.state.lifecycle.begin(RequestKind::Primary) {
            Ok(Admission::Started(ticket)) => ticket,
            Ok(Admission::AlreadyInFlight) => return,
            Err(e) => {
                self.state.set_error(e.to_string());
                return;
            }
        };

        // Fresh attempt: new accumulator, new cancel flag, nothing carried over
        self.cancel = Arc::new(AtomicBool::new(false));
        self.accumulator = Some(StreamAccumulator::new(NotationRenderer));
        self.analysis_ticket = Some(ticket);
        self.state.answer = None;
        self.state.error = None;
        self.state.notice = None;
        self.state.scroll_offset = 0;
        self.state.set_tree(Default::default());

        let request = AnalysisRequest { document: Arc::clone(&self.state.document), model: self.state.model };
        llms::start_analysis(Arc::clone(&self.client), request, ticket, tx.clone(), Arc::clone(&self.cancel));
    }

    /// Start handwriting generation for the last successful answer.
    pub fn start_handwriting(&mut self, tx: &Sender<StreamEvent>) {
        if self.state.lifecycle.is_in_flight(RequestKind::Secondary) {
            tracing::debug!("handwriting already in flight, ignoring trigger");
            return;
        }
        let Some(sample) = self.state.sample.clone() else {
            self.state.set_error(LlmError::Precondition(NO_SAMPLE.into()).to_string());
            return;
        };
        let Some(answer_text) = self.state.answer.clone() else {
            self.state.set_error(LifecycleError::PrimaryNotSucceeded.to_string());
            return;
        };

        let ticket = match self.state.lifecycle.begin(RequestKind::Secondary) {
            Ok(Admission::Started(ticket)) => ticket,
            Ok(Admission::AlreadyInFlight) => return,
            Err(e) => {
                self.state.set_error(e.to_string());
                return;
            }
        };
        self.state.error = None;
        self.state.notice = None;

        let request = HandwritingRequest { answer_text, sample };
        llms::start_handwriting(Arc::clone(&self.client), request, ticket, tx.clone());
    }

    /// Stop the analysis stream; the invocation ends as failed.
    pub fn cancel_analysis(&mut self) {
        let Some(ticket) = self.analysis_ticket else {
            return;
        };
        if !self.state.lifecycle.is_current(ticket) {
            return;
        }
        self.cancel.store(true, Ordering::Relaxed);
        self.state.lifecycle.fail(ticket);
        self.accumulator = None;
        self.state.set_error(LlmError::Cancelled.to_string());
        tracing::info!(id = ticket.id, "analysis cancelled");
    }

    /// Drain worker events. Events of superseded invocations are dropped.
    pub fn process_stream_events(&mut self, rx: &Receiver<StreamEvent>) {
        while let Ok(evt) = rx.try_recv() {
            let ticket = evt.ticket();
            if !self.state.lifecycle.is_current(ticket) {
                tracing::trace!(kind = ticket.kind.label(), id = ticket.id, "stale event dropped");
                continue;
            }
            self.state.dirty = true;
            match evt {
                StreamEvent::Chunk { bytes, .. } => self.on_chunk(ticket, &bytes),
                StreamEvent::Done { .. } => self.on_done(ticket),
                StreamEvent::Image { image, .. } => self.on_image(ticket, image),
                StreamEvent::Error { error, .. } => self.on_error(ticket, error),
            }
        }
    }

    fn on_chunk(&mut self, ticket: Ticket, bytes: &[u8]) {
        let Some(acc) = self.accumulator.as_mut() else {
            return;
        };
        let mut latest = None;
        let result = acc.consume(bytes, |tree| latest = Some(tree));
        if let Some(tree) = latest {
            self.state.set_tree(tree);
        }
        if let Err(failure) = result {
            // Stop the worker; whatever it still sends is stale
            self.cancel.store(true, Ordering::Relaxed);
            self.accumulator = None;
            self.state.lifecycle.fail(ticket);
            self.state.set_error(failure.to_string());
        }
    }

    fn on_done(&mut self, ticket: Ticket) {
        let Some(mut acc) = self.accumulator.take() else {
            return;
        };
        match acc.finish() {
            Ok(text) => {
                self.state.lifecycle.succeed(ticket);
                self.state.answer = Some(text);
                if let Some(path) = self.export_path.clone() {
                    self.export_html(Some(path));
                }
            }
            Err(failure) => {
                self.state.lifecycle.fail(ticket);
                self.state.set_error(failure.to_string());
            }
        }
    }

    fn on_image(&mut self, ticket: Ticket, image: GeneratedImage) {
        match self.save_image(&image) {
            Ok(path) => {
                self.state.lifecycle.succeed(ticket);
                tracing::info!(path = %path.display(), bytes = image.bytes.len(), "handwriting saved");
                self.state.notice = Some(format!("Handwriting saved to {}", path.display()));
                self.state.image_path = Some(path);
            }
            Err(e) => {
                self.state.lifecycle.fail(ticket);
                tracing::error!(error = %e, "could not save handwriting image");
                self.state.set_error(format!("Could not save the handwritten image: {}", e));
            }
        }
    }

    fn on_error(&mut self, ticket: Ticket, error: LlmError) {
        tracing::error!(kind = ticket.kind.label(), id = ticket.id, error = %error, "request failed");
        if ticket.kind == RequestKind::Primary {
            self.accumulator = None;
        }
        self.state.lifecycle.fail(ticket);
        self.state.set_error(error.to_string());
    }

    fn save_image(&self, image: &GeneratedImage) -> io::Result<PathBuf> {
        let name = format!("handwriting-{}.{}", timestamp(), extension_for(&image.media_type));
        let path = self.state.out_dir.join(name);
        write_file(&path, &image.bytes)?;
        Ok(path)
    }

    /// Write the current tree as a standalone HTML page.
    pub fn export_html(&mut self, path: Option<PathBuf>) {
        if self.state.tree.is_empty() {
            self.state.notice = Some("Nothing to export yet".into());
            return;
        }
        let path = path.unwrap_or_else(|| self.state.out_dir.join(format!("answer-{}.html", timestamp())));
        let html = self.state.tree.to_html_document(&self.state.document.name);
        match write_file(&path, html.as_bytes()) {
            Ok(()) => {
                tracing::info!(path = %path.display(), "answer exported");
                self.state.notice = Some(format!("Exported {}", path.display()));
            }
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "export failed");
                self.state.set_error(format!("Could not write {}: {}", path.display(), e));
            }
        }
        self.state.dirty = true;
    }
}
