//! Stream accumulator: decode → extract → append → render, once per delta.

use ms_base::render::Render;
use thiserror::Error;

use crate::delta::{Delta, extract};
use crate::frame::FrameDecoder;

/// Terminal outcomes of a stream other than success.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamFailure {
    /// Error reported inside the stream, message kept verbatim
    #[error("{0}")]
    Semantic(String),
    /// Stream closed without producing any answer text
    #[error("no content produced")]
    NoContent,
}

#[derive(Debug)]
pub struct StreamAccumulator<R: Render> {
    decoder: FrameDecoder,
    renderer: R,
    text: String,
    deltas: usize,
    failure: Option<StreamFailure>,
    finished: bool,
}

impl<R: Render> StreamAccumulator<R> {
    pub fn new(renderer: R) -> Self {
        Self { decoder: FrameDecoder::new(), renderer, text: String::new(), deltas: 0, failure: None, finished: false }
    }

    /// Full answer text accumulated so far.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Number of text deltas applied (empty ones included).
    pub fn delta_count(&self) -> usize {
        self.deltas
    }

    pub fn is_terminated(&self) -> bool {
        self.failure.is_some() || self.finished
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// Feed one transport chunk. Every text delta appends to the buffer and
    /// renders the whole buffer exactly once, handing the result to
    /// `publish`. Returns the number of deltas applied from this chunk.
    ///
    /// An error delta fails the stream immediately; the rest of the chunk
    /// and every later chunk are ignored.
    pub fn consume<F>(&mut self, chunk: &[u8], mut publish: F) -> Result<usize, StreamFailure>
    where
        F: FnMut(R::Tree),
    {
        if self.is_terminated() {
            tracing::debug!(bytes = chunk.len(), "chunk after stream end ignored");
            return Ok(0);
        }

        let mut applied = 0;
        for frame in self.decoder.feed(chunk) {
            match extract(&frame) {
                Some(Delta::Text(text)) => {
                    self.text.push_str(&text);
                    self.deltas += 1;
                    applied += 1;
                    publish(self.renderer.render(&self.text));
                }
                Some(Delta::Error(message)) => {
                    tracing::warn!(message = %message, "stream reported an error");
                    let failure = StreamFailure::Semantic(message);
                    self.failure = Some(failure.clone());
                    self.decoder.finish();
                    return Err(failure);
                }
                None => {}
            }
        }
        Ok(applied)
    }

    /// End of stream. Yields the full answer, or the failure that ended it.
    pub fn finish(&mut self) -> Result<String, StreamFailure> {
        if let Some(failure) = &self.failure {
            return Err(failure.clone());
        }
        self.decoder.finish();
        self.finished = true;

        if self.text.is_empty() {
            let failure = StreamFailure::NoContent;
            self.failure = Some(failure.clone());
            return Err(failure);
        }
        tracing::info!(chars = self.text.len(), deltas = self.deltas, "stream complete");
        Ok(self.text.clone())
    }
}
