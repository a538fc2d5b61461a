//! Backend abstraction layer.
//!
//! Two backends implement [`LlmClient`]: the HTTP relay and the Generative
//! Language API. Requests run on short-lived worker threads that forward
//! ticket-tagged [`StreamEvent`]s to the UI thread.

pub mod error;
pub mod gemini;
pub mod quota;
pub mod relay;

use std::io::{ErrorKind, Read};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::time::Duration;

use ms_base::constants::{API_FAILED_FALLBACK, STREAM_READ_BUF};
use ms_base::document::Document;
use ms_base::lifecycle::Ticket;
use ms_base::models::GeminiModel;
use reqwest::blocking::Client;
use serde_json::Value;

pub use error::LlmError;

/// Where requests are sent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Backend {
    /// HTTP relay exposing `/api/analyze` and `/api/generate-handwriting`
    #[default]
    Relay,
    /// Generative Language API, keyed by `GEMINI_API_KEY`
    Gemini,
}

impl Backend {
    pub fn label(self) -> &'static str {
        match self {
            Backend::Relay => "relay",
            Backend::Gemini => "gemini",
        }
    }
}

/// Events emitted by request workers
#[derive(Debug)]
pub enum StreamEvent {
    /// Raw bytes of the analysis stream, in arrival order
    Chunk { ticket: Ticket, bytes: Vec<u8> },
    /// Analysis stream closed normally
    Done { ticket: Ticket },
    /// Handwriting image received
    Image { ticket: Ticket, image: GeneratedImage },
    /// Request failed
    Error { ticket: Ticket, error: LlmError },
}

impl StreamEvent {
    pub fn ticket(&self) -> Ticket {
        match self {
            StreamEvent::Chunk { ticket, .. }
            | StreamEvent::Done { ticket }
            | StreamEvent::Image { ticket, .. }
            | StreamEvent::Error { ticket, .. } => *ticket,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub document: Arc<Document>,
    pub model: GeminiModel,
}

#[derive(Debug, Clone)]
pub struct HandwritingRequest {
    pub answer_text: String,
    pub sample: Arc<Document>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    pub bytes: Vec<u8>,
    pub media_type: String,
}

/// Outlet for the bytes of one analysis stream.
pub struct StreamSink {
    ticket: Ticket,
    tx: Sender<StreamEvent>,
    cancel: Arc<AtomicBool>,
}

impl StreamSink {
    pub fn new(ticket: Ticket, tx: Sender<StreamEvent>, cancel: Arc<AtomicBool>) -> Self {
        Self { ticket, tx, cancel }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// Forward one chunk. A closed receiver means nobody is listening anymore.
    pub fn send_chunk(&self, bytes: Vec<u8>) -> Result<(), LlmError> {
        self.tx.send(StreamEvent::Chunk { ticket: self.ticket, bytes }).map_err(|_| LlmError::Cancelled)
    }
}

/// Trait for request backends
pub trait LlmClient: Send + Sync {
    /// Stream the analysis of a document into `sink`. Returns once the body
    /// is exhausted.
    fn analyze(&self, request: &AnalysisRequest, sink: &StreamSink) -> Result<(), LlmError>;

    /// Generate the handwritten rendition of an answer.
    fn handwriting(&self, request: &HandwritingRequest) -> Result<GeneratedImage, LlmError>;
}

/// Get the client for the given backend
pub fn get_client(backend: Backend, endpoint: &str) -> Arc<dyn LlmClient> {
    match backend {
        Backend::Relay => Arc::new(relay::RelayClient::new(endpoint)),
        Backend::Gemini => Arc::new(gemini::GeminiClient::new()),
    }
}

/// Start the analysis stream in the background
pub fn start_analysis(
    client: Arc<dyn LlmClient>,
    request: AnalysisRequest,
    ticket: Ticket,
    tx: Sender<StreamEvent>,
    cancel: Arc<AtomicBool>,
) {
    std::thread::spawn(move || {
        let sink = StreamSink::new(ticket, tx.clone(), cancel);
        let event = match client.analyze(&request, &sink) {
            Ok(()) => StreamEvent::Done { ticket },
            Err(error) => StreamEvent::Error { ticket, error },
        };
        let _ = tx.send(event);
    });
}

/// Start handwriting generation in the background
pub fn start_handwriting(client: Arc<dyn LlmClient>, request: HandwritingRequest, ticket: Ticket, tx: Sender<StreamEvent>) {
    std::thread::spawn(move || {
        let event = match client.handwriting(&request) {
            Ok(image) => StreamEvent::Image { ticket, image },
            Err(error) => StreamEvent::Error { ticket, error },
        };
        let _ = tx.send(event);
    });
}

/// Copy a response body into the sink, checking for cancellation between reads.
pub(crate) fn pump(mut body: impl Read, sink: &StreamSink) -> Result<(), LlmError> {
    let mut buf = vec![0u8; STREAM_READ_BUF];
    loop {
        if sink.is_cancelled() {
            return Err(LlmError::Cancelled);
        }
        let n = match body.read(&mut buf) {
            Ok(0) => return Ok(()),
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(LlmError::StreamRead(e.to_string())),
        };
        sink.send_chunk(buf[..n].to_vec())?;
    }
}

/// Blocking client without the default request timeout; streams may run long.
pub(crate) fn http() -> Result<Client, LlmError> {
    Ok(Client::builder().timeout(None::<Duration>).build()?)
}

/// Error for a non-2xx response, using the body's `error` field when present.
pub(crate) fn api_error(status: u16, body: &str) -> LlmError {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| match v.get("error") {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Object(o)) => o.get("message").and_then(Value::as_str).map(str::to_string),
            _ => None,
        })
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| API_FAILED_FALLBACK.to_string());
    tracing::warn!(status, message = %message, "backend returned an error status");
    LlmError::Api { status, message }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::mpsc;

    use ms_base::lifecycle::RequestKind;

    use super::*;

    fn ticket() -> Ticket {
        Ticket { kind: RequestKind::Primary, id: 1 }
    }

    #[test]
    fn api_error_uses_error_string() {
        let e = api_error(400, r#"{"error":"Invalid file type"}"#);
        assert!(matches!(e, LlmError::Api { status: 400, ref message } if message == "Invalid file type"));
    }

    #[test]
    fn api_error_uses_nested_message() {
        let e = api_error(403, r#"{"error":{"code":403,"message":"API key not valid"}}"#);
        assert_eq!(e.to_string(), "API key not valid");
    }

    #[test]
    fn api_error_falls_back() {
        assert_eq!(api_error(502, "<html>bad gateway</html>").to_string(), "API request failed");
        assert_eq!(api_error(500, r#"{"detail":"x"}"#).to_string(), "API request failed");
    }

    #[test]
    fn pump_forwards_all_bytes_in_order() {
        let (tx, rx) = mpsc::channel();
        let sink = StreamSink::new(ticket(), tx, Arc::new(AtomicBool::new(false)));
        let body: Vec<u8> = (0..20_000u32).map(|i| (i % 251) as u8).collect();

        pump(Cursor::new(body.clone()), &sink).unwrap();
        drop(sink);

        let mut received = Vec::new();
        for event in rx {
            match event {
                StreamEvent::Chunk { bytes, .. } => received.extend(bytes),
                other => panic!("unexpected event {:?}", other),
            }
        }
        assert_eq!(received, body);
    }

    #[test]
    fn pump_stops_when_cancelled() {
        let (tx, rx) = mpsc::channel();
        let sink = StreamSink::new(ticket(), tx, Arc::new(AtomicBool::new(true)));
        let result = pump(Cursor::new(b"data: {}\n".to_vec()), &sink);
        assert!(matches!(result, Err(LlmError::Cancelled)));
        drop(sink);
        assert_eq!(rx.iter().count(), 0);
    }

    #[test]
    fn event_ticket() {
        let event = StreamEvent::Done { ticket: ticket() };
        assert_eq!(event.ticket(), ticket());
    }
}
