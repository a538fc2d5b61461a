//! Generative Language API backend.
//!
//! Analysis uses `streamGenerateContent?alt=sse`, whose body already has the
//! `data: ` framing the stream decoder expects. Handwriting uses a plain
//! `generateContent` call on the image model.

use std::env;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use ms_base::config::PROMPTS;
use ms_base::constants::{GEMINI_API_BASE, GEMINI_KEY_VAR, HANDWRITING_MODEL};
use ms_base::lifecycle::RequestKind;
use secrecy::{ExposeSecret, SecretBox};
use serde::{Deserialize, Serialize};

use super::error::LlmError;
use super::relay::NO_IMAGE;
use super::{AnalysisRequest, GeneratedImage, HandwritingRequest, LlmClient, StreamSink, api_error, http, pump, quota};

const MISSING_KEY: &str = "API key not configured. Please add GEMINI_API_KEY to your .env file.";
const TEXT_INSTEAD_OF_IMAGE: &str =
    "Model returned text instead of image. Please try again or use a different handwriting sample.";

pub struct GeminiClient {
    api_key: Option<SecretBox<String>>,
    base: String,
}

impl GeminiClient {
    pub fn new() -> Self {
        dotenvy::dotenv().ok();
        let key = env::var(GEMINI_KEY_VAR).ok().filter(|k| !k.trim().is_empty());
        Self::with_key(key)
    }

    pub fn with_key(key: Option<String>) -> Self {
        Self { api_key: key.map(|k| SecretBox::new(Box::new(k))), base: GEMINI_API_BASE.to_string() }
    }

    fn key(&self) -> Result<&SecretBox<String>, LlmError> {
        self.api_key.as_ref().ok_or_else(|| LlmError::Auth(MISSING_KEY.into()))
    }

    fn url(&self, model: &str, method: &str) -> String {
        format!("{}/models/{}:{}", self.base, model, method)
    }
}

impl Default for GeminiClient {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: Blob,
    },
    Text {
        text: &'a str,
    },
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Blob {
    mime_type: String,
    data: String,
}

#[derive(Debug, Default, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Default, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Default, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    text: Option<String>,
    inline_data: Option<Blob>,
}

fn document_and_prompt<'a>(mime_type: &str, data: String, prompt: &'a str) -> GenerateRequest<'a> {
    GenerateRequest {
        contents: vec![Content {
            parts: vec![
                Part::Inline { inline_data: Blob { mime_type: mime_type.to_string(), data } },
                Part::Text { text: prompt },
            ],
        }],
    }
}

/// The first part decides: an inline image wins, text means the model refused.
fn first_image(response: GenerateResponse, status: u16) -> Result<GeneratedImage, LlmError> {
    let parts = response.candidates.into_iter().flat_map(|c| c.content).flat_map(|c| c.parts);
    for part in parts {
        if let Some(blob) = part.inline_data {
            let bytes = STANDARD.decode(blob.data.trim()).map_err(|e| LlmError::Parse(e.to_string()))?;
            return Ok(GeneratedImage { bytes, media_type: blob.mime_type });
        }
        if part.text.is_some() {
            return Err(LlmError::Api { status, message: TEXT_INSTEAD_OF_IMAGE.into() });
        }
    }
    Err(LlmError::Api { status, message: NO_IMAGE.into() })
}

/// Quota failures of the image model get the long explanation; anything
/// else goes through `api_error`.
fn gemini_error(kind: RequestKind, status: u16, body: &str) -> LlmError {
    if kind == RequestKind::Secondary && quota::is_quota_error(status, body) {
        tracing::warn!(status, "quota exhausted");
        return LlmError::Api { status, message: quota::describe(body) };
    }
    api_error(status, body)
}

impl LlmClient for GeminiClient {
    fn analyze(&self, request: &AnalysisRequest, sink: &StreamSink) -> Result<(), LlmError> {
        let key = self.key()?;
        let body = document_and_prompt(&request.document.media_type, request.document.base64(), &PROMPTS.analysis);
        let url = format!("{}?alt=sse", self.url(request.model.api_name(), "streamGenerateContent"));
        tracing::info!(document = %request.document.name, model = request.model.api_name(), "gemini analysis request");

        let response = http()?.post(url).header("x-goog-api-key", key.expose_secret()).json(&body).send()?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().unwrap_or_default();
            return Err(gemini_error(RequestKind::Primary, status, &text));
        }
        pump(response, sink)
    }

    fn handwriting(&self, request: &HandwritingRequest) -> Result<GeneratedImage, LlmError> {
        let key = self.key()?;
        let prompt = PROMPTS.handwriting_for(&request.answer_text);
        let body = document_and_prompt(&request.sample.media_type, request.sample.base64(), &prompt);
        tracing::info!(sample = %request.sample.name, model = HANDWRITING_MODEL, "gemini handwriting request");

        let response = http()?
            .post(self.url(HANDWRITING_MODEL, "generateContent"))
            .header("x-goog-api-key", key.expose_secret())
            .json(&body)
            .send()?;
        let status = response.status().as_u16();
        let text = response.text().map_err(|e| LlmError::StreamRead(e.to_string()))?;
        if !(200..300).contains(&status) {
            return Err(gemini_error(RequestKind::Secondary, status, &text));
        }
        let parsed: GenerateResponse = serde_json::from_str(&text).map_err(|e| LlmError::Parse(e.to_string()))?;
        first_image(parsed, status)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::AtomicBool;
    use std::sync::mpsc;

    use ms_base::document::Document;
    use ms_base::lifecycle::{RequestKind, Ticket};
    use ms_base::models::GeminiModel;

    use super::*;
    use crate::llms::StreamEvent;

    fn response(json: &str) -> GenerateResponse {
        serde_json::from_str(json).unwrap()
    }

    fn sample() -> Arc<Document> {
        Arc::new(Document::from_bytes("sample.png", "image/png", vec![1, 2, 3]).unwrap())
    }

    #[test]
    fn request_parts_are_camel_case() {
        let body = document_and_prompt("image/png", "AQID".into(), "solve");
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"contents": [{"parts": [
                {"inlineData": {"mimeType": "image/png", "data": "AQID"}},
                {"text": "solve"}
            ]}]})
        );
    }

    #[test]
    fn inline_image_is_returned() {
        let r = response(r#"{"candidates":[{"content":{"parts":[{"inlineData":{"mimeType":"image/png","data":"AQID"}}]}}]}"#);
        let image = first_image(r, 200).unwrap();
        assert_eq!(image, GeneratedImage { bytes: vec![1, 2, 3], media_type: "image/png".into() });
    }

    #[test]
    fn text_before_image_is_an_error() {
        let r = response(
            r#"{"candidates":[{"content":{"parts":[{"text":"I cannot"},{"inlineData":{"mimeType":"image/png","data":"AQID"}}]}}]}"#,
        );
        assert_eq!(first_image(r, 200).unwrap_err().to_string(), TEXT_INSTEAD_OF_IMAGE);
    }

    #[test]
    fn empty_response_has_no_image() {
        assert_eq!(first_image(response("{}"), 200).unwrap_err().to_string(), NO_IMAGE);
    }

    #[test]
    fn quota_errors_are_described() {
        let body = r#"{"error":{"code":429,"message":"Please retry in 61.2s.","status":"RESOURCE_EXHAUSTED"}}"#;
        let message = gemini_error(RequestKind::Secondary, 429, body).to_string();
        assert!(message.starts_with("⚠️ Quota Exceeded"));
        assert!(message.ends_with("approximately 1m 1s"));
    }

    #[test]
    fn analysis_quota_errors_keep_api_message() {
        let body = r#"{"error":{"code":429,"message":"Please retry in 61.2s.","status":"RESOURCE_EXHAUSTED"}}"#;
        assert_eq!(gemini_error(RequestKind::Primary, 429, body).to_string(), "Please retry in 61.2s.");
    }

    #[test]
    fn other_errors_keep_api_message() {
        let body = r#"{"error":{"code":400,"message":"API key not valid","status":"INVALID_ARGUMENT"}}"#;
        assert_eq!(gemini_error(RequestKind::Secondary, 400, body).to_string(), "API key not valid");
    }

    #[test]
    fn missing_key_fails_before_any_request() {
        let client = GeminiClient::with_key(None);
        let request = HandwritingRequest { answer_text: "x = 1".into(), sample: sample() };
        let err = client.handwriting(&request).unwrap_err();
        assert!(matches!(err, LlmError::Auth(ref m) if m == MISSING_KEY));

        let (tx, rx) = mpsc::channel();
        let sink = StreamSink::new(Ticket { kind: RequestKind::Primary, id: 1 }, tx, Arc::new(AtomicBool::new(false)));
        let analysis = AnalysisRequest { document: sample(), model: GeminiModel::default() };
        assert!(matches!(client.analyze(&analysis, &sink), Err(LlmError::Auth(_))));
        drop(sink);
        assert_eq!(rx.iter().count(), 0);
    }

    #[test]
    #[ignore = "needs GEMINI_API_KEY and network access"]
    fn live_analysis_streams_frames() {
        let client = GeminiClient::new();
        let (tx, rx) = mpsc::channel();
        let sink = StreamSink::new(Ticket { kind: RequestKind::Primary, id: 1 }, tx, Arc::new(AtomicBool::new(false)));
        let png = STANDARD
            .decode("iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mP8z8BQDwAEhQGAhKmMIQAAAABJRU5ErkJggg==")
            .unwrap();
        let document = Arc::new(Document::from_bytes("dot.png", "image/png", png).unwrap());
        client.analyze(&AnalysisRequest { document, model: GeminiModel::default() }, &sink).unwrap();
        drop(sink);
        let bytes: Vec<u8> = rx
            .into_iter()
            .flat_map(|e| match e {
                StreamEvent::Chunk { bytes, .. } => bytes,
                _ => Vec::new(),
            })
            .collect();
        assert!(String::from_utf8_lossy(&bytes).contains("data: "));
    }
}
