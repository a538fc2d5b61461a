//! HTTP relay backend.
//!
//! The relay holds the API key and forwards to the model. Analysis answers
//! with a `data: ` framed stream, handwriting with a single JSON object.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use ms_base::constants::{RELAY_ANALYZE_PATH, RELAY_HANDWRITING_PATH};
use serde::{Deserialize, Serialize};

use super::error::LlmError;
use super::{AnalysisRequest, GeneratedImage, HandwritingRequest, LlmClient, StreamSink, api_error, http, pump};

pub(crate) const NO_IMAGE: &str = "Failed to generate handwritten image. Please try again.";

pub struct RelayClient {
    endpoint: String,
}

impl RelayClient {
    pub fn new(endpoint: &str) -> Self {
        Self { endpoint: endpoint.trim_end_matches('/').to_string() }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint, path)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeBody<'a> {
    content: String,
    media_type: &'a str,
    model: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HandwritingBody<'a> {
    answer_text: &'a str,
    sample: String,
    sample_media_type: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HandwritingResponse {
    #[serde(default)]
    success: bool,
    image: Option<String>,
    #[serde(alias = "mimeType")]
    media_type: Option<String>,
    error: Option<String>,
}

impl HandwritingResponse {
    fn into_image(self, status: u16) -> Result<GeneratedImage, LlmError> {
        let image = match (self.success, self.image) {
            (true, Some(image)) if !image.is_empty() => image,
            _ => {
                let message = self.error.filter(|e| !e.is_empty()).unwrap_or_else(|| NO_IMAGE.to_string());
                return Err(LlmError::Api { status, message });
            }
        };
        let bytes = STANDARD.decode(image.trim()).map_err(|e| LlmError::Parse(e.to_string()))?;
        Ok(GeneratedImage { bytes, media_type: self.media_type.unwrap_or_else(|| "image/png".to_string()) })
    }
}

impl LlmClient for RelayClient {
    fn analyze(&self, request: &AnalysisRequest, sink: &StreamSink) -> Result<(), LlmError> {
        let body = AnalyzeBody {
            content: request.document.base64(),
            media_type: &request.document.media_type,
            model: request.model.api_name(),
        };
        tracing::info!(document = %request.document.name, model = body.model, "relay analysis request");

        let response = http()?.post(self.url(RELAY_ANALYZE_PATH)).json(&body).send()?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().unwrap_or_default();
            return Err(api_error(status, &text));
        }
        pump(response, sink)
    }

    fn handwriting(&self, request: &HandwritingRequest) -> Result<GeneratedImage, LlmError> {
        let body = HandwritingBody {
            answer_text: &request.answer_text,
            sample: request.sample.base64(),
            sample_media_type: &request.sample.media_type,
        };
        tracing::info!(sample = %request.sample.name, chars = request.answer_text.len(), "relay handwriting request");

        let response = http()?.post(self.url(RELAY_HANDWRITING_PATH)).json(&body).send()?;
        let status = response.status().as_u16();
        let text = response.text().map_err(|e| LlmError::StreamRead(e.to_string()))?;
        if !(200..300).contains(&status) {
            return Err(api_error(status, &text));
        }
        let parsed: HandwritingResponse = serde_json::from_str(&text).map_err(|e| LlmError::Parse(e.to_string()))?;
        parsed.into_image(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> HandwritingResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn url_joins_without_double_slash() {
        let client = RelayClient::new("http://localhost:5000/");
        assert_eq!(client.url(RELAY_ANALYZE_PATH), "http://localhost:5000/api/analyze");
    }

    #[test]
    fn analyze_body_field_names() {
        let body = AnalyzeBody { content: "AAAA".into(), media_type: "image/png", model: "gemini-2.5-flash" };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json, serde_json::json!({"content": "AAAA", "mediaType": "image/png", "model": "gemini-2.5-flash"}));
    }

    #[test]
    fn handwriting_body_field_names() {
        let body = HandwritingBody { answer_text: "x = 2", sample: "QUJD".into(), sample_media_type: "image/jpeg" };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["answerText"], "x = 2");
        assert_eq!(json["sample"], "QUJD");
        assert_eq!(json["sampleMediaType"], "image/jpeg");
    }

    #[test]
    fn successful_response_decodes_image() {
        let image = parse(r#"{"success":true,"image":"iVBORw==","mimeType":"image/png"}"#).into_image(200).unwrap();
        assert_eq!(image.bytes, vec![0x89, b'P', b'N', b'G']);
        assert_eq!(image.media_type, "image/png");
    }

    #[test]
    fn missing_image_is_a_failure() {
        let err = parse(r#"{"success":true}"#).into_image(200).unwrap_err();
        assert_eq!(err.to_string(), NO_IMAGE);
    }

    #[test]
    fn unsuccessful_response_uses_error_text() {
        let err = parse(r#"{"success":false,"error":"Answer text is required"}"#).into_image(200).unwrap_err();
        assert_eq!(err.to_string(), "Answer text is required");
    }

    #[test]
    fn invalid_base64_is_a_parse_error() {
        let err = parse(r#"{"success":true,"image":"not base64!"}"#).into_image(200).unwrap_err();
        assert!(matches!(err, LlmError::Parse(_)));
    }
}
