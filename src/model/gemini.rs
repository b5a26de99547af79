//! Gemini `generateContent` client.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

use super::{GenerateRequest, GenerateResponse, GenerativeModel, Modality, ModelError, Part};
use crate::datauri::{self, DataUri};

// -----------------------------
// Wire types
// -----------------------------

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Serialize, Debug)]
struct Content {
    role: &'static str,
    parts: Vec<WirePart>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
enum WirePart {
    #[serde(rename = "text")]
    Text(String),
    InlineData(InlineData),
    FileData(FileData),
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct FileData {
    mime_type: String,
    file_uri: String,
}

#[derive(Serialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    response_modalities: Vec<&'static str>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Deserialize, Debug)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Deserialize, Debug)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    inline_data: Option<InlineData>,
}

// -----------------------------
// Client
// -----------------------------

/// Talks to the Gemini REST API.
#[derive(Clone, Debug)]
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    api_base: String,
    default_model: String,
}

impl GeminiClient {
    /// Builds a client; `timeout` bounds every call.
    pub fn new(
        api_key: impl Into<String>,
        api_base: &str,
        default_model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ModelError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| ModelError::Transport(format!("Failed to build HTTP client: {err}")))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            api_base: api_base.trim_end_matches('/').to_string(),
            default_model: default_model.into(),
        })
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.api_base, model)
    }
}

fn to_wire_part(part: &Part) -> Result<WirePart, ModelError> {
    match part {
        Part::Text(text) => Ok(WirePart::Text(text.clone())),
        Part::Media(url) if url.starts_with("data:") => {
            let parsed = DataUri::parse(url)
                .map_err(|err| ModelError::Protocol(format!("Bad media part: {err}")))?;
            Ok(WirePart::InlineData(InlineData {
                mime_type: parsed.mime().to_string(),
                data: parsed.base64_payload(),
            }))
        }
        Part::Media(url) => Ok(WirePart::FileData(FileData {
            mime_type: datauri::mime_for(Some(Path::new(url)), &[]).to_string(),
            file_uri: url.clone(),
        })),
    }
}

fn build_body(request: &GenerateRequest) -> Result<GenerateContentRequest, ModelError> {
    let parts = request
        .parts
        .iter()
        .map(to_wire_part)
        .collect::<Result<Vec<_>, _>>()?;

    let mut config = GenerationConfig::default();
    if let Some(schema) = &request.output_schema {
        config.response_mime_type = Some("application/json");
        config.response_schema = Some(schema.clone());
    }
    config.response_modalities = request
        .modalities
        .iter()
        .map(|modality| match modality {
            Modality::Text => "TEXT",
            Modality::Image => "IMAGE",
        })
        .collect();
    let has_config = config.response_mime_type.is_some() || !config.response_modalities.is_empty();

    Ok(GenerateContentRequest {
        contents: vec![Content {
            role: "user",
            parts,
        }],
        generation_config: has_config.then_some(config),
    })
}

fn read_response(
    parsed: GenerateContentResponse,
    wants_json: bool,
) -> Result<GenerateResponse, ModelError> {
    if let Some(err) = parsed.error {
        return Err(ModelError::Protocol(format!("API returned error: {err}")));
    }
    if parsed.candidates.is_empty() {
        let feedback = parsed
            .prompt_feedback
            .map(|value| value.to_string())
            .unwrap_or_else(|| "none".to_string());
        return Err(ModelError::Protocol(format!(
            "response had no candidates (prompt feedback: {feedback})"
        )));
    }

    let mut text = String::new();
    let mut media = None;
    for part in parsed
        .candidates
        .into_iter()
        .take(1)
        .filter_map(|candidate| candidate.content)
        .flat_map(|content| content.parts)
    {
        if let Some(chunk) = part.text {
            text.push_str(&chunk);
        }
        if media.is_none()
            && let Some(inline) = part.inline_data
        {
            match general_purpose::STANDARD.decode(inline.data.as_bytes()) {
                Ok(bytes) => media = Some(datauri::encode(&inline.mime_type, &bytes)),
                Err(err) => debug!("Skipping undecodable inline image: {err}"),
            }
        }
    }

    let text = (!text.trim().is_empty()).then_some(text);
    let output = match (&text, wants_json) {
        (Some(raw), true) => Some(
            serde_json::from_str::<Value>(raw.trim())
                .map_err(|err| ModelError::OutputShape(format!("{err}: {raw}")))?,
        ),
        _ => None,
    };

    Ok(GenerateResponse {
        text,
        output,
        media,
    })
}

#[async_trait]
impl GenerativeModel for GeminiClient {
    #[instrument(skip_all, fields(model = tracing::field::Empty))]
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, ModelError> {
        let model = request
            .model
            .clone()
            .unwrap_or_else(|| self.default_model.clone());
        tracing::Span::current().record("model", model.as_str());
        let body = build_body(&request)?;

        let resp = self
            .client
            .post(self.endpoint(&model))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    ModelError::Transport(format!("request to {model} timed out"))
                } else {
                    ModelError::Transport(format!("request to {model} failed: {err}"))
                }
            })?;

        let status = resp.status();
        let bytes = resp
            .bytes()
            .await
            .map_err(|err| ModelError::Transport(format!("failed reading response body: {err}")))?;
        if !status.is_success() {
            return Err(ModelError::Transport(format!(
                "Gemini API error {status}: {}",
                String::from_utf8_lossy(&bytes)
            )));
        }

        let parsed: GenerateContentResponse = serde_json::from_slice(&bytes)
            .map_err(|err| ModelError::Protocol(format!("failed to parse response JSON: {err}")))?;
        let response = read_response(parsed, request.output_schema.is_some())?;
        debug!(
            "Model {model} answered: text={} media={}",
            response.text.as_ref().map_or(0, String::len),
            response.media.as_deref().map(datauri::summarize).unwrap_or_default()
        );
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_body_maps_parts_and_config() {
        let request = GenerateRequest::new(vec![
            Part::Text("pick one".to_string()),
            Part::Media(datauri::encode("image/png", b"abc")),
            Part::Media("https://example.org/look.jpg".to_string()),
        ])
        .with_output_schema(json!({"type": "object"}))
        .with_modalities(&[Modality::Text, Modality::Image]);

        let body = serde_json::to_value(build_body(&request).unwrap()).unwrap();
        let parts = &body["contents"][0]["parts"];
        assert_eq!(parts[0]["text"], "pick one");
        assert_eq!(parts[1]["inlineData"]["mimeType"], "image/png");
        assert_eq!(parts[1]["inlineData"]["data"], "YWJj");
        assert_eq!(parts[2]["fileData"]["fileUri"], "https://example.org/look.jpg");
        assert_eq!(parts[2]["fileData"]["mimeType"], "image/jpeg");
        let config = &body["generationConfig"];
        assert_eq!(config["responseMimeType"], "application/json");
        assert_eq!(config["responseModalities"], json!(["TEXT", "IMAGE"]));
    }

    #[test]
    fn plain_request_has_no_generation_config() {
        let request = GenerateRequest::new(vec![Part::Text("hi".to_string())]);
        let body = serde_json::to_value(build_body(&request).unwrap()).unwrap();
        assert!(body.get("generationConfig").is_none());
    }

    #[test]
    fn structured_text_is_parsed() {
        let parsed: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{"content": {"parts": [{"text": "{\"a\": [1]}"}]}}]
        }))
        .unwrap();
        let response = read_response(parsed, true).unwrap();
        assert_eq!(response.output, Some(json!({"a": [1]})));
        assert!(response.media.is_none());
    }

    #[test]
    fn non_json_structured_output_is_an_output_shape_error() {
        let parsed: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{"content": {"parts": [{"text": "sorry, no"}]}}]
        }))
        .unwrap();
        assert!(matches!(
            read_response(parsed, true),
            Err(ModelError::OutputShape(_))
        ));
    }

    #[test]
    fn inline_image_becomes_data_uri() {
        let parsed: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{"content": {"parts": [
                {"text": "Here is the look."},
                {"inlineData": {"mimeType": "image/png", "data": "YWJj"}}
            ]}}]
        }))
        .unwrap();
        let response = read_response(parsed, false).unwrap();
        assert_eq!(response.media.as_deref(), Some("data:image/png;base64,YWJj"));
        assert_eq!(response.text.as_deref(), Some("Here is the look."));
    }

    #[test]
    fn empty_candidates_is_a_protocol_error() {
        let parsed: GenerateContentResponse =
            serde_json::from_value(json!({"promptFeedback": {"blockReason": "SAFETY"}})).unwrap();
        let err = read_response(parsed, false).unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
    }
}
