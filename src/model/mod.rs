//! The generative model collaborator.
//!
//! Flows only see [`GenerativeModel`]: hand it a prompt and an optional output
//! shape, get back text, structured output and/or an image, or an error.

use std::fmt;

use async_trait::async_trait;
use serde_json::Value;

mod gemini;
#[cfg(test)]
pub(crate) mod testing;

pub use gemini::GeminiClient;

/// One piece of a prompt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Part {
    /// Plain instruction text
    Text(String),
    /// An image, as a data URI or URL
    Media(String),
}

/// What kind of output the model should produce.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Modality {
    /// Text (including structured JSON)
    Text,
    /// Generated images
    Image,
}

/// A single call to the model.
#[derive(Clone, Debug, Default)]
pub struct GenerateRequest {
    /// Overrides the client's default model
    pub model: Option<String>,
    /// Ordered prompt parts
    pub parts: Vec<Part>,
    /// JSON-Schema the structured output has to follow
    pub output_schema: Option<Value>,
    /// Requested output modalities; empty means the model's default
    pub modalities: Vec<Modality>,
}

impl GenerateRequest {
    /// A request made of `parts`, using the default model.
    pub fn new(parts: Vec<Part>) -> Self {
        Self {
            parts,
            ..Default::default()
        }
    }

    /// Pins the model for this call.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Asks for structured JSON output in this shape.
    pub fn with_output_schema(mut self, schema: Value) -> Self {
        self.output_schema = Some(schema);
        self
    }

    /// Sets the output modalities.
    pub fn with_modalities(mut self, modalities: &[Modality]) -> Self {
        self.modalities = modalities.to_vec();
        self
    }

    /// Every text part joined, for logs and tests.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                Part::Text(text) => Some(text.as_str()),
                Part::Media(_) => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Media parts, in prompt order.
    pub fn media(&self) -> Vec<&str> {
        self.parts
            .iter()
            .filter_map(|part| match part {
                Part::Media(url) => Some(url.as_str()),
                Part::Text(_) => None,
            })
            .collect()
    }
}

/// What came back from a call.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GenerateResponse {
    /// Concatenated text output, if any
    pub text: Option<String>,
    /// Parsed JSON output when an output schema was requested
    pub output: Option<Value>,
    /// First generated image, as a data URI
    pub media: Option<String>,
}

/// Errors from the model collaborator.
#[derive(Debug)]
pub enum ModelError {
    /// Couldn't reach the model, it timed out, or it returned a non-2xx status
    Transport(String),
    /// The response body didn't make sense
    Protocol(String),
    /// Structured output was requested but the text wasn't JSON
    OutputShape(String),
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(msg) => write!(f, "transport error: {msg}"),
            Self::Protocol(msg) => write!(f, "protocol error: {msg}"),
            Self::OutputShape(msg) => write!(f, "output was not valid JSON: {msg}"),
        }
    }
}

impl std::error::Error for ModelError {}

/// Anything that can answer a [`GenerateRequest`].
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    /// Sends one request.
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, ModelError>;
}
