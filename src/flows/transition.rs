//! Describes, then renders, a transition between two outfits.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use super::{check_input, parse_output};
use crate::constants::{FALLBACK_DESCRIPTION, MIN_STYLE_LENGTH};
use crate::datauri::looks_like_data_uri;
use crate::error::FlowError;
use crate::model::{GenerateRequest, GenerativeModel, Modality, Part};
use crate::schema::{Field, FieldKind, Schema};

/// Two outfits and the style to move between them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRequest {
    /// First outfit, as a data URI
    #[serde(rename = "image1DataUri")]
    pub image1: String,
    /// Second outfit, as a data URI
    #[serde(rename = "image2DataUri")]
    pub image2: String,
    /// e.g. "elegant", "sporty", "edgy"
    #[serde(rename = "transitionStyle")]
    pub style: String,
}

/// A description, and an image if the model produced one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionResult {
    /// Never empty
    #[serde(rename = "transitionDescription")]
    pub description: String,
    /// Generated image as a data URI
    #[serde(rename = "generatedImage", skip_serializing_if = "Option::is_none", default)]
    pub image: Option<String>,
}

const DESCRIPTION_FIELD: &str = "transitionDescription";

#[derive(Deserialize)]
struct DescribeOutput {
    #[serde(rename = "transitionDescription")]
    description: String,
}

const IMAGE_HELP: &str = "An outfit image, as a data URI that must include a MIME type and use \
                          Base64 encoding. Expected format: 'data:<mimetype>;base64,<encoded_data>'.";

fn input_schema() -> Schema {
    Schema::new(
        "suggestOutfitTransitionsInput",
        vec![
            Field::required("image1DataUri", FieldKind::DataUri, IMAGE_HELP),
            Field::required("image2DataUri", FieldKind::DataUri, IMAGE_HELP),
            Field::required(
                "transitionStyle",
                FieldKind::MinLengthString(MIN_STYLE_LENGTH),
                "The desired style for the outfit transition, e.g., \"elegant\", \"sporty\", \"casual\".",
            ),
        ],
    )
}

fn describe_schema() -> Schema {
    Schema::new(
        "suggestOutfitTransitionsDescription",
        vec![Field::required(
            DESCRIPTION_FIELD,
            FieldKind::String,
            "A textual description of the suggested outfit transition.",
        )],
    )
}

fn describe_prompt(request: &TransitionRequest) -> Vec<Part> {
    vec![
        Part::Text(format!(
            "You are a fashion stylist creating outfit transitions between two given outfits.\n\n\
             Given two outfit images and a transition style, create a description of how to \
             transition from the first outfit to the second.\n\n\
             Here are the details of the outfit transition:\n\
             Transition Style: {}\nOutfit 1:",
            request.style.trim()
        )),
        Part::Media(request.image1.clone()),
        Part::Text("Outfit 2:".to_string()),
        Part::Media(request.image2.clone()),
        Part::Text("Transition Description:".to_string()),
    ]
}

fn render_prompt(request: &TransitionRequest, description: &str) -> Vec<Part> {
    vec![
        Part::Text(format!(
            "Generate an image that represents a transition between the two following outfits, \
             based on this description: \"{description}\". The transition style should be \"{}\".",
            request.style.trim()
        )),
        Part::Media(request.image1.clone()),
        Part::Media(request.image2.clone()),
    ]
}

/// Two sequential model calls: describe, then render.
#[derive(Clone)]
pub struct TransitionFlow {
    model: Arc<dyn GenerativeModel>,
    text_model: String,
    image_model: String,
}

impl TransitionFlow {
    /// Builds the flow with the models used by each step.
    pub fn new(
        model: Arc<dyn GenerativeModel>,
        text_model: impl Into<String>,
        image_model: impl Into<String>,
    ) -> Self {
        Self {
            model,
            text_model: text_model.into(),
            image_model: image_model.into(),
        }
    }

    /// Runs both steps. Fails on bad input, a failed model call, or a
    /// description that isn't a string.
    #[instrument(skip_all, fields(style = %request.style))]
    pub async fn transition(
        &self,
        request: &TransitionRequest,
    ) -> Result<TransitionResult, FlowError> {
        check_input(&input_schema(), request)?;

        let description = self.describe(request).await?;
        let image = self.render(request, &description).await?;
        info!(
            "Transition ready (description {} chars, image: {})",
            description.len(),
            image.is_some()
        );

        Ok(TransitionResult { description, image })
    }

    async fn describe(&self, request: &TransitionRequest) -> Result<String, FlowError> {
        let call = GenerateRequest::new(describe_prompt(request))
            .with_model(self.text_model.clone())
            .with_output_schema(describe_schema().to_json_schema());

        let output = match self.model.generate(call).await?.output {
            Some(Value::Object(fields))
                if fields.get(DESCRIPTION_FIELD).is_none_or(Value::is_null) =>
            {
                None
            }
            other => other,
        };
        let Some(output) = output else {
            warn!("Model returned no description, using fallback");
            return Ok(FALLBACK_DESCRIPTION.to_string());
        };

        let parsed = parse_output::<DescribeOutput>(&describe_schema(), Some(&output))?;
        let description = parsed.description.trim();
        if description.is_empty() {
            warn!("Model returned a blank description, using fallback");
            return Ok(FALLBACK_DESCRIPTION.to_string());
        }
        Ok(description.to_string())
    }

    async fn render(
        &self,
        request: &TransitionRequest,
        description: &str,
    ) -> Result<Option<String>, FlowError> {
        let call = GenerateRequest::new(render_prompt(request, description))
            .with_model(self.image_model.clone())
            .with_modalities(&[Modality::Text, Modality::Image]);

        let response = self.model.generate(call).await?;
        let image = response.media.filter(|media| looks_like_data_uri(media));
        if image.is_none() {
            debug!("Model declined to render a transition image");
        }
        Ok(image)
    }
}
