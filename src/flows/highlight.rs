//! Picks the best photos out of a set.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use super::{check_input, parse_output};
use crate::error::FlowError;
use crate::model::{GenerateRequest, GenerativeModel, Part};
use crate::schema::{Field, FieldKind, Schema};

const PHOTOS_FIELD: &str = "photoDataUris";
const TOP_PHOTOS_FIELD: &str = "topPhotoDataUris";

/// Photos to choose from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighlightRequest {
    /// Candidate photos, as data URIs
    #[serde(rename = "photoDataUris")]
    pub images: Vec<String>,
}

/// The chosen photos; always a subset of the request.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighlightResult {
    /// Picked photos, in the order the model gave them
    #[serde(rename = "topPhotoDataUris")]
    pub top_images: Vec<String>,
}

fn input_schema() -> Schema {
    Schema::new(
        "highlightTopPhotosInput",
        vec![Field::required(
            PHOTOS_FIELD,
            FieldKind::array_of(FieldKind::DataUri, 1),
            "An array of photo data URIs to evaluate for highlighting.",
        )],
    )
}

fn output_schema() -> Schema {
    Schema::new(
        "highlightTopPhotosOutput",
        vec![Field::required(
            TOP_PHOTOS_FIELD,
            FieldKind::array_of(FieldKind::String, 0),
            "An array of photo data URIs that are considered the top photos. \
             This must be a subset of the input URIs.",
        )],
    )
}

fn instructions(top_k: usize) -> String {
    format!(
        r#"You are an AI expert in photo curation for a model's portfolio.

From the provided list of photos, select the top {top_k} based on aesthetic appeal, composition, lighting, and high engagement potential.

Your response MUST contain ONLY the data URIs for the top {top_k} photos in the '{TOP_PHOTOS_FIELD}' array, copied exactly as given. Do not include any other text, explanations, or formatting.

Photos:"#
    )
}

/// Keeps only references present in `inputs`, first occurrence wins,
/// never longer than `inputs`.
pub fn enforce_subset(inputs: &[String], candidates: Vec<String>) -> Vec<String> {
    let known: HashSet<&str> = inputs.iter().map(String::as_str).collect();
    let mut seen = HashSet::new();
    let mut kept = Vec::new();
    for candidate in candidates {
        if !known.contains(candidate.as_str()) {
            warn!("Dropping photo the model made up: {}", crate::datauri::summarize(&candidate));
            continue;
        }
        if seen.insert(candidate.clone()) {
            kept.push(candidate);
        }
    }
    kept.truncate(inputs.len());
    kept
}

/// Asks the model for the top photos in one call.
#[derive(Clone)]
pub struct HighlightFlow {
    model: Arc<dyn GenerativeModel>,
    model_name: String,
    top_k: usize,
}

impl HighlightFlow {
    /// `top_k` is how many photos the prompt asks for.
    pub fn new(model: Arc<dyn GenerativeModel>, model_name: impl Into<String>, top_k: usize) -> Self {
        Self {
            model,
            model_name: model_name.into(),
            top_k,
        }
    }

    /// Returns the model's picks, or an empty result if anything goes wrong.
    #[instrument(skip_all, fields(photos = request.images.len(), top_k = self.top_k))]
    pub async fn highlight(&self, request: &HighlightRequest) -> HighlightResult {
        match self.try_highlight(request).await {
            Ok(result) => {
                info!("Model highlighted {} photo(s)", result.top_images.len());
                result
            }
            Err(err) => {
                warn!("AI did not return the expected top photos output: {err}");
                HighlightResult::default()
            }
        }
    }

    async fn try_highlight(&self, request: &HighlightRequest) -> Result<HighlightResult, FlowError> {
        check_input(&input_schema(), request)?;

        let mut parts = Vec::with_capacity(request.images.len() * 2 + 1);
        parts.push(Part::Text(instructions(self.top_k)));
        for (index, image) in request.images.iter().enumerate() {
            parts.push(Part::Text(format!("Photo {}:", index + 1)));
            parts.push(Part::Media(image.clone()));
        }
        let call = GenerateRequest::new(parts)
            .with_model(self.model_name.clone())
            .with_output_schema(output_schema().to_json_schema());

        let response = self.model.generate(call).await?;
        let parsed: HighlightResult = parse_output(&output_schema(), response.output.as_ref())?;

        Ok(HighlightResult {
            top_images: enforce_subset(&request.images, parsed.top_images),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datauri::encode;
    use crate::model::ModelError;
    use crate::model::testing::ScriptedModel;
    use serde_json::json;

    fn photos(n: usize) -> Vec<String> {
        (0..n)
            .map(|i| encode("image/jpeg", format!("photo-{i}").as_bytes()))
            .collect()
    }

    fn flow(model: &Arc<ScriptedModel>) -> HighlightFlow {
        HighlightFlow::new(model.clone(), "text-model", 3)
    }

    #[tokio::test]
    async fn returns_model_picks_in_model_order() {
        let images = photos(10);
        let model = Arc::new(ScriptedModel::new().then_output(json!({
            TOP_PHOTOS_FIELD: [images[7], images[2], images[4]]
        })));

        let result = flow(&model)
            .highlight(&HighlightRequest { images: images.clone() })
            .await;

        assert_eq!(
            result.top_images,
            vec![images[7].clone(), images[2].clone(), images[4].clone()]
        );
        let requests = model.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].media().len(), 10);
        assert_eq!(requests[0].model.as_deref(), Some("text-model"));
        assert!(requests[0].text().contains("select the top 3"));
        assert!(requests[0].output_schema.is_some());
    }

    #[tokio::test]
    async fn top_k_is_configurable() {
        let images = photos(6);
        let model = Arc::new(ScriptedModel::new().then_output(json!({TOP_PHOTOS_FIELD: []})));
        HighlightFlow::new(model.clone(), "m", 5)
            .highlight(&HighlightRequest { images })
            .await;
        assert!(model.requests()[0].text().contains("select the top 5"));
    }

    #[tokio::test]
    async fn fabricated_and_repeated_references_are_dropped() {
        let images = photos(4);
        let made_up = encode("image/jpeg", b"not in the set");
        let model = Arc::new(ScriptedModel::new().then_output(json!({
            TOP_PHOTOS_FIELD: [images[1], made_up, images[1], images[3]]
        })));

        let result = flow(&model)
            .highlight(&HighlightRequest { images: images.clone() })
            .await;

        assert_eq!(result.top_images, vec![images[1].clone(), images[3].clone()]);
        for picked in &result.top_images {
            assert!(images.contains(picked));
        }
    }

    #[tokio::test]
    async fn transport_error_degrades_to_empty() {
        let model = Arc::new(
            ScriptedModel::new().then_error(ModelError::Transport("timed out".to_string())),
        );
        let result = flow(&model)
            .highlight(&HighlightRequest { images: photos(3) })
            .await;
        assert!(result.top_images.is_empty());
    }

    #[tokio::test]
    async fn wrong_output_shape_degrades_to_empty() {
        let model = Arc::new(ScriptedModel::new().then_output(json!({"photos": ["a"]})));
        let result = flow(&model)
            .highlight(&HighlightRequest { images: photos(3) })
            .await;
        assert!(result.top_images.is_empty());

        let model = Arc::new(ScriptedModel::new().then_media(None));
        let result = flow(&model)
            .highlight(&HighlightRequest { images: photos(3) })
            .await;
        assert!(result.top_images.is_empty());
    }

    #[tokio::test]
    async fn invalid_input_skips_the_model() {
        let model = Arc::new(ScriptedModel::new());
        let result = flow(&model)
            .highlight(&HighlightRequest { images: vec![] })
            .await;
        assert!(result.top_images.is_empty());

        let result = flow(&model)
            .highlight(&HighlightRequest {
                images: vec![photos(1).remove(0), "/portfolio/2.jpg".to_string()],
            })
            .await;
        assert!(result.top_images.is_empty());
        assert!(model.requests().is_empty());
    }

    #[test]
    fn enforce_subset_never_exceeds_input_length() {
        let inputs = vec!["a".to_string(), "b".to_string()];
        let kept = enforce_subset(&inputs, vec!["b".into(), "a".into(), "b".into(), "c".into()]);
        assert_eq!(kept, vec!["b".to_string(), "a".to_string()]);
    }
}
