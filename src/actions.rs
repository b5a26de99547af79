//! Server actions: the only entry points the UI calls.
//!
//! Every action resolves to an [`ActionEnvelope`]. Errors stop here; they're
//! logged and replaced with a fixed message for the user.

use std::path::PathBuf;

use serde::Serialize;
use tracing::{debug, error, instrument, warn};

use crate::constants::{ERR_NO_IMAGES, ERR_TRANSITION_FAILED};
use crate::datauri::{self, ImageSource};
use crate::flows::{HighlightFlow, HighlightRequest, TransitionFlow, TransitionRequest, TransitionResult};
use crate::gallery;

/// `{success, data}` or `{success, error}`, never both.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ActionEnvelope<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ActionEnvelope<T> {
    /// A successful result.
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// A failed result with a user-facing message.
    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }

    /// Whether the action succeeded.
    pub fn is_success(&self) -> bool {
        self.success
    }

    /// The payload, on success.
    pub fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    /// The message, on failure.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Converts into a plain `Result`.
    pub fn into_result(self) -> Result<T, String> {
        match (self.data, self.error) {
            (Some(data), _) => Ok(data),
            (None, error) => Err(error.unwrap_or_default()),
        }
    }
}

/// Payload of a successful highlight action.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HighlightActionData {
    /// The highlighted photos, as the `src` values the UI sent
    #[serde(rename = "topPhotoSrcs")]
    pub top_photo_srcs: Vec<String>,
}

/// One uploaded file.
#[derive(Clone, Debug, Default)]
pub struct UploadedImage {
    /// Raw bytes
    pub bytes: Vec<u8>,
    /// Content type the browser declared
    pub content_type: Option<String>,
    /// Original file name
    pub file_name: Option<String>,
}

impl UploadedImage {
    fn to_data_uri(&self) -> String {
        datauri::from_upload(
            self.content_type.as_deref(),
            self.file_name.as_deref(),
            &self.bytes,
        )
    }
}

/// Holds the flows and the directory gallery images are read from.
#[derive(Clone)]
pub struct Actions {
    highlight: HighlightFlow,
    transition: TransitionFlow,
    public_dir: PathBuf,
}

impl Actions {
    /// `public_dir` is where gallery `src` paths are resolved.
    pub fn new(highlight: HighlightFlow, transition: TransitionFlow, public_dir: PathBuf) -> Self {
        Self {
            highlight,
            transition,
            public_dir,
        }
    }

    /// Loads the given gallery photos, asks for highlights, and maps the
    /// picks back to their `src`.
    ///
    /// Only files under the public directory are read; nothing is fetched
    /// over the network. Photos with identical bytes are sent once.
    #[instrument(skip_all, fields(photos = photo_srcs.len()))]
    pub async fn handle_highlight_photos(
        &self,
        photo_srcs: &[String],
    ) -> ActionEnvelope<HighlightActionData> {
        let mut origins = Vec::with_capacity(photo_srcs.len());
        let mut sources = Vec::with_capacity(photo_srcs.len());
        for src in photo_srcs {
            match gallery::resolve(&self.public_dir, src).map(ImageSource::File) {
                Some(source) => {
                    origins.push(src.clone());
                    sources.push(source);
                }
                None => warn!("Skipping photo with an unusable path: {src}"),
            }
        }

        let mut loaded_srcs = Vec::with_capacity(sources.len());
        let mut photo_data_uris: Vec<String> = Vec::with_capacity(sources.len());
        for item in datauri::convert_batch(None, sources).await {
            let (Some(data_uri), Some(origin)) = (item.data_uri, origins.get(item.index)) else {
                continue;
            };
            if photo_data_uris.contains(&data_uri) {
                debug!("Skipping {origin}, same image as an earlier photo");
                continue;
            }
            loaded_srcs.push(origin.clone());
            photo_data_uris.push(data_uri);
        }

        if photo_data_uris.is_empty() {
            return ActionEnvelope::err(ERR_NO_IMAGES);
        }

        let result = self
            .highlight
            .highlight(&HighlightRequest {
                images: photo_data_uris.clone(),
            })
            .await;

        let top_photo_srcs = result
            .top_images
            .iter()
            .filter_map(|uri| {
                photo_data_uris
                    .iter()
                    .position(|candidate| candidate == uri)
                    .and_then(|index| loaded_srcs.get(index).cloned())
            })
            .collect();

        ActionEnvelope::ok(HighlightActionData { top_photo_srcs })
    }

    /// Runs the transition flow on data URIs the browser already built.
    pub async fn handle_suggest_transition(
        &self,
        request: &TransitionRequest,
    ) -> ActionEnvelope<TransitionResult> {
        match self.transition.transition(request).await {
            Ok(result) => ActionEnvelope::ok(result),
            Err(err) => {
                error!("Error suggesting outfit transition: {err}");
                ActionEnvelope::err(ERR_TRANSITION_FAILED)
            }
        }
    }

    /// Encodes two uploaded files and runs the transition flow.
    pub async fn handle_suggest_transition_upload(
        &self,
        image1: &UploadedImage,
        image2: &UploadedImage,
        style: &str,
    ) -> ActionEnvelope<TransitionResult> {
        let request = TransitionRequest {
            image1: image1.to_data_uri(),
            image2: image2.to_data_uri(),
            style: style.to_string(),
        };
        self.handle_suggest_transition(&request).await
    }
}
