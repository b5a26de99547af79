//! Shared constants and defaults
//!

/// MIME type used when neither the extension nor the content gives one away.
pub const DEFAULT_IMAGE_MIME: &str = "image/jpeg";

/// How many photos the highlight flow asks the model to pick.
pub const DEFAULT_TOP_K: usize = 3;

/// Substituted when the describe step comes back empty.
pub const FALLBACK_DESCRIPTION: &str = "A stylish transition.";

/// Shortest transition style label accepted from the form.
pub const MIN_STYLE_LENGTH: usize = 3;

/// Default text (and structured output) model.
pub const DEFAULT_TEXT_MODEL: &str = "gemini-2.0-flash";

/// Default image generation model.
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.0-flash-preview-image-generation";

/// Base URL for the Gemini REST API.
pub const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Upper bound (in seconds) on a single model call.
pub const DEFAULT_MODEL_TIMEOUT_SECONDS: u64 = 120;

/// Error text returned when no gallery image could be read.
pub const ERR_NO_IMAGES: &str = "Could not process any images.";

/// Error text returned when highlighting fails outright.
pub const ERR_HIGHLIGHT_FAILED: &str = "Failed to highlight photos.";

/// Error text returned when the transition flow fails.
pub const ERR_TRANSITION_FAILED: &str = "Failed to suggest outfit transition.";

/// Error text returned when an upload can't be read.
pub const ERR_BAD_UPLOAD: &str = "Could not read the uploaded images.";

/// Largest remote image body accepted, in bytes.
pub const MAX_REMOTE_IMAGE_BYTES: usize = 20 * 1024 * 1024;
