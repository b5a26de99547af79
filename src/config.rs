//! Config handling

use std::time::Duration;

use tracing::log::LevelFilter;

use crate::cli::CliOptions;
use crate::constants::{
    DEFAULT_IMAGE_MODEL, DEFAULT_MODEL_TIMEOUT_SECONDS, DEFAULT_TEXT_MODEL, DEFAULT_TOP_K,
};

/// Sets up logging based on the debug flag
pub fn setup_logging(debug: bool) -> Result<(), Box<std::io::Error>> {
    let level = if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let mut logger = simple_logger::SimpleLogger::new().with_level(level);
    if !debug {
        logger = logger
            .with_module_level("tracing", LevelFilter::Warn)
            .with_module_level("rustls", LevelFilter::Info)
            .with_module_level("hyper_util", LevelFilter::Info)
            .with_module_level("reqwest", LevelFilter::Info)
            .with_module_level("h2", LevelFilter::Info);
    }
    logger.init().map_err(|err| {
        eprintln!("Failed to initialize logger: {}", err);
        Box::new(std::io::Error::other(err))
    })
}

/// Settings shared by the flows.
#[derive(Clone, Debug)]
pub struct FlowConfig {
    /// Model used for structured text output.
    pub text_model: String,
    /// Model used for the image generation step.
    pub image_model: String,
    /// How many photos the highlight flow asks for.
    pub top_k: usize,
    /// Bound on a single model call.
    pub model_timeout: Duration,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            text_model: DEFAULT_TEXT_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            top_k: DEFAULT_TOP_K,
            model_timeout: Duration::from_secs(DEFAULT_MODEL_TIMEOUT_SECONDS),
        }
    }
}

impl From<&CliOptions> for FlowConfig {
    fn from(cli: &CliOptions) -> Self {
        Self {
            text_model: cli.text_model.clone(),
            image_model: cli.image_model.clone(),
            top_k: cli.top_k.get(),
            model_timeout: Duration::from_secs(cli.model_timeout_secs),
        }
    }
}
