//! CLI parser
use clap::Parser;
use std::num::{NonZeroU16, NonZeroUsize};
use std::path::PathBuf;

use crate::constants::{
    DEFAULT_GEMINI_API_BASE, DEFAULT_IMAGE_MODEL, DEFAULT_MODEL_TIMEOUT_SECONDS,
    DEFAULT_TEXT_MODEL,
};

#[derive(Parser, Debug)]
/// CLI Options
pub struct CliOptions {
    #[clap(long, help = "Enable debug logging", env = "LOOKBOOK_DEBUG")]
    /// Enable debug logging. Env: LOOKBOOK_DEBUG
    pub debug: bool,
    #[clap(long, short, default_value = "9002", env = "LOOKBOOK_PORT")]
    /// http listener, defaults to `9002`.
    /// Env: LOOKBOOK_PORT
    pub port: NonZeroU16,
    #[clap(
        long,
        short,
        default_value = "127.0.0.1",
        env = "LOOKBOOK_LISTEN_ADDRESS"
    )]
    /// Listen address, defaults to `127.0.0.1`.
    /// Env: LOOKBOOK_LISTEN_ADDRESS
    pub listen_address: String,

    #[clap(long, default_value = "./public", env = "LOOKBOOK_PUBLIC_DIR")]
    /// Directory holding `portfolio/` and other public files.
    /// Env: LOOKBOOK_PUBLIC_DIR
    pub public_dir: PathBuf,

    #[clap(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    /// Gemini API key. Env: GEMINI_API_KEY
    pub gemini_api_key: String,

    #[clap(long, default_value = DEFAULT_GEMINI_API_BASE, env = "LOOKBOOK_API_BASE")]
    /// Base URL of the generative model API.
    pub api_base: String,

    #[clap(long, default_value = DEFAULT_TEXT_MODEL, env = "LOOKBOOK_TEXT_MODEL")]
    /// Model used for highlights and transition descriptions.
    pub text_model: String,

    #[clap(long, default_value = DEFAULT_IMAGE_MODEL, env = "LOOKBOOK_IMAGE_MODEL")]
    /// Model used to render transition images.
    pub image_model: String,

    #[clap(long, default_value = "3", env = "LOOKBOOK_TOP_K")]
    /// How many photos to highlight.
    pub top_k: NonZeroUsize,

    #[clap(long, default_value_t = DEFAULT_MODEL_TIMEOUT_SECONDS, env = "LOOKBOOK_MODEL_TIMEOUT_SECS")]
    /// Seconds before a model call gives up.
    pub model_timeout_secs: u64,
}
