use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use lookbook::config::setup_logging;
use lookbook::constants::{DEFAULT_GEMINI_API_BASE, DEFAULT_IMAGE_MODEL, DEFAULT_TEXT_MODEL};
use lookbook::datauri::{self, DataUri, ImageSource};
use lookbook::flows::{HighlightFlow, HighlightRequest, TransitionFlow, TransitionRequest};
use lookbook::model::{GeminiClient, GenerativeModel};

/// Run the lookbook AI flows against local files.
///
/// Minimal UX:
///   lookbook_flows highlight public/portfolio/*.jpg https://example.org/look.jpg
///   lookbook_flows transition look1.jpg look2.jpg --style edgy --out transition.png
#[derive(Parser, Debug)]
#[command(name = "lookbook_flows")]
struct Args {
    /// Gemini API key
    #[arg(required = true, long, env = "GEMINI_API_KEY", hide_env_values = true)]
    gemini_api_key: String,

    /// API base URL
    #[arg(long, default_value = DEFAULT_GEMINI_API_BASE)]
    api_base: String,

    /// Text model used for highlights and descriptions
    #[arg(long, default_value = DEFAULT_TEXT_MODEL)]
    text_model: String,

    /// Image model
    #[arg(long, default_value = DEFAULT_IMAGE_MODEL)]
    image_model: String,

    /// Seconds before a model call or image download gives up
    #[arg(long, default_value_t = 120)]
    timeout_secs: u64,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Pick the best photos out of a set of files or URLs
    Highlight {
        /// Photos to choose from: paths, or http(s) URLs
        #[arg(required = true)]
        photos: Vec<ImageSource>,

        /// How many to ask for
        #[arg(long, default_value_t = 3)]
        top_k: usize,
    },
    /// Describe (and try to render) a transition between two outfits
    Transition {
        /// First outfit
        image1: PathBuf,
        /// Second outfit
        image2: PathBuf,
        /// Transition style, e.g. elegant, sporty, edgy
        #[arg(long)]
        style: String,
        /// Where to write the generated image, if the model makes one
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

async fn load(path: &Path) -> Result<String> {
    datauri::from_path(path)
        .await
        .ok_or_else(|| anyhow!("Failed to read {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let _ = setup_logging(args.debug);

    let timeout = Duration::from_secs(args.timeout_secs);
    let model: Arc<dyn GenerativeModel> = Arc::new(
        GeminiClient::new(
            args.gemini_api_key.clone(),
            &args.api_base,
            args.text_model.clone(),
            timeout,
        )
        .context("Failed to build model client")?,
    );

    match args.command {
        Command::Highlight { photos, top_k } => {
            let remote = datauri::remote_client(timeout).context("Failed to build HTTP client")?;
            let mut kept = Vec::new();
            let mut images = Vec::new();
            for item in datauri::convert_batch(Some(&remote), photos).await {
                match item.data_uri {
                    Some(uri) => {
                        kept.push(item.source);
                        images.push(uri);
                    }
                    None => eprintln!("Skipping unreadable photo: {}", item.source),
                }
            }
            if images.is_empty() {
                return Err(anyhow!("None of the photos could be read"));
            }

            let flow = HighlightFlow::new(model, args.text_model, top_k);
            let result = flow
                .highlight(&HighlightRequest {
                    images: images.clone(),
                })
                .await;
            if result.top_images.is_empty() {
                eprintln!("No highlights returned");
            }
            for picked in result.top_images {
                if let Some(source) = images
                    .iter()
                    .position(|uri| *uri == picked)
                    .and_then(|index| kept.get(index))
                {
                    println!("{source}");
                }
            }
        }
        Command::Transition {
            image1,
            image2,
            style,
            out,
        } => {
            let request = TransitionRequest {
                image1: load(&image1).await?,
                image2: load(&image2).await?,
                style,
            };
            let flow = TransitionFlow::new(model, args.text_model, args.image_model);
            let result = flow
                .transition(&request)
                .await
                .context("Outfit transition failed")?;

            println!("{}", result.description);
            match (result.image, out) {
                (Some(image), Some(out)) => {
                    let decoded = DataUri::parse(&image).context("Model returned a bad image")?;
                    std::fs::write(&out, decoded.bytes())
                        .with_context(|| format!("Failed to write {}", out.display()))?;
                    eprintln!("Saved: {} ({})", out.display(), decoded.mime());
                }
                (Some(_), None) => eprintln!("Model rendered an image; pass --out to save it"),
                (None, _) => eprintln!("Model did not render an image"),
            }
        }
    }
    Ok(())
}
