use std::sync::Arc;

use clap::Parser;
use lookbook::actions::Actions;
use lookbook::cli::CliOptions;
use lookbook::config::{FlowConfig, setup_logging};
use lookbook::error::LookbookError;
use lookbook::flows::{HighlightFlow, TransitionFlow};
use lookbook::model::{GeminiClient, GenerativeModel};
use tracing::error;

async fn run(cli: CliOptions) -> Result<(), LookbookError> {
    let flow_config = FlowConfig::from(&cli);
    let model: Arc<dyn GenerativeModel> = Arc::new(GeminiClient::new(
        cli.gemini_api_key.clone(),
        &cli.api_base,
        flow_config.text_model.clone(),
        flow_config.model_timeout,
    )?);

    let actions = Actions::new(
        HighlightFlow::new(model.clone(), flow_config.text_model.clone(), flow_config.top_k),
        TransitionFlow::new(
            model,
            flow_config.text_model.clone(),
            flow_config.image_model.clone(),
        ),
        cli.public_dir.clone(),
    );

    lookbook::web::setup_server(&cli.listen_address, cli.port, cli.public_dir, actions).await
}

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    let cli = CliOptions::parse();

    if let Err(err) = setup_logging(cli.debug) {
        eprintln!("Logging setup failed: {err}");
    }

    if let Err(err) = run(cli).await {
        error!("Application error: {}", err);
    }
}
