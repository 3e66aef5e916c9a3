pub mod ai;
pub mod cli;
pub mod config;
pub mod error;
pub mod extract;
pub mod pipeline;
pub mod placement;
pub mod tree;

pub use config::{AppConfig, OcrMethod, PipelineMode};
pub use error::{DocsortError, Result};
pub use extract::{ImageToText, TextExtractor};
pub use pipeline::{Categorization, Categorizer};
pub use placement::FileMover;
pub use tree::DirectoryTree;

use ai::client::CompletionClient;
use clap::Parser;
use cli::{print_error_box, Cli};
use extract::{TesseractOcr, VisionOcr};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

pub async fn run() -> ExitCode {
    // Load .env file from the working directory, then the parent
    if dotenvy::dotenv().is_err() {
        let _ = dotenvy::from_path("../.env");
    }

    // Default: warn for most crates, info for ours
    // Use RUST_LOG=debug for per-request logs
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,docsort=info")),
        )
        .init();

    let cli = Cli::parse();

    match execute(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!("[Startup] {}", e);
            print_error_box(&e.to_string());
            ExitCode::FAILURE
        }
    }
}

/// Returns whether every requested file was moved
async fn execute(cli: Cli) -> Result<bool> {
    let mut config = AppConfig::from_env()?;
    if let Some(mode) = cli.mode {
        config.pipeline_mode = mode;
    }
    if let Some(ocr) = cli.ocr {
        config.ocr_method = ocr;
    }

    let tree = Arc::new(DirectoryTree::scan(&config.reference_dir)?);

    if cli.show_tree {
        print!("{}", tree.render_ascii(cli::SHOW_TREE_FILES));
        return Ok(true);
    }

    if cli.paths.is_empty() {
        print_error_box("No files provided");
        return Ok(false);
    }

    let (files, missing) = cli::expand_paths(&cli.paths);
    for path in &missing {
        print_error_box(&format!("File not found: {}", path.display()));
    }

    let strategy: Arc<dyn ImageToText> = match config.ocr_method {
        OcrMethod::Ollama => Arc::new(VisionOcr::new(CompletionClient::new(
            &config.base_url,
            &config.image_model,
        ))),
        OcrMethod::Tesseract => Arc::new(TesseractOcr::new(&config.ocr_language)),
    };

    tracing::info!(
        "[Startup] chat={} image={} at {}, mode={}, ocr={}",
        config.chat_model,
        config.image_model,
        config.base_url,
        config.pipeline_mode.as_str(),
        config.ocr_method.as_str()
    );

    let categorizer = Categorizer::new(
        Arc::new(CompletionClient::new(&config.base_url, &config.chat_model)),
        tree,
        TextExtractor::new(strategy),
        config.pipeline_mode,
    );
    let mover = FileMover::new(config.destination_dir.clone());

    let summary = cli::run_batch(&categorizer, &mover, &files).await;
    Ok(summary.failed == 0 && missing.is_empty())
}
