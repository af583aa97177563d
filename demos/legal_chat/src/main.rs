use std::io::Write;
use std::sync::Arc;

use futures::StreamExt;
use ragchat::core::RagError;
use ragchat::engine::{ChatMode, Language, RagPipeline, RagSettings};
use ragchat::models::HttpBackend;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: legal_chat <question> [document.txt ...]

Environment:
  RAGCHAT_SETTINGS  settings JSON file (defaults apply when unset)
  RAGCHAT_LANGUAGE  en | vi | cs (default en)
  API_KEY           key for OpenAI models the settings file does not set
  RAGCHAT_LOG       log filter (default info)";

#[tokio::main]
async fn main() -> Result<(), RagError> {
    let filter =
        EnvFilter::try_from_env("RAGCHAT_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let mut args = std::env::args().skip(1);
    let Some(question) = args.next() else {
        eprintln!("{USAGE}");
        std::process::exit(2);
    };
    let files: Vec<String> = args.collect();

    let settings = match std::env::var("RAGCHAT_SETTINGS") {
        Ok(path) => RagSettings::from_file(&path).await?,
        Err(_) => {
            let mut settings = RagSettings::default();
            settings.fill_missing_keys(std::env::var(ragchat::engine::API_KEY_ENV).ok());
            settings.validate()?;
            settings
        }
    };
    let language = std::env::var("RAGCHAT_LANGUAGE")
        .map(|tag| Language::from_tag(&tag))
        .unwrap_or_default();

    let backend = Arc::new(HttpBackend::with_timeout(settings.llm.request_timeout())?);
    let mut pipeline = RagPipeline::from_settings(settings, backend)?;
    pipeline.set_language(language);

    if !files.is_empty() {
        let chunks = pipeline.store_files(&files).await?;
        tracing::info!(files = files.len(), chunks, "documents ingested");
    }
    pipeline.set_engine().await?;

    let mut turn = pipeline.query(ChatMode::Qa, &question, Vec::new()).await?;
    let mut stdout = std::io::stdout();
    while let Some(chunk) = turn.stream.next().await {
        print!("{}", chunk?.content);
        let _ = stdout.flush();
    }
    println!();

    if !turn.sources.is_empty() {
        println!("\nSources:");
        for (i, source) in turn.sources.iter().enumerate() {
            let file = source.chunk.file_name().unwrap_or("unknown");
            println!("  [{}] {file} (score {:.3})", i + 1, source.score);
        }
    }
    Ok(())
}
