use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use serde_json::json;

mod auth;
mod cli;
mod config;
mod extract;
mod lock;
mod semantic;
#[cfg(test)]
mod tests;
mod web;

use config::Config;
use extract::{PlainTextExtractor, TextExtractor};
use lock::FileLock;
use semantic::{EmbeddingModel, IndexStorage, SemanticIndexer};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = cli::Args::parse();
    let config = Config::load_with(&args.data_dir);

    // Daemon and CLI invocations share the data directory; the flock keeps
    // their index writes from interleaving.
    let _lock = FileLock::try_acquire(config.base_path())
        .context("another semdex instance is using this data directory")?;

    match args.command {
        cli::Command::Daemon {} => {
            let api_key = config.resolve_api_key().unwrap_or_else(|| {
                let key = config::generate_api_key();
                log::warn!("no API key configured; generated one for this run: {}", key);
                log::warn!(
                    "set api_key in config.yaml or {} for production",
                    config::API_KEY_ENV
                );
                key
            });

            let indexer = open_indexer(&config)?;
            web::start_daemon(Arc::new(indexer), config.listen_addr.clone(), api_key);
            Ok(())
        }

        cli::Command::Index { id, text, file } => {
            let text = match (text, file) {
                (Some(text), None) => text,
                (None, Some(path)) => read_file_text(&path)?,
                _ => bail!("provide exactly one of --text or --file"),
            };

            let indexer = open_indexer(&config)?;
            let outcome = indexer.index_document(&id, &text)?;

            let outcome = match outcome {
                semantic::IndexOutcome::Indexed => "indexed",
                semantic::IndexOutcome::AlreadyIndexed => "already_indexed",
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({"identifier": id, "outcome": outcome}))?
            );
            Ok(())
        }

        cli::Command::Search { query, k } => {
            let indexer = open_indexer(&config)?;
            let results = indexer.search(&query, k)?;
            println!("{}", serde_json::to_string_pretty(&results)?);
            Ok(())
        }

        cli::Command::Stats {} => {
            let indexer = open_indexer(&config)?;
            println!("{}", serde_json::to_string_pretty(&indexer.stats()?)?);
            Ok(())
        }
    }
}

/// Load the embedding model and open the index against the data directory.
fn open_indexer(config: &Config) -> anyhow::Result<SemanticIndexer> {
    let index_dir = config.index_dir();
    std::fs::create_dir_all(&index_dir).context("failed to create index directory")?;

    let model = EmbeddingModel::new(&config.index.model, config.base_path().to_path_buf())?;
    let storage = IndexStorage::new(index_dir);

    Ok(SemanticIndexer::open(
        Box::new(model),
        storage,
        config.index.clone(),
    )?)
}

/// Read a file and run it through the text extraction seam.
fn read_file_text(path: &Path) -> anyhow::Result<String> {
    let bytes = std::fs::read(path).with_context(|| format!("failed to read {:?}", path))?;

    // infer only recognizes magic-numbered formats; no match means the file
    // has no binary signature, which we treat as plain text
    let mime = infer::get(&bytes)
        .map(|kind| kind.mime_type().to_string())
        .unwrap_or_else(|| "text/plain".to_string());

    let text = PlainTextExtractor.extract(&bytes, &mime)?;
    Ok(text)
}
