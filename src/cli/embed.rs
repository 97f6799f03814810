//! CLI entry-point for precomputing term embeddings.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args as ClapArgs;
use indexmap::IndexMap;
use tracing::{info, instrument};

use crate::{
    config::Settings,
    nlp::embeddings::{build_term_embeddings, OpenAiEmbedder},
};

/// Args for the `embed` command.
#[derive(Debug, Clone, ClapArgs)]
pub struct Args {
    /// JSON object of term lists per category, e.g. {"conditions": [...], "interventions": [...]}.
    #[arg(long)]
    pub terms: Option<PathBuf>,
    /// Output path; defaults to the configured embeddings file.
    #[arg(long)]
    pub output: Option<PathBuf>,
}

#[instrument(skip(settings))]
pub async fn run(args: Args, settings: Settings) -> Result<()> {
    let Some(api_key) = settings.openai_api_key.as_deref() else {
        bail!("OPENAI_API_KEY is required to compute embeddings");
    };
    let terms_path = args
        .terms
        .unwrap_or_else(|| settings.join_data("unique_terms.json"));
    let text = tokio::fs::read_to_string(&terms_path)
        .await
        .with_context(|| format!("reading {}", terms_path.display()))?;
    let terms: IndexMap<String, Vec<String>> =
        serde_json::from_str(&text).context("parsing term lists")?;

    let embedder = OpenAiEmbedder::new(
        &settings.openai_base_url,
        api_key,
        &settings.embedding_model,
        settings.request_timeout(),
    )?;
    let table = build_term_embeddings(&embedder, &terms).await?;
    let output = args.output.unwrap_or(settings.embeddings_file);
    table.save(&output)?;
    info!(path = %output.display(), "wrote term embeddings");
    Ok(())
}
