//! CLI entry-point for building the synonym vocabulary from MeSH.

use std::{fs::File, io::BufReader, path::PathBuf};

use anyhow::{Context, Result};
use clap::Args as ClapArgs;
use tracing::{info, instrument};

use crate::{config::Settings, nlp::vocabulary};

/// Args for the `build-vocabulary` command.
#[derive(Debug, Clone, ClapArgs)]
pub struct Args {
    /// MeSH descriptor XML (e.g. desc2026.xml).
    #[arg(long)]
    pub mesh_xml: PathBuf,
    /// Output path; defaults to the configured synonyms file.
    #[arg(long)]
    pub output: Option<PathBuf>,
}

#[instrument(skip(settings))]
pub async fn run(args: Args, settings: Settings) -> Result<()> {
    let file = File::open(&args.mesh_xml)
        .with_context(|| format!("opening {}", args.mesh_xml.display()))?;
    let output = args.output.unwrap_or(settings.synonyms_file);
    let vocabulary = tokio::task::spawn_blocking(move || {
        vocabulary::build_from_mesh(BufReader::new(file))
    })
    .await??;
    vocabulary.save(&output)?;
    info!(path = %output.display(), mappings = vocabulary.len(), "wrote synonym vocabulary");
    Ok(())
}
