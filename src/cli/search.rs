//! CLI entry-point for a single natural-language search.

use anyhow::{bail, Result};
use clap::Args as ClapArgs;
use tracing::instrument;

use crate::{config::Settings, pipeline::Pipeline, query::DEFAULT_PAGE_SIZE};

/// Args for the `search` command.
#[derive(Debug, Clone, ClapArgs)]
pub struct Args {
    /// Free-text query, e.g. "recruiting phase 3 lung cancer trials in Boston".
    pub query: String,
    #[arg(long, default_value_t = 1)]
    pub page: i64,
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    pub size: i64,
}

#[instrument(skip(settings))]
pub async fn run(args: Args, settings: Settings) -> Result<()> {
    let pipeline = Pipeline::bootstrap(&settings)?;
    let response = pipeline.search(&args.query, args.page, args.size).await;
    println!("{}", serde_json::to_string_pretty(&response)?);
    if let Some(error) = response.error {
        bail!("search failed: {error}");
    }
    Ok(())
}
