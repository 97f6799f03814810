//! CLI entry-point for inspecting term resolution.

use anyhow::Result;
use clap::Args as ClapArgs;
use tracing::instrument;

use crate::{config::Settings, pipeline::build_resolver};

/// Args for the `resolve` command.
#[derive(Debug, Clone, ClapArgs)]
pub struct Args {
    /// Terms to resolve.
    #[arg(required = true)]
    pub terms: Vec<String>,
}

#[instrument(skip(settings))]
pub async fn run(args: Args, settings: Settings) -> Result<()> {
    let resolver = build_resolver(&settings)?;
    for term in &args.terms {
        let resolution = resolver.resolve_with_info(term).await;
        println!("{}", serde_json::to_string_pretty(&resolution)?);
    }
    Ok(())
}
