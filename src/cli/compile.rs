//! CLI entry-point for compiling raw entities without calling the extractor.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args as ClapArgs;
use serde_json::Value;
use tracing::instrument;

use crate::{
    config::Settings,
    data::{interpret, normalize},
    nlp::attach_condition_synonyms,
    pipeline::build_resolver,
    query::{QueryCompiler, DEFAULT_PAGE_SIZE},
};

/// Args for the `compile` command.
#[derive(Debug, Clone, ClapArgs)]
pub struct Args {
    /// Raw entity JSON object, e.g. '{"condition": "asthma", "phase": "PHASE3"}'.
    #[arg(long, conflicts_with = "file", required_unless_present = "file")]
    pub entities: Option<String>,
    /// Read the raw entity JSON object from a file instead.
    #[arg(long)]
    pub file: Option<PathBuf>,
    #[arg(long, default_value_t = 1)]
    pub page: i64,
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    pub size: i64,
}

#[instrument(skip(settings))]
pub async fn run(args: Args, settings: Settings) -> Result<()> {
    let text = match (&args.entities, &args.file) {
        (Some(inline), _) => inline.clone(),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?,
        (None, None) => bail!("provide --entities or --file"),
    };
    let raw = match serde_json::from_str::<Value>(&text).context("parsing entity JSON")? {
        Value::Object(map) => map,
        _ => bail!("entities must be a JSON object"),
    };

    let resolver = build_resolver(&settings)?;
    let mut entities = normalize(&raw);
    attach_condition_synonyms(&mut entities, &resolver).await;
    let compiled = QueryCompiler::new(&resolver)
        .compile(&entities, args.page, args.size)
        .await;

    let output = serde_json::json!({
        "interpretation": interpret(&entities),
        "entities": entities,
        "query": compiled,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
