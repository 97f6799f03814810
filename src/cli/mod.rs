//! Command-line interface wiring for trial-assistant.

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::config::Settings;

pub mod build_vocabulary;
pub mod compile;
pub mod embed;
pub mod resolve;
pub mod search;
pub mod serve;

/// Top-level CLI definition.
#[derive(Debug, Parser)]
#[command(author, version, about = "Natural-language clinical trial search", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    /// Parse CLI arguments from the environment.
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    /// Dispatch the selected sub-command.
    pub async fn dispatch(self, settings: Settings) -> Result<()> {
        match self.command {
            Commands::Serve(args) => serve::run(args, settings).await,
            Commands::Search(args) => search::run(args, settings).await,
            Commands::Resolve(args) => resolve::run(args, settings).await,
            Commands::Compile(args) => compile::run(args, settings).await,
            Commands::BuildVocabulary(args) => build_vocabulary::run(args, settings).await,
            Commands::Embed(args) => embed::run(args, settings).await,
        }
    }
}

/// Supported sub-commands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Serve the JSON search API.
    Serve(serve::Args),
    /// Run one natural-language search and print the JSON response.
    Search(search::Args),
    /// Show how a medical term resolves against the vocabulary.
    Resolve(resolve::Args),
    /// Compile a raw entity JSON object into a document-store query.
    Compile(compile::Args),
    /// Build the synonym vocabulary from a MeSH descriptor XML file.
    BuildVocabulary(build_vocabulary::Args),
    /// Precompute term embeddings for semantic resolution.
    Embed(embed::Args),
}
