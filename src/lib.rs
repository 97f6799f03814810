//! Natural-language clinical trial search: entity extraction, term resolution
//! and query compilation against an Elasticsearch trial index.

pub mod api;
pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod logging;
pub mod nlp;
pub mod pipeline;
pub mod query;
pub mod store;

pub use error::{Error, Result};
