//! Natural language understanding: extraction, normalisation and term resolution.

pub mod embeddings;
pub mod extract;
pub mod resolver;
pub mod similarity;
pub mod vocabulary;

use indexmap::IndexMap;
use serde::Serialize;
use tracing::{info, instrument};

use crate::data::{
    entities::{normalize, AttributeKind, EntityMap},
    interpret::{interpret, EXTRACTION_FAILED},
};

use self::{extract::Extractor, resolver::TermResolver};

/// What the system understood from one free-text query.
#[derive(Debug, Clone, Serialize)]
pub struct Understanding {
    pub success: bool,
    pub entities: EntityMap,
    pub interpretation: String,
    pub raw_query: String,
}

/// Extract, normalise, expand condition synonyms and render the interpretation.
#[instrument(skip(extractor, resolver))]
pub async fn understand(
    extractor: &dyn Extractor,
    resolver: &TermResolver,
    query: &str,
) -> Understanding {
    let raw = extractor.extract(query).await;
    if raw.is_empty() {
        info!("extractor returned no entities");
        return Understanding {
            success: false,
            entities: EntityMap::new(),
            interpretation: EXTRACTION_FAILED.to_string(),
            raw_query: query.to_string(),
        };
    }

    let mut entities = normalize(&raw);
    attach_condition_synonyms(&mut entities, resolver).await;
    let interpretation = interpret(&entities);
    info!(%interpretation, "understood query");

    Understanding {
        success: true,
        entities,
        interpretation,
        raw_query: query.to_string(),
    }
}

/// Record the synonym expansion of every condition that resolves to several terms.
pub async fn attach_condition_synonyms(entities: &mut EntityMap, resolver: &TermResolver) {
    let mut expansions = IndexMap::new();
    for condition in entities.values(AttributeKind::Condition) {
        let resolution = resolver.resolve_with_info(condition).await;
        if resolution.synonyms.len() > 1 {
            expansions.insert(condition.clone(), resolution.synonyms);
        }
    }
    entities.condition_synonyms = expansions;
}
