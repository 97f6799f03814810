//! Process-wide search pipeline: read-only resolver state plus outbound clients.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::{
    config::{EmbeddingBackend, Settings},
    data::EntityMap,
    nlp::{
        self,
        embeddings::{Embedder, OpenAiEmbedder, TermEmbeddings, CONDITIONS},
        extract::{DisabledExtractor, Extractor, OpenAiExtractor},
        resolver::TermResolver,
        vocabulary::Vocabulary,
        Understanding,
    },
    query::{Pagination, QueryCompiler},
    store::{format::{format_hit, ResultRecord}, ElasticStore},
};

/// Response of one natural-language search round-trip.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub query: String,
    pub interpretation: String,
    pub entities: EntityMap,
    pub total: u64,
    pub page: u64,
    pub size: u64,
    pub total_pages: u64,
    pub results: Vec<ResultRecord>,
}

/// Everything a request needs; built once at startup and shared read-only.
pub struct Pipeline {
    pub extractor: Arc<dyn Extractor>,
    pub resolver: Arc<TermResolver>,
    pub store: ElasticStore,
}

impl Pipeline {
    pub fn new(
        extractor: Arc<dyn Extractor>,
        resolver: Arc<TermResolver>,
        store: ElasticStore,
    ) -> Self {
        Self {
            extractor,
            resolver,
            store,
        }
    }

    /// Load artefacts and construct clients from settings.
    #[instrument(skip(settings))]
    pub fn bootstrap(settings: &Settings) -> Result<Self> {
        let resolver = build_resolver(settings)?;
        let extractor: Arc<dyn Extractor> = match &settings.openai_api_key {
            Some(key) => Arc::new(OpenAiExtractor::new(
                &settings.openai_base_url,
                key,
                &settings.extraction_model,
                settings.request_timeout(),
            )?),
            None => {
                warn!("OPENAI_API_KEY not set; entity extraction disabled");
                Arc::new(DisabledExtractor)
            }
        };
        let store = ElasticStore::new(
            &settings.elasticsearch_host,
            &settings.elasticsearch_index,
            settings.request_timeout(),
        )?;
        Ok(Self::new(extractor, Arc::new(resolver), store))
    }

    pub async fn understand(&self, query: &str) -> Understanding {
        nlp::understand(self.extractor.as_ref(), &self.resolver, query).await
    }

    /// Full round-trip; store failures come back as an unsuccessful, empty response.
    #[instrument(skip(self))]
    pub async fn search(&self, query: &str, page: i64, size: i64) -> SearchResponse {
        let window = Pagination::new(page, size);
        let understanding = self.understand(query).await;
        let compiled = QueryCompiler::new(&self.resolver)
            .compile(&understanding.entities, page, size)
            .await;

        match self.store.search(&compiled).await {
            Ok(hits) => SearchResponse {
                success: true,
                error: None,
                query: query.to_string(),
                interpretation: understanding.interpretation,
                entities: understanding.entities,
                total: hits.total,
                page: window.page,
                size: window.size,
                total_pages: window.total_pages(hits.total),
                results: hits.hits.iter().map(format_hit).collect(),
            },
            Err(err) => {
                warn!(%err, "document store query failed");
                SearchResponse {
                    success: false,
                    error: Some(err.to_string()),
                    query: query.to_string(),
                    interpretation: String::new(),
                    entities: EntityMap::new(),
                    total: 0,
                    page: window.page,
                    size: window.size,
                    total_pages: 0,
                    results: Vec::new(),
                }
            }
        }
    }
}

/// Exact and fuzzy layers over the synonym vocabulary, semantic layer when possible.
pub fn build_resolver(settings: &Settings) -> Result<TermResolver> {
    let vocabulary = if settings.synonyms_file.exists() {
        Vocabulary::load(&settings.synonyms_file).context("loading synonym vocabulary")?
    } else if settings.vocabulary_required {
        bail!(
            "synonym vocabulary {} not found; run build-vocabulary first",
            settings.synonyms_file.display()
        );
    } else {
        warn!(
            path = %settings.synonyms_file.display(),
            "synonym vocabulary missing; terms resolve to themselves"
        );
        Vocabulary::empty()
    };

    let semantic = semantic_parts(settings)?;
    let resolver = TermResolver::standard(
        Arc::new(vocabulary),
        semantic,
        settings.fuzzy_cutoff,
        settings.embedding_threshold,
        settings.fuzzy_scorer,
    );
    info!(layers = ?resolver.layers().collect::<Vec<_>>(), "term resolver ready");
    Ok(resolver)
}

fn semantic_parts(
    settings: &Settings,
) -> Result<Option<(Arc<dyn Embedder>, Arc<TermEmbeddings>)>> {
    let embedder: Arc<dyn Embedder> = match settings.embedding_backend {
        EmbeddingBackend::None => return Ok(None),
        EmbeddingBackend::OpenAi => match &settings.openai_api_key {
            Some(key) => Arc::new(OpenAiEmbedder::new(
                &settings.openai_base_url,
                key,
                &settings.embedding_model,
                settings.request_timeout(),
            )?),
            None => {
                warn!("OPENAI_API_KEY not set; semantic resolution disabled");
                return Ok(None);
            }
        },
        EmbeddingBackend::Local => local_embedder()?,
    };

    if !settings.embeddings_file.exists() {
        warn!(
            path = %settings.embeddings_file.display(),
            "term embedding cache missing; semantic resolution disabled"
        );
        return Ok(None);
    }
    let embeddings = TermEmbeddings::load(&settings.embeddings_file)
        .context("loading term embeddings")?;
    if embeddings.len(CONDITIONS) == 0 {
        warn!("term embedding cache has no conditions; semantic resolution disabled");
        return Ok(None);
    }
    Ok(Some((embedder, Arc::new(embeddings))))
}

#[cfg(feature = "embeddings")]
fn local_embedder() -> Result<Arc<dyn Embedder>> {
    Ok(Arc::new(crate::nlp::embeddings::LocalEmbedder::try_new()?))
}

#[cfg(not(feature = "embeddings"))]
fn local_embedder() -> Result<Arc<dyn Embedder>> {
    bail!("EMBEDDING_BACKEND=local requires building with the `embeddings` feature")
}
