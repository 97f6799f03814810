//! Runtime configuration utilities for trial-assistant.

use std::{
    env,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use serde::Deserialize;

use crate::nlp::similarity::FuzzyScorer;

/// Which embedding provider backs the semantic resolution layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    OpenAi,
    Local,
    None,
}

impl FromStr for EmbeddingBackend {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "local" => Ok(Self::Local),
            "none" | "off" => Ok(Self::None),
            other => Err(format!("unknown embedding backend {other}")),
        }
    }
}

/// Application configuration resolved from `.env` and defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Root folder for precomputed artefacts.
    pub data_dir: PathBuf,
    /// Synonym vocabulary artefact (lower-cased term to equivalence group).
    pub synonyms_file: PathBuf,
    /// Term embedding cache artefact.
    pub embeddings_file: PathBuf,
    /// Treat a missing synonym vocabulary as a startup error.
    pub vocabulary_required: bool,
    /// Base URL of the document store.
    pub elasticsearch_host: String,
    /// Index holding trial documents.
    pub elasticsearch_index: String,
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    /// Chat model used for free-text entity extraction.
    pub extraction_model: String,
    pub embedding_model: String,
    pub embedding_backend: EmbeddingBackend,
    /// Timeout applied to every outbound HTTP call.
    pub request_timeout_ms: u64,
    pub fuzzy_cutoff: f64,
    pub embedding_threshold: f64,
    pub fuzzy_scorer: FuzzyScorer,
}

impl Settings {
    /// Load configuration from environment with reasonable defaults.
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let data_dir = env::var("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data"));
        let synonyms_file = env::var("SYNONYMS_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("mesh_synonyms.json"));
        let embeddings_file = env::var("EMBEDDINGS_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("embeddings_cache.json"));

        Ok(Self {
            data_dir,
            synonyms_file,
            embeddings_file,
            vocabulary_required: parsed("VOCABULARY_REQUIRED", false),
            elasticsearch_host: env::var("ELASTICSEARCH_HOST")
                .unwrap_or_else(|_| "http://localhost:9200".to_string()),
            elasticsearch_index: env::var("ELASTICSEARCH_INDEX")
                .unwrap_or_else(|_| "clinical_trials".to_string()),
            openai_api_key: env::var("OPENAI_API_KEY")
                .ok()
                .filter(|key| !key.trim().is_empty()),
            openai_base_url: env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            extraction_model: env::var("EXTRACTION_MODEL")
                .unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            embedding_model: env::var("EMBEDDING_MODEL")
                .unwrap_or_else(|_| "text-embedding-3-small".to_string()),
            embedding_backend: parsed("EMBEDDING_BACKEND", EmbeddingBackend::OpenAi),
            request_timeout_ms: parsed("REQUEST_TIMEOUT_MS", 10_000),
            fuzzy_cutoff: parsed("FUZZY_CUTOFF", crate::nlp::resolver::FUZZY_CUTOFF),
            embedding_threshold: parsed(
                "EMBEDDING_THRESHOLD",
                crate::nlp::resolver::EMBEDDING_THRESHOLD,
            ),
            fuzzy_scorer: parsed("FUZZY_SCORER", FuzzyScorer::Gestalt),
        })
    }

    /// Convenience helper for derived path segments.
    pub fn join_data<P: AsRef<Path>>(&self, path: P) -> PathBuf {
        self.data_dir.join(path)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

fn parsed<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
