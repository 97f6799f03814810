//! Embedding providers and the precomputed term embedding cache.

use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
    time::Duration,
};

use futures::future::BoxFuture;
use indexmap::IndexMap;
use reqwest::Client;
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::error::{Error, Result};

#[cfg(feature = "embeddings")]
use fastembed::TextEmbedding;

/// Category of the curated term list used by the semantic resolution layer.
pub const CONDITIONS: &str = "conditions";
pub const INTERVENTIONS: &str = "interventions";

const BATCH_SIZE: usize = 500;

/// Anything able to turn text into a dense vector.
pub trait Embedder: Send + Sync {
    fn embed<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Vec<f32>>>;
}

/// OpenAI-compatible `/embeddings` client.
#[derive(Debug, Clone)]
pub struct OpenAiEmbedder {
    client: Client,
    url: String,
    api_key: String,
    model: String,
}

impl OpenAiEmbedder {
    pub fn new(base_url: &str, api_key: &str, model: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: format!("{}/embeddings", base_url.trim_end_matches('/')),
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }

    /// Embed many texts in one request; output follows input order.
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let body = serde_json::json!({ "model": self.model, "input": texts });
        let res = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        let json: Value = res.error_for_status()?.json().await?;
        let vectors = parse_embedding_response(json)?;
        if vectors.len() != texts.len() {
            return Err(Error::invalid_response(format!(
                "expected {} embeddings, received {}",
                texts.len(),
                vectors.len()
            )));
        }
        Ok(vectors)
    }
}

impl Embedder for OpenAiEmbedder {
    fn embed<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Vec<f32>>> {
        Box::pin(async move {
            let mut vectors = self.embed_batch(&[text.to_string()]).await?;
            vectors
                .pop()
                .ok_or_else(|| Error::invalid_response("embedding response was empty"))
        })
    }
}

fn parse_embedding_response(json: Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::invalid_response("embedding response is missing data array"))?;

    let mut indexed: Vec<(usize, Vec<f32>)> = Vec::with_capacity(data.len());
    for (fallback_index, item) in data.iter().enumerate() {
        let index = item
            .get("index")
            .and_then(Value::as_u64)
            .map(|v| v as usize)
            .unwrap_or(fallback_index);
        let embedding = item
            .get("embedding")
            .and_then(Value::as_array)
            .ok_or_else(|| Error::invalid_response("embedding item missing embedding array"))?;
        let vector = embedding
            .iter()
            .map(|value| {
                value
                    .as_f64()
                    .map(|n| n as f32)
                    .ok_or_else(|| Error::invalid_response("embedding value must be numeric"))
            })
            .collect::<Result<Vec<f32>>>()?;
        indexed.push((index, vector));
    }
    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, vector)| vector).collect())
}

/// In-process embeddings via fastembed.
#[cfg(feature = "embeddings")]
pub struct LocalEmbedder {
    model: std::sync::Mutex<TextEmbedding>,
}

#[cfg(feature = "embeddings")]
impl LocalEmbedder {
    pub fn try_new() -> Result<Self> {
        let model = TextEmbedding::try_new(Default::default())
            .map_err(|err| Error::NotConfigured { message: err.to_string() })?;
        Ok(Self {
            model: std::sync::Mutex::new(model),
        })
    }
}

#[cfg(feature = "embeddings")]
impl Embedder for LocalEmbedder {
    fn embed<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Vec<f32>>> {
        Box::pin(async move {
            #[allow(unused_mut)]
            let mut model = self
                .model
                .lock()
                .map_err(|_| Error::invalid_response("embedding model lock poisoned"))?;
            let mut vectors = model
                .embed(vec![text], None)
                .map_err(|err| Error::invalid_response(err.to_string()))?;
            vectors
                .pop()
                .ok_or_else(|| Error::invalid_response("embedding model returned nothing"))
        })
    }
}

/// Read-only `{category: {term: vector}}` table loaded at startup.
#[derive(Debug, Clone, Default)]
pub struct TermEmbeddings {
    categories: IndexMap<String, IndexMap<String, Vec<f32>>>,
}

impl TermEmbeddings {
    pub fn new(categories: IndexMap<String, IndexMap<String, Vec<f32>>>) -> Self {
        Self { categories }
    }

    #[instrument]
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|err| Error::io(path, err))?;
        let categories: IndexMap<String, IndexMap<String, Vec<f32>>> =
            serde_json::from_reader(BufReader::new(file))?;
        info!(
            conditions = categories.get(CONDITIONS).map_or(0, IndexMap::len),
            interventions = categories.get(INTERVENTIONS).map_or(0, IndexMap::len),
            "loaded term embeddings"
        );
        Ok(Self { categories })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|err| Error::io(parent, err))?;
        }
        let mut file = File::create(path).map_err(|err| Error::io(path, err))?;
        serde_json::to_writer(&mut file, &self.categories)?;
        file.flush().map_err(|err| Error::io(path, err))?;
        Ok(())
    }

    pub fn len(&self, category: &str) -> usize {
        self.categories.get(category).map_or(0, IndexMap::len)
    }

    /// Best cosine match within a category; the first of equally scored terms wins.
    ///
    /// Cached vectors whose dimension differs from `vector` never match.
    pub fn closest(&self, vector: &[f32], category: &str) -> Option<(&str, f64)> {
        let terms = self.categories.get(category)?;
        let mismatched = terms.values().filter(|c| c.len() != vector.len()).count();
        if mismatched > 0 {
            warn!(
                %category,
                mismatched,
                expected = vector.len(),
                "cached embeddings have a different dimension; rebuild the cache with the current model"
            );
        }
        let mut best: Option<(&str, f64)> = None;
        for (term, candidate) in terms {
            let score = f64::from(cosine(vector, candidate));
            if score > best.map_or(0.0, |(_, s)| s) {
                best = Some((term.as_str(), score));
            }
        }
        best
    }
}

/// Embed every term of every category, `BATCH_SIZE` texts per request.
pub async fn build_term_embeddings(
    embedder: &OpenAiEmbedder,
    terms: &IndexMap<String, Vec<String>>,
) -> Result<TermEmbeddings> {
    let mut categories = IndexMap::new();
    for (category, list) in terms {
        let mut vectors = IndexMap::new();
        for chunk in list.chunks(BATCH_SIZE) {
            let embedded = embedder.embed_batch(chunk).await?;
            for (term, vector) in chunk.iter().zip(embedded) {
                vectors.insert(term.clone(), vector);
            }
            info!(%category, done = vectors.len(), total = list.len(), "computed embeddings");
        }
        categories.insert(category.clone(), vectors);
    }
    Ok(TermEmbeddings { categories })
}

/// Cosine similarity; vectors of different dimension score 0.
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot = a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>();
    let norm_a = a.iter().map(|v| v * v).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_embeddings_in_index_order() {
        let json = serde_json::json!({
            "data": [
                { "index": 1, "embedding": [2.0, 3.0] },
                { "index": 0, "embedding": [0.5, 1.5] }
            ]
        });
        let parsed = parse_embedding_response(json).unwrap();
        assert_eq!(parsed, vec![vec![0.5, 1.5], vec![2.0, 3.0]]);
    }

    #[test]
    fn rejects_non_numeric_components() {
        let json = serde_json::json!({ "data": [{ "embedding": ["x"] }] });
        assert!(parse_embedding_response(json).is_err());
    }

    #[test]
    fn closest_prefers_highest_cosine() {
        let mut conditions = IndexMap::new();
        conditions.insert("asthma".to_string(), vec![1.0, 0.0]);
        conditions.insert("myocardial infarction".to_string(), vec![0.0, 1.0]);
        let mut categories = IndexMap::new();
        categories.insert(CONDITIONS.to_string(), conditions);
        let table = TermEmbeddings::new(categories);

        let (term, score) = table.closest(&[0.1, 0.9], CONDITIONS).unwrap();
        assert_eq!(term, "myocardial infarction");
        assert!(score > 0.9);
        assert!(table.closest(&[0.1, 0.9], INTERVENTIONS).is_none());
    }

    #[test]
    fn mismatched_dimensions_never_match() {
        assert_eq!(cosine(&[1.0, 0.0], &[1.0, 0.0, 0.0]), 0.0);

        let mut conditions = IndexMap::new();
        conditions.insert("asthma".to_string(), vec![1.0, 0.0, 0.0]);
        let mut categories = IndexMap::new();
        categories.insert(CONDITIONS.to_string(), conditions);
        let table = TermEmbeddings::new(categories);
        assert!(table.closest(&[1.0, 0.0], CONDITIONS).is_none());
    }

    #[test]
    fn cosine_of_zero_vector_is_zero() {
        assert_eq!(cosine(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }
}
