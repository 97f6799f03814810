//! Term resolution cascade: exact vocabulary hit, fuzzy key match, semantic match.
//!
//! Each layer is a [`ResolutionLayer`]; [`TermResolver`] walks them in order and stops
//! at the first hit. A term no layer resolves comes back as itself.

use std::sync::Arc;

use futures::future::{self, BoxFuture};
use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::nlp::{
    embeddings::{Embedder, TermEmbeddings, CONDITIONS},
    similarity::{ratio_of, FuzzyScorer},
    vocabulary::{dedupe, Vocabulary},
};

/// Minimum string similarity for a fuzzy hit.
pub const FUZZY_CUTOFF: f64 = 0.85;
/// Minimum cosine similarity for a semantic hit.
pub const EMBEDDING_THRESHOLD: f64 = 0.60;

/// Which layer produced a resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchLayer {
    Exact,
    Fuzzy,
    #[serde(rename = "embedding")]
    Semantic,
    None,
}

/// A hit reported by one layer.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerMatch {
    pub matched_term: String,
    pub confidence: f64,
    pub synonyms: Vec<String>,
}

/// Resolution outcome with diagnostic metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolution {
    pub original: String,
    pub matched_term: Option<String>,
    #[serde(rename = "match_type")]
    pub layer: MatchLayer,
    pub confidence: f64,
    pub synonyms: Vec<String>,
}

/// One step of the cascade.
pub trait ResolutionLayer: Send + Sync {
    fn layer(&self) -> MatchLayer;

    /// `term` is already trimmed and non-empty.
    fn attempt<'a>(&'a self, term: &'a str) -> BoxFuture<'a, Option<LayerMatch>>;
}

pub struct ExactLayer {
    vocabulary: Arc<Vocabulary>,
}

impl ExactLayer {
    pub fn new(vocabulary: Arc<Vocabulary>) -> Self {
        Self { vocabulary }
    }
}

impl ResolutionLayer for ExactLayer {
    fn layer(&self) -> MatchLayer {
        MatchLayer::Exact
    }

    fn attempt<'a>(&'a self, term: &'a str) -> BoxFuture<'a, Option<LayerMatch>> {
        let hit = self.vocabulary.lookup(term).map(|group| LayerMatch {
            matched_term: term.to_string(),
            confidence: 1.0,
            synonyms: group.to_vec(),
        });
        Box::pin(future::ready(hit))
    }
}

pub struct FuzzyLayer {
    vocabulary: Arc<Vocabulary>,
    cutoff: f64,
    scorer: FuzzyScorer,
}

impl FuzzyLayer {
    pub fn new(vocabulary: Arc<Vocabulary>, cutoff: f64, scorer: FuzzyScorer) -> Self {
        Self {
            vocabulary,
            cutoff,
            scorer,
        }
    }

    /// Best-scoring vocabulary key at or above the cutoff.
    ///
    /// Ties on score resolve to the lexicographically greatest key.
    pub fn best_key(&self, term: &str) -> Option<(&str, f64)> {
        let needle = term.to_lowercase();
        let needle_chars: Vec<char> = needle.chars().collect();
        let mut best: Option<(&str, f64)> = None;
        for key in self.vocabulary.keys() {
            let key_chars: Vec<char> = key.chars().collect();
            if let Some(bound) = self.scorer.upper_bound(&needle_chars, &key_chars) {
                if bound < self.cutoff {
                    continue;
                }
            }
            let score = match self.scorer {
                FuzzyScorer::Gestalt => ratio_of(&needle_chars, &key_chars),
                other => other.score(&needle, key),
            };
            if score < self.cutoff {
                continue;
            }
            let better = match best {
                None => true,
                Some((best_key, best_score)) => {
                    score > best_score || (score == best_score && key > best_key)
                }
            };
            if better {
                best = Some((key, score));
            }
        }
        best
    }
}

impl ResolutionLayer for FuzzyLayer {
    fn layer(&self) -> MatchLayer {
        MatchLayer::Fuzzy
    }

    fn attempt<'a>(&'a self, term: &'a str) -> BoxFuture<'a, Option<LayerMatch>> {
        let hit = self.best_key(term).and_then(|(key, score)| {
            self.vocabulary.group(key).map(|group| LayerMatch {
                matched_term: key.to_string(),
                confidence: score,
                synonyms: group.to_vec(),
            })
        });
        Box::pin(future::ready(hit))
    }
}

pub struct SemanticLayer {
    vocabulary: Arc<Vocabulary>,
    embedder: Arc<dyn Embedder>,
    embeddings: Arc<TermEmbeddings>,
    category: String,
    threshold: f64,
}

impl SemanticLayer {
    pub fn new(
        vocabulary: Arc<Vocabulary>,
        embedder: Arc<dyn Embedder>,
        embeddings: Arc<TermEmbeddings>,
        threshold: f64,
    ) -> Self {
        Self {
            vocabulary,
            embedder,
            embeddings,
            category: CONDITIONS.to_string(),
            threshold,
        }
    }
}

impl ResolutionLayer for SemanticLayer {
    fn layer(&self) -> MatchLayer {
        MatchLayer::Semantic
    }

    fn attempt<'a>(&'a self, term: &'a str) -> BoxFuture<'a, Option<LayerMatch>> {
        Box::pin(async move {
            let vector = match self.embedder.embed(term).await {
                Ok(vector) => vector,
                Err(err) => {
                    warn!(%term, %err, "embedding lookup failed; skipping semantic layer");
                    return None;
                }
            };
            let (matched, confidence) = self.embeddings.closest(&vector, &self.category)?;
            if confidence < self.threshold {
                debug!(%term, %matched, confidence, "semantic match below threshold");
                return None;
            }
            let group = self.vocabulary.lookup(matched)?;
            Some(LayerMatch {
                matched_term: matched.to_string(),
                confidence,
                synonyms: group.to_vec(),
            })
        })
    }
}

/// Ordered chain of resolution layers.
pub struct TermResolver {
    layers: Vec<Box<dyn ResolutionLayer>>,
}

impl TermResolver {
    pub fn new(layers: Vec<Box<dyn ResolutionLayer>>) -> Self {
        Self { layers }
    }

    /// Exact and fuzzy layers over `vocabulary`, plus the semantic layer when both an
    /// embedder and term embeddings are available.
    pub fn standard(
        vocabulary: Arc<Vocabulary>,
        semantic: Option<(Arc<dyn Embedder>, Arc<TermEmbeddings>)>,
        fuzzy_cutoff: f64,
        embedding_threshold: f64,
        scorer: FuzzyScorer,
    ) -> Self {
        let mut layers: Vec<Box<dyn ResolutionLayer>> = vec![
            Box::new(ExactLayer::new(vocabulary.clone())),
            Box::new(FuzzyLayer::new(vocabulary.clone(), fuzzy_cutoff, scorer)),
        ];
        if let Some((embedder, embeddings)) = semantic {
            layers.push(Box::new(SemanticLayer::new(
                vocabulary,
                embedder,
                embeddings,
                embedding_threshold,
            )));
        }
        Self { layers }
    }

    /// A resolver with no layers; every term resolves to itself.
    pub fn passthrough() -> Self {
        Self { layers: Vec::new() }
    }

    pub fn layers(&self) -> impl Iterator<Item = MatchLayer> + '_ {
        self.layers.iter().map(|layer| layer.layer())
    }

    /// Equivalent vocabulary terms for `term`; empty only for blank input.
    pub async fn resolve(&self, term: &str) -> Vec<String> {
        self.resolve_with_info(term).await.synonyms
    }

    #[instrument(skip(self))]
    pub async fn resolve_with_info(&self, term: &str) -> Resolution {
        let trimmed = term.trim();
        if trimmed.is_empty() {
            return Resolution {
                original: term.to_string(),
                matched_term: None,
                layer: MatchLayer::None,
                confidence: 0.0,
                synonyms: Vec::new(),
            };
        }

        for layer in &self.layers {
            if let Some(hit) = layer.attempt(trimmed).await {
                let synonyms = dedupe(hit.synonyms);
                if synonyms.is_empty() {
                    continue;
                }
                debug!(layer = ?layer.layer(), matched = %hit.matched_term, confidence = hit.confidence, "term resolved");
                return Resolution {
                    original: trimmed.to_string(),
                    matched_term: Some(hit.matched_term),
                    layer: layer.layer(),
                    confidence: hit.confidence,
                    synonyms,
                };
            }
        }

        debug!("no resolution; falling back to original term");
        Resolution {
            original: trimmed.to_string(),
            matched_term: None,
            layer: MatchLayer::None,
            confidence: 0.0,
            synonyms: vec![trimmed.to_string()],
        }
    }
}
