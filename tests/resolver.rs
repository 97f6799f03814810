use std::sync::Arc;

use futures::future::{self, BoxFuture};
use indexmap::IndexMap;
use trial_assistant::{
    nlp::{
        embeddings::{Embedder, TermEmbeddings, CONDITIONS},
        resolver::{MatchLayer, TermResolver, EMBEDDING_THRESHOLD, FUZZY_CUTOFF},
        similarity::{self, FuzzyScorer},
        vocabulary::Vocabulary,
    },
    Error,
};

/// Returns the same vector for every input.
struct FixedEmbedder(Vec<f32>);

impl Embedder for FixedEmbedder {
    fn embed<'a>(&'a self, _text: &'a str) -> BoxFuture<'a, trial_assistant::Result<Vec<f32>>> {
        Box::pin(future::ready(Ok(self.0.clone())))
    }
}

struct FailingEmbedder;

impl Embedder for FailingEmbedder {
    fn embed<'a>(&'a self, _text: &'a str) -> BoxFuture<'a, trial_assistant::Result<Vec<f32>>> {
        Box::pin(future::ready(Err(Error::NotConfigured {
            message: "embedding service timed out".into(),
        })))
    }
}

fn vocabulary() -> Arc<Vocabulary> {
    Arc::new(Vocabulary::from_groups([
        ("lung cancer", vec!["Lung Neoplasms", "Lung Cancer", "Pulmonary Neoplasms"]),
        ("lung neoplasms", vec!["Lung Neoplasms", "Lung Cancer", "Pulmonary Neoplasms"]),
        ("myocardial infarction", vec!["Myocardial Infarction", "Heart Attack"]),
        ("abcdefghijx", vec!["Group X"]),
        ("abcdefghijy", vec!["Group Y"]),
        ("abcdefghijklmnopqrst", vec!["Alphabet"]),
    ]))
}

fn term_embeddings(entries: &[(&str, Vec<f32>)]) -> Arc<TermEmbeddings> {
    let conditions: IndexMap<String, Vec<f32>> = entries
        .iter()
        .map(|(term, vector)| (term.to_string(), vector.clone()))
        .collect();
    let mut categories = IndexMap::new();
    categories.insert(CONDITIONS.to_string(), conditions);
    Arc::new(TermEmbeddings::new(categories))
}

fn resolver_with(embedder: Arc<dyn Embedder>, embeddings: Arc<TermEmbeddings>) -> TermResolver {
    TermResolver::standard(
        vocabulary(),
        Some((embedder, embeddings)),
        FUZZY_CUTOFF,
        EMBEDDING_THRESHOLD,
        FuzzyScorer::Gestalt,
    )
}

fn lexical_resolver() -> TermResolver {
    TermResolver::standard(
        vocabulary(),
        None,
        FUZZY_CUTOFF,
        EMBEDDING_THRESHOLD,
        FuzzyScorer::Gestalt,
    )
}

#[tokio::test]
async fn exact_match_is_case_and_whitespace_insensitive() {
    let resolver = lexical_resolver();
    let info = resolver.resolve_with_info("  Lung Cancer ").await;
    assert_eq!(info.layer, MatchLayer::Exact);
    assert_eq!(info.original, "Lung Cancer");
    assert_eq!(info.confidence, 1.0);
    assert_eq!(
        info.synonyms,
        ["Lung Neoplasms", "Lung Cancer", "Pulmonary Neoplasms"]
    );
}

#[tokio::test]
async fn misspelling_resolves_through_fuzzy_layer() {
    let resolver = lexical_resolver();
    let info = resolver.resolve_with_info("lung cancr").await;
    assert_eq!(info.layer, MatchLayer::Fuzzy);
    assert_eq!(info.matched_term.as_deref(), Some("lung cancer"));
    assert!((info.confidence - 20.0 / 21.0).abs() < 1e-9);
    assert_eq!(info.synonyms[0], "Lung Neoplasms");
}

#[tokio::test]
async fn fuzzy_cutoff_is_inclusive() {
    let resolver = lexical_resolver();
    // 17 shared characters over 40 total: exactly 0.85.
    let info = resolver.resolve_with_info("abcdefghijklmnopq123").await;
    assert_eq!(info.layer, MatchLayer::Fuzzy);
    assert_eq!(info.synonyms, ["Alphabet"]);

    // 16 shared characters over 40 total: 0.80, below the cutoff.
    let info = resolver.resolve_with_info("abcdefghijklmnop1234").await;
    assert_eq!(info.layer, MatchLayer::None);
    assert_eq!(info.synonyms, ["abcdefghijklmnop1234"]);
}

#[tokio::test]
async fn ratio_just_below_cutoff_does_not_match() {
    let resolver = TermResolver::standard(
        Arc::new(Vocabulary::from_groups([("abcdefghijklmnopqrstuvwxy", vec!["Alphabet"])])),
        None,
        FUZZY_CUTOFF,
        EMBEDDING_THRESHOLD,
        FuzzyScorer::Gestalt,
    );
    // 21 shared characters over 50 total: exactly 0.84.
    assert_eq!(
        similarity::sequence_ratio("abcdefghijklmnopqrstu1234", "abcdefghijklmnopqrstuvwxy"),
        0.84
    );
    let info = resolver.resolve_with_info("abcdefghijklmnopqrstu1234").await;
    assert_eq!(info.layer, MatchLayer::None);
    assert_eq!(info.synonyms, ["abcdefghijklmnopqrstu1234"]);
}

#[tokio::test]
async fn fuzzy_ties_prefer_greatest_key() {
    let resolver = lexical_resolver();
    let info = resolver.resolve_with_info("abcdefghijz").await;
    assert_eq!(info.layer, MatchLayer::Fuzzy);
    assert_eq!(info.matched_term.as_deref(), Some("abcdefghijy"));
    assert_eq!(info.synonyms, ["Group Y"]);
}

#[tokio::test]
async fn semantic_layer_maps_to_vocabulary_group() {
    let resolver = resolver_with(
        Arc::new(FixedEmbedder(vec![0.1, 0.9])),
        term_embeddings(&[
            ("asthma", vec![1.0, 0.0]),
            ("myocardial infarction", vec![0.0, 1.0]),
        ]),
    );
    let info = resolver.resolve_with_info("widowmaker").await;
    assert_eq!(info.layer, MatchLayer::Semantic);
    assert_eq!(info.matched_term.as_deref(), Some("myocardial infarction"));
    assert!(info.confidence >= EMBEDDING_THRESHOLD);
    assert_eq!(info.synonyms, ["Myocardial Infarction", "Heart Attack"]);
}

#[tokio::test]
async fn semantic_match_below_threshold_falls_back() {
    let resolver = resolver_with(
        Arc::new(FixedEmbedder(vec![1.0, 0.5])),
        term_embeddings(&[("myocardial infarction", vec![0.0, 1.0])]),
    );
    assert_eq!(resolver.resolve("widowmaker").await, ["widowmaker"]);
}

#[tokio::test]
async fn semantic_match_without_group_falls_back() {
    let resolver = resolver_with(
        Arc::new(FixedEmbedder(vec![0.0, 1.0])),
        term_embeddings(&[("unlisted syndrome", vec![0.0, 1.0])]),
    );
    let info = resolver.resolve_with_info("widowmaker").await;
    assert_eq!(info.layer, MatchLayer::None);
    assert_eq!(info.synonyms, ["widowmaker"]);
}

#[tokio::test]
async fn embedder_failure_is_a_layer_miss() {
    let resolver = resolver_with(
        Arc::new(FailingEmbedder),
        term_embeddings(&[("myocardial infarction", vec![0.0, 1.0])]),
    );
    let info = resolver.resolve_with_info(" widowmaker ").await;
    assert_eq!(info.layer, MatchLayer::None);
    assert_eq!(info.confidence, 0.0);
    assert_eq!(info.synonyms, ["widowmaker"]);
}

#[tokio::test]
async fn blank_terms_resolve_to_nothing() {
    let resolver = lexical_resolver();
    assert!(resolver.resolve("").await.is_empty());
    assert!(resolver.resolve("   ").await.is_empty());
}

#[tokio::test]
async fn resolution_serializes_layer_as_match_type() {
    let resolver = lexical_resolver();
    let info = resolver.resolve_with_info("unknown term").await;
    let json = serde_json::to_value(&info).unwrap();
    assert_eq!(json["match_type"], "none");
    assert_eq!(json["matched_term"], serde_json::Value::Null);
    assert_eq!(json["synonyms"], serde_json::json!(["unknown term"]));
}

#[tokio::test]
async fn passthrough_resolver_returns_the_term() {
    let resolver = TermResolver::passthrough();
    assert_eq!(resolver.resolve("Asthma").await, ["Asthma"]);
    assert_eq!(resolver.layers().count(), 0);
}
