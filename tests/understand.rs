use std::sync::Arc;

use futures::future::{self, BoxFuture};
use serde_json::json;
use trial_assistant::{
    data::{interpret::EXTRACTION_FAILED, AttributeKind, RawEntityMap},
    nlp::{
        extract::{DisabledExtractor, Extractor},
        resolver::{ExactLayer, ResolutionLayer, TermResolver},
        understand,
        vocabulary::Vocabulary,
    },
};

/// Replays a canned extraction.
struct CannedExtractor(RawEntityMap);

impl Extractor for CannedExtractor {
    fn extract<'a>(&'a self, _query: &'a str) -> BoxFuture<'a, RawEntityMap> {
        Box::pin(future::ready(self.0.clone()))
    }
}

fn resolver() -> TermResolver {
    let vocabulary = Arc::new(Vocabulary::from_groups([(
        "lung cancer",
        vec!["Lung Neoplasms", "Lung Cancer", "Pulmonary Neoplasms"],
    )]));
    let layers: Vec<Box<dyn ResolutionLayer>> = vec![Box::new(ExactLayer::new(vocabulary))];
    TermResolver::new(layers)
}

#[tokio::test]
async fn understanding_expands_conditions_and_interprets() {
    let extractor = CannedExtractor(
        json!({ "condition": "lung cancer", "status": "RECRUITING", "location": "Boston" })
            .as_object()
            .cloned()
            .unwrap(),
    );
    let understanding = understand(&extractor, &resolver(), "recruiting lung cancer trials in Boston").await;

    assert!(understanding.success);
    assert_eq!(understanding.entities.values(AttributeKind::Location), ["Boston"]);
    assert_eq!(
        understanding.entities.condition_synonyms["lung cancer"],
        ["Lung Neoplasms", "Lung Cancer", "Pulmonary Neoplasms"]
    );
    assert_eq!(
        understanding.interpretation,
        "We understood: Condition = lung cancer → Expanded to: Lung Neoplasms, Lung Cancer, \
         Pulmonary Neoplasms, Status = RECRUITING, Location = Boston"
    );
}

#[tokio::test]
async fn unresolved_conditions_get_no_expansion() {
    let extractor = CannedExtractor(json!({ "condition": "vitiligo" }).as_object().cloned().unwrap());
    let understanding = understand(&extractor, &resolver(), "vitiligo").await;
    assert!(understanding.entities.condition_synonyms.is_empty());
    assert_eq!(understanding.interpretation, "We understood: Condition = vitiligo");
}

#[tokio::test]
async fn empty_extraction_is_reported() {
    let understanding = understand(&DisabledExtractor, &resolver(), "anything").await;
    assert!(!understanding.success);
    assert!(understanding.entities.is_unconstrained());
    assert_eq!(understanding.interpretation, EXTRACTION_FAILED);
    assert_eq!(understanding.raw_query, "anything");
}
