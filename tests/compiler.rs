use std::sync::Arc;

use serde_json::json;
use trial_assistant::{
    data::{normalize, AttributeKind, Combinator, EntityMap},
    nlp::{
        resolver::{ExactLayer, ResolutionLayer, TermResolver},
        vocabulary::Vocabulary,
    },
    query::{Clause, QueryCompiler},
};

fn resolver() -> TermResolver {
    let vocabulary = Arc::new(Vocabulary::from_groups([
        ("lung cancer", vec!["Lung Neoplasms", "Lung Cancer"]),
        ("diabetes", vec!["Diabetes Mellitus"]),
    ]));
    let layers: Vec<Box<dyn ResolutionLayer>> = vec![Box::new(ExactLayer::new(vocabulary))];
    TermResolver::new(layers)
}

async fn compile(entities: &EntityMap, page: i64, size: i64) -> serde_json::Value {
    let resolver = resolver();
    QueryCompiler::new(&resolver)
        .compile(entities, page, size)
        .await
        .to_json()
}

#[tokio::test]
async fn empty_entities_match_everything_by_enrollment() {
    let body = compile(&EntityMap::new(), 1, 10).await;
    insta::assert_json_snapshot!(body, @r###"
    {
      "from": 0,
      "query": {
        "match_all": {}
      },
      "size": 10,
      "sort": [
        {
          "enrollment": "desc"
        }
      ]
    }
    "###);
}

#[tokio::test]
async fn filters_only_inject_match_all() {
    let entities = EntityMap::new()
        .with(AttributeKind::Phase, ["PHASE3"], Combinator::Or)
        .with(AttributeKind::Status, ["RECRUITING", "NOT_YET_RECRUITING"], Combinator::Or);
    let body = compile(&entities, 2, 20).await;

    assert_eq!(body["from"], 20);
    assert_eq!(body["size"], 20);
    assert_eq!(
        body["query"]["bool"]["filter"],
        json!([
            { "term": { "phase": "PHASE3" } },
            { "terms": { "overall_status": ["RECRUITING", "NOT_YET_RECRUITING"] } }
        ])
    );
    assert_eq!(body["query"]["bool"]["must"], json!([{ "match_all": {} }]));
    assert!(body["query"]["bool"].get("should").is_none());
    assert_eq!(body["sort"], json!([{ "_score": "desc" }, { "enrollment": "desc" }]));
    assert!(body.get("highlight").is_some());
}

#[tokio::test]
async fn condition_expands_synonyms_into_nested_any_of() {
    let entities = EntityMap::new().with(AttributeKind::Condition, ["Lung Cancer"], Combinator::Or);
    let body = compile(&entities, 1, 10).await;

    assert_eq!(
        body["query"]["bool"]["must"],
        json!([{
            "nested": {
                "path": "conditions",
                "query": {
                    "bool": {
                        "should": [
                            { "match": { "conditions.name": { "query": "Lung Neoplasms", "fuzziness": "AUTO" } } },
                            { "match": { "conditions.name": { "query": "Lung Cancer", "fuzziness": "AUTO" } } }
                        ],
                        "minimum_should_match": 1
                    }
                }
            }
        }])
    );
    assert_eq!(
        body["query"]["bool"]["should"],
        json!([{ "match": { "brief_title": { "query": "Lung Cancer", "boost": 2.0 } } }])
    );
    assert_eq!(body["query"]["bool"]["minimum_should_match"], 0);
}

#[tokio::test]
async fn and_conditions_become_independent_required_clauses() {
    let and = EntityMap::new().with(
        AttributeKind::Condition,
        ["diabetes", "hypertension"],
        Combinator::And,
    );
    let or = EntityMap::new().with(
        AttributeKind::Condition,
        ["diabetes", "hypertension"],
        Combinator::Or,
    );

    let and_body = compile(&and, 1, 10).await;
    let must = and_body["query"]["bool"]["must"].as_array().unwrap();
    assert_eq!(must.len(), 2);
    assert_eq!(must[0]["nested"]["query"]["match"]["conditions.name"]["query"], "Diabetes Mellitus");
    assert_eq!(must[1]["nested"]["query"]["match"]["conditions.name"]["query"], "hypertension");

    let or_body = compile(&or, 1, 10).await;
    let must = or_body["query"]["bool"]["must"].as_array().unwrap();
    assert_eq!(must.len(), 1);
    assert_eq!(must[0]["bool"]["minimum_should_match"], 1);
    assert_eq!(must[0]["bool"]["should"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn location_searches_weighted_facility_fields() {
    let entities = EntityMap::new().with(AttributeKind::Location, ["Boston"], Combinator::Or);
    let body = compile(&entities, 1, 10).await;
    assert_eq!(
        body["query"]["bool"]["must"][0],
        json!({
            "nested": {
                "path": "facilities",
                "query": {
                    "multi_match": {
                        "query": "Boston",
                        "fields": ["facilities.city^3", "facilities.state^2", "facilities.country"],
                        "fuzziness": "AUTO"
                    }
                }
            }
        })
    );
    // Location alone adds no title boost.
    assert!(body["query"]["bool"].get("should").is_none());
}

#[tokio::test]
async fn keywords_and_interventions_feed_the_title_boost() {
    let entities = EntityMap::new()
        .with(AttributeKind::Intervention, ["pembrolizumab"], Combinator::Or)
        .with(AttributeKind::Keyword, ["immunotherapy", "PD-1"], Combinator::And);
    let body = compile(&entities, 1, 10).await;

    let must = body["query"]["bool"]["must"].as_array().unwrap();
    assert_eq!(must.len(), 2);
    assert_eq!(must[0]["nested"]["path"], "interventions");
    // Keywords always combine as alternatives.
    assert_eq!(must[1]["bool"]["should"].as_array().unwrap().len(), 2);
    assert_eq!(
        body["query"]["bool"]["should"][0]["match"]["brief_title"]["query"],
        "pembrolizumab immunotherapy PD-1"
    );
}

#[tokio::test]
async fn page_and_size_are_clamped() {
    let entities = EntityMap::new().with(AttributeKind::Sponsor, ["Pfizer"], Combinator::Or);
    let body = compile(&entities, 0, 500).await;
    assert_eq!(body["from"], 0);
    assert_eq!(body["size"], 100);

    let body = compile(&entities, -4, 0).await;
    assert_eq!(body["from"], 0);
    assert_eq!(body["size"], 1);

    let body = compile(&entities, i64::MAX, 100).await;
    assert_eq!(body["from"], u64::MAX);
    assert_eq!(body["size"], 100);
}

#[tokio::test]
async fn date_range_validates_bounds() {
    let entities = EntityMap::new().with_date(Some("2020-01-01"), Some("2020-13-45"));
    let body = compile(&entities, 1, 10).await;
    assert_eq!(
        body["query"]["bool"]["filter"],
        json!([{ "range": { "start_date": { "gte": "2020-01-01" } } }])
    );
    assert_eq!(body["query"]["bool"]["must"], json!([{ "match_all": {} }]));
}

#[tokio::test]
async fn only_malformed_dates_fall_back_to_match_all() {
    let entities = EntityMap::new().with_date(Some("last spring"), None);
    let body = compile(&entities, 1, 10).await;
    assert_eq!(body["query"], json!({ "match_all": {} }));
    assert_eq!(body["sort"], json!([{ "enrollment": "desc" }]));
}

#[tokio::test]
async fn highlight_marks_title_conditions_and_description() {
    let raw = json!({ "condition": "asthma" });
    let entities = normalize(raw.as_object().unwrap());
    let body = compile(&entities, 1, 10).await;
    assert_eq!(
        body["highlight"],
        json!({
            "fields": {
                "brief_title": {},
                "conditions.name": {},
                "brief_summaries_description": { "fragment_size": 150, "number_of_fragments": 2 }
            },
            "pre_tags": ["<mark>"],
            "post_tags": ["</mark>"]
        })
    );
}

#[tokio::test]
async fn compiled_query_exposes_its_bool_tree() {
    let resolver = resolver();
    let entities = EntityMap::new().with(AttributeKind::AgeGroup, ["Older Adult"], Combinator::Or);
    let compiled = QueryCompiler::new(&resolver).compile(&entities, 1, 10).await;
    let query = compiled.bool_query().expect("bool root");
    assert_eq!(
        query.must,
        vec![Clause::nested("age", Clause::fuzzy_match("age.age_category", "Older Adult"))]
    );
    assert!(!compiled.is_unconstrained());
}
