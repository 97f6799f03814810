//! Compile a normalized entity map into a paginated, boosted boolean query.

use tracing::{debug, instrument};

use crate::{
    data::entities::{AttributeKind, Combinator, EntityMap},
    nlp::resolver::TermResolver,
    query::{BoolQuery, Clause, CompiledQuery, Fuzziness, Highlight, Pagination, QueryRoot, SortKey},
};

const PHASE_FIELD: &str = "phase";
const STATUS_FIELD: &str = "overall_status";
const START_DATE_FIELD: &str = "start_date";
const TITLE_FIELD: &str = "brief_title";
const DESCRIPTION_FIELD: &str = "brief_summaries_description";
const TITLE_BOOST: f64 = 2.0;

const HIGHLIGHT_FRAGMENT_SIZE: u32 = 150;
const HIGHLIGHT_FRAGMENTS: u32 = 2;
const HIGHLIGHT_PRE: &str = "<mark>";
const HIGHLIGHT_POST: &str = "</mark>";

/// Builds [`CompiledQuery`] values, resolving condition terms through the resolver.
pub struct QueryCompiler<'a> {
    resolver: &'a TermResolver,
}

impl<'a> QueryCompiler<'a> {
    pub fn new(resolver: &'a TermResolver) -> Self {
        Self { resolver }
    }

    #[instrument(skip(self, entities))]
    pub async fn compile(&self, entities: &EntityMap, page: i64, size: i64) -> CompiledQuery {
        let window = Pagination::new(page, size);

        if entities.is_unconstrained() {
            return unconstrained(window);
        }

        let mut query = BoolQuery::default();

        for kind in [AttributeKind::Phase, AttributeKind::Status] {
            if let Some(field) = entities.field(kind) {
                query.filter.push(exclusive_filter(kind, &field.values));
            }
        }

        for kind in [
            AttributeKind::Condition,
            AttributeKind::Location,
            AttributeKind::Sponsor,
            AttributeKind::Intervention,
            AttributeKind::AgeGroup,
        ] {
            let Some(field) = entities.field(kind) else {
                continue;
            };
            let mut per_value = Vec::with_capacity(field.values.len());
            for value in &field.values {
                per_value.push(self.value_clause(kind, value).await);
            }
            combine(per_value, field.op, &mut query.must);
        }

        let keywords = entities.values(AttributeKind::Keyword);
        if !keywords.is_empty() {
            query
                .must
                .push(Clause::any_of(keywords.iter().map(|k| keyword_clause(k)).collect()));
        }

        if let Some(range) = entities.date.as_ref().and_then(|date| {
            let gte = date.valid_start().map(|d| d.format("%Y-%m-%d").to_string());
            let lte = date.valid_end().map(|d| d.format("%Y-%m-%d").to_string());
            (gte.is_some() || lte.is_some()).then(|| Clause::Range {
                field: START_DATE_FIELD.to_string(),
                gte,
                lte,
            })
        }) {
            query.filter.push(range);
        }

        if let Some(boost) = title_boost(entities) {
            query.should.push(boost);
        }

        if query.must.is_empty() && query.filter.is_empty() {
            debug!("no usable constraints after compilation");
            return unconstrained(window);
        }
        if query.must.is_empty() {
            query.must.push(Clause::MatchAll);
        }

        CompiledQuery {
            root: QueryRoot::Bool(query),
            from: window.offset(),
            size: window.size,
            sort: vec![SortKey::ScoreDesc, SortKey::EnrollmentDesc],
            highlight: Some(highlight()),
        }
    }

    async fn value_clause(&self, kind: AttributeKind, value: &str) -> Clause {
        match kind {
            AttributeKind::Condition => {
                let mut synonyms = self.resolver.resolve(value).await;
                if synonyms.is_empty() {
                    synonyms.push(value.to_string());
                }
                let matches = synonyms
                    .into_iter()
                    .map(|synonym| Clause::fuzzy_match("conditions.name", synonym))
                    .collect();
                Clause::nested("conditions", Clause::any_of(matches))
            }
            AttributeKind::Location => Clause::nested(
                "facilities",
                Clause::MultiMatch {
                    fields: vec![
                        ("facilities.city".to_string(), Some(3.0)),
                        ("facilities.state".to_string(), Some(2.0)),
                        ("facilities.country".to_string(), None),
                    ],
                    query: value.to_string(),
                    fuzziness: Fuzziness::Auto,
                },
            ),
            AttributeKind::Sponsor => {
                Clause::nested("sponsors", Clause::fuzzy_match("sponsors.name", value))
            }
            AttributeKind::Intervention => Clause::nested(
                "interventions",
                Clause::fuzzy_match("interventions.name", value),
            ),
            AttributeKind::AgeGroup => {
                Clause::nested("age", Clause::fuzzy_match("age.age_category", value))
            }
            AttributeKind::Keyword => keyword_clause(value),
            AttributeKind::Phase | AttributeKind::Status => exclusive_filter(kind, &[value.to_string()]),
        }
    }
}

/// Singleton → the clause itself; OR → one any-of group; AND → one required clause each.
fn combine(mut clauses: Vec<Clause>, op: Combinator, must: &mut Vec<Clause>) {
    match (clauses.len(), op) {
        (0, _) => {}
        (1, _) => must.push(clauses.remove(0)),
        (_, Combinator::And) => must.extend(clauses),
        (_, Combinator::Or) => must.push(Clause::AnyOf(clauses)),
    }
}

fn exclusive_filter(kind: AttributeKind, values: &[String]) -> Clause {
    let field = match kind {
        AttributeKind::Status => STATUS_FIELD,
        _ => PHASE_FIELD,
    };
    match values {
        [single] => Clause::term(field, single.clone()),
        many => Clause::Terms {
            field: field.to_string(),
            values: many.to_vec(),
        },
    }
}

/// Free-text title/description match, or a match on the curated keyword list.
fn keyword_clause(keyword: &str) -> Clause {
    Clause::AnyOf(vec![
        Clause::MultiMatch {
            fields: vec![
                (TITLE_FIELD.to_string(), Some(2.0)),
                ("official_title".to_string(), None),
                (DESCRIPTION_FIELD.to_string(), None),
            ],
            query: keyword.to_string(),
            fuzziness: Fuzziness::Auto,
        },
        Clause::nested("keywords", Clause::fuzzy_match("keywords.name", keyword)),
    ])
}

/// Optional title match over the raw condition, intervention and keyword values.
fn title_boost(entities: &EntityMap) -> Option<Clause> {
    let terms: Vec<&str> = [
        AttributeKind::Condition,
        AttributeKind::Intervention,
        AttributeKind::Keyword,
    ]
    .into_iter()
    .flat_map(|kind| entities.values(kind).iter().map(String::as_str))
    .collect();
    if terms.is_empty() {
        return None;
    }
    Some(Clause::Match {
        field: TITLE_FIELD.to_string(),
        query: terms.join(" "),
        fuzziness: Fuzziness::Exact,
        boost: Some(TITLE_BOOST),
    })
}

fn unconstrained(window: Pagination) -> CompiledQuery {
    CompiledQuery {
        root: QueryRoot::MatchAll,
        from: window.offset(),
        size: window.size,
        sort: vec![SortKey::EnrollmentDesc],
        highlight: None,
    }
}

pub fn highlight() -> Highlight {
    Highlight {
        fields: vec![
            (TITLE_FIELD.to_string(), None),
            ("conditions.name".to_string(), None),
            (
                DESCRIPTION_FIELD.to_string(),
                Some((HIGHLIGHT_FRAGMENT_SIZE, HIGHLIGHT_FRAGMENTS)),
            ),
        ],
        pre_tag: HIGHLIGHT_PRE.to_string(),
        post_tag: HIGHLIGHT_POST.to_string(),
    }
}
