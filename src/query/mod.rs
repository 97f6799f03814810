//! Structured boolean query tree and its document-store JSON rendering.

pub mod compiler;

pub use compiler::QueryCompiler;

use serde::{Serialize, Serializer};
use serde_json::{json, Map, Value};

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;

/// Clamped page window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub page: u64,
    pub size: u64,
}

impl Pagination {
    /// `page` clamps to at least 1, `size` to `[1, MAX_PAGE_SIZE]`.
    pub fn new(page: i64, size: i64) -> Self {
        Self {
            page: page.max(1) as u64,
            size: size.clamp(1, MAX_PAGE_SIZE) as u64,
        }
    }

    pub fn offset(&self) -> u64 {
        (self.page - 1).saturating_mul(self.size)
    }

    pub fn total_pages(&self, total: u64) -> u64 {
        total.div_ceil(self.size)
    }
}

/// Text fuzziness applied to a match clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fuzziness {
    Exact,
    Auto,
}

/// A node of the boolean query tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    MatchAll,
    /// Exact keyword equality.
    Term { field: String, value: String },
    /// Keyword set membership.
    Terms { field: String, values: Vec<String> },
    Match {
        field: String,
        query: String,
        fuzziness: Fuzziness,
        boost: Option<f64>,
    },
    /// Match across weighted fields, `("facilities.city", Some(3.0))` → `facilities.city^3`.
    MultiMatch {
        fields: Vec<(String, Option<f64>)>,
        query: String,
        fuzziness: Fuzziness,
    },
    Range {
        field: String,
        gte: Option<String>,
        lte: Option<String>,
    },
    Nested { path: String, query: Box<Clause> },
    /// At least one alternative must match.
    AnyOf(Vec<Clause>),
}

impl Clause {
    pub fn term(field: &str, value: impl Into<String>) -> Self {
        Self::Term {
            field: field.to_string(),
            value: value.into(),
        }
    }

    pub fn fuzzy_match(field: &str, query: impl Into<String>) -> Self {
        Self::Match {
            field: field.to_string(),
            query: query.into(),
            fuzziness: Fuzziness::Auto,
            boost: None,
        }
    }

    pub fn nested(path: &str, query: Clause) -> Self {
        Self::Nested {
            path: path.to_string(),
            query: Box::new(query),
        }
    }

    /// Single alternatives collapse to themselves.
    pub fn any_of(mut alternatives: Vec<Clause>) -> Self {
        if alternatives.len() == 1 {
            alternatives.remove(0)
        } else {
            Self::AnyOf(alternatives)
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::MatchAll => json!({ "match_all": {} }),
            Self::Term { field, value } => json!({ "term": { field: value } }),
            Self::Terms { field, values } => json!({ "terms": { field: values } }),
            Self::Match {
                field,
                query,
                fuzziness,
                boost,
            } => {
                let mut body = Map::new();
                body.insert("query".into(), json!(query));
                if *fuzziness == Fuzziness::Auto {
                    body.insert("fuzziness".into(), json!("AUTO"));
                }
                if let Some(boost) = boost {
                    body.insert("boost".into(), json!(boost));
                }
                json!({ "match": { field: body } })
            }
            Self::MultiMatch {
                fields,
                query,
                fuzziness,
            } => {
                let fields: Vec<String> = fields
                    .iter()
                    .map(|(name, weight)| match weight {
                        Some(w) => format!("{name}^{w}"),
                        None => name.clone(),
                    })
                    .collect();
                let mut body = Map::new();
                body.insert("query".into(), json!(query));
                body.insert("fields".into(), json!(fields));
                if *fuzziness == Fuzziness::Auto {
                    body.insert("fuzziness".into(), json!("AUTO"));
                }
                json!({ "multi_match": body })
            }
            Self::Range { field, gte, lte } => {
                let mut bounds = Map::new();
                if let Some(gte) = gte {
                    bounds.insert("gte".into(), json!(gte));
                }
                if let Some(lte) = lte {
                    bounds.insert("lte".into(), json!(lte));
                }
                json!({ "range": { field: bounds } })
            }
            Self::Nested { path, query } => {
                json!({ "nested": { "path": path, "query": query.to_json() } })
            }
            Self::AnyOf(alternatives) => json!({
                "bool": {
                    "should": alternatives.iter().map(Clause::to_json).collect::<Vec<_>>(),
                    "minimum_should_match": 1
                }
            }),
        }
    }
}

impl Serialize for Clause {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// Required, filter and optional clause lists.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BoolQuery {
    /// Must match; contributes to score.
    pub must: Vec<Clause>,
    /// Must match; never scored.
    pub filter: Vec<Clause>,
    /// Optional; only boosts score.
    pub should: Vec<Clause>,
}

impl BoolQuery {
    pub fn to_json(&self) -> Value {
        let mut body = Map::new();
        let render = |clauses: &[Clause]| clauses.iter().map(Clause::to_json).collect::<Vec<_>>();
        if !self.must.is_empty() {
            body.insert("must".into(), json!(render(&self.must)));
        }
        if !self.filter.is_empty() {
            body.insert("filter".into(), json!(render(&self.filter)));
        }
        if !self.should.is_empty() {
            body.insert("should".into(), json!(render(&self.should)));
            body.insert("minimum_should_match".into(), json!(0));
        }
        Value::Object(body)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    ScoreDesc,
    EnrollmentDesc,
}

impl SortKey {
    fn to_json(self) -> Value {
        match self {
            Self::ScoreDesc => json!({ "_score": "desc" }),
            Self::EnrollmentDesc => json!({ "enrollment": "desc" }),
        }
    }
}

/// Highlighted-fragment request.
#[derive(Debug, Clone, PartialEq)]
pub struct Highlight {
    /// `(field, Some((fragment_size, number_of_fragments)))`
    pub fields: Vec<(String, Option<(u32, u32)>)>,
    pub pre_tag: String,
    pub post_tag: String,
}

impl Highlight {
    pub fn to_json(&self) -> Value {
        let mut fields = Map::new();
        for (name, fragments) in &self.fields {
            let options = match fragments {
                Some((size, count)) => {
                    json!({ "fragment_size": size, "number_of_fragments": count })
                }
                None => json!({}),
            };
            fields.insert(name.clone(), options);
        }
        json!({
            "fields": fields,
            "pre_tags": [self.pre_tag],
            "post_tags": [self.post_tag]
        })
    }
}

/// Root of a compiled query.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryRoot {
    MatchAll,
    Bool(BoolQuery),
}

/// Complete, paginated search request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub root: QueryRoot,
    pub from: u64,
    pub size: u64,
    pub sort: Vec<SortKey>,
    pub highlight: Option<Highlight>,
}

impl CompiledQuery {
    pub fn bool_query(&self) -> Option<&BoolQuery> {
        match &self.root {
            QueryRoot::Bool(query) => Some(query),
            QueryRoot::MatchAll => None,
        }
    }

    pub fn is_unconstrained(&self) -> bool {
        matches!(self.root, QueryRoot::MatchAll)
    }

    pub fn to_json(&self) -> Value {
        let query = match &self.root {
            QueryRoot::MatchAll => Clause::MatchAll.to_json(),
            QueryRoot::Bool(query) => json!({ "bool": query.to_json() }),
        };
        let mut body = Map::new();
        body.insert("from".into(), json!(self.from));
        body.insert("query".into(), query);
        body.insert("size".into(), json!(self.size));
        body.insert(
            "sort".into(),
            Value::Array(self.sort.iter().map(|key| key.to_json()).collect()),
        );
        if let Some(highlight) = &self.highlight {
            body.insert("highlight".into(), highlight.to_json());
        }
        Value::Object(body)
    }
}

impl Serialize for CompiledQuery {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}
