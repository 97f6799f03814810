//! Entity model and the normalizer that coerces untrusted extractor output into it.
//!
//! The extractor hands back a loosely-typed JSON object. [`normalize`] is the only
//! place that looks at that shape; everything downstream works on [`EntityMap`].

use std::fmt;

use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::{ser::SerializeMap, Serialize, Serializer};
use serde_json::{Map, Value};
use tracing::debug;

/// Raw attribute map as produced by the extractor.
pub type RawEntityMap = Map<String, Value>;

/// Multi-valued attribute kinds, in rendering order of the raw schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AttributeKind {
    Phase,
    Status,
    Condition,
    Intervention,
    Location,
    Sponsor,
    AgeGroup,
    Keyword,
}

impl AttributeKind {
    pub const ALL: [AttributeKind; 8] = [
        Self::Phase,
        Self::Status,
        Self::Condition,
        Self::Intervention,
        Self::Location,
        Self::Sponsor,
        Self::AgeGroup,
        Self::Keyword,
    ];

    /// Attribute name in the raw schema.
    pub fn key(self) -> &'static str {
        match self {
            Self::Phase => "phase",
            Self::Status => "status",
            Self::Condition => "condition",
            Self::Intervention => "intervention",
            Self::Location => "location",
            Self::Sponsor => "sponsor",
            Self::AgeGroup => "age_group",
            Self::Keyword => "keyword",
        }
    }

    /// Name of the companion operator attribute, e.g. `condition_op`.
    pub fn op_key(self) -> String {
        format!("{}_op", self.key())
    }

    /// A document holds a single value of these, so AND across values is meaningless.
    pub fn is_exclusive(self) -> bool {
        matches!(self, Self::Phase | Self::Status)
    }
}

impl fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Combinator {
    And,
    #[default]
    Or,
}

impl Combinator {
    pub fn parse(value: &Value) -> Option<Self> {
        match value.as_str()?.trim().to_ascii_uppercase().as_str() {
            "AND" => Some(Self::And),
            "OR" => Some(Self::Or),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryType {
    #[default]
    Search,
    Question,
}

/// Start-date window as extracted; bounds are kept verbatim and validated on use.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct DateRange {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
}

impl DateRange {
    /// Start bound if it is a valid ISO-8601 calendar date.
    pub fn valid_start(&self) -> Option<NaiveDate> {
        self.start.as_deref().and_then(parse_iso_date)
    }

    pub fn valid_end(&self) -> Option<NaiveDate> {
        self.end.as_deref().and_then(parse_iso_date)
    }
}

fn parse_iso_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()
}

/// Values of one multi-valued attribute plus how they combine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub values: Vec<String>,
    pub op: Combinator,
}

/// Canonical entity map: every present multi-valued kind holds a non-empty list.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EntityMap {
    fields: IndexMap<AttributeKind, Field>,
    pub date: Option<DateRange>,
    pub query_type: QueryType,
    /// Condition → resolved synonyms, only for conditions with more than one synonym.
    pub condition_synonyms: IndexMap<String, Vec<String>>,
}

impl EntityMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field; blank values are dropped and an empty list clears the kind.
    pub fn set<I, S>(&mut self, kind: AttributeKind, values: I, op: Combinator) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values: Vec<String> = values
            .into_iter()
            .map(Into::into)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .collect();
        if values.is_empty() {
            self.fields.shift_remove(&kind);
            return self;
        }
        let op = if kind.is_exclusive() {
            Combinator::Or
        } else {
            op
        };
        self.fields.insert(kind, Field { values, op });
        self
    }

    /// Builder form of [`EntityMap::set`].
    pub fn with<I, S>(mut self, kind: AttributeKind, values: I, op: Combinator) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set(kind, values, op);
        self
    }

    pub fn with_date(mut self, start: Option<&str>, end: Option<&str>) -> Self {
        self.date = date_range(start.map(str::to_string), end.map(str::to_string));
        self
    }

    pub fn field(&self, kind: AttributeKind) -> Option<&Field> {
        self.fields.get(&kind)
    }

    pub fn values(&self, kind: AttributeKind) -> &[String] {
        self.fields
            .get(&kind)
            .map(|field| field.values.as_slice())
            .unwrap_or(&[])
    }

    pub fn op(&self, kind: AttributeKind) -> Combinator {
        self.fields
            .get(&kind)
            .map(|field| field.op)
            .unwrap_or_default()
    }

    pub fn contains(&self, kind: AttributeKind) -> bool {
        self.fields.contains_key(&kind)
    }

    /// Present multi-valued kinds in canonical kind order.
    pub fn kinds(&self) -> impl Iterator<Item = AttributeKind> + '_ {
        AttributeKind::ALL
            .into_iter()
            .filter(|kind| self.fields.contains_key(kind))
    }

    /// True when no attribute constrains the search.
    pub fn is_unconstrained(&self) -> bool {
        self.fields.is_empty() && self.date.is_none()
    }
}

impl Serialize for EntityMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        for kind in self.kinds() {
            let field = &self.fields[&kind];
            map.serialize_entry(kind.key(), &field.values)?;
            if field.op == Combinator::And {
                map.serialize_entry(&kind.op_key(), &field.op)?;
            }
        }
        if let Some(date) = &self.date {
            map.serialize_entry("date", date)?;
        }
        map.serialize_entry("query_type", &self.query_type)?;
        if !self.condition_synonyms.is_empty() {
            map.serialize_entry("condition_synonyms", &self.condition_synonyms)?;
        }
        map.end()
    }
}

/// Coerce an untrusted attribute map into an [`EntityMap`]. Never fails.
pub fn normalize(raw: &RawEntityMap) -> EntityMap {
    let mut entities = EntityMap::new();

    for kind in AttributeKind::ALL {
        let Some(value) = raw.get(kind.key()) else {
            continue;
        };
        let values = lift_values(value);
        if values.is_empty() {
            debug!(%kind, "dropping attribute without usable values");
            continue;
        }
        let op = raw
            .get(&kind.op_key())
            .and_then(Combinator::parse)
            .unwrap_or_default();
        entities.set(kind, values, op);
    }

    entities.date = raw.get("date").and_then(|value| match value {
        Value::Object(bounds) => date_range(
            bounds.get("start").and_then(scalar_string),
            bounds.get("end").and_then(scalar_string),
        ),
        _ => None,
    });

    entities.query_type = match raw.get("query_type").and_then(Value::as_str) {
        Some(kind) if kind.trim().eq_ignore_ascii_case("question") => QueryType::Question,
        _ => QueryType::Search,
    };

    entities
}

/// Scalars become a one-element list; lists keep their usable scalar members in order.
fn lift_values(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(scalar_string).collect(),
        other => scalar_string(other).into_iter().collect(),
    }
}

fn scalar_string(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

fn date_range(start: Option<String>, end: Option<String>) -> Option<DateRange> {
    let start = start.filter(|s| !s.trim().is_empty());
    let end = end.filter(|s| !s.trim().is_empty());
    if start.is_none() && end.is_none() {
        return None;
    }
    Some(DateRange { start, end })
}
