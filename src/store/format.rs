//! Flatten raw store hits into UI-friendly trial records.

use indexmap::IndexSet;
use serde::Serialize;
use serde_json::{Map, Value};

const MAX_LOCATIONS: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRecord {
    pub nct_id: Option<String>,
    pub brief_title: Option<String>,
    pub overall_status: Option<String>,
    pub phase: Option<String>,
    pub conditions: Vec<String>,
    pub sponsor: Option<String>,
    pub enrollment: Option<i64>,
    /// Up to three "city, state, country" strings.
    pub locations: Vec<String>,
    /// Every distinct facility country, first-seen order.
    pub countries: Vec<String>,
    pub start_date: Option<String>,
    pub score: Option<f64>,
    pub highlights: Map<String, Value>,
}

/// Map one hit; absent or mistyped source fields default to empty.
pub fn format_hit(hit: &Value) -> ResultRecord {
    let empty = Map::new();
    let source = hit
        .get("_source")
        .and_then(Value::as_object)
        .unwrap_or(&empty);

    let conditions = objects(source, "conditions")
        .filter_map(|c| text(c, "name"))
        .collect();

    let facilities: Vec<&Map<String, Value>> = objects(source, "facilities").collect();
    let countries = facilities
        .iter()
        .filter_map(|f| text(f, "country"))
        .collect::<IndexSet<_>>()
        .into_iter()
        .collect();
    let locations = facilities
        .iter()
        .take(MAX_LOCATIONS)
        .filter_map(|f| {
            let parts: Vec<String> = ["city", "state", "country"]
                .into_iter()
                .filter_map(|key| text(f, key))
                .collect();
            (!parts.is_empty()).then(|| parts.join(", "))
        })
        .collect();

    ResultRecord {
        nct_id: text(source, "nct_id"),
        brief_title: text(source, "brief_title"),
        overall_status: text(source, "overall_status"),
        phase: text(source, "phase"),
        conditions,
        sponsor: primary_sponsor(source),
        enrollment: source.get("enrollment").and_then(integer),
        locations,
        countries,
        start_date: text(source, "start_date"),
        score: hit.get("_score").and_then(Value::as_f64),
        highlights: hit
            .get("highlight")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default(),
    }
}

/// The sponsor marked "lead", else the first named sponsor.
fn primary_sponsor(source: &Map<String, Value>) -> Option<String> {
    let sponsors: Vec<&Map<String, Value>> = objects(source, "sponsors").collect();
    sponsors
        .iter()
        .find(|s| {
            s.get("lead_or_collaborator")
                .and_then(Value::as_str)
                .is_some_and(|role| role.eq_ignore_ascii_case("lead"))
        })
        .and_then(|s| text(s, "name"))
        .or_else(|| sponsors.first().and_then(|s| text(s, "name")))
}

fn objects<'a>(
    source: &'a Map<String, Value>,
    key: &str,
) -> impl Iterator<Item = &'a Map<String, Value>> {
    source
        .get(key)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_object)
}

fn text(object: &Map<String, Value>, key: &str) -> Option<String> {
    object
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
