//! Human-readable rendering of what was understood from a query.

use crate::data::entities::{AttributeKind, Combinator, EntityMap};

pub const NO_FILTERS: &str = "No search filters detected.";
pub const EXTRACTION_FAILED: &str = "Could not extract any search filters from your query.";

const SHOWN_SYNONYMS: usize = 3;

const LABELS: [(AttributeKind, &str); 7] = [
    (AttributeKind::Status, "Status"),
    (AttributeKind::Phase, "Phase"),
    (AttributeKind::Intervention, "Treatment"),
    (AttributeKind::Location, "Location"),
    (AttributeKind::Sponsor, "Sponsor"),
    (AttributeKind::AgeGroup, "Age Group"),
    (AttributeKind::Keyword, "Keyword"),
];

pub fn interpret(entities: &EntityMap) -> String {
    let mut parts = Vec::new();

    let conditions = entities.values(AttributeKind::Condition);
    if !conditions.is_empty() {
        let labels: Vec<String> = conditions
            .iter()
            .map(|condition| condition_label(condition, entities))
            .collect();
        if entities.op(AttributeKind::Condition) == Combinator::And && labels.len() > 1 {
            parts.push(format!("{} (all required)", labels.join(" and ")));
        } else {
            parts.extend(labels);
        }
    }

    for (kind, label) in LABELS {
        let Some(field) = entities.field(kind) else {
            continue;
        };
        let joiner = match field.op {
            Combinator::And => " and ",
            Combinator::Or => " or ",
        };
        let mut display = field.values.join(joiner);
        if field.op == Combinator::And && field.values.len() > 1 {
            display.push_str(" (all required)");
        }
        parts.push(format!("{label} = {display}"));
    }

    if let Some(date) = &entities.date {
        // Only bounds the compiler turns into a range are reported.
        let start = date.valid_start().map(|d| d.format("%Y").to_string());
        let end = date.valid_end().map(|d| d.format("%Y").to_string());
        match (start, end) {
            (Some(start), Some(end)) if start == end => parts.push(format!("Year = {start}")),
            (Some(start), Some(end)) => parts.push(format!("Date Range = {start}–{end}")),
            (Some(start), None) => parts.push(format!("From = {start}")),
            (None, Some(end)) => parts.push(format!("Before = {end}")),
            (None, None) => {}
        }
    }

    if parts.is_empty() {
        return NO_FILTERS.to_string();
    }
    format!("We understood: {}", parts.join(", "))
}

fn condition_label(condition: &str, entities: &EntityMap) -> String {
    let mut label = format!("Condition = {condition}");
    if let Some(synonyms) = entities.condition_synonyms.get(condition) {
        if synonyms.len() > 1 {
            let mut expansion = synonyms
                .iter()
                .take(SHOWN_SYNONYMS)
                .cloned()
                .collect::<Vec<_>>()
                .join(", ");
            let remaining = synonyms.len().saturating_sub(SHOWN_SYNONYMS);
            if remaining > 0 {
                expansion.push_str(&format!(", +{remaining} more"));
            }
            label.push_str(&format!(" → Expanded to: {expansion}"));
        }
    }
    label
}
