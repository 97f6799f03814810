//! Free-text to raw entity extraction through a chat-completion model.

use std::time::Duration;

use futures::future::BoxFuture;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde_json::Value;
use tracing::warn;

use crate::{
    data::entities::RawEntityMap,
    error::{Error, Result},
};

const SYSTEM_PROMPT: &str = r#"You turn clinical trial search requests into JSON filters.
Return ONLY a JSON object. Omit keys that the request does not mention. When a key has
several values, return a JSON array.

Keys and allowed values:
- phase: EARLY_PHASE1, PHASE1, PHASE2, PHASE3, PHASE4, PHASE1/PHASE2, PHASE2/PHASE3
- status: RECRUITING (open, enrolling), NOT_YET_RECRUITING (upcoming), ACTIVE_NOT_RECRUITING
  (ongoing), COMPLETED (finished, closed), SUSPENDED (paused), TERMINATED (stopped),
  WITHDRAWN
- condition: standard medical terminology ("high blood pressure" -> "Hypertension",
  "shingles" -> "Herpes Zoster")
- intervention: standard pharmacological terminology ("chemo" -> "Chemotherapy",
  "blood thinner" -> "Anticoagulants")
- location: city, state or country; "USA"/"US"/"America" -> "United States",
  "UK"/"Britain" -> "United Kingdom"
- sponsor: organisation name as written
- age_group: adult, child, older-adults
- keyword: genes and biomarkers such as BRCA1, EGFR, PD-L1
- date: {"start": "YYYY-MM-DD", "end": "YYYY-MM-DD"}, either bound optional
  ("in 2023" -> both bounds of 2023, "since 2021" -> start only, "before 2020" -> end
  "2019-12-31")
- <key>_op: "AND" when the user requires every value ("both", "only", "all of",
  "together") for condition, intervention, location or sponsor; otherwise omit it.
  Phase and status are never AND.
- query_type: "question" for analytical questions ("how many", "which", "compare"),
  otherwise "search".

Sponsors and locations are valid filters on their own. If nothing searchable is
mentioned, return {}.

Examples:
"active phase 3 lung cancer trials" -> {"status": "RECRUITING", "phase": "PHASE3", "condition": "lung cancer", "query_type": "search"}
"Pfizer or Novartis diabetes studies in US and UK" -> {"sponsor": ["Pfizer", "Novartis"], "condition": "diabetes", "location": ["United States", "United Kingdom"], "query_type": "search"}
"trials studying both diabetes and hypertension" -> {"condition": ["diabetes", "Hypertension"], "condition_op": "AND", "query_type": "search"}
"how many melanoma trials started since 2021?" -> {"condition": "melanoma", "date": {"start": "2021-01-01"}, "query_type": "question"}"#;

static FENCED_JSON: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").expect("valid fenced json pattern")
});

/// Black-box extraction of a loosely-typed attribute map from free text.
pub trait Extractor: Send + Sync {
    /// Never fails: any upstream problem yields an empty map.
    fn extract<'a>(&'a self, query: &'a str) -> BoxFuture<'a, RawEntityMap>;

    fn is_configured(&self) -> bool {
        true
    }
}

/// OpenAI-compatible chat-completion extractor in JSON mode.
#[derive(Debug, Clone)]
pub struct OpenAiExtractor {
    client: Client,
    url: String,
    api_key: String,
    model: String,
}

impl OpenAiExtractor {
    pub fn new(base_url: &str, api_key: &str, model: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }

    async fn request(&self, query: &str) -> Result<RawEntityMap> {
        let body = serde_json::json!({
            "model": self.model,
            "temperature": 0,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": query }
            ]
        });
        let res = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        let payload: Value = res.error_for_status()?.json().await?;
        let content = payload
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::invalid_response("completion has no message content"))?;
        parse_entity_json(content)
    }
}

impl Extractor for OpenAiExtractor {
    fn extract<'a>(&'a self, query: &'a str) -> BoxFuture<'a, RawEntityMap> {
        Box::pin(async move {
            match self.request(query).await {
                Ok(map) => map,
                Err(err) => {
                    warn!(%err, "entity extraction failed");
                    RawEntityMap::new()
                }
            }
        })
    }
}

/// Stand-in used when no extraction model is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledExtractor;

impl Extractor for DisabledExtractor {
    fn extract<'a>(&'a self, _query: &'a str) -> BoxFuture<'a, RawEntityMap> {
        warn!("no extraction model configured; set OPENAI_API_KEY");
        Box::pin(futures::future::ready(RawEntityMap::new()))
    }

    fn is_configured(&self) -> bool {
        false
    }
}

/// Parse model output that is either a bare JSON object or one wrapped in a fence.
pub fn parse_entity_json(text: &str) -> Result<RawEntityMap> {
    let trimmed = text.trim();
    let candidate = if trimmed.starts_with('{') {
        trimmed
    } else {
        FENCED_JSON
            .captures(trimmed)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
            .ok_or_else(|| {
                Error::invalid_response(format!("could not find JSON object in: {trimmed}"))
            })?
    };
    match serde_json::from_str::<Value>(candidate)? {
        Value::Object(map) => Ok(map),
        other => Err(Error::invalid_response(format!(
            "expected JSON object, got {other}"
        ))),
    }
}
