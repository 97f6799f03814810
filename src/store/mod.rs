//! Document store client (Elasticsearch-compatible `_search` API).

pub mod format;

use std::time::Duration;

use reqwest::Client;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::{
    error::{Error, Result},
    query::CompiledQuery,
};

/// Raw scored hits plus the total match count.
#[derive(Debug, Clone, Default)]
pub struct SearchHits {
    pub total: u64,
    pub hits: Vec<Value>,
}

#[derive(Debug, Clone)]
pub struct ElasticStore {
    client: Client,
    base_url: String,
    index: String,
}

impl ElasticStore {
    pub fn new(base_url: &str, index: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent("trial-assistant/0.1")
            .timeout(timeout)
            .gzip(true)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            index: index.to_string(),
        })
    }

    #[instrument(skip(self, query), fields(index = %self.index, from = query.from, size = query.size))]
    pub async fn search(&self, query: &CompiledQuery) -> Result<SearchHits> {
        let url = format!("{}/{}/_search", self.base_url, self.index);
        let resp = self.client.post(&url).json(query).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Store {
                status: status.as_u16(),
                body,
            });
        }
        let payload: Value = resp.json().await?;
        let hits = parse_hits(payload)?;
        debug!(total = hits.total, returned = hits.hits.len(), "search completed");
        Ok(hits)
    }

    /// True when the store answers its root endpoint.
    pub async fn ping(&self) -> bool {
        match self.client.get(&self.base_url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(err) => {
                debug!(%err, "document store unreachable");
                false
            }
        }
    }
}

pub(crate) fn parse_hits(payload: Value) -> Result<SearchHits> {
    let hits = payload
        .get("hits")
        .ok_or_else(|| Error::invalid_response("search response has no hits section"))?;
    // Older stores report the total as a bare number.
    let total = hits
        .pointer("/total/value")
        .or_else(|| hits.get("total"))
        .and_then(Value::as_u64)
        .unwrap_or(0);
    let hits = hits
        .get("hits")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    Ok(SearchHits { total, hits })
}
