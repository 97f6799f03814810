//! HTTP route handlers for Axum.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;

use crate::{
    api::types::{HealthDto, IndexDto, PageQuery, ServicesDto},
    nlp::resolver::Resolution,
    pipeline::SearchResponse,
};

use super::AppState;

pub async fn index() -> Json<IndexDto> {
    Json(IndexDto {
        message: "Clinical Trials Search API",
        endpoints: vec![
            ("health", "/api/health"),
            ("search", "/api/search/<query>"),
            ("resolve", "/api/resolve/<term>"),
        ],
    })
}

pub async fn health(State(state): State<AppState>) -> Json<HealthDto> {
    let pipeline = &state.pipeline;
    let connected = pipeline.store.ping().await;
    Json(HealthDto {
        status: if connected { "healthy" } else { "degraded" },
        timestamp: Utc::now().to_rfc3339(),
        services: ServicesDto {
            elasticsearch: if connected { "connected" } else { "disconnected" },
            extractor: if pipeline.extractor.is_configured() {
                "configured"
            } else {
                "missing"
            },
            resolver_layers: pipeline
                .resolver
                .layers()
                .map(|layer| format!("{layer:?}").to_lowercase())
                .collect(),
        },
    })
}

pub async fn search(
    State(state): State<AppState>,
    Path(query): Path<String>,
    Query(page): Query<PageQuery>,
) -> (StatusCode, Json<SearchResponse>) {
    let response = state.pipeline.search(&query, page.page, page.size).await;
    let status = if response.success {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(response))
}

pub async fn resolve(State(state): State<AppState>, Path(term): Path<String>) -> Json<Resolution> {
    Json(state.pipeline.resolver.resolve_with_info(&term).await)
}
