//! Shared DTOs for JSON responses.

use serde::{Deserialize, Serialize};

use crate::query::DEFAULT_PAGE_SIZE;

#[derive(Debug, Clone, Deserialize)]
pub struct PageQuery {
    #[serde(default = "first_page")]
    pub page: i64,
    #[serde(default = "default_size")]
    pub size: i64,
}

fn first_page() -> i64 {
    1
}

fn default_size() -> i64 {
    DEFAULT_PAGE_SIZE
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthDto {
    pub status: &'static str,
    pub timestamp: String,
    pub services: ServicesDto,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServicesDto {
    pub elasticsearch: &'static str,
    pub extractor: &'static str,
    pub resolver_layers: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexDto {
    pub message: &'static str,
    pub endpoints: Vec<(&'static str, &'static str)>,
}
