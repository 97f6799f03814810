//! HTTP layer exposing natural-language trial search.

pub mod routes;
pub mod types;

use std::{net::SocketAddr, sync::Arc};

use anyhow::Result;
use axum::{routing::get, Router};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::pipeline::Pipeline;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/", get(routes::index))
        .route("/api/health", get(routes::health))
        .route("/api/search/*query", get(routes::search))
        .route("/api/resolve/:term", get(routes::resolve))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(pipeline: Pipeline, host: String, port: u16) -> Result<()> {
    let state = AppState {
        pipeline: Arc::new(pipeline),
    };
    let addr: SocketAddr = format!("{host}:{port}").parse()?;
    info!(%addr, "serving trial-assistant API");
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, router(state).into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown signal received");
    }
}
