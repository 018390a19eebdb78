//! HTTP front end: JSON API plus server rendered pages.
use anyhow::{Context, Result};
use axum::routing::{get, post};
use axum::Router;

use crate::config::AppConfig;

pub mod error;
pub mod handlers;
pub mod pages;
pub mod state;

pub use state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(pages::index))
        .route("/predict", get(pages::predict))
        .route("/documentation", get(pages::documentation))
        .route("/analysis", get(pages::analysis))
        .route("/comparison", get(pages::comparison))
        .route("/api/predict", post(handlers::predict))
        .route("/api/evaluate_dataset", post(handlers::evaluate_dataset))
        .route("/api/dataset", get(handlers::dataset))
        .route("/api/metrics", get(handlers::metrics))
        .fallback(pages::not_found)
        .with_state(state)
}

/// Make the models ready, then serve until the process is stopped.
pub async fn serve(config: AppConfig) -> Result<()> {
    let addr = config.bind_address();
    let state = AppState::new(config);

    state
        .ready()
        .await
        .context("Failed to initialize models")?;

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    log::info!("Listening on http://{}", addr);

    axum::serve(listener, build_router(state))
        .await
        .context("Server error")?;
    Ok(())
}
