pub mod handlers;
pub mod interactions;

use crate::common::Config;
use crate::pipeline::VaultPipeline;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

/// Application state passed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: VaultPipeline,
    pub config: Config,
    /// Plain HTTP client for pulling interaction attachment URLs.
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(pipeline: VaultPipeline, config: Config) -> Self {
        Self {
            pipeline,
            config,
            http: reqwest::Client::new(),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/", get(handlers::serve_index))
        .route("/app.js", get(handlers::serve_js))
        .route("/api/upload", post(handlers::upload_handler))
        .route("/api/files", get(handlers::list_handler))
        .route("/api/download/:id", get(handlers::download_handler))
        .route("/api/delete/:id", post(handlers::delete_handler))
        .route("/api/interactions", post(interactions::interaction_handler))
        // Uploads are streamed through the chunker, not buffered
        .layer(DefaultBodyLimit::disable())
        .with_state(state)
}

pub async fn serve(state: AppState, addr: &str) -> anyhow::Result<()> {
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Vault server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
