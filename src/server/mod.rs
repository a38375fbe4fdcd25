//! axum HTTP surface.

pub mod error;
pub mod handlers;
pub mod upload;

use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::settings::Settings;
use crate::store::LetterheadStore;

/// Shared, read-only handles injected into every handler.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub store: Arc<LetterheadStore>,
}

impl AppState {
    /// State with a letterhead store rooted at `settings.storage_dir`.
    pub fn new(settings: Settings) -> Self {
        let store = LetterheadStore::new(&settings.storage_dir);
        Self {
            settings: Arc::new(settings),
            store: Arc::new(store),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers(Any);
    let body_limit = state.settings.max_upload_bytes;

    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/merge", post(handlers::merge))
        .route("/api/combine", post(handlers::combine))
        .route("/api/optimize", post(handlers::optimize))
        .route(
            "/api/letterhead",
            post(handlers::upload_letterhead)
                .get(handlers::letterhead_info)
                .delete(handlers::delete_letterhead),
        )
        .route("/api/letterhead/download", get(handlers::download_letterhead))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
