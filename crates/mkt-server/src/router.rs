use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use mkt_fabric::Indexer;

use crate::handler::{self, AppState};

/// Default request body bound used when no config is supplied.
pub const DEFAULT_BODY_LIMIT: usize = 64 * 1024;

/// Build the axum router with all listing endpoints.
pub fn build_router(indexer: Arc<Indexer>, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/v1/health", get(handler::health_handler))
        .route("/v1/info", get(handler::info_handler))
        .route("/v1/listings", get(handler::list_listings_handler))
        .route("/v1/listings/:key", get(handler::get_listing_handler))
        .route("/v1/events", post(handler::ingest_event_handler))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { indexer })
}
