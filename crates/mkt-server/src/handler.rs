use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::response::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

use mkt_fabric::{IngestOutcome, Indexer};
use mkt_index::ListingFilter;
use mkt_types::{ListingRecord, ListingState};

use crate::error::{ServerError, ServerResult};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub indexer: Arc<Indexer>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// A listing as returned by the API: the record plus its persisted key.
#[derive(Debug, Serialize)]
pub struct ListingView {
    pub id: String,
    pub state: ListingState,
    #[serde(flatten)]
    pub record: ListingRecord,
}

impl From<ListingRecord> for ListingView {
    fn from(record: ListingRecord) -> Self {
        Self {
            id: record.key().encode(),
            state: record.state(),
            record,
        }
    }
}

/// Query string for `GET /v1/listings`. Filters combine with AND.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub active: bool,
    pub contract: Option<String>,
    pub seller: Option<String>,
    pub token_id: Option<String>,
}

impl ListParams {
    pub fn to_filter(&self) -> ServerResult<ListingFilter> {
        Ok(ListingFilter::parse(
            self.active,
            self.contract.as_deref(),
            self.seller.as_deref(),
            self.token_id.as_deref(),
        )?)
    }
}

/// Health check handler.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::default())
}

/// Info handler.
pub async fn info_handler(State(state): State<AppState>) -> ServerResult<Json<serde_json::Value>> {
    let query = state.indexer.query();
    let stats = state.indexer.stats()?;
    Ok(Json(json!({
        "name": "mkt-server",
        "version": env!("CARGO_PKG_VERSION"),
        "listings": query.count()?,
        "active_listings": query.list_active()?.len(),
        "durable": state.indexer.wal().is_some(),
        "stats": stats,
    })))
}

pub async fn list_listings_handler(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> ServerResult<Json<Vec<ListingView>>> {
    let filter = params.to_filter()?;
    let records = state.indexer.query().list(&filter)?;
    Ok(Json(records.into_iter().map(ListingView::from).collect()))
}

pub async fn get_listing_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ServerResult<Json<ListingView>> {
    match state.indexer.query().get_encoded(&key)? {
        Some(record) => Ok(Json(record.into())),
        None => Err(ServerError::NotFound(key)),
    }
}

/// Ingest one raw event. The body is decoded by the indexer so that bad
/// JSON is counted as a rejected event. WAL and store writes block, so the
/// work runs on the blocking pool.
pub async fn ingest_event_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> ServerResult<Json<IngestOutcome>> {
    let indexer = Arc::clone(&state.indexer);
    let outcome = tokio::task::spawn_blocking(move || indexer.ingest_json(&body))
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))??;
    Ok(Json(outcome))
}
