use std::sync::Arc;

use tokio::net::TcpListener;

use mkt_fabric::Indexer;
use mkt_store::InMemoryListingStore;

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::router::build_router;

/// Listing indexer server.
pub struct ListingServer {
    config: ServerConfig,
    indexer: Arc<Indexer>,
}

impl ListingServer {
    /// Build a server from config. With a `wal_path` the table is rebuilt
    /// from the log before the server is returned.
    pub fn new(config: ServerConfig) -> ServerResult<Self> {
        let indexer = match &config.wal_path {
            Some(path) => {
                let indexer = Indexer::open(
                    Arc::new(InMemoryListingStore::new()),
                    path,
                    config.wal_config(),
                )?;
                indexer.recover()?;
                indexer
            }
            None => Indexer::in_memory(),
        };
        Ok(Self::with_indexer(config, Arc::new(indexer)))
    }

    /// Serve an existing indexer.
    pub fn with_indexer(config: ServerConfig, indexer: Arc<Indexer>) -> Self {
        Self { config, indexer }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn indexer(&self) -> &Arc<Indexer> {
        &self.indexer
    }

    /// Build the router (useful for testing).
    pub fn router(&self) -> axum::Router {
        build_router(Arc::clone(&self.indexer), self.config.max_body_bytes)
    }

    /// Start serving requests.
    pub async fn serve(self) -> ServerResult<()> {
        let app = self.router();
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!(
            bind_addr = %self.config.bind_addr,
            durable = self.config.wal_path.is_some(),
            "listing server listening"
        );
        axum::serve(listener, app)
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))
    }
}
