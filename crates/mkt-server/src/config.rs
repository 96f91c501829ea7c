use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use mkt_fabric::{SyncMode, WalConfig};
use serde::{Deserialize, Serialize};

use crate::error::{ServerError, ServerResult};
use crate::router::DEFAULT_BODY_LIMIT;

/// Listing server configuration, usually loaded from a TOML file.
///
/// Every field has a default, so a partial file is valid.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Event log location. `None` keeps the table in memory only.
    pub wal_path: Option<PathBuf>,
    pub sync_mode: SyncMode,
    /// Upper bound on a single request body.
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            wal_path: None,
            sync_mode: SyncMode::default(),
            max_body_bytes: DEFAULT_BODY_LIMIT,
        }
    }
}

impl ServerConfig {
    /// Parse a TOML document.
    pub fn from_toml(input: &str) -> ServerResult<Self> {
        toml::from_str(input).map_err(|e| ServerError::Config(e.to_string()))
    }

    /// Read and parse a TOML file.
    pub fn load(path: &Path) -> ServerResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    pub fn wal_config(&self) -> WalConfig {
        WalConfig {
            sync_mode: self.sync_mode,
        }
    }
}
