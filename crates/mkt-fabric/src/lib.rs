//! Ingestion fabric for the marketplace listing indexer.
//!
//! Sits between an event source and the reducer. Every accepted event is
//! content-addressed, deduplicated, written to a crash-recoverable
//! Write-Ahead Log (WAL), and only then folded into the listing table. On
//! restart the table is rebuilt by replaying the WAL.

pub mod error;
pub mod event;
pub mod indexer;
pub mod wal;

pub use error::FabricError;
pub use event::{EventId, LoggedEvent};
pub use indexer::{IngestOutcome, Indexer, IndexerStats, RecoveryReport};
pub use wal::{SyncMode, WalConfig, WriteAheadLog};
