//! Event-sourced listing reconciliation for the marketplace listing indexer.
//!
//! This crate is the heart of the indexer. It provides:
//! - Typed marketplace events and their validated decoding from raw input
//! - `EventReducer`: one handler per event kind, folding events into a
//!   `ListingStore` with existence-check-then-act semantics
//! - `ListingQuery`: the read-only query surface over the store
//! - Deterministic replay of an event sequence into a fresh table

pub mod error;
pub mod event;
pub mod query;
pub mod reducer;
pub mod replay;

pub use error::{IndexError, IndexResult};
pub use event::{decode_json_lines, EventEnvelope, EventKind, ListingEvent, RawEvent};
pub use query::{ListingFilter, ListingQuery};
pub use reducer::{Applied, EventReducer};
pub use replay::{ReplayEngine, ReplayResult};
