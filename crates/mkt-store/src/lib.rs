//! Listing table storage for the marketplace listing indexer.
//!
//! The store is the only mutable state of the indexer: a mapping from
//! [`ListingKey`](mkt_types::ListingKey) to the current
//! [`ListingRecord`](mkt_types::ListingRecord). It knows nothing about
//! events; the reducer in `mkt-index` decides what to write.
//!
//! # Storage Backends
//!
//! All backends implement the [`ListingStore`] trait:
//!
//! - [`InMemoryListingStore`] -- `BTreeMap`-based store for tests and embedding
//!
//! # Design Rules
//!
//! 1. All mutations to the table are serialized; a reader never sees a
//!    half-applied mutation.
//! 2. `modify` is an atomic read-modify-write on one key.
//! 3. Scans return records in key order.
//! 4. All backend failures are propagated, never silently ignored.

pub mod error;
pub mod memory;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use memory::InMemoryListingStore;
pub use traits::ListingStore;
