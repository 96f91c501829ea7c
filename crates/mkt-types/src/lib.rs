//! Foundation types for the marketplace listing indexer.
//!
//! Every other crate in the workspace depends on `mkt-types`. The types here
//! are plain values: no storage, no I/O.
//!
//! # Key Types
//!
//! - [`Address`] — 20-byte account or contract address, lower-case hex on the wire
//! - [`Uint`] — arbitrary-precision non-negative integer (token ids, prices)
//! - [`BlockPosition`] — on-chain ordering position of an event
//! - [`ListingKey`] — composite `(contract, token_id, seller)` identity of a listing
//! - [`ListingRecord`] — current state of one listing
//! - [`ListingState`] — lifecycle classification (`NonExistent`, `Active`, `Sold`)

pub mod address;
pub mod error;
pub mod identity;
pub mod listing;
pub mod position;
pub mod uint;

pub use address::Address;
pub use error::TypeError;
pub use identity::ListingKey;
pub use listing::{ListingRecord, ListingState};
pub use position::BlockPosition;
pub use uint::Uint;
