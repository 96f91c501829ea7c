use std::collections::BTreeMap;
use std::sync::Arc;

use mkt_store::{InMemoryListingStore, ListingStore};
use mkt_types::{BlockPosition, ListingKey, ListingRecord};

use crate::error::IndexResult;
use crate::event::EventEnvelope;
use crate::reducer::EventReducer;

/// Result of folding an event sequence into a fresh table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplayResult {
    pub evaluated_events: u64,
    pub applied_events: u64,
    pub ignored_events: u64,
    pub last_position: Option<BlockPosition>,
    pub records: BTreeMap<ListingKey, ListingRecord>,
}

impl ReplayResult {
    /// Load the replayed table into a new in-memory store.
    pub fn into_store(self) -> IndexResult<InMemoryListingStore> {
        let store = InMemoryListingStore::new();
        for record in self.records.into_values() {
            store.put(record)?;
        }
        Ok(store)
    }
}

/// Deterministic replay helpers.
pub struct ReplayEngine;

impl ReplayEngine {
    /// Fold events in the order given.
    pub fn replay(envelopes: &[EventEnvelope]) -> IndexResult<ReplayResult> {
        let store = Arc::new(InMemoryListingStore::new());
        let mut result = Self::replay_into(&store, envelopes)?;
        result.records = store.snapshot()?;
        Ok(result)
    }

    /// Fold events after sorting them by block position.
    ///
    /// Used for backfills that fetch block ranges in parallel and deliver
    /// them out of order. The sort is stable, so events sharing a position
    /// keep their relative order.
    pub fn replay_ordered(envelopes: &[EventEnvelope]) -> IndexResult<ReplayResult> {
        let mut sorted = envelopes.to_vec();
        sorted.sort_by_key(|e| e.position);
        Self::replay(&sorted)
    }

    /// Fold events into an existing store and report counts.
    ///
    /// `records` is left empty; callers read the store directly.
    pub fn replay_into<S: ListingStore + ?Sized>(
        store: &Arc<S>,
        envelopes: &[EventEnvelope],
    ) -> IndexResult<ReplayResult> {
        let reducer = EventReducer::new(Arc::clone(store));
        let mut applied_events = 0u64;
        let mut ignored_events = 0u64;
        let mut last_position = None;

        for envelope in envelopes {
            if reducer.apply_envelope(envelope)?.is_ignored() {
                ignored_events += 1;
            } else {
                applied_events += 1;
            }
            last_position = Some(envelope.position);
        }

        Ok(ReplayResult {
            evaluated_events: envelopes.len() as u64,
            applied_events,
            ignored_events,
            last_position,
            records: BTreeMap::new(),
        })
    }

    /// Check that a live store holds exactly the fold of `envelopes`.
    pub fn verify_convergence<S: ListingStore + ?Sized>(
        store: &S,
        envelopes: &[EventEnvelope],
    ) -> IndexResult<bool> {
        let replayed = Self::replay(envelopes)?;
        let live = store.scan()?;
        Ok(live.len() == replayed.records.len()
            && live
                .iter()
                .all(|r| replayed.records.get(&r.key()) == Some(r)))
    }
}
