use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tracing::{debug, info, warn};

use mkt_index::{Applied, EventEnvelope, EventReducer, ListingQuery, RawEvent};
use mkt_store::{InMemoryListingStore, ListingStore};
use mkt_types::BlockPosition;

use crate::error::{FabricError, Result};
use crate::event::{EventId, LoggedEvent};
use crate::wal::{WalConfig, WriteAheadLog};

/// Result of handing one event to the indexer.
///
/// Serializes as `{"status": "applied", "effect": "inserted"}` or
/// `{"status": "duplicate"}`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "effect", rename_all = "snake_case")]
pub enum IngestOutcome {
    /// The event was logged and reduced.
    Applied(Applied),
    /// An event with the same id was already applied; nothing happened.
    Duplicate,
}

/// Running counters for an [`Indexer`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct IndexerStats {
    /// Events that changed the table.
    pub applied: u64,
    /// Events reduced as no-ops (target listing absent).
    pub ignored: u64,
    /// Redeliveries skipped by id.
    pub duplicates: u64,
    /// Raw events rejected as malformed.
    pub rejected: u64,
    /// Highest block position reduced so far.
    pub high_water: Option<BlockPosition>,
    /// Event ids currently remembered for deduplication.
    pub tracked_ids: u64,
}

/// Summary of rebuilding the table from the WAL.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RecoveryReport {
    pub recovered: u64,
    pub applied: u64,
    pub ignored: u64,
    pub duplicates: u64,
    pub corrupt: u64,
}

#[derive(Default)]
struct IngestState {
    /// Applied ids and their positions. Grows by one entry per
    /// applied event until [`Indexer::forget_before`] prunes it.
    seen: HashMap<EventId, BlockPosition>,
    stats: IndexerStats,
}

impl IngestState {
    fn reject(&mut self, error: &mkt_index::IndexError) {
        self.stats.rejected += 1;
        warn!(error = %error, "rejected malformed event");
    }
}

/// Ingestion driver: the single entry point for events.
///
/// Per event: compute its id, skip it if already applied, append it to the
/// WAL (if one is configured), then reduce it into the store. Ingestion is
/// serialized by one mutex, so the indexer can be shared across backfill
/// threads. A store failure leaves the event unapplied; the driver may
/// retry it and the retry is not treated as a duplicate.
pub struct Indexer {
    reducer: EventReducer<dyn ListingStore>,
    query: ListingQuery<dyn ListingStore>,
    wal: Option<WriteAheadLog>,
    state: Mutex<IngestState>,
}

impl Indexer {
    /// Indexer over `store` with no durable log.
    pub fn new(store: Arc<dyn ListingStore>) -> Self {
        Self {
            reducer: EventReducer::new(Arc::clone(&store)),
            query: ListingQuery::new(store),
            wal: None,
            state: Mutex::new(IngestState::default()),
        }
    }

    /// Indexer over a fresh in-memory store with no durable log.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryListingStore::new()))
    }

    /// Indexer over `store` that logs every event to the WAL at `wal_path`.
    ///
    /// The store is not populated from the log; call [`Indexer::recover`].
    pub fn open(store: Arc<dyn ListingStore>, wal_path: &Path, config: WalConfig) -> Result<Self> {
        let wal = WriteAheadLog::open(wal_path, config)?;
        info!(wal_path = %wal_path.display(), "indexer opened");
        let mut indexer = Self::new(store);
        indexer.wal = Some(wal);
        Ok(indexer)
    }

    /// Read-only query surface over this indexer's store.
    pub fn query(&self) -> ListingQuery<dyn ListingStore> {
        self.query.clone()
    }

    pub fn store(&self) -> &Arc<dyn ListingStore> {
        self.reducer.store()
    }

    pub fn wal(&self) -> Option<&WriteAheadLog> {
        self.wal.as_ref()
    }

    pub fn stats(&self) -> Result<IndexerStats> {
        let state = self.lock_state()?;
        let mut stats = state.stats.clone();
        stats.tracked_ids = state.seen.len() as u64;
        Ok(stats)
    }

    /// Stop remembering ids of events before `position`. Returns how many
    /// ids were dropped.
    ///
    /// Only call this once the event source can no longer redeliver those
    /// events (for example past chain finality): a pruned event that is
    /// delivered again is applied again.
    pub fn forget_before(&self, position: BlockPosition) -> Result<usize> {
        let mut state = self.lock_state()?;
        let before = state.seen.len();
        state.seen.retain(|_, seen_at| *seen_at >= position);
        let dropped = before - state.seen.len();
        debug!(%position, dropped, "pruned dedup ids");
        Ok(dropped)
    }

    /// Ingest one validated event.
    pub fn ingest(&self, envelope: &EventEnvelope) -> Result<IngestOutcome> {
        let logged = LoggedEvent::new(envelope.clone())?;
        let mut state = self.lock_state()?;

        if state.seen.contains_key(&logged.id) {
            state.stats.duplicates += 1;
            debug!(id = %logged.id, position = %envelope.position, "duplicate event skipped");
            return Ok(IngestOutcome::Duplicate);
        }

        if let Some(wal) = &self.wal {
            wal.append(&logged)?;
        }

        let applied = self.reducer.apply_envelope(envelope)?;
        record_applied(&mut state, logged.id, envelope.position, applied);
        Ok(IngestOutcome::Applied(applied))
    }

    /// Decode and ingest one raw event. Malformed input is counted and
    /// returned as an error without touching the log or the store.
    pub fn ingest_raw(&self, raw: &RawEvent) -> Result<IngestOutcome> {
        match raw.decode() {
            Ok(envelope) => self.ingest(&envelope),
            Err(e) => {
                self.lock_state()?.reject(&e);
                Err(e.into())
            }
        }
    }

    /// Parse one JSON-encoded raw event and ingest it. Bodies that are not
    /// a JSON event object are rejected like any other malformed event.
    pub fn ingest_json(&self, input: &[u8]) -> Result<IngestOutcome> {
        match RawEvent::from_json_slice(input) {
            Ok(raw) => self.ingest_raw(&raw),
            Err(e) => {
                self.lock_state()?.reject(&e);
                Err(e.into())
            }
        }
    }

    /// Ingest a batch in order, stopping at the first failure.
    pub fn ingest_batch(&self, envelopes: &[EventEnvelope]) -> Result<Vec<IngestOutcome>> {
        envelopes.iter().map(|e| self.ingest(e)).collect()
    }

    /// Rebuild the store by replaying the WAL.
    ///
    /// Entries are reduced in log order without being re-logged. Entries
    /// whose id does not match their body are skipped as corrupt; repeated
    /// ids (a retried event logged twice) are applied once.
    pub fn recover(&self) -> Result<RecoveryReport> {
        let Some(wal) = &self.wal else {
            return Ok(RecoveryReport::default());
        };

        let entries = wal.recover()?;
        let mut state = self.lock_state()?;
        let mut report = RecoveryReport {
            recovered: entries.len() as u64,
            ..RecoveryReport::default()
        };

        for entry in entries {
            if !entry.verify_integrity() {
                warn!(id = %entry.id, "WAL entry failed integrity check; skipping");
                report.corrupt += 1;
                continue;
            }
            if state.seen.contains_key(&entry.id) {
                report.duplicates += 1;
                continue;
            }
            let applied = self.reducer.apply_envelope(&entry.envelope)?;
            if applied.is_ignored() {
                report.ignored += 1;
            } else {
                report.applied += 1;
            }
            record_applied(&mut state, entry.id, entry.envelope.position, applied);
        }

        info!(
            recovered = report.recovered,
            applied = report.applied,
            ignored = report.ignored,
            duplicates = report.duplicates,
            corrupt = report.corrupt,
            "indexer recovered from WAL"
        );
        Ok(report)
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, IngestState>> {
        self.state
            .lock()
            .map_err(|e| FabricError::LockPoisoned(e.to_string()))
    }
}

fn record_applied(state: &mut IngestState, id: EventId, position: BlockPosition, applied: Applied) {
    state.seen.insert(id, position);
    if applied.is_ignored() {
        state.stats.ignored += 1;
    } else {
        state.stats.applied += 1;
    }
    if state.stats.high_water.map_or(true, |hw| position > hw) {
        state.stats.high_water = Some(position);
    }
}

impl std::fmt::Debug for Indexer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Indexer")
            .field("wal", &self.wal)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mkt_index::ListingEvent;
    use mkt_store::{StoreError, StoreResult};
    use mkt_types::{Address, ListingKey, ListingRecord, Uint};

    fn addr(byte: u8) -> Address {
        Address::from_bytes([byte; 20])
    }

    fn key() -> ListingKey {
        ListingKey::resolve(addr(0xcc), Uint::from_u64(1), addr(0xaa))
    }

    fn created(block: u64, price: u64) -> EventEnvelope {
        EventEnvelope::new(
            BlockPosition::new(block, 0),
            ListingEvent::Created {
                seller: addr(0xaa),
                contract: addr(0xcc),
                token_id: Uint::from_u64(1),
                price: Uint::from_u64(price),
            },
        )
    }

    fn updated(block: u64, price: u64) -> EventEnvelope {
        EventEnvelope::new(
            BlockPosition::new(block, 0),
            ListingEvent::Updated {
                seller: addr(0xaa),
                contract: addr(0xcc),
                token_id: Uint::from_u64(1),
                new_price: Uint::from_u64(price),
            },
        )
    }

    #[test]
    fn ingest_applies_and_counts() {
        let indexer = Indexer::in_memory();
        assert_eq!(
            indexer.ingest(&created(1, 100)).unwrap(),
            IngestOutcome::Applied(Applied::Inserted)
        );
        assert_eq!(
            indexer.ingest(&updated(2, 150)).unwrap(),
            IngestOutcome::Applied(Applied::PriceChanged)
        );

        let record = indexer.query().get(&key()).unwrap().unwrap();
        assert_eq!(record.price, Uint::from_u64(150));

        let stats = indexer.stats().unwrap();
        assert_eq!(stats.applied, 2);
        assert_eq!(stats.high_water, Some(BlockPosition::new(2, 0)));
    }

    #[test]
    fn redelivered_create_does_not_reset_price() {
        let indexer = Indexer::in_memory();
        indexer.ingest(&created(1, 100)).unwrap();
        indexer.ingest(&updated(2, 150)).unwrap();

        assert_eq!(indexer.ingest(&created(1, 100)).unwrap(), IngestOutcome::Duplicate);
        let record = indexer.query().get(&key()).unwrap().unwrap();
        assert_eq!(record.price, Uint::from_u64(150));
        assert_eq!(indexer.stats().unwrap().duplicates, 1);
    }

    #[test]
    fn malformed_raw_event_is_rejected_without_side_effects() {
        let indexer = Indexer::in_memory();
        let raw = RawEvent {
            kind: Some("created".into()),
            seller: Some("0x1234".into()),
            block: Some(1),
            ..RawEvent::default()
        };
        let err = indexer.ingest_raw(&raw).unwrap_err();
        assert!(err.is_malformed());
        assert_eq!(indexer.query().count().unwrap(), 0);
        assert_eq!(indexer.stats().unwrap().rejected, 1);
    }

    #[test]
    fn ingest_json_rejects_wrong_field_types() {
        let indexer = Indexer::in_memory();
        let err = indexer
            .ingest_json(br#"{"kind":"created","block":"7"}"#)
            .unwrap_err();
        assert!(err.is_malformed());
        assert!(indexer.ingest_json(b"not json").unwrap_err().is_malformed());
        assert_eq!(indexer.stats().unwrap().rejected, 2);
        assert_eq!(indexer.query().count().unwrap(), 0);
    }

    #[test]
    fn ingest_json_applies_valid_event() {
        let indexer = Indexer::in_memory();
        let body = format!(
            r#"{{"kind":"created","seller":"{}","contract":"{}","token_id":"1","price":"100","block":1}}"#,
            addr(0xaa),
            addr(0xcc)
        );
        assert_eq!(
            indexer.ingest_json(body.as_bytes()).unwrap(),
            IngestOutcome::Applied(Applied::Inserted)
        );
    }

    #[test]
    fn forget_before_bounds_tracked_ids() {
        let indexer = Indexer::in_memory();
        indexer
            .ingest_batch(&[created(1, 100), updated(2, 150), updated(3, 175)])
            .unwrap();
        assert_eq!(indexer.stats().unwrap().tracked_ids, 3);

        let dropped = indexer.forget_before(BlockPosition::new(3, 0)).unwrap();
        assert_eq!(dropped, 2);
        assert_eq!(indexer.stats().unwrap().tracked_ids, 1);

        // Still remembered.
        assert_eq!(indexer.ingest(&updated(3, 175)).unwrap(), IngestOutcome::Duplicate);
    }

    #[test]
    fn duplicates_and_failures_do_not_grow_tracked_ids() {
        let indexer = Indexer::in_memory();
        indexer.ingest(&created(1, 100)).unwrap();
        indexer.ingest(&created(1, 100)).unwrap();
        let _ = indexer.ingest_json(b"{}");
        assert_eq!(indexer.stats().unwrap().tracked_ids, 1);
    }

    #[test]
    fn ignored_events_are_counted() {
        let indexer = Indexer::in_memory();
        assert_eq!(
            indexer.ingest(&updated(1, 5)).unwrap(),
            IngestOutcome::Applied(Applied::Ignored)
        );
        assert_eq!(indexer.stats().unwrap().ignored, 1);
    }

    #[test]
    fn recover_rebuilds_store_from_wal() {
        let dir = tempfile::tempdir().unwrap();
        let wal_path = dir.path().join("events.wal");

        {
            let indexer = Indexer::open(
                Arc::new(InMemoryListingStore::new()),
                &wal_path,
                WalConfig::default(),
            )
            .unwrap();
            indexer
                .ingest_batch(&[created(1, 100), updated(2, 150)])
                .unwrap();
        }

        let store = Arc::new(InMemoryListingStore::new());
        let indexer = Indexer::open(store.clone(), &wal_path, WalConfig::default()).unwrap();
        let report = indexer.recover().unwrap();
        assert_eq!(report.recovered, 2);
        assert_eq!(report.applied, 2);
        assert_eq!(store.get(&key()).unwrap().unwrap().price, Uint::from_u64(150));

        // Recovered ids are remembered, so redelivery stays a duplicate.
        assert_eq!(indexer.ingest(&created(1, 100)).unwrap(), IngestOutcome::Duplicate);
    }

    #[test]
    fn recover_without_wal_is_empty() {
        let indexer = Indexer::in_memory();
        assert_eq!(indexer.recover().unwrap(), RecoveryReport::default());
        assert!(indexer.wal().is_none());
    }

    struct FlakyStore {
        inner: InMemoryListingStore,
        fail: std::sync::atomic::AtomicBool,
    }

    impl FlakyStore {
        fn check(&self) -> StoreResult<()> {
            if self.fail.load(std::sync::atomic::Ordering::SeqCst) {
                Err(StoreError::Unavailable("disk offline".into()))
            } else {
                Ok(())
            }
        }
    }

    impl ListingStore for FlakyStore {
        fn get(&self, key: &ListingKey) -> StoreResult<Option<ListingRecord>> {
            self.inner.get(key)
        }
        fn put(&self, record: ListingRecord) -> StoreResult<Option<ListingRecord>> {
            self.check()?;
            self.inner.put(record)
        }
        fn remove(&self, key: &ListingKey) -> StoreResult<Option<ListingRecord>> {
            self.check()?;
            self.inner.remove(key)
        }
        fn modify(
            &self,
            key: &ListingKey,
            f: &mut dyn FnMut(&mut ListingRecord),
        ) -> StoreResult<bool> {
            self.check()?;
            self.inner.modify(key, f)
        }
        fn scan(&self) -> StoreResult<Vec<ListingRecord>> {
            self.inner.scan()
        }
        fn len(&self) -> StoreResult<usize> {
            self.inner.len()
        }
    }

    #[test]
    fn store_failure_leaves_event_retryable() {
        let store = Arc::new(FlakyStore {
            inner: InMemoryListingStore::new(),
            fail: std::sync::atomic::AtomicBool::new(true),
        });
        let indexer = Indexer::new(store.clone());

        let err = indexer.ingest(&created(1, 100)).unwrap_err();
        assert!(!err.is_malformed());
        assert_eq!(store.len().unwrap(), 0);

        store.fail.store(false, std::sync::atomic::Ordering::SeqCst);
        assert_eq!(
            indexer.ingest(&created(1, 100)).unwrap(),
            IngestOutcome::Applied(Applied::Inserted)
        );
    }

    #[test]
    fn shared_across_threads() {
        use std::thread;

        let indexer = Arc::new(Indexer::in_memory());
        let handles: Vec<_> = (0..4u8)
            .map(|t| {
                let indexer = Arc::clone(&indexer);
                thread::spawn(move || {
                    for token in 0..25u64 {
                        let envelope = EventEnvelope::new(
                            BlockPosition::new(u64::from(t) * 100 + token, 0),
                            ListingEvent::Created {
                                seller: addr(t + 1),
                                contract: addr(0xcc),
                                token_id: Uint::from_u64(token),
                                price: Uint::from_u64(1),
                            },
                        );
                        indexer.ingest(&envelope).unwrap();
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().expect("thread should not panic");
        }
        assert_eq!(indexer.query().count().unwrap(), 100);
        assert_eq!(indexer.stats().unwrap().applied, 100);
    }
}
