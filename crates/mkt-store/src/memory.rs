use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use mkt_types::{ListingKey, ListingRecord};
use tracing::trace;

use crate::error::{StoreError, StoreResult};
use crate::traits::ListingStore;

/// In-memory, `BTreeMap`-based listing store.
///
/// Intended for tests, embedding, and as the live table of a running
/// indexer (durability comes from the event log, not from this table). One
/// `RwLock` guards the whole map, so every mutation is serialized and reads
/// run concurrently with each other.
pub struct InMemoryListingStore {
    records: RwLock<BTreeMap<ListingKey, ListingRecord>>,
}

impl InMemoryListingStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            records: RwLock::new(BTreeMap::new()),
        }
    }

    /// Copy of the whole table, keyed by listing key.
    pub fn snapshot(&self) -> StoreResult<BTreeMap<ListingKey, ListingRecord>> {
        Ok(self.read_guard()?.clone())
    }

    /// Remove every record.
    pub fn clear(&self) -> StoreResult<()> {
        self.write_guard()?.clear();
        Ok(())
    }

    fn read_guard(&self) -> StoreResult<RwLockReadGuard<'_, BTreeMap<ListingKey, ListingRecord>>> {
        self.records
            .read()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }

    fn write_guard(
        &self,
    ) -> StoreResult<RwLockWriteGuard<'_, BTreeMap<ListingKey, ListingRecord>>> {
        self.records
            .write()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }
}

impl Default for InMemoryListingStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ListingStore for InMemoryListingStore {
    fn get(&self, key: &ListingKey) -> StoreResult<Option<ListingRecord>> {
        Ok(self.read_guard()?.get(key).cloned())
    }

    fn put(&self, record: ListingRecord) -> StoreResult<Option<ListingRecord>> {
        let key = record.key();
        let mut map = self.write_guard()?;
        trace!(%key, "put listing");
        Ok(map.insert(key, record))
    }

    fn remove(&self, key: &ListingKey) -> StoreResult<Option<ListingRecord>> {
        let mut map = self.write_guard()?;
        trace!(%key, "remove listing");
        Ok(map.remove(key))
    }

    fn modify(
        &self,
        key: &ListingKey,
        f: &mut dyn FnMut(&mut ListingRecord),
    ) -> StoreResult<bool> {
        let mut map = self.write_guard()?;
        let Some(current) = map.get(key) else {
            return Ok(false);
        };

        // Mutate a copy and swap it in, so a panicking closure leaves the
        // stored record untouched.
        let mut updated = current.clone();
        f(&mut updated);
        map.insert(key.clone(), updated);
        trace!(%key, "modify listing");
        Ok(true)
    }

    fn scan(&self) -> StoreResult<Vec<ListingRecord>> {
        Ok(self.read_guard()?.values().cloned().collect())
    }

    fn len(&self) -> StoreResult<usize> {
        Ok(self.read_guard()?.len())
    }
}

impl std::fmt::Debug for InMemoryListingStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.read_guard().map(|m| m.len()).unwrap_or_default();
        f.debug_struct("InMemoryListingStore")
            .field("record_count", &count)
            .finish()
    }
}
