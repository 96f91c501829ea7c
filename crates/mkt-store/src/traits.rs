use mkt_types::{ListingKey, ListingRecord};

use crate::error::StoreResult;

/// Keyed listing table.
///
/// All implementations must satisfy these invariants:
/// - Every mutation is applied completely or not at all.
/// - Mutations are serialized; reads never observe a partial write.
/// - Operations on disjoint keys never interact.
/// - Scans are returned in `ListingKey` order.
pub trait ListingStore: Send + Sync {
    /// Point lookup.
    ///
    /// Returns `Ok(None)` if no record exists for the key.
    fn get(&self, key: &ListingKey) -> StoreResult<Option<ListingRecord>>;

    /// Insert a record, replacing any record stored under the same key.
    ///
    /// Returns the record that was replaced, if any.
    fn put(&self, record: ListingRecord) -> StoreResult<Option<ListingRecord>>;

    /// Delete a record. Returns the removed record, if one existed.
    fn remove(&self, key: &ListingKey) -> StoreResult<Option<ListingRecord>>;

    /// Atomically apply `f` to the record under `key`, if it exists.
    ///
    /// Returns `Ok(false)` without calling `f` when the key is absent. The
    /// existence check and the write happen under one exclusive section.
    fn modify(
        &self,
        key: &ListingKey,
        f: &mut dyn FnMut(&mut ListingRecord),
    ) -> StoreResult<bool>;

    /// Every record, in key order.
    fn scan(&self) -> StoreResult<Vec<ListingRecord>>;

    /// Number of records.
    fn len(&self) -> StoreResult<usize>;

    fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }

    fn contains(&self, key: &ListingKey) -> StoreResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Records with no buyer, in key order.
    ///
    /// Default implementation filters `scan()`. Backends with a secondary
    /// index may override.
    fn scan_active(&self) -> StoreResult<Vec<ListingRecord>> {
        Ok(self
            .scan()?
            .into_iter()
            .filter(ListingRecord::is_active)
            .collect())
    }
}
