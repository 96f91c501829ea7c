use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use mkt_store::ListingStore;
use mkt_types::{Address, ListingKey, ListingRecord, Uint};

use crate::error::IndexResult;
use crate::event::{EventEnvelope, ListingEvent};

/// What a handler did to the listing table.
///
/// Absence of the target listing is reported as `Ignored`, never as an
/// error: the table is a best-effort view of on-chain state and must keep
/// ingesting when its local view disagrees with the chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Applied {
    /// A create found no record and inserted one.
    Inserted,
    /// A create overwrote an existing record, resetting price and buyer.
    Replaced,
    /// An update changed the price of an existing record.
    PriceChanged,
    /// A purchase recorded (or overwrote) the buyer of an existing record.
    BuyerSet,
    /// A cancel deleted an existing record.
    Removed,
    /// The target listing does not exist; the table is unchanged.
    Ignored,
}

impl Applied {
    pub fn is_ignored(&self) -> bool {
        matches!(self, Self::Ignored)
    }
}

/// Folds marketplace events into a [`ListingStore`].
///
/// One handler per event kind. Every handler resolves the listing key from
/// the event's identity fields and then checks existence before acting.
/// Only store failures surface as errors.
pub struct EventReducer<S: ListingStore + ?Sized> {
    store: Arc<S>,
}

impl<S: ListingStore + ?Sized> Clone for EventReducer<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: ListingStore + ?Sized> EventReducer<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// The store this reducer writes to.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Create or overwrite the listing with buyer cleared.
    pub fn on_created(
        &self,
        seller: Address,
        contract: Address,
        token_id: Uint,
        price: Uint,
    ) -> IndexResult<Applied> {
        let record = ListingRecord::new(seller, contract, token_id, price);
        let key = record.key();
        let applied = match self.store.put(record)? {
            Some(_) => Applied::Replaced,
            None => Applied::Inserted,
        };
        debug!(%key, ?applied, "listing created");
        Ok(applied)
    }

    /// Set the price of an existing listing.
    pub fn on_updated(
        &self,
        seller: Address,
        contract: Address,
        token_id: Uint,
        new_price: Uint,
    ) -> IndexResult<Applied> {
        let key = ListingKey::resolve(contract, token_id, seller);
        let found = self
            .store
            .modify(&key, &mut |record| record.price = new_price.clone())?;
        let applied = if found {
            Applied::PriceChanged
        } else {
            Applied::Ignored
        };
        debug!(%key, ?applied, "listing updated");
        Ok(applied)
    }

    /// Record the buyer of an existing listing.
    pub fn on_purchased(
        &self,
        seller: Address,
        contract: Address,
        token_id: Uint,
        buyer: Address,
    ) -> IndexResult<Applied> {
        let key = ListingKey::resolve(contract, token_id, seller);
        let found = self
            .store
            .modify(&key, &mut |record| record.buyer = Some(buyer))?;
        let applied = if found {
            Applied::BuyerSet
        } else {
            Applied::Ignored
        };
        debug!(%key, ?applied, "listing purchased");
        Ok(applied)
    }

    /// Delete an existing listing.
    pub fn on_canceled(
        &self,
        seller: Address,
        contract: Address,
        token_id: Uint,
    ) -> IndexResult<Applied> {
        let key = ListingKey::resolve(contract, token_id, seller);
        let applied = match self.store.remove(&key)? {
            Some(_) => Applied::Removed,
            None => Applied::Ignored,
        };
        debug!(%key, ?applied, "listing canceled");
        Ok(applied)
    }

    /// Dispatch an event to its handler.
    pub fn apply(&self, event: &ListingEvent) -> IndexResult<Applied> {
        match event.clone() {
            ListingEvent::Created {
                seller,
                contract,
                token_id,
                price,
            } => self.on_created(seller, contract, token_id, price),
            ListingEvent::Updated {
                seller,
                contract,
                token_id,
                new_price,
            } => self.on_updated(seller, contract, token_id, new_price),
            ListingEvent::Purchased {
                seller,
                contract,
                token_id,
                buyer,
            } => self.on_purchased(seller, contract, token_id, buyer),
            ListingEvent::Canceled {
                seller,
                contract,
                token_id,
            } => self.on_canceled(seller, contract, token_id),
        }
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope) -> IndexResult<Applied> {
        let applied = self.apply(&envelope.event)?;
        debug!(position = %envelope.position, kind = %envelope.event.kind(), ?applied, "event applied");
        Ok(applied)
    }

    /// Apply a batch in order, stopping at the first store failure.
    pub fn apply_all<'a, I>(&self, envelopes: I) -> IndexResult<Vec<Applied>>
    where
        I: IntoIterator<Item = &'a EventEnvelope>,
    {
        envelopes
            .into_iter()
            .map(|envelope| self.apply_envelope(envelope))
            .collect()
    }
}
