use std::sync::Arc;

use mkt_store::ListingStore;
use mkt_types::{Address, ListingKey, ListingRecord, ListingState, Uint};

use crate::error::{IndexError, IndexResult};

/// Conjunctive listing filter. The default filter matches every listing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListingFilter {
    /// Only listings with no buyer.
    pub active: bool,
    pub contract: Option<Address>,
    pub seller: Option<Address>,
    pub token_id: Option<Uint>,
}

impl ListingFilter {
    pub fn active() -> Self {
        Self {
            active: true,
            ..Self::default()
        }
    }

    pub fn with_contract(mut self, contract: Address) -> Self {
        self.contract = Some(contract);
        self
    }

    pub fn with_seller(mut self, seller: Address) -> Self {
        self.seller = Some(seller);
        self
    }

    pub fn with_token_id(mut self, token_id: Uint) -> Self {
        self.token_id = Some(token_id);
        self
    }

    /// Build a filter from untrusted text (query strings, CLI flags).
    pub fn parse(
        active: bool,
        contract: Option<&str>,
        seller: Option<&str>,
        token_id: Option<&str>,
    ) -> IndexResult<Self> {
        Ok(Self {
            active,
            contract: contract.map(|c| parse_field("contract", c, Address::from_hex)).transpose()?,
            seller: seller.map(|s| parse_field("seller", s, Address::from_hex)).transpose()?,
            token_id: token_id.map(|t| parse_field("token_id", t, Uint::parse)).transpose()?,
        })
    }

    pub fn matches(&self, record: &ListingRecord) -> bool {
        (!self.active || record.is_active())
            && self.contract.map_or(true, |c| record.contract == c)
            && self.seller.map_or(true, |s| record.seller == s)
            && self.token_id.as_ref().map_or(true, |t| record.token_id == *t)
    }
}

fn parse_field<T, E: std::fmt::Display>(
    field: &str,
    input: &str,
    parse: impl FnOnce(&str) -> Result<T, E>,
) -> IndexResult<T> {
    parse(input).map_err(|e| IndexError::InvalidFilter {
        field: field.to_string(),
        reason: e.to_string(),
    })
}

/// Read-only view over the listing table.
///
/// "Not found" is `Ok(None)`; `Err` always means the store itself failed.
/// Every result reflects the store at call time.
pub struct ListingQuery<S: ListingStore + ?Sized> {
    store: Arc<S>,
}

impl<S: ListingStore + ?Sized> Clone for ListingQuery<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: ListingStore + ?Sized> ListingQuery<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn get(&self, key: &ListingKey) -> IndexResult<Option<ListingRecord>> {
        Ok(self.store.get(key)?)
    }

    /// Look up by the persisted string key.
    pub fn get_encoded(&self, encoded: &str) -> IndexResult<Option<ListingRecord>> {
        let key = ListingKey::decode(encoded)?;
        self.get(&key)
    }

    pub fn list_all(&self) -> IndexResult<Vec<ListingRecord>> {
        Ok(self.store.scan()?)
    }

    /// Listings with no buyer.
    pub fn list_active(&self) -> IndexResult<Vec<ListingRecord>> {
        Ok(self.store.scan_active()?)
    }

    /// Listings matching every criterion of `filter`, in key order.
    pub fn list(&self, filter: &ListingFilter) -> IndexResult<Vec<ListingRecord>> {
        let mut records = if filter.active {
            self.list_active()?
        } else {
            self.list_all()?
        };
        records.retain(|r| filter.matches(r));
        Ok(records)
    }

    pub fn list_by_contract(&self, contract: &Address) -> IndexResult<Vec<ListingRecord>> {
        self.list(&ListingFilter::default().with_contract(*contract))
    }

    pub fn list_by_seller(&self, seller: &Address) -> IndexResult<Vec<ListingRecord>> {
        self.list(&ListingFilter::default().with_seller(*seller))
    }

    /// Every listing of one token, across sellers.
    pub fn list_by_token(&self, contract: &Address, token_id: &Uint) -> IndexResult<Vec<ListingRecord>> {
        self.list(
            &ListingFilter::default()
                .with_contract(*contract)
                .with_token_id(token_id.clone()),
        )
    }

    pub fn state(&self, key: &ListingKey) -> IndexResult<ListingState> {
        Ok(ListingState::of(self.get(key)?.as_ref()))
    }

    pub fn count(&self) -> IndexResult<usize> {
        Ok(self.store.len()?)
    }
}
