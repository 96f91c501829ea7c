use std::fmt;

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::identity::ListingKey;
use crate::uint::Uint;

/// Current state of one listing.
///
/// `seller`, `contract`, and `token_id` are fixed at creation. `price` moves
/// with update events and `buyer` is set by a purchase. A record with no
/// buyer is an active listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingRecord {
    pub seller: Address,
    #[serde(rename = "contractAddress")]
    pub contract: Address,
    pub token_id: Uint,
    pub price: Uint,
    #[serde(default)]
    pub buyer: Option<Address>,
}

impl ListingRecord {
    /// A fresh, unsold listing.
    pub fn new(seller: Address, contract: Address, token_id: Uint, price: Uint) -> Self {
        Self {
            seller,
            contract,
            token_id,
            price,
            buyer: None,
        }
    }

    /// Resolve this record's composite key.
    pub fn key(&self) -> ListingKey {
        ListingKey::resolve(self.contract, self.token_id.clone(), self.seller)
    }

    /// `true` while no buyer has been recorded.
    pub fn is_active(&self) -> bool {
        self.buyer.is_none()
    }

    pub fn state(&self) -> ListingState {
        if self.is_active() {
            ListingState::Active
        } else {
            ListingState::Sold
        }
    }
}

/// Lifecycle classification of a listing key.
///
/// `NonExistent` is both the initial state and the state after a cancel.
/// Only a create event leaves it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingState {
    NonExistent,
    Active,
    Sold,
}

impl ListingState {
    /// Classify an optional record.
    pub fn of(record: Option<&ListingRecord>) -> Self {
        record.map_or(Self::NonExistent, ListingRecord::state)
    }
}

impl fmt::Display for ListingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NonExistent => "non-existent",
            Self::Active => "active",
            Self::Sold => "sold",
        };
        f.write_str(s)
    }
}
