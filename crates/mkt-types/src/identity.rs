use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::address::Address;
use crate::error::TypeError;
use crate::uint::Uint;

/// Separator between the three components of the encoded key.
pub const KEY_SEPARATOR: char = '_';

/// Composite identity of one listing lifecycle.
///
/// A `ListingKey` is resolved from exactly three event fields: the NFT
/// contract, the token id, and the seller. The same triple always resolves
/// to the same key no matter which event kind carried it.
///
/// The struct is the internal form. The string form
/// `contractAddress_tokenId_sellerAddress` (lower-case `0x` hex addresses,
/// decimal token id) is produced only at serialization boundaries and is
/// kept byte-for-byte compatible with existing consumers of the table.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListingKey {
    pub contract: Address,
    pub token_id: Uint,
    pub seller: Address,
}

impl ListingKey {
    /// Resolve the key for a (contract, token, seller) triple.
    pub fn resolve(contract: Address, token_id: Uint, seller: Address) -> Self {
        Self {
            contract,
            token_id,
            seller,
        }
    }

    /// The persisted string encoding.
    pub fn encode(&self) -> String {
        format!(
            "{}{sep}{}{sep}{}",
            self.contract,
            self.token_id,
            self.seller,
            sep = KEY_SEPARATOR
        )
    }

    /// Parse the persisted string encoding.
    pub fn decode(s: &str) -> Result<Self, TypeError> {
        let parts: Vec<&str> = s.split(KEY_SEPARATOR).collect();
        let [contract, token_id, seller] = parts.as_slice() else {
            return Err(TypeError::InvalidKey {
                input: s.to_string(),
                reason: format!("expected 3 components, found {}", parts.len()),
            });
        };

        let contract = Address::from_hex(contract).map_err(|e| key_error(s, "contract", e))?;
        let token_id = Uint::parse(token_id).map_err(|e| key_error(s, "token id", e))?;
        let seller = Address::from_hex(seller).map_err(|e| key_error(s, "seller", e))?;
        Ok(Self::resolve(contract, token_id, seller))
    }
}

fn key_error(input: &str, component: &str, err: TypeError) -> TypeError {
    TypeError::InvalidKey {
        input: input.to_string(),
        reason: format!("{component}: {err}"),
    }
}

impl fmt::Debug for ListingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ListingKey({})", self.encode())
    }
}

impl fmt::Display for ListingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for ListingKey {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

impl Serialize for ListingKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}

impl<'de> Deserialize<'de> for ListingKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::decode(&s).map_err(serde::de::Error::custom)
    }
}
