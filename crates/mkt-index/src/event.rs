use serde::{Deserialize, Serialize};
use serde_json::Value;

use mkt_types::{Address, BlockPosition, ListingKey, Uint};

use crate::error::{IndexError, IndexResult};

/// Classification of marketplace events.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Created,
    Updated,
    Purchased,
    Canceled,
}

impl EventKind {
    fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "created" | "listingcreated" => Some(Self::Created),
            "updated" | "listingupdated" => Some(Self::Updated),
            "purchased" | "listingpurchased" => Some(Self::Purchased),
            "canceled" | "cancelled" | "listingcanceled" => Some(Self::Canceled),
            _ => None,
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Created => "Created",
            Self::Updated => "Updated",
            Self::Purchased => "Purchased",
            Self::Canceled => "Canceled",
        };
        write!(f, "{s}")
    }
}

/// A validated marketplace event.
///
/// Every variant carries the three identity fields, so the listing key can
/// be resolved from any of them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListingEvent {
    Created {
        seller: Address,
        contract: Address,
        token_id: Uint,
        price: Uint,
    },
    Updated {
        seller: Address,
        contract: Address,
        token_id: Uint,
        new_price: Uint,
    },
    Purchased {
        seller: Address,
        contract: Address,
        token_id: Uint,
        buyer: Address,
    },
    Canceled {
        seller: Address,
        contract: Address,
        token_id: Uint,
    },
}

impl ListingEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Created { .. } => EventKind::Created,
            Self::Updated { .. } => EventKind::Updated,
            Self::Purchased { .. } => EventKind::Purchased,
            Self::Canceled { .. } => EventKind::Canceled,
        }
    }

    /// Resolve the listing key this event targets.
    pub fn key(&self) -> ListingKey {
        match self {
            Self::Created {
                seller,
                contract,
                token_id,
                ..
            }
            | Self::Updated {
                seller,
                contract,
                token_id,
                ..
            }
            | Self::Purchased {
                seller,
                contract,
                token_id,
                ..
            }
            | Self::Canceled {
                seller,
                contract,
                token_id,
            } => ListingKey::resolve(*contract, token_id.clone(), *seller),
        }
    }
}

/// An event together with its position in the on-chain log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub position: BlockPosition,
    pub event: ListingEvent,
}

impl EventEnvelope {
    pub fn new(position: BlockPosition, event: ListingEvent) -> Self {
        Self { position, event }
    }
}

/// Untrusted event as delivered by an event source.
///
/// All fields are optional at this layer so that a missing field is
/// reported by name instead of as a generic parse failure. Field aliases
/// accept the camelCase names used by marketplace contract ABIs.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub seller: Option<String>,
    #[serde(default, alias = "nftAddress", alias = "contractAddress")]
    pub contract: Option<String>,
    #[serde(default, alias = "tokenId")]
    pub token_id: Option<Value>,
    #[serde(default)]
    pub price: Option<Value>,
    #[serde(default, alias = "newPrice")]
    pub new_price: Option<Value>,
    #[serde(default)]
    pub buyer: Option<String>,
    #[serde(default, alias = "blockNumber")]
    pub block: Option<u64>,
    #[serde(default, alias = "logIndex")]
    pub log_index: Option<u32>,
}

impl RawEvent {
    /// Validate every field and build a typed envelope.
    ///
    /// Nothing is partially decoded: either all fields required by the
    /// event kind are valid, or a `MalformedEvent` naming the first bad
    /// field is returned.
    pub fn decode(&self) -> IndexResult<EventEnvelope> {
        let kind_text = required(&self.kind, "kind")?;
        let kind = EventKind::parse(kind_text)
            .ok_or_else(|| IndexError::malformed("kind", format!("unknown event kind {kind_text:?}")))?;

        let block = self
            .block
            .ok_or_else(|| IndexError::malformed("block", "missing field"))?;
        let position = BlockPosition::new(block, self.log_index.unwrap_or(0));

        let seller = address(&self.seller, "seller")?;
        let contract = address(&self.contract, "contract")?;
        let token_id = integer(&self.token_id, "token_id")?;

        let event = match kind {
            EventKind::Created => ListingEvent::Created {
                seller,
                contract,
                token_id,
                price: integer(&self.price, "price")?,
            },
            EventKind::Updated => ListingEvent::Updated {
                seller,
                contract,
                token_id,
                new_price: integer(&self.new_price, "new_price")?,
            },
            EventKind::Purchased => ListingEvent::Purchased {
                seller,
                contract,
                token_id,
                buyer: address(&self.buyer, "buyer")?,
            },
            EventKind::Canceled => ListingEvent::Canceled {
                seller,
                contract,
                token_id,
            },
        };

        Ok(EventEnvelope::new(position, event))
    }

    /// Parse a JSON object without validating its fields. Syntax errors
    /// and wrongly typed fields are reported as a malformed `json` field.
    pub fn from_json_slice(input: &[u8]) -> IndexResult<Self> {
        serde_json::from_slice(input).map_err(|e| IndexError::malformed("json", e.to_string()))
    }

    /// Parse and decode a single JSON object.
    pub fn decode_json(input: &str) -> IndexResult<EventEnvelope> {
        Self::from_json_slice(input.as_bytes())?.decode()
    }
}

impl From<&EventEnvelope> for RawEvent {
    fn from(envelope: &EventEnvelope) -> Self {
        let mut raw = RawEvent {
            kind: Some(envelope.event.kind().to_string().to_ascii_lowercase()),
            block: Some(envelope.position.block_number),
            log_index: Some(envelope.position.log_index),
            ..RawEvent::default()
        };
        let (seller, contract, token_id) = match &envelope.event {
            ListingEvent::Created {
                seller,
                contract,
                token_id,
                price,
            } => {
                raw.price = Some(Value::String(price.to_string()));
                (seller, contract, token_id)
            }
            ListingEvent::Updated {
                seller,
                contract,
                token_id,
                new_price,
            } => {
                raw.new_price = Some(Value::String(new_price.to_string()));
                (seller, contract, token_id)
            }
            ListingEvent::Purchased {
                seller,
                contract,
                token_id,
                buyer,
            } => {
                raw.buyer = Some(buyer.to_hex());
                (seller, contract, token_id)
            }
            ListingEvent::Canceled {
                seller,
                contract,
                token_id,
            } => (seller, contract, token_id),
        };
        raw.seller = Some(seller.to_hex());
        raw.contract = Some(contract.to_hex());
        raw.token_id = Some(Value::String(token_id.to_string()));
        raw
    }
}

/// Decode a JSON-lines batch. Blank lines and `#` comments are skipped.
///
/// The first malformed line aborts the batch; its 1-based line number is
/// reported.
pub fn decode_json_lines(input: &str) -> IndexResult<Vec<EventEnvelope>> {
    let mut envelopes = Vec::new();
    for (index, line) in input.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let envelope = RawEvent::decode_json(trimmed).map_err(|e| IndexError::MalformedLine {
            line: index + 1,
            reason: e.to_string(),
        })?;
        envelopes.push(envelope);
    }
    Ok(envelopes)
}

fn required<'a>(value: &'a Option<String>, field: &str) -> IndexResult<&'a str> {
    value
        .as_deref()
        .ok_or_else(|| IndexError::malformed(field, "missing field"))
}

fn address(value: &Option<String>, field: &str) -> IndexResult<Address> {
    let text = required(value, field)?;
    Address::from_hex(text).map_err(|e| IndexError::malformed(field, e.to_string()))
}

fn integer(value: &Option<Value>, field: &str) -> IndexResult<Uint> {
    match value {
        None | Some(Value::Null) => Err(IndexError::malformed(field, "missing field")),
        Some(Value::String(s)) => {
            Uint::parse(s).map_err(|e| IndexError::malformed(field, e.to_string()))
        }
        Some(Value::Number(n)) => n.as_u64().map(Uint::from_u64).ok_or_else(|| {
            IndexError::malformed(
                field,
                format!("{n} is not a non-negative integer; pass large values as strings"),
            )
        }),
        Some(other) => Err(IndexError::malformed(
            field,
            format!("expected integer, found {other}"),
        )),
    }
}
