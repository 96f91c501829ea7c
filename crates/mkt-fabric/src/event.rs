use serde::{Deserialize, Serialize};

use mkt_index::EventEnvelope;

use crate::error::{FabricError, Result};

/// Content-addressed identifier of a delivered event.
///
/// BLAKE3 over the block position and the event body. Redelivery of the
/// same on-chain log always produces the same id, which is what the
/// indexer deduplicates on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId {
    pub hash: [u8; 32],
}

impl EventId {
    pub fn from_hash(hash: [u8; 32]) -> Self {
        Self { hash }
    }

    /// Compute the id of an envelope.
    pub fn of(envelope: &EventEnvelope) -> Result<Self> {
        let event_bytes = bincode::serialize(&envelope.event)
            .map_err(|e| FabricError::Serialization(e.to_string()))?;

        let mut hasher = blake3::Hasher::new();
        hasher.update(b"mkt-event-v1:");
        hasher.update(&envelope.position.block_number.to_le_bytes());
        hasher.update(&envelope.position.log_index.to_le_bytes());
        hasher.update(&event_bytes);

        Ok(Self {
            hash: *hasher.finalize().as_bytes(),
        })
    }

    /// Short hex representation (first 8 hex chars).
    pub fn short_hex(&self) -> String {
        hex::encode(&self.hash[..4])
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.hash)
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "evt:{}", self.short_hex())
    }
}

/// An envelope as persisted in the WAL, tagged with its id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggedEvent {
    pub id: EventId,
    pub envelope: EventEnvelope,
}

impl LoggedEvent {
    pub fn new(envelope: EventEnvelope) -> Result<Self> {
        Ok(Self {
            id: EventId::of(&envelope)?,
            envelope,
        })
    }

    /// Verify the stored id still matches the envelope.
    pub fn verify_integrity(&self) -> bool {
        EventId::of(&self.envelope).is_ok_and(|id| id == self.id)
    }
}
