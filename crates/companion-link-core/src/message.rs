//! Outbound payloads and the transport envelope.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{LinkError, OutboundLimit, Result};

/// Largest payload, in bytes, the transport accepts in one message.
pub const MAX_PAYLOAD_BYTES: usize = 1024;

/// A payload that has passed the size check.
///
/// This is the only way to hand bytes to the dispatcher, so an oversized
/// payload can never reach the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    payload: Vec<u8>,
}

impl OutboundMessage {
    /// Accept `payload` if it fits in [`MAX_PAYLOAD_BYTES`].
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::PayloadTooLarge`] if the payload is over the bound.
    pub fn new(payload: impl Into<Vec<u8>>) -> Result<Self> {
        let payload = payload.into();
        if payload.len() > MAX_PAYLOAD_BYTES {
            return Err(LinkError::PayloadTooLarge(OutboundLimit {
                max: MAX_PAYLOAD_BYTES,
                actual: payload.len(),
            }));
        }
        Ok(Self { payload })
    }

    /// Payload bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.payload
    }

    /// Payload size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Returns `true` for an empty payload.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Wrap the payload in a transport envelope.
    #[must_use]
    pub fn into_envelope(self) -> MessageEnvelope {
        MessageEnvelope {
            id: Uuid::new_v4(),
            payload: self.payload,
            created_at_utc: Utc::now(),
        }
    }
}

/// A framed message as submitted to the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEnvelope {
    /// Unique id, used to correlate progress and result logs.
    pub id: Uuid,
    /// Payload bytes.
    pub payload: Vec<u8>,
    /// When the envelope was created (UTC).
    pub created_at_utc: DateTime<Utc>,
}

/// Decode an inbound frame as text. Invalid UTF-8 is replaced, not rejected.
#[must_use]
pub fn decode_inbound(frame: &[u8]) -> String {
    String::from_utf8_lossy(frame).into_owned()
}
