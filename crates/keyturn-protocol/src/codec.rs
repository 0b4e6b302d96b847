//! Codec trait and implementations for serializing event envelopes.
//!
//! The relay hands envelopes to an external transport as raw bytes. How
//! those bytes are produced is a [`Codec`] implementation detail — the rest
//! of the stack only sees the trait. [`JsonCodec`] is the default; a binary
//! codec can be swapped in later without touching the relay.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// Encodes Rust values to bytes and decodes them back.
///
/// `Send + Sync + 'static` because codecs are shared across Tokio tasks and
/// live as long as the service.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Encode`] if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Decode`] if the bytes are malformed or
    /// don't match the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON via `serde_json`.
///
/// Human-readable, which is what browser clients and debugging want.
/// Behind the default-on `json` feature so a binary-only deployment can
/// opt out of it.
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::{EventEnvelope, SessionEvent, SessionId};

    #[test]
    fn test_json_codec_round_trips_envelope() {
        let codec = JsonCodec;
        let envelope = EventEnvelope {
            session_id: SessionId("cafe".into()),
            seq: 1,
            timestamp: 42,
            event: SessionEvent::SessionAbandoned,
        };

        let bytes = codec.encode(&envelope).unwrap();
        let decoded: EventEnvelope = codec.decode(&bytes).unwrap();
        assert_eq!(envelope, decoded);
    }

    #[test]
    fn test_json_codec_decode_garbage_fails() {
        let codec = JsonCodec;
        let result: Result<EventEnvelope, _> = codec.decode(b"\x00\x01\x02");
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }
}
