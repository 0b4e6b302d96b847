//! Error types for the protocol layer.

/// Errors that can occur while encoding or decoding wire messages.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a value into bytes).
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes into a value).
    /// Common causes: malformed JSON, missing fields, truncated input.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),
}
