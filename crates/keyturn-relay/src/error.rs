//! Error types for the relay layer.

use keyturn_protocol::ProtocolError;

/// Errors that can occur while handing events to a transport.
///
/// These are logged at the publish site, never returned to the engine —
/// state authority lives in the session store, and a delivery failure must
/// not look like a failed state transition.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// The envelope could not be encoded for the wire.
    #[error(transparent)]
    Encode(#[from] ProtocolError),

    /// The transport's byte sink is gone (receiver dropped).
    #[error("relay sink closed")]
    SinkClosed,
}
