//! Error types for the protocol layer.

/// Errors that can occur while encoding, decoding, or validating messages.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, a missing field, or an
    /// unknown `type`/`op` tag.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// A room code that is not five characters from `A-Z0-9`.
    #[error("invalid room code {0:?}")]
    InvalidRoomCode(String),

    /// The message decoded but breaks a protocol rule (e.g. a request
    /// before the handshake).
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
