//! Error types for the transport layer.

/// Errors raised while accepting, reading from, or writing to a peer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The peer went away or the close handshake already happened.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Writing a frame to the peer failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Reading a frame from the peer failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// Binding the listener or upgrading an incoming socket failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),
}

impl TransportError {
    /// Wraps any displayable error as an `io::Error` of the given kind.
    ///
    /// tungstenite errors are not `io::Error`s, so every WebSocket failure
    /// goes through here before landing in one of the variants above.
    pub(crate) fn io(
        kind: std::io::ErrorKind,
        err: impl std::fmt::Display,
    ) -> std::io::Error {
        std::io::Error::new(kind, err.to_string())
    }
}
