//! Error types for the connection registry.

use matchroom_transport::ConnectionId;

/// Errors that can occur while tracking connected players.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The connection never completed the ready step, or has since gone.
    #[error("connection {0} is not ready")]
    NotReady(ConnectionId),

    /// The ready hook fired twice for the same connection.
    #[error("connection {0} is already ready")]
    AlreadyReady(ConnectionId),
}
