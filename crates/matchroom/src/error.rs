//! Unified error type for the Matchroom server.

use matchroom_lobby::LobbyError;
use matchroom_protocol::ProtocolError;
use matchroom_session::SessionError;
use matchroom_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// `#[from]` on each variant lets `?` convert layer errors as they
/// bubble up through the connection handler.
#[derive(Debug, thiserror::Error)]
pub enum MatchroomError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, bad handshake).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The connection registry refused a change.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The lobby refused a change or has stopped.
    #[error(transparent)]
    Lobby(#[from] LobbyError),
}
