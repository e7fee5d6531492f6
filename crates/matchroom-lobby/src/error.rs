//! Error types for the lobby layer.

use matchroom_protocol::{MatchId, RoomCode};
use matchroom_session::SessionError;
use matchroom_transport::ConnectionId;

/// Reasons a lobby operation is refused.
///
/// All of these are local validation failures: the operation is rejected,
/// state is left as it was, and the server keeps running.
#[derive(Debug, thiserror::Error)]
pub enum LobbyError {
    /// The connection sent a request before it was registered as ready.
    #[error("connection {0} is not ready")]
    NotReady(ConnectionId),

    /// The connection already owns an open match.
    #[error("connection {0} already owns match {1}")]
    AlreadyOwnsMatch(ConnectionId, MatchId),

    /// The connection is already a member of an open match.
    #[error("connection {0} is already in match {1}")]
    AlreadyInMatch(ConnectionId, MatchId),

    /// No open match has this code.
    #[error("room {0} not found")]
    RoomNotFound(RoomCode),

    /// The match is at `max_players`.
    #[error("room {0} is full")]
    RoomFull(RoomCode),

    /// Start or cancel from a connection that owns no open match.
    #[error("connection {0} owns no open match")]
    NoOwnedMatch(ConnectionId),

    /// Leave or ready from a connection that is in no open match.
    #[error("connection {0} is not in an open match")]
    NotInMatch(ConnectionId),

    /// Every drawn room code collided with an open room.
    #[error("no free room code after {0} attempts")]
    CodeSpaceExhausted(usize),

    /// The lobby settings are unusable.
    #[error("invalid lobby config: {0}")]
    InvalidConfig(String),

    /// The connection registry refused the change.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The lobby actor has stopped.
    #[error("lobby is unavailable")]
    Unavailable,
}

impl LobbyError {
    /// HTTP-style status code sent to clients in `Rejected`.
    pub fn code(&self) -> u16 {
        match self {
            Self::NotReady(_) => 401,
            Self::NoOwnedMatch(_) => 403,
            Self::RoomNotFound(_) => 404,
            Self::AlreadyOwnsMatch(..)
            | Self::AlreadyInMatch(..)
            | Self::RoomFull(_)
            | Self::NotInMatch(_) => 409,
            Self::CodeSpaceExhausted(_) | Self::Unavailable => 503,
            Self::InvalidConfig(_) | Self::Session(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_maps_validation_failures() {
        let conn = ConnectionId::new(1);
        let room = RoomCode::parse("ZZZZZ").unwrap();

        assert_eq!(LobbyError::RoomNotFound(room.clone()).code(), 404);
        assert_eq!(LobbyError::RoomFull(room).code(), 409);
        assert_eq!(LobbyError::NoOwnedMatch(conn).code(), 403);
        assert_eq!(LobbyError::NotReady(conn).code(), 401);
        assert_eq!(LobbyError::CodeSpaceExhausted(64).code(), 503);
    }

    #[test]
    fn test_display_names_the_room() {
        let err = LobbyError::RoomNotFound(RoomCode::parse("ZZZZZ").unwrap());
        assert_eq!(err.to_string(), "room ZZZZZ not found");
    }
}
