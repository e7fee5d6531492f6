//! Lobby configuration and the per-connection state machine.

use serde::{Deserialize, Serialize};

use crate::LobbyError;

// ---------------------------------------------------------------------------
// LobbyConfig
// ---------------------------------------------------------------------------

/// Settings shared by every match the lobby creates.
///
/// `#[serde(default)]` lets a config file name only the fields it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LobbyConfig {
    /// Capacity of each new match, owner included.
    pub max_players: usize,

    /// How many room codes to draw before giving up on a collision-free one.
    pub max_code_attempts: usize,

    /// Send `Rejected` to the requester when an operation fails. With
    /// `false` a failed request is only logged.
    pub notify_rejections: bool,

    /// Push a fresh `MatchList` to every waiting connection whenever the
    /// set of open matches changes.
    pub broadcast_match_list: bool,
}

impl Default for LobbyConfig {
    fn default() -> Self {
        Self {
            max_players: 40,
            max_code_attempts: 64,
            notify_rejections: true,
            broadcast_match_list: true,
        }
    }
}

impl LobbyConfig {
    /// Checks the settings before a lobby is built from them.
    pub fn validate(&self) -> Result<(), LobbyError> {
        if self.max_players == 0 {
            return Err(LobbyError::InvalidConfig(
                "max_players must be at least 1".into(),
            ));
        }
        if self.max_code_attempts == 0 {
            return Err(LobbyError::InvalidConfig(
                "max_code_attempts must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// PlayerState
// ---------------------------------------------------------------------------

/// Where a ready connection is in the lobby.
///
/// ```text
///              ┌── create ──→ Hosting ──┐
/// Unmatched ───┤                        ├── start ──→ InMatch
///     ▲        └── join ────→ Joined ───┘
///     └──── leave / cancel ────┘
/// ```
///
/// Disconnecting from any state is terminal: the connection's records are
/// dropped and it has no state at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerState {
    Unmatched,
    Hosting,
    Joined,
    InMatch,
}

impl PlayerState {
    /// Returns `true` while the connection sits in an open match.
    pub fn is_in_open_match(&self) -> bool {
        matches!(self, Self::Hosting | Self::Joined)
    }
}

impl std::fmt::Display for PlayerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unmatched => write!(f, "Unmatched"),
            Self::Hosting => write!(f, "Hosting"),
            Self::Joined => write!(f, "Joined"),
            Self::InMatch => write!(f, "InMatch"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lobby_config_default() {
        let config = LobbyConfig::default();
        assert_eq!(config.max_players, 40);
        assert_eq!(config.max_code_attempts, 64);
        assert!(config.notify_rejections);
        assert!(config.broadcast_match_list);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_lobby_config_validate_rejects_zero_capacity() {
        let config = LobbyConfig {
            max_players: 0,
            ..LobbyConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(LobbyError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_lobby_config_validate_rejects_zero_attempts() {
        let config = LobbyConfig {
            max_code_attempts: 0,
            ..LobbyConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_player_state_is_in_open_match() {
        assert!(!PlayerState::Unmatched.is_in_open_match());
        assert!(PlayerState::Hosting.is_in_open_match());
        assert!(PlayerState::Joined.is_in_open_match());
        assert!(!PlayerState::InMatch.is_in_open_match());
    }

    #[test]
    fn test_player_state_display() {
        assert_eq!(PlayerState::Hosting.to_string(), "Hosting");
        assert_eq!(PlayerState::InMatch.to_string(), "InMatch");
    }
}
