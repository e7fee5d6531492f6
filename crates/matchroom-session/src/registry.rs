//! The connection registry: one player record per ready connection.
//!
//! # Concurrency note
//!
//! `ConnectionRegistry` is a plain `HashMap` with no locking. It is owned
//! by the lobby actor, which already processes one command at a time.

use std::collections::HashMap;

use matchroom_protocol::{MatchId, PlayerIndex, PlayerInfo, RoomCode};
use matchroom_transport::ConnectionId;

use crate::SessionError;

/// Tracks every connection that has passed the ready step.
///
/// ## Lifecycle
///
/// ```text
/// register_ready() ──→ assign_match() ⇄ clear_match() ──→ remove()
///        │                                                  ▲
///        └──────────────────────────────────────────────────┘
/// ```
pub struct ConnectionRegistry {
    players: HashMap<ConnectionId, PlayerInfo>,

    /// Next index to hand out. Survives `reset()` so an index is never
    /// reused while the process runs.
    next_index: u32,
}

impl ConnectionRegistry {
    /// Creates an empty registry. The first ready connection gets index 1.
    pub fn new() -> Self {
        Self {
            players: HashMap::new(),
            next_index: 1,
        }
    }

    /// Registers a connection as ready and assigns its player index.
    ///
    /// # Errors
    /// Returns [`SessionError::AlreadyReady`] if the connection is
    /// already registered; its record is left untouched.
    pub fn register_ready(
        &mut self,
        conn: ConnectionId,
    ) -> Result<&PlayerInfo, SessionError> {
        if self.players.contains_key(&conn) {
            return Err(SessionError::AlreadyReady(conn));
        }

        let player_index = PlayerIndex(self.next_index);
        self.next_index += 1;

        tracing::info!(%conn, %player_index, "connection ready");
        Ok(&*self
            .players
            .entry(conn)
            .or_insert(PlayerInfo::unmatched(player_index)))
    }

    /// Records that `conn` now belongs to `match_id`. Clears its ready flag.
    pub fn assign_match(
        &mut self,
        conn: ConnectionId,
        match_id: MatchId,
        room_code: RoomCode,
    ) -> Result<(), SessionError> {
        let info = self.get_mut(conn)?;
        info.ready = false;
        info.match_id = Some(match_id);
        info.room_code = Some(room_code);
        Ok(())
    }

    /// Records that `conn` is back in the waiting pool. Clears its ready flag.
    pub fn clear_match(&mut self, conn: ConnectionId) -> Result<(), SessionError> {
        let info = self.get_mut(conn)?;
        info.ready = false;
        info.match_id = None;
        info.room_code = None;
        Ok(())
    }

    /// Records that the match of `conn` has been launched. The match id
    /// stays; the room code is dropped because it may already name a new
    /// open match.
    pub fn enter_play(&mut self, conn: ConnectionId) -> Result<(), SessionError> {
        let info = self.get_mut(conn)?;
        info.ready = false;
        info.room_code = None;
        Ok(())
    }

    /// Sets the ready flag of `conn`.
    pub fn set_ready(
        &mut self,
        conn: ConnectionId,
        ready: bool,
    ) -> Result<(), SessionError> {
        self.get_mut(conn)?.ready = ready;
        Ok(())
    }

    /// Forgets a connection. Returns its last record, or `None` if it was
    /// not registered. Calling this twice is harmless.
    pub fn remove(&mut self, conn: ConnectionId) -> Option<PlayerInfo> {
        let removed = self.players.remove(&conn);
        if removed.is_some() {
            tracing::debug!(%conn, "connection record removed");
        }
        removed
    }

    /// Looks up the record of a connection.
    pub fn get(&self, conn: &ConnectionId) -> Option<&PlayerInfo> {
        self.players.get(conn)
    }

    /// Returns `true` if `conn` passed the ready step and is still here.
    pub fn is_ready(&self, conn: &ConnectionId) -> bool {
        self.players.contains_key(conn)
    }

    /// Ready connections that are in no match, in player-index order.
    pub fn waiting(&self) -> Vec<ConnectionId> {
        let mut waiting: Vec<(PlayerIndex, ConnectionId)> = self
            .players
            .iter()
            .filter(|(_, info)| info.match_id.is_none())
            .map(|(conn, info)| (info.player_index, *conn))
            .collect();
        waiting.sort();
        waiting.into_iter().map(|(_, conn)| conn).collect()
    }

    /// Number of registered connections.
    pub fn len(&self) -> usize {
        self.players.len()
    }

    /// Returns `true` if no connection is registered.
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Drops every record. Player indices keep counting up.
    pub fn reset(&mut self) {
        self.players.clear();
    }

    fn get_mut(&mut self, conn: ConnectionId) -> Result<&mut PlayerInfo, SessionError> {
        self.players
            .get_mut(&conn)
            .ok_or(SessionError::NotReady(conn))
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// =========================================================================
// Tests
// =========================================================================
