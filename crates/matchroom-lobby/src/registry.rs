//! The match registry: every open match, reachable by id and by room code.
//!
//! Matches are stored once, keyed by [`MatchId`]. The room code index and
//! the per-connection membership index are derived from that map and are
//! only ever updated together with it, inside the methods below.

use std::collections::{HashMap, HashSet};

use matchroom_protocol::{MatchId, MatchSummary, RoomCode};
use matchroom_transport::ConnectionId;

use crate::code::{CodeSource, RandomCodes};
use crate::LobbyError;

// ---------------------------------------------------------------------------
// Match
// ---------------------------------------------------------------------------

/// An open match waiting for its owner to start it.
#[derive(Debug, Clone)]
pub struct Match {
    id: MatchId,
    room_code: RoomCode,
    owner: ConnectionId,
    max_players: usize,
    members: HashSet<ConnectionId>,
}

impl Match {
    pub fn id(&self) -> MatchId {
        self.id
    }

    pub fn room_code(&self) -> &RoomCode {
        &self.room_code
    }

    pub fn owner(&self) -> ConnectionId {
        self.owner
    }

    pub fn max_players(&self) -> usize {
        self.max_players
    }

    /// Current occupancy. Always the size of the member set.
    pub fn players(&self) -> usize {
        self.members.len()
    }

    /// Members ordered by connection id.
    pub fn members(&self) -> Vec<ConnectionId> {
        let mut members: Vec<ConnectionId> = self.members.iter().copied().collect();
        members.sort();
        members
    }

    pub fn contains(&self, conn: &ConnectionId) -> bool {
        self.members.contains(conn)
    }

    pub fn is_full(&self) -> bool {
        self.players() >= self.max_players
    }

    /// The row this match contributes to a `MatchList`.
    pub fn summary(&self) -> MatchSummary {
        MatchSummary {
            match_id: self.id,
            room_code: self.room_code.clone(),
            players: self.players(),
            max_players: self.max_players,
        }
    }

    fn into_snapshot(self) -> MatchSnapshot {
        let members = self.members();
        MatchSnapshot {
            match_id: self.id,
            room_code: self.room_code,
            owner: self.owner,
            members,
        }
    }
}

/// A match that has left the registry, with everyone who was in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchSnapshot {
    pub match_id: MatchId,
    pub room_code: RoomCode,
    pub owner: ConnectionId,
    pub members: Vec<ConnectionId>,
}

/// What happened to a match when one of its members went away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Departure {
    /// A non-owner left; the match stays open with `remaining` members.
    Left {
        match_id: MatchId,
        room_code: RoomCode,
        remaining: Vec<ConnectionId>,
    },
    /// The owner left and took the match with them.
    Cancelled(MatchSnapshot),
}

// ---------------------------------------------------------------------------
// MatchRegistry
// ---------------------------------------------------------------------------

/// Owns every open match.
///
/// ## Invariants
///
/// - every match appears under its id and under its room code, or under
///   neither;
/// - room codes of open matches are pairwise distinct;
/// - each connection is a member of at most one open match, and
///   `player_matches` names exactly that match.
///
/// [`is_consistent`](Self::is_consistent) checks all three.
pub struct MatchRegistry {
    matches: HashMap<MatchId, Match>,
    codes: HashMap<RoomCode, MatchId>,
    player_matches: HashMap<ConnectionId, MatchId>,
    code_source: Box<dyn CodeSource>,
    max_code_attempts: usize,
}

impl MatchRegistry {
    /// Creates an empty registry that draws random room codes.
    pub fn new(max_code_attempts: usize) -> Self {
        Self::with_code_source(RandomCodes, max_code_attempts)
    }

    /// Creates an empty registry that draws room codes from `source`.
    pub fn with_code_source(source: impl CodeSource, max_code_attempts: usize) -> Self {
        Self {
            matches: HashMap::new(),
            codes: HashMap::new(),
            player_matches: HashMap::new(),
            code_source: Box::new(source),
            max_code_attempts,
        }
    }

    /// Opens a match owned by `owner`, who becomes its only member.
    ///
    /// # Errors
    /// - [`LobbyError::AlreadyOwnsMatch`] if `owner` already owns an open match
    /// - [`LobbyError::AlreadyInMatch`] if `owner` is a member of someone else's
    /// - [`LobbyError::CodeSpaceExhausted`] if no free room code turned up
    pub fn create_match(
        &mut self,
        owner: ConnectionId,
        max_players: usize,
    ) -> Result<&Match, LobbyError> {
        if let Some(&current) = self.player_matches.get(&owner) {
            let owns = self
                .matches
                .get(&current)
                .is_some_and(|m| m.owner == owner);
            return Err(if owns {
                LobbyError::AlreadyOwnsMatch(owner, current)
            } else {
                LobbyError::AlreadyInMatch(owner, current)
            });
        }

        let room_code = self.unique_room_code()?;
        let mut match_id = MatchId::new();
        while self.matches.contains_key(&match_id) {
            match_id = MatchId::new();
        }

        let created = Match {
            id: match_id,
            room_code: room_code.clone(),
            owner,
            max_players,
            members: HashSet::from([owner]),
        };
        self.codes.insert(room_code.clone(), match_id);
        self.player_matches.insert(owner, match_id);

        tracing::info!(%owner, %match_id, %room_code, max_players, "match created");
        Ok(&*self.matches.entry(match_id).or_insert(created))
    }

    /// Adds `conn` to the open match with `room_code`.
    ///
    /// # Errors
    /// - [`LobbyError::AlreadyInMatch`] if `conn` is already in an open match
    /// - [`LobbyError::RoomNotFound`] if no open match has this code
    /// - [`LobbyError::RoomFull`] if the match is at capacity
    pub fn join_match(
        &mut self,
        conn: ConnectionId,
        room_code: &RoomCode,
    ) -> Result<&Match, LobbyError> {
        if let Some(&current) = self.player_matches.get(&conn) {
            return Err(LobbyError::AlreadyInMatch(conn, current));
        }

        let match_id = *self
            .codes
            .get(room_code)
            .ok_or_else(|| LobbyError::RoomNotFound(room_code.clone()))?;
        let joined = self
            .matches
            .get_mut(&match_id)
            .ok_or_else(|| LobbyError::RoomNotFound(room_code.clone()))?;

        if joined.is_full() {
            return Err(LobbyError::RoomFull(room_code.clone()));
        }

        joined.members.insert(conn);
        self.player_matches.insert(conn, match_id);

        tracing::info!(
            %conn,
            %match_id,
            %room_code,
            players = joined.players(),
            "player joined match"
        );
        Ok(&*joined)
    }

    /// Closes the match `owner` owns so it can be launched.
    ///
    /// The match leaves the registry entirely; its code becomes free.
    ///
    /// # Errors
    /// Returns [`LobbyError::NoOwnedMatch`] if `owner` owns no open match.
    pub fn start_match(&mut self, owner: ConnectionId) -> Result<MatchSnapshot, LobbyError> {
        let snapshot = self.take_owned(owner)?;
        tracing::info!(
            %owner,
            match_id = %snapshot.match_id,
            players = snapshot.members.len(),
            "match started"
        );
        Ok(snapshot)
    }

    /// Closes the match `owner` owns without starting it.
    ///
    /// # Errors
    /// Returns [`LobbyError::NoOwnedMatch`] if `owner` owns no open match.
    pub fn cancel_match(&mut self, owner: ConnectionId) -> Result<MatchSnapshot, LobbyError> {
        let snapshot = self.take_owned(owner)?;
        tracing::info!(%owner, match_id = %snapshot.match_id, "match cancelled");
        Ok(snapshot)
    }

    /// Takes `conn` out of its open match. If `conn` owns it, the match
    /// is cancelled.
    ///
    /// # Errors
    /// Returns [`LobbyError::NotInMatch`] if `conn` is in no open match.
    pub fn leave_match(&mut self, conn: ConnectionId) -> Result<Departure, LobbyError> {
        let match_id = self
            .player_matches
            .get(&conn)
            .copied()
            .ok_or(LobbyError::NotInMatch(conn))?;

        let owns = self.matches.get(&match_id).is_some_and(|m| m.owner == conn);
        if owns {
            return self.cancel_match(conn).map(Departure::Cancelled);
        }

        self.player_matches.remove(&conn);
        let left = self
            .matches
            .get_mut(&match_id)
            .ok_or(LobbyError::NotInMatch(conn))?;
        left.members.remove(&conn);

        tracing::info!(%conn, %match_id, players = left.players(), "player left match");
        Ok(Departure::Left {
            match_id,
            room_code: left.room_code.clone(),
            remaining: left.members(),
        })
    }

    /// Forgets a disconnecting connection. Calling this again for the same
    /// connection does nothing and returns `None`.
    pub fn remove_connection(&mut self, conn: ConnectionId) -> Option<Departure> {
        self.leave_match(conn).ok()
    }

    /// The open match `conn` is a member of.
    pub fn match_of(&self, conn: &ConnectionId) -> Option<MatchId> {
        self.player_matches.get(conn).copied()
    }

    pub fn get(&self, match_id: &MatchId) -> Option<&Match> {
        self.matches.get(match_id)
    }

    pub fn by_code(&self, room_code: &RoomCode) -> Option<&Match> {
        self.codes
            .get(room_code)
            .and_then(|id| self.matches.get(id))
    }

    /// Summaries of every open match, ordered by room code.
    pub fn open_matches(&self) -> Vec<MatchSummary> {
        let mut open: Vec<MatchSummary> = self.matches.values().map(Match::summary).collect();
        open.sort_by(|a, b| a.room_code.cmp(&b.room_code));
        open
    }

    /// Number of open matches.
    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// Drops every open match.
    pub fn reset(&mut self) {
        self.matches.clear();
        self.codes.clear();
        self.player_matches.clear();
    }

    /// Checks that both indexes agree with the match map.
    pub fn is_consistent(&self) -> bool {
        let codes_agree = self.codes.len() == self.matches.len()
            && self.matches.values().all(|m| {
                self.codes.get(&m.room_code) == Some(&m.id) && m.members.contains(&m.owner)
            });

        let member_count: usize = self.matches.values().map(Match::players).sum();
        let members_agree = self.player_matches.len() == member_count
            && self.player_matches.iter().all(|(conn, id)| {
                self.matches.get(id).is_some_and(|m| m.members.contains(conn))
            });

        codes_agree && members_agree
    }

    fn take_owned(&mut self, owner: ConnectionId) -> Result<MatchSnapshot, LobbyError> {
        let match_id = self
            .player_matches
            .get(&owner)
            .copied()
            .filter(|id| self.matches.get(id).is_some_and(|m| m.owner == owner))
            .ok_or(LobbyError::NoOwnedMatch(owner))?;

        let closed = self
            .matches
            .remove(&match_id)
            .ok_or(LobbyError::NoOwnedMatch(owner))?;
        self.codes.remove(&closed.room_code);
        for member in &closed.members {
            self.player_matches.remove(member);
        }
        Ok(closed.into_snapshot())
    }

    fn unique_room_code(&mut self) -> Result<RoomCode, LobbyError> {
        for attempt in 1..=self.max_code_attempts {
            let code = self.code_source.next_code();
            if !self.codes.contains_key(&code) {
                return Ok(code);
            }
            tracing::debug!(%code, attempt, "room code collision, drawing again");
        }
        tracing::error!(attempts = self.max_code_attempts, "no free room code");
        Err(LobbyError::CodeSpaceExhausted(self.max_code_attempts))
    }
}

// =========================================================================
// Tests
// =========================================================================
