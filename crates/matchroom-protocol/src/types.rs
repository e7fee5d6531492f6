//! Core protocol types for Matchroom's wire format.
//!
//! Every type here is serialized onto the wire. Field names are part of the
//! contract with clients, so the JSON shape tests at the bottom of this file
//! pin them down.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Sequential index handed to a connection when it becomes ready.
///
/// Indices start at 1 and are never reused while the server runs, so a
/// client can use them as a stable display order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PlayerIndex(pub u32);

impl fmt::Display for PlayerIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

/// Globally unique identifier of a match.
///
/// A random v4 UUID: unique across the process lifetime and across
/// restarts, without a registry-wide counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchId(pub Uuid);

impl MatchId {
    /// Generates a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Number of characters in a room code.
pub const ROOM_CODE_LEN: usize = 5;

/// Symbols a room code is drawn from.
pub const ROOM_CODE_ALPHABET: &[u8; 36] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Short human-enterable code that identifies an open match.
///
/// Always [`ROOM_CODE_LEN`] characters from [`ROOM_CODE_ALPHABET`].
/// Deserialization goes through [`RoomCode::parse`], so a malformed code
/// from a client fails to decode instead of reaching the registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomCode(String);

impl RoomCode {
    /// Parses user input into a room code.
    ///
    /// Surrounding whitespace is ignored and lowercase letters are
    /// accepted, since people type these codes by hand.
    pub fn parse(input: &str) -> Result<Self, ProtocolError> {
        let code = input.trim().to_ascii_uppercase();
        let valid = code.len() == ROOM_CODE_LEN
            && code.bytes().all(|b| ROOM_CODE_ALPHABET.contains(&b));
        if valid {
            Ok(Self(code))
        } else {
            Err(ProtocolError::InvalidRoomCode(input.to_string()))
        }
    }

    /// Builds a code one symbol at a time.
    ///
    /// `pick` receives the alphabet size and returns the index of the next
    /// symbol; out-of-range indices wrap. Generators plug their randomness
    /// in here so this crate stays free of an RNG dependency.
    pub fn from_picks(mut pick: impl FnMut(usize) -> usize) -> Self {
        let n = ROOM_CODE_ALPHABET.len();
        let code = (0..ROOM_CODE_LEN)
            .map(|_| char::from(ROOM_CODE_ALPHABET[pick(n) % n]))
            .collect();
        Self(code)
    }

    /// Returns the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for RoomCode {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for RoomCode {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RoomCode> for String {
    fn from(code: RoomCode) -> Self {
        code.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// What the server tells clients about one connected player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub player_index: PlayerIndex,
    /// Set by the player through `MatchRequest::Ready`. Reset on every
    /// match change.
    pub ready: bool,
    pub match_id: Option<MatchId>,
    /// Always the code of `match_id`'s match while it is open.
    pub room_code: Option<RoomCode>,
}

impl PlayerInfo {
    /// A freshly connected player that is in no match.
    pub fn unmatched(player_index: PlayerIndex) -> Self {
        Self {
            player_index,
            ready: false,
            match_id: None,
            room_code: None,
        }
    }
}

/// One row of the open-match list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSummary {
    pub match_id: MatchId,
    pub room_code: RoomCode,
    pub players: usize,
    pub max_players: usize,
}

// ---------------------------------------------------------------------------
// Lobby messages
// ---------------------------------------------------------------------------

/// Client → Server: an operation on the match lobby.
///
/// Internally tagged on `op`, e.g. `{ "op": "Join", "room_code": "K3Q9Z" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op")]
pub enum MatchRequest {
    /// Open a new match owned by the sender.
    Create,
    /// Join the open match with this code.
    Join { room_code: RoomCode },
    /// Owner only: start the match with its current members.
    Start,
    /// Owner only: close the match without starting it.
    Cancel,
    /// Leave the current match. The owner leaving cancels it.
    Leave,
    /// Toggle the sender's ready flag inside its match.
    Ready { ready: bool },
    /// Ask for the list of open matches.
    List,
}

impl MatchRequest {
    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Join { .. } => "join",
            Self::Start => "start",
            Self::Cancel => "cancel",
            Self::Leave => "leave",
            Self::Ready { .. } => "ready",
            Self::List => "list",
        }
    }
}

/// Server → Client: the outcome of lobby operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op")]
pub enum MatchEvent {
    /// Your match is open; share the room code.
    Created { match_id: MatchId, room_code: RoomCode },
    /// You joined a match. `members` includes you.
    Joined {
        match_id: MatchId,
        room_code: RoomCode,
        members: Vec<PlayerInfo>,
    },
    /// The membership or ready flags of your match changed.
    RoomUpdated { members: Vec<PlayerInfo> },
    /// Your match started.
    Started,
    /// Open matches, sent to players that are not in one.
    MatchList { matches: Vec<MatchSummary> },
    /// Your match was cancelled by its owner.
    Cancelled,
    /// You left your match.
    Departed,
    /// Your last request was refused. `code` follows HTTP conventions.
    Rejected { code: u16, reason: String },
}

// ---------------------------------------------------------------------------
// Connection plumbing
// ---------------------------------------------------------------------------

/// Messages about the connection itself rather than the lobby.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SystemMessage {
    /// Client → Server: first frame on every connection. Being accepted
    /// marks the connection ready for lobby requests.
    Handshake { version: u32 },

    /// Server → Client: the connection is ready.
    HandshakeAck {
        player_index: PlayerIndex,
        server_time: u64,
    },

    /// Either direction: "I'm disconnecting."
    Disconnect { reason: String },

    /// Client → Server keep-alive.
    Heartbeat { client_time: u64 },

    /// Server → Client keep-alive echo.
    HeartbeatAck { client_time: u64, server_time: u64 },

    /// Server → Client: a frame was refused before reaching the lobby.
    Error { code: u16, message: String },
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// Content of an envelope.
///
/// Adjacently tagged: `{ "type": "Request", "data": { "op": "Start" } }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Payload {
    System(SystemMessage),
    Request(MatchRequest),
    Event(MatchEvent),
}

/// Every frame on the wire is one envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Per-sender sequence number.
    pub seq: u64,
    /// Milliseconds since the sender's connection started.
    pub timestamp: u64,
    pub payload: Payload,
}

impl Envelope {
    pub fn new(seq: u64, timestamp: u64, payload: Payload) -> Self {
        Self {
            seq,
            timestamp,
            payload,
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
