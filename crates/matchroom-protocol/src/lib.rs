//! Wire protocol for Matchroom.
//!
//! This crate defines what a lobby client and the server say to each other:
//!
//! - **Identity** ([`MatchId`], [`RoomCode`], [`PlayerIndex`]) and the
//!   records built from them ([`PlayerInfo`], [`MatchSummary`]).
//! - **Messages**: inbound [`MatchRequest`]s, outbound [`MatchEvent`]s and
//!   connection plumbing ([`SystemMessage`]), all wrapped in an [`Envelope`].
//! - **Codec** ([`Codec`], [`JsonCodec`]) for turning envelopes into frames.
//!
//! ```text
//! Transport (bytes) → Protocol (Envelope) → Lobby (requests / events)
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    Envelope, MatchEvent, MatchId, MatchRequest, MatchSummary, Payload,
    PlayerIndex, PlayerInfo, ROOM_CODE_ALPHABET, ROOM_CODE_LEN, RoomCode,
    SystemMessage,
};
