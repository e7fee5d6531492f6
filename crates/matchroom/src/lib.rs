//! # Matchroom
//!
//! A match lobby server: players connect over WebSockets, open matches
//! identified by a short room code, join each other by code, and the
//! owner starts the match.
//!
//! ```text
//! transport (frames) → protocol (envelopes) → lobby actor (registries)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use matchroom::prelude::*;
//!
//! # async fn run() -> Result<(), MatchroomError> {
//! let server = MatchroomServer::builder()
//!     .bind("0.0.0.0:7777")
//!     .lobby_config(LobbyConfig {
//!         max_players: 8,
//!         ..LobbyConfig::default()
//!     })
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod error;
mod handler;
mod server;

pub use error::MatchroomError;
pub use server::{MatchroomServer, MatchroomServerBuilder, PROTOCOL_VERSION};

/// Everything needed to run a server or write a client.
pub mod prelude {
    pub use crate::{MatchroomError, MatchroomServer, MatchroomServerBuilder, PROTOCOL_VERSION};
    pub use matchroom_lobby::{LobbyConfig, LobbyError, LobbyHandle, PlayerState};
    pub use matchroom_protocol::{
        Codec, Envelope, JsonCodec, MatchEvent, MatchId, MatchRequest, MatchSummary, Payload,
        PlayerIndex, PlayerInfo, RoomCode, SystemMessage,
    };
    pub use matchroom_transport::ConnectionId;
}
