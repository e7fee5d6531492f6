//! Connection registry for Matchroom.
//!
//! Holds one [`PlayerInfo`](matchroom_protocol::PlayerInfo) per ready
//! connection: its player index, ready flag, and which match (if any) it
//! belongs to. There is no logic here beyond bookkeeping; the lobby decides
//! when a record changes.
//!
//! ```text
//! Lobby (above)     ← decides membership, then mirrors it here
//!     ↕
//! Registry (this crate)  ← one record per ready connection
//!     ↕
//! Transport (below) ← provides ConnectionId
//! ```

mod error;
mod registry;

pub use error::SessionError;
pub use registry::ConnectionRegistry;
