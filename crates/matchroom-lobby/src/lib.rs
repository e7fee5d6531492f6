//! Match lobby for Matchroom.
//!
//! Players who have passed the ready step create matches, share the room
//! code, join each other's matches, and the owner starts the match. All
//! of it runs inside one actor task, so the registries are plain maps.
//!
//! # Key types
//!
//! - [`MatchRegistry`]: open matches, indexed by id and by room code
//! - [`CodeSource`]: where room codes come from
//! - [`LobbyService`]: turns requests into registry changes and events
//! - [`Spawner`] / [`launch_match`]: entities for a started match
//! - [`LobbyHandle`]: send commands to the running lobby actor
//! - [`LobbyConfig`]: capacity and notification settings

mod actor;
mod code;
mod config;
mod error;
mod launch;
mod registry;
mod service;

pub use actor::{LobbyHandle, Outbox, spawn_lobby};
pub use code::{CodeSource, RandomCodes, generate_room_code};
pub use config::{LobbyConfig, PlayerState};
pub use error::LobbyError;
pub use launch::{Entity, EntityId, EntityKind, EntityTable, LaunchedMatch, Spawner, launch_match};
pub use registry::{Departure, Match, MatchRegistry, MatchSnapshot};
pub use service::{LobbyService, Outbound};
