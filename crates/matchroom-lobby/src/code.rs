//! Room code generation.
//!
//! A generator only produces well-formed codes. Whether a code is free is
//! decided by the [`MatchRegistry`](crate::MatchRegistry), which keeps
//! drawing until it finds one no open match uses.

use matchroom_protocol::RoomCode;
use rand::Rng;

/// Produces candidate room codes.
///
/// Any `FnMut() -> RoomCode` closure is a `CodeSource`, which is how tests
/// script collisions.
pub trait CodeSource: Send + 'static {
    fn next_code(&mut self) -> RoomCode;
}

impl<F> CodeSource for F
where
    F: FnMut() -> RoomCode + Send + 'static,
{
    fn next_code(&mut self) -> RoomCode {
        self()
    }
}

/// Draws codes from the thread-local RNG. Not reproducible.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomCodes;

impl CodeSource for RandomCodes {
    fn next_code(&mut self) -> RoomCode {
        generate_room_code(&mut rand::rng())
    }
}

/// Draws every symbol uniformly from `A-Z0-9`.
pub fn generate_room_code<R: Rng + ?Sized>(rng: &mut R) -> RoomCode {
    RoomCode::from_picks(|n| rng.random_range(0..n))
}
