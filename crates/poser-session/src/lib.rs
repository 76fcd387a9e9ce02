//! Player sessions for the Poser game server.
//!
//! A [`Session`] is the handle a room keeps for one connected player: a
//! stable identity, the seat the room assigned, and the ability to send a
//! frame or close the socket. Sends never touch the socket directly. They
//! go through an unbounded channel that a per-connection writer task
//! ([`forward`]) drains, so a room can fan out to a slow client without
//! waiting on it.
//!
//! ```text
//! Room ──Session::send──▶ channel ──forward──▶ Connection::send ──▶ socket
//! ```

mod error;
mod session;

pub use error::SessionError;
pub use session::{forward, Outbound, Session, SessionId, SessionReceiver};
