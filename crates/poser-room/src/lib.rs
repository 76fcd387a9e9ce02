//! Rooms for the Poser game server.
//!
//! A [`Room`] seats up to [`RoomConfig::capacity`] players and runs one
//! game at a time. The [`RoomRegistry`] maps room ids from the URL to live
//! rooms, creating them on first use and evicting them once empty.
//!
//! # Locking
//!
//! Each room has one mutex. Every operation holds it for its full critical
//! section and collects outgoing messages in an [`Outbox`] instead of
//! writing to sockets. Before the lock is released the messages are
//! encoded and pushed onto each session's unbounded queue, which keeps a
//! room's messages in order. The socket writes happen on each session's
//! writer task, so a slow client never holds up the room.
//!
//! ```text
//! Room::start ─lock─▶ Game::start ─▶ Outbox ─▶ Session::send ×N ─unlock─▶
//! ```

mod config;
mod error;
mod outbox;
mod registry;
mod room;

pub use config::RoomConfig;
pub use error::RoomError;
pub use outbox::{Outbox, Payload, Recipient};
pub use registry::RoomRegistry;
pub use room::{Departure, Room, RoomInner, HOST};
