//! # Poser
//!
//! Real-time server for Poser, a multiplayer drawing party game.
//!
//! Players open a WebSocket to `/ws/<room-id>`. The first connection to an
//! id creates the room; the room disappears when its last player leaves.
//! Within a room the host (Player #1) starts rounds: a secret Muse picks a
//! prompt, everyone but the Poser learns it, players take turns drawing,
//! then the room votes on who was bluffing.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! # async fn run() -> Result<(), poser::PoserError> {
//! let server = poser::PoserServer::builder()
//!     .bind("0.0.0.0:8080")
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```
//!
//! The layers live in their own crates and are re-exported here:
//! `poser_transport` → `poser_protocol` → `poser_session` → `poser_room`
//! (which drives `poser_game`).

mod error;
mod handler;
mod server;

pub use error::PoserError;
pub use server::{PoserServer, PoserServerBuilder};

pub use poser_game::{Game, GameError};
pub use poser_protocol::{ClientMessage, GameState, JsonCodec, Role, Seat, ServerMessage};
pub use poser_room::{Room, RoomConfig, RoomError, RoomRegistry};
