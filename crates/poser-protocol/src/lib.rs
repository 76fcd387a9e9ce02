//! Wire protocol for the Poser game server.
//!
//! This crate defines the messages that travel between the browser client
//! and the server:
//!
//! - **Types** ([`Envelope`], [`ClientMessage`], [`ServerMessage`], [`Seat`],
//!   [`GameState`], [`Role`]): the shapes on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how those shapes become
//!   bytes.
//! - **Errors** ([`ProtocolError`]).
//!
//! The protocol layer knows nothing about sockets or rooms.
//!
//! ```text
//! Transport (bytes) → Protocol (Envelope) → Room (game operations)
//! ```

mod codec;
mod error;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use types::{
    now_millis, ChatInput, ChatMessage, ClientMessage, ConnectionData,
    Envelope, GameState, GuessData, Inbound, Notification, PlayerEntry,
    PlayersData, PromptData, Role, RoleData, Seat, ServerMessage, StateData,
    Stroke, TurnData, VoteData,
};
