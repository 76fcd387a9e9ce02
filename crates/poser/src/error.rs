//! Unified error type for the Poser server.

use poser_game::GameError;
use poser_protocol::ProtocolError;
use poser_room::RoomError;
use poser_session::SessionError;
use poser_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant generates the `From` impls,
/// so `?` converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum PoserError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The session's writer has stopped.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A room-level error (full, game in progress, closed).
    #[error(transparent)]
    Room(#[from] RoomError),

    /// A rejected game transition.
    #[error(transparent)]
    Game(#[from] GameError),
}
