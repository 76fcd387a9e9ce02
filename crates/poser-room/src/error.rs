//! Error types for the room layer.

use poser_game::GameError;
use poser_protocol::Seat;

/// Errors that can occur during room operations.
///
/// By the time a caller sees one of these, the room has already told the
/// affected players (a private notification, or an abort broadcast).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    /// Every seat is taken.
    #[error("room is full")]
    RoomFull,

    /// A round is being played; new players wait for the next one.
    #[error("a game is already in progress")]
    GameInProgress,

    /// The room emptied out and was evicted. Look it up again.
    #[error("room is closed")]
    Closed,

    /// The room settings cannot produce a playable room.
    #[error("invalid room config: {0}")]
    InvalidConfig(&'static str),

    /// The seat is not allowed to do this.
    #[error("player {seat} may not {action}")]
    NotPermitted { seat: Seat, action: &'static str },

    /// The game rejected the transition.
    #[error(transparent)]
    Game(#[from] GameError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use poser_protocol::GameState;

    #[test]
    fn test_error_display() {
        assert_eq!(RoomError::RoomFull.to_string(), "room is full");
        assert_eq!(
            RoomError::NotPermitted {
                seat: Seat(2),
                action: "start the game"
            }
            .to_string(),
            "player #2 may not start the game"
        );
    }

    #[test]
    fn test_game_error_is_transparent() {
        let err: RoomError = GameError::InvalidState {
            operation: "voting",
            state: GameState::Drawing,
        }
        .into();
        assert_eq!(err.to_string(), "voting is not allowed while Drawing");
    }
}
