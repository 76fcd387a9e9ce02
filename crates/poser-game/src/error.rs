//! Error types for the game state machine.

use poser_protocol::{GameState, Seat};

/// Reasons a game transition was rejected. The game is left unchanged in
/// every case.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    /// `start` was called while a round is already underway.
    #[error("a round is already in progress")]
    GameInProgress,

    /// The operation is not valid in the current state.
    #[error("{operation} is not allowed while {state}")]
    InvalidState {
        operation: &'static str,
        state: GameState,
    },

    /// Fewer seats than a round needs.
    #[error("not enough players: need at least {needed}, have {have}")]
    NotEnoughPlayers { needed: usize, have: usize },

    /// Someone other than the current drawer tried to end the turn.
    #[error("player {0} is not drawing")]
    NotYourTurn(Seat),

    /// The voter or the accused is not part of this round.
    #[error("invalid vote from {voter} for {target}")]
    InvalidVote { voter: Seat, target: Seat },

    #[error("player {0} has already voted")]
    VotedTwice(Seat),

    /// Only the Poser may guess the prompt.
    #[error("player {0} is not the Poser")]
    NotPoser(Seat),
}
