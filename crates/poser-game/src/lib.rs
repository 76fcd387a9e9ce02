//! Round logic for Poser.
//!
//! One round goes like this: the Muse picks a secret prompt, everyone but
//! the Poser learns it, the players take turns adding strokes to a shared
//! canvas, then everyone votes on who they think was faking it. A caught
//! Poser gets one guess at the prompt.
//!
//! [`Game`] is a plain state machine with no I/O and no locking. The room
//! that owns it serializes access and turns its results into messages.

mod error;
mod game;

pub use error::GameError;
pub use game::{Game, PlayRecord, Round, Verdict, MIN_PLAYERS, ROUND_LIMIT};
