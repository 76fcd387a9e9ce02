//! Room configuration.

use poser_game::ROUND_LIMIT;
use serde::{Deserialize, Serialize};

use crate::RoomError;

/// Settings shared by every room a registry creates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomConfig {
    /// Seats per room. Joins beyond this are refused with `RoomFull`.
    pub capacity: usize,

    /// Turns each player draws before voting.
    pub round_limit: u32,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            capacity: 8,
            round_limit: ROUND_LIMIT,
        }
    }
}

impl RoomConfig {
    /// Checks the settings before any room is built from them.
    ///
    /// # Errors
    /// [`RoomError::InvalidConfig`] for a room with no seats or a round
    /// with no turns.
    pub fn validate(&self) -> Result<(), RoomError> {
        if self.capacity == 0 {
            return Err(RoomError::InvalidConfig("capacity must be at least 1"));
        }
        if self.round_limit == 0 {
            return Err(RoomError::InvalidConfig("round_limit must be at least 1"));
        }
        Ok(())
    }
}
