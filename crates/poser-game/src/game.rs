//! The round state machine.
//!
//! [`Game`] knows nothing about sockets or rooms. It is handed a list of
//! seats when a round starts and from then on only answers "is this
//! transition allowed, and what is the new state?".

use std::collections::BTreeMap;

use poser_protocol::{GameState, Role, Seat};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::GameError;

/// Turns each player takes before voting begins.
pub const ROUND_LIMIT: u32 = 2;

/// Seats needed to start a round: one Muse and at least one other player,
/// who becomes the Poser.
pub const MIN_PLAYERS: usize = 2;

/// One seat's part in the current round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlayRecord {
    /// Turns this seat has finished drawing.
    pub turns: u32,
    /// Who this seat voted for, once it has voted.
    pub vote: Option<Seat>,
    /// Votes cast against this seat.
    pub votes_received: u32,
}

/// Everything that belongs to one round. `Round::default()` is the state
/// of a game with no round in progress.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Round {
    state: GameState,
    /// Participants in turn order, fixed at `start`.
    seats: Vec<Seat>,
    plays: BTreeMap<Seat, PlayRecord>,
    muse: Option<Seat>,
    poser: Option<Seat>,
    drawing: Option<Seat>,
    prompt: String,
}

/// Result of a vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Some participants have not voted yet.
    Pending,
    /// Everyone voted; the round moved to this state.
    Resolved(GameState),
}

/// A game of Poser: one round at a time over a fixed set of seats.
#[derive(Debug)]
pub struct Game {
    rng: StdRng,
    round_limit: u32,
    round: Round,
}

impl Game {
    /// A game seeded from the operating system.
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_os_rng())
    }

    /// A game whose Muse, Poser and first drawer picks are reproducible.
    pub fn seeded(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        Self {
            rng,
            round_limit: ROUND_LIMIT,
            round: Round::default(),
        }
    }

    /// Overrides the number of turns each player takes before voting.
    pub fn with_round_limit(mut self, round_limit: u32) -> Self {
        self.round_limit = round_limit.max(1);
        self
    }

    // -- Transitions -------------------------------------------------------

    /// Starts a round with the given seats, in turn order.
    ///
    /// Picks the Muse uniformly, then the first drawer uniformly from all
    /// seats (the Muse may draw first), then the Poser uniformly from every
    /// seat except the Muse.
    ///
    /// # Errors
    /// - [`GameError::GameInProgress`] unless the game is `Waiting`.
    /// - [`GameError::NotEnoughPlayers`] for fewer than [`MIN_PLAYERS`] seats.
    pub fn start(&mut self, seats: &[Seat]) -> Result<(), GameError> {
        if self.round.state != GameState::Waiting {
            return Err(GameError::GameInProgress);
        }
        if seats.len() < MIN_PLAYERS {
            return Err(GameError::NotEnoughPlayers {
                needed: MIN_PLAYERS,
                have: seats.len(),
            });
        }
        debug_assert!(
            seats.iter().enumerate().all(|(i, s)| !seats[..i].contains(s)),
            "seats must be distinct"
        );

        let mut choices = seats.to_vec();
        let muse = choices.remove(self.rng.random_range(0..choices.len()));
        let first = seats[self.rng.random_range(0..seats.len())];
        let poser = choices[self.rng.random_range(0..choices.len())];

        self.round = Round {
            state: GameState::GettingPrompt,
            seats: seats.to_vec(),
            plays: seats.iter().map(|s| (*s, PlayRecord::default())).collect(),
            muse: Some(muse),
            poser: Some(poser),
            drawing: Some(first),
            prompt: String::new(),
        };
        Ok(())
    }

    /// Stores the Muse's prompt and opens the drawing phase. The first
    /// drawer was already chosen by [`start`](Self::start).
    pub fn set_prompt(
        &mut self,
        prompt: impl Into<String>,
    ) -> Result<(), GameError> {
        self.expect_state("setting the prompt", GameState::GettingPrompt)?;
        self.round.prompt = prompt.into();
        self.round.state = GameState::Drawing;
        Ok(())
    }

    /// Ends `seat`'s turn and passes the brush to the next seat in order.
    ///
    /// When the next seat has already drawn `round_limit` times, every
    /// seat has, and the round moves to `Voting` instead.
    ///
    /// Returns the state after the transition.
    pub fn end_turn(&mut self, seat: Seat) -> Result<GameState, GameError> {
        self.expect_state("ending a turn", GameState::Drawing)?;
        if self.round.drawing != Some(seat) {
            return Err(GameError::NotYourTurn(seat));
        }
        let position = self
            .round
            .seats
            .iter()
            .position(|s| *s == seat)
            .ok_or(GameError::NotYourTurn(seat))?;

        if let Some(play) = self.round.plays.get_mut(&seat) {
            play.turns += 1;
        }

        let count = self.round.seats.len();
        let next = self.round.seats[(position + 1) % count];
        let next_turns = self.round.plays.get(&next).map_or(0, |p| p.turns);
        if next_turns >= self.round_limit {
            self.round.drawing = None;
            self.round.state = GameState::Voting;
        } else {
            self.round.drawing = Some(next);
        }
        Ok(self.round.state)
    }

    /// Records `voter`'s accusation against `target`.
    ///
    /// Once every participant has voted, the seats tied for the most votes
    /// decide the round:
    ///
    /// - more than one → `PoserWonByTie`
    /// - only the Poser → `PoserGuessing`
    /// - only someone else → `PoserWon`
    pub fn vote(
        &mut self,
        voter: Seat,
        target: Seat,
    ) -> Result<Verdict, GameError> {
        self.expect_state("voting", GameState::Voting)?;
        let invalid = GameError::InvalidVote { voter, target };
        if !self.round.plays.contains_key(&target) {
            return Err(invalid);
        }
        let ballot = self.round.plays.get_mut(&voter).ok_or(invalid)?;
        if ballot.vote.is_some() {
            return Err(GameError::VotedTwice(voter));
        }
        ballot.vote = Some(target);
        if let Some(accused) = self.round.plays.get_mut(&target) {
            accused.votes_received += 1;
        }

        if self.round.plays.values().any(|p| p.vote.is_none()) {
            return Ok(Verdict::Pending);
        }

        let most = self
            .round
            .plays
            .values()
            .map(|p| p.votes_received)
            .max()
            .unwrap_or(0);
        let leaders: Vec<Seat> = self
            .round
            .plays
            .iter()
            .filter(|(_, p)| p.votes_received == most)
            .map(|(seat, _)| *seat)
            .collect();

        self.round.state = match leaders.as_slice() {
            [only] if Some(*only) == self.round.poser => GameState::PoserGuessing,
            [_] => GameState::PoserWon,
            // A tie ends the round outright: there is no runoff and no guess
            // for this branch yet.
            _ => GameState::PoserWonByTie,
        };
        Ok(Verdict::Resolved(self.round.state))
    }

    /// The caught Poser's one guess at the prompt. Matching ignores case
    /// and surrounding whitespace.
    ///
    /// Returns `PoserWon` for a correct guess and `PoserLost` otherwise.
    pub fn guess(
        &mut self,
        seat: Seat,
        guess: &str,
    ) -> Result<GameState, GameError> {
        self.expect_state("guessing", GameState::PoserGuessing)?;
        if self.round.poser != Some(seat) {
            return Err(GameError::NotPoser(seat));
        }
        let correct = normalize(guess) == normalize(&self.round.prompt);
        self.round.state = if correct {
            GameState::PoserWon
        } else {
            GameState::PoserLost
        };
        Ok(self.round.state)
    }

    /// Throws away the current round, whatever its state. Never fails and
    /// always leaves exactly `Round::default()`.
    pub fn abort(&mut self) {
        self.round = Round::default();
    }

    fn expect_state(
        &self,
        operation: &'static str,
        expected: GameState,
    ) -> Result<(), GameError> {
        if self.round.state == expected {
            Ok(())
        } else {
            Err(GameError::InvalidState {
                operation,
                state: self.round.state,
            })
        }
    }

    // -- Accessors ---------------------------------------------------------

    pub fn state(&self) -> GameState {
        self.round.state
    }

    /// New players may only join between rounds.
    pub fn is_joinable(&self) -> bool {
        self.round.state == GameState::Waiting
    }

    /// The round has reached an outcome.
    pub fn is_finished(&self) -> bool {
        self.round.state.is_terminal()
    }

    pub fn round(&self) -> &Round {
        &self.round
    }

    pub fn round_limit(&self) -> u32 {
        self.round_limit
    }

    /// Participants in turn order. Empty between rounds.
    pub fn seats(&self) -> &[Seat] {
        &self.round.seats
    }

    pub fn contains(&self, seat: Seat) -> bool {
        self.round.plays.contains_key(&seat)
    }

    pub fn muse(&self) -> Option<Seat> {
        self.round.muse
    }

    pub fn poser(&self) -> Option<Seat> {
        self.round.poser
    }

    /// The seat holding the brush, while `Drawing` (and the pre-chosen
    /// first drawer while `GettingPrompt`).
    pub fn drawing(&self) -> Option<Seat> {
        self.round.drawing
    }

    pub fn prompt(&self) -> &str {
        &self.round.prompt
    }

    pub fn play(&self, seat: Seat) -> Option<&PlayRecord> {
        self.round.plays.get(&seat)
    }

    pub fn votes_received(&self, seat: Seat) -> u32 {
        self.play(seat).map_or(0, |p| p.votes_received)
    }

    /// The role `seat` plays this round, or `None` if it is not playing.
    pub fn role_of(&self, seat: Seat) -> Option<Role> {
        if !self.contains(seat) {
            None
        } else if self.round.muse == Some(seat) {
            Some(Role::Muse)
        } else if self.round.poser == Some(seat) {
            Some(Role::Poser)
        } else {
            Some(Role::Artist)
        }
    }
}

impl Default for Game {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

// =========================================================================
// Tests
// =========================================================================
