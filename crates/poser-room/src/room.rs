//! A room: a fixed set of seats, the sessions sitting in them, and one
//! game.
//!
//! Every operation takes the room's mutex for its whole critical section,
//! so game transitions in one room are strictly serialized. Messages are
//! queued in an [`Outbox`] and handed to the session queues before the
//! lock is released, so every member sees a room's messages in the order
//! its state changed. Queuing never blocks; the socket writes happen later
//! on each session's writer task.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use poser_game::{Game, GameError, Verdict, MIN_PLAYERS};
use poser_protocol::{
    Codec, GameState, PlayerEntry, PlayersData, Seat, ServerMessage,
};
use poser_session::{Session, SessionId};
use tokio::sync::Mutex;

use crate::outbox::{Delivery, Payload, Recipient};
use crate::{Outbox, RoomConfig, RoomError};

/// The seat allowed to start and reset rounds: whoever sits in the first
/// slot.
pub const HOST: Seat = Seat(1);

/// State guarded by the room lock.
#[derive(Debug)]
pub struct RoomInner {
    /// Index `i` holds the session in seat `i + 1`.
    slots: Vec<Option<Session>>,
    /// Cache of the ids in `slots`, for membership checks and counts.
    members: HashSet<SessionId>,
    game: Game,
}

impl RoomInner {
    fn new(capacity: usize, game: Game) -> Self {
        Self {
            slots: vec![None; capacity],
            members: HashSet::new(),
            game,
        }
    }

    /// Seats with someone in them, in slot order.
    fn occupied(&self) -> Vec<Seat> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_some())
            .map(|(index, _)| Seat::from_index(index))
            .collect()
    }

    fn is_occupied(&self, seat: Seat) -> bool {
        seat.index()
            .and_then(|i| self.slots.get(i))
            .is_some_and(Option::is_some)
    }

    fn consistent(&self) -> bool {
        let seated = self.slots.iter().flatten().count();
        seated == self.members.len()
            && self.slots.iter().enumerate().all(|(index, slot)| {
                slot.as_ref().is_none_or(|s| {
                    self.members.contains(s.id())
                        && s.seat() == Seat::from_index(index)
                })
            })
    }
}

/// What [`Room::remove`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Departure {
    /// Members left after the removal.
    pub remaining: usize,
    /// The round was aborted, which already sent the new roster to
    /// everyone left.
    pub aborted: bool,
}

/// One game room.
pub struct Room<C: Codec> {
    id: String,
    config: RoomConfig,
    codec: Arc<C>,
    inner: Mutex<RoomInner>,
    /// Set under the room lock when the last member leaves. A closed room
    /// accepts no one and is about to leave the registry.
    closed: AtomicBool,
}

impl<C: Codec> Room<C> {
    pub fn new(id: impl Into<String>, config: RoomConfig, codec: Arc<C>) -> Self {
        let game = Game::new().with_round_limit(config.round_limit);
        Self::with_game(id, config, codec, game)
    }

    /// A room playing the given game. Tests pass a seeded one.
    pub fn with_game(
        id: impl Into<String>,
        config: RoomConfig,
        codec: Arc<C>,
        game: Game,
    ) -> Self {
        let inner = RoomInner::new(config.capacity, game);
        Self {
            id: id.into(),
            config,
            codec,
            inner: Mutex::new(inner),
            closed: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    // -- Membership --------------------------------------------------------

    /// Seats `session` in the lowest free slot and returns its seat.
    ///
    /// Nothing is broadcast; the caller announces the new roster once the
    /// player has been told who they are.
    ///
    /// # Errors
    /// - [`RoomError::Closed`] if the room emptied out meanwhile.
    /// - [`RoomError::GameInProgress`] while a round is being played.
    /// - [`RoomError::RoomFull`] when every seat is taken.
    pub async fn add(&self, mut session: Session) -> Result<Seat, RoomError> {
        let mut inner = self.inner.lock().await;
        if self.is_closed() {
            return Err(RoomError::Closed);
        }
        if let Some(seat) = inner
            .slots
            .iter()
            .flatten()
            .find(|s| s.id() == session.id())
            .map(Session::seat)
        {
            return Ok(seat);
        }
        if inner.game.state().is_active() {
            return Err(RoomError::GameInProgress);
        }
        if inner.members.len() >= self.config.capacity {
            return Err(RoomError::RoomFull);
        }
        let index = inner
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(RoomError::RoomFull)?;

        let seat = Seat::from_index(index);
        session.assign_seat(seat);
        inner.members.insert(session.id().clone());
        tracing::info!(
            room_id = %self.id,
            session = %session.id(),
            %seat,
            players = inner.members.len(),
            "player joined"
        );
        inner.slots[index] = Some(session);
        self.check_consistency(&inner);
        Ok(seat)
    }

    /// Takes `session_id` out of its seat and reports how many members
    /// remain.
    ///
    /// If that player was part of the round being played, the round is
    /// aborted. When the last member leaves the room is closed under the
    /// same lock; the caller then evicts it from the registry.
    pub async fn remove(&self, session_id: &SessionId) -> Departure {
        self.transact(|inner, out| {
            let Some(index) = inner
                .slots
                .iter()
                .position(|slot| slot.as_ref().is_some_and(|s| s.id() == session_id))
            else {
                return Departure {
                    remaining: inner.members.len(),
                    aborted: false,
                };
            };
            inner.slots[index] = None;
            inner.members.remove(session_id);
            self.check_consistency(inner);

            let seat = Seat::from_index(index);
            let remaining = inner.members.len();
            tracing::info!(
                room_id = %self.id,
                session = %session_id,
                %seat,
                players = remaining,
                "player left"
            );

            let mut aborted = false;
            if remaining == 0 {
                inner.game.abort();
                self.closed.store(true, Ordering::Release);
                tracing::debug!(room_id = %self.id, "room closed");
            } else if inner.game.state().is_active() && inner.game.contains(seat)
            {
                self.abort_locked(inner, out, &format!("Player {seat} left the game"));
                aborted = true;
            }
            Departure { remaining, aborted }
        })
        .await
    }

    /// Number of seated players.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.members.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Seats with someone in them, in order.
    pub async fn seats(&self) -> Vec<Seat> {
        self.inner.lock().await.occupied()
    }

    pub async fn seat_of(&self, session_id: &SessionId) -> Option<Seat> {
        let inner = self.inner.lock().await;
        inner
            .slots
            .iter()
            .flatten()
            .find(|s| s.id() == session_id)
            .map(Session::seat)
    }

    pub async fn state(&self) -> GameState {
        self.inner.lock().await.game.state()
    }

    /// Runs `f` against the game under the room lock.
    pub async fn inspect<R>(&self, f: impl FnOnce(&Game) -> R) -> R {
        f(&self.inner.lock().await.game)
    }

    // -- Game operations ---------------------------------------------------

    /// Starts a round with everyone currently seated.
    ///
    /// Only the [`HOST`] may start. A duplicate start while a round is
    /// running is ignored; any other failure aborts.
    pub async fn start(&self, seat: Seat) -> Result<(), RoomError> {
        self.transact(|inner, out| {
            if seat != HOST {
                out.seat(seat, ServerMessage::error("Only Player #1 can start the game"));
                return Err(RoomError::NotPermitted {
                    seat,
                    action: "start the game",
                });
            }
            if inner.game.is_finished() {
                inner.game.abort();
            }

            let seats = inner.occupied();
            match inner.game.start(&seats) {
                Ok(()) => {}
                Err(GameError::GameInProgress) => {
                    tracing::debug!(room_id = %self.id, %seat, "start ignored, round already running");
                    return Err(GameError::GameInProgress.into());
                }
                Err(e) => {
                    self.abort_locked(inner, out, &e.to_string());
                    return Err(e.into());
                }
            }

            tracing::info!(
                room_id = %self.id,
                players = seats.len(),
                muse = ?inner.game.muse(),
                poser = ?inner.game.poser(),
                "round started"
            );
            self.broadcast_players_locked(inner, out);
            out.all(ServerMessage::state(inner.game.state()));
            out.all(ServerMessage::info(
                "A new round is starting! The Muse is choosing a prompt.",
            ));
            for &player in inner.game.seats() {
                if let Some(role) = inner.game.role_of(player) {
                    out.seat(player, ServerMessage::role(role));
                }
            }
            if let Some(muse) = inner.game.muse() {
                out.seat(
                    muse,
                    ServerMessage::info("You are the Muse! Choose a prompt for everyone to draw."),
                );
            }
            Ok(())
        })
        .await
    }

    /// The Muse's prompt. Everyone but the Poser sees it; the Poser is told
    /// to play along. Drawing starts with the drawer picked at start.
    pub async fn set_prompt(&self, seat: Seat, text: &str) -> Result<(), RoomError> {
        self.transact(|inner, out| {
            if inner.game.muse() != Some(seat) {
                out.seat(seat, ServerMessage::error("Only the Muse can choose the prompt"));
                return Err(RoomError::NotPermitted {
                    seat,
                    action: "choose the prompt",
                });
            }
            let prompt = text.trim();
            if prompt.is_empty() {
                out.seat(seat, ServerMessage::error("The prompt cannot be empty"));
                return Err(RoomError::NotPermitted {
                    seat,
                    action: "choose an empty prompt",
                });
            }

            let present = inner
                .game
                .seats()
                .iter()
                .filter(|s| inner.is_occupied(**s))
                .count();
            if present < MIN_PLAYERS {
                let err = GameError::NotEnoughPlayers {
                    needed: MIN_PLAYERS,
                    have: present,
                };
                self.abort_locked(inner, out, &err.to_string());
                return Err(err.into());
            }

            if let Err(e) = inner.game.set_prompt(prompt) {
                self.abort_locked(inner, out, &e.to_string());
                return Err(e.into());
            }
            tracing::info!(room_id = %self.id, "prompt chosen, drawing begins");

            if let Some(poser) = inner.game.poser() {
                out.all_except(poser, ServerMessage::prompt(prompt));
                out.seat(
                    poser,
                    ServerMessage::prompt("You are the Poser! Nobody told you the prompt, so play along."),
                );
            }
            out.all(ServerMessage::state(inner.game.state()));
            if let Some(first) = inner.game.drawing() {
                out.all(ServerMessage::turn(first));
            }
            Ok(())
        })
        .await
    }

    /// Ends `seat`'s drawing turn. Any rejection aborts the round.
    pub async fn end_turn(&self, seat: Seat) -> Result<(), RoomError> {
        self.transact(|inner, out| {
            let state = match inner.game.end_turn(seat) {
                Ok(state) => state,
                Err(e) => {
                    self.abort_locked(inner, out, &e.to_string());
                    return Err(e.into());
                }
            };
            out.all(ServerMessage::state(state));
            match state {
                GameState::Drawing => {
                    if let Some(next) = inner.game.drawing() {
                        out.all(ServerMessage::turn(next));
                    }
                }
                GameState::Voting => {
                    tracing::info!(room_id = %self.id, "voting begins");
                    out.all(ServerMessage::info("Time to vote! Who is the Poser?"));
                }
                _ => {}
            }
            Ok(())
        })
        .await
    }

    /// `seat` accuses `target`. Bad or repeated votes are answered
    /// privately and the round goes on.
    pub async fn vote(&self, seat: Seat, target: Seat) -> Result<(), RoomError> {
        self.transact(|inner, out| {
            let verdict = match inner.game.vote(seat, target) {
                Ok(verdict) => verdict,
                Err(e @ (GameError::InvalidVote { .. } | GameError::VotedTwice(_))) => {
                    out.seat(seat, ServerMessage::error(e.to_string()));
                    return Err(e.into());
                }
                Err(e) => {
                    self.abort_locked(inner, out, &e.to_string());
                    return Err(e.into());
                }
            };
            self.broadcast_players_locked(inner, out);

            let Verdict::Resolved(state) = verdict else {
                return Ok(());
            };
            let poser = inner.game.poser().unwrap_or(Seat::UNSEATED);
            tracing::info!(room_id = %self.id, %state, %poser, "votes counted");
            out.all(ServerMessage::state(state));
            let message = match state {
                GameState::PoserGuessing => format!(
                    "Player {poser} was the Poser and has been caught! They get one guess at the prompt."
                ),
                GameState::PoserWon => format!(
                    "The Poser, Player {poser}, fooled everyone! The prompt was \"{}\".",
                    inner.game.prompt()
                ),
                // Ties go straight to the Poser. A runoff vote would be the
                // place to resolve them properly.
                GameState::PoserWonByTie => format!(
                    "The vote was tied, so the Poser, Player {poser}, wins! The prompt was \"{}\".",
                    inner.game.prompt()
                ),
                _ => return Ok(()),
            };
            out.all(ServerMessage::info(message));
            Ok(())
        })
        .await
    }

    /// The caught Poser's guess at the prompt.
    pub async fn guess(&self, seat: Seat, text: &str) -> Result<(), RoomError> {
        self.transact(|inner, out| {
            let state = match inner.game.guess(seat, text) {
                Ok(state) => state,
                Err(e @ GameError::NotPoser(_)) => {
                    out.seat(seat, ServerMessage::error("Only the Poser can guess the prompt"));
                    return Err(e.into());
                }
                Err(e) => {
                    self.abort_locked(inner, out, &e.to_string());
                    return Err(e.into());
                }
            };
            let prompt = inner.game.prompt();
            tracing::info!(room_id = %self.id, %seat, %state, "poser guessed");
            out.all(ServerMessage::state(state));
            let message = if state == GameState::PoserWon {
                format!("Player {seat} guessed the prompt \"{prompt}\" and wins!")
            } else {
                format!(
                    "Player {seat} guessed \"{}\" but the prompt was \"{prompt}\". The artists win!",
                    text.trim()
                )
            };
            out.all(ServerMessage::info(message));
            Ok(())
        })
        .await
    }

    /// Abandons the round on the host's request.
    pub async fn reset(&self, seat: Seat) -> Result<(), RoomError> {
        self.transact(|inner, out| {
            if seat != HOST {
                out.seat(seat, ServerMessage::error("Only Player #1 can reset the game"));
                return Err(RoomError::NotPermitted {
                    seat,
                    action: "reset the game",
                });
            }
            self.abort_locked(inner, out, &format!("Round reset by Player {seat}"));
            Ok(())
        })
        .await
    }

    /// Abandons the round, telling everyone why.
    pub async fn abort(&self, reason: &str) {
        self.transact(|inner, out| self.abort_locked(inner, out, reason))
            .await;
    }

    // -- Fan-out -----------------------------------------------------------

    /// Sends `msg` to every member except `from`.
    pub async fn broadcast(&self, from: Option<Seat>, msg: ServerMessage) {
        self.transact(|_, out| out.push(recipient_except(from), msg))
            .await;
    }

    /// Relays an already-encoded frame to every member except `from`.
    pub async fn broadcast_raw(&self, from: Option<Seat>, frame: impl Into<Arc<[u8]>>) {
        let payload = Payload::Raw(frame.into());
        self.transact(|_, out| out.push(recipient_except(from), payload))
            .await;
    }

    /// Sends the roster to everyone.
    pub async fn broadcast_players(&self) {
        self.transact(|inner, out| self.broadcast_players_locked(inner, out))
            .await;
    }

    /// Sends the current game state to everyone.
    pub async fn broadcast_state(&self) {
        self.transact(|inner, out| {
            out.all(ServerMessage::state(inner.game.state()));
        })
        .await;
    }

    pub async fn send_to(&self, session_id: &SessionId, msg: ServerMessage) {
        self.transact(|_, out| out.push(Recipient::Session(session_id.clone()), msg))
            .await;
    }

    /// One entry per slot, empty slots included so positions match seats.
    pub async fn roster(&self) -> Vec<PlayerEntry> {
        let inner = self.inner.lock().await;
        roster(&inner)
    }

    // -- Locked helpers ----------------------------------------------------

    fn abort_locked(&self, inner: &mut RoomInner, out: &mut Outbox, reason: &str) {
        tracing::warn!(room_id = %self.id, state = %inner.game.state(), %reason, "round aborted");
        inner.game.abort();
        out.all(ServerMessage::error(reason));
        out.all(ServerMessage::state(inner.game.state()));
        self.broadcast_players_locked(inner, out);
    }

    fn broadcast_players_locked(&self, inner: &RoomInner, out: &mut Outbox) {
        out.all(ServerMessage::Players(PlayersData {
            players: roster(inner),
        }));
    }

    fn check_consistency(&self, inner: &RoomInner) {
        let ok = inner.consistent();
        if !ok {
            tracing::error!(
                room_id = %self.id,
                members = inner.members.len(),
                "slot table and membership disagree"
            );
        }
        debug_assert!(ok, "slot table and membership disagree in {}", self.id);
    }

    // -- Locking and delivery ----------------------------------------------

    /// Runs `f` under the room lock and queues whatever it sent before
    /// letting go.
    async fn transact<R>(&self, f: impl FnOnce(&mut RoomInner, &mut Outbox) -> R) -> R {
        let mut inner = self.inner.lock().await;
        let mut out = Outbox::default();
        let result = f(&mut inner, &mut out);
        self.deliver(out.resolve(&inner.slots));
        drop(inner);
        result
    }

    /// Encodes each message once and queues it on every target session.
    fn deliver(&self, delivery: Delivery) {
        for (targets, payload) in delivery.batches {
            if targets.is_empty() {
                continue;
            }
            let frame: Arc<[u8]> = match payload {
                Payload::Raw(frame) => frame,
                Payload::Message(msg) => match self.codec.encode(&msg) {
                    Ok(bytes) => bytes.into(),
                    Err(e) => {
                        tracing::error!(room_id = %self.id, kind = msg.kind(), error = %e, "encode failed");
                        continue;
                    }
                },
            };
            for session in targets {
                if let Err(e) = session.send(Arc::clone(&frame)) {
                    tracing::trace!(room_id = %self.id, error = %e, "dropping frame");
                }
            }
        }
    }
}

impl<C: Codec> std::fmt::Debug for Room<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Room")
            .field("id", &self.id)
            .field("config", &self.config)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

fn recipient_except(from: Option<Seat>) -> Recipient {
    match from {
        Some(seat) => Recipient::AllExcept(seat),
        None => Recipient::All,
    }
}

fn roster(inner: &RoomInner) -> Vec<PlayerEntry> {
    inner
        .slots
        .iter()
        .enumerate()
        .map(|(index, slot)| PlayerEntry {
            id: slot
                .as_ref()
                .map(|s| s.id().to_string())
                .unwrap_or_default(),
            votes: inner.game.votes_received(Seat::from_index(index)),
        })
        .collect()
}
