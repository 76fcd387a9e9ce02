//! Core protocol types for the Poser wire format.
//!
//! Every frame on the socket is an [`Envelope`]: a short `type` tag plus a
//! `data` payload whose shape depends on the tag. Inbound frames are
//! classified into [`ClientMessage`]s (or left as raw envelopes when the tag
//! is unknown); outbound frames are [`ServerMessage`]s.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Seat
// ---------------------------------------------------------------------------

/// A 1-indexed position in a room's slot table ("player number").
///
/// `Seat(0)` is reserved for "not yet seated". Serialized as a plain number
/// because the client uses it directly as `playerNumber`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default,
    Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Seat(pub usize);

impl Seat {
    /// The placeholder seat of a connection that has not joined a room.
    pub const UNSEATED: Seat = Seat(0);

    /// Seat for a zero-based slot index.
    pub fn from_index(index: usize) -> Self {
        Self(index + 1)
    }

    /// Zero-based slot index, or `None` for [`Seat::UNSEATED`].
    pub fn index(self) -> Option<usize> {
        self.0.checked_sub(1)
    }

    /// Returns `true` unless this is [`Seat::UNSEATED`].
    pub fn is_seated(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for Seat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// GameState / Role
// ---------------------------------------------------------------------------

/// The state of a room's game, as shown to clients.
///
/// ```text
/// Waiting → GettingPrompt → Drawing → Voting ─┬→ PoserGuessing ─┬→ PoserWon
///                                             ├→ PoserWon       └→ PoserLost
///                                             └→ PoserWonByTie
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
pub enum GameState {
    /// No round in progress; players may join and the host may start.
    #[default]
    Waiting,
    /// The Muse is choosing a prompt.
    GettingPrompt,
    /// Players take turns adding strokes.
    Drawing,
    /// Everyone votes for the player they think is the Poser.
    Voting,
    /// The Poser was caught and gets one guess at the prompt.
    PoserGuessing,
    /// The Poser escaped detection or guessed the prompt.
    PoserWon,
    /// The vote ended in a tie, which the Poser wins.
    PoserWonByTie,
    /// The Poser was caught and guessed wrong.
    PoserLost,
}

impl GameState {
    /// Returns `true` for the states that end a round.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::PoserWon | Self::PoserWonByTie | Self::PoserLost)
    }

    /// Returns `true` while a round is being played.
    pub fn is_active(self) -> bool {
        !matches!(self, Self::Waiting) && !self.is_terminal()
    }
}

impl fmt::Display for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Waiting => "Waiting",
            Self::GettingPrompt => "GettingPrompt",
            Self::Drawing => "Drawing",
            Self::Voting => "Voting",
            Self::PoserGuessing => "PoserGuessing",
            Self::PoserWon => "PoserWon",
            Self::PoserWonByTie => "PoserWonByTie",
            Self::PoserLost => "PoserLost",
        };
        f.write_str(name)
    }
}

/// A player's private role for one round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    /// Knows the prompt and draws.
    Artist,
    /// Chose the prompt.
    Muse,
    /// Does not know the prompt and has to bluff.
    Poser,
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// The untyped wire frame: `{"type": "...", "data": ...}`.
///
/// `data` is kept as raw JSON so that frames with an unrecognized `type`
/// can be forwarded untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Message tag, e.g. `"chat"` or `"draw"`.
    #[serde(rename = "type")]
    pub kind: String,

    /// Payload; absent and `null` are equivalent.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,
}

/// An inbound frame after classification.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// A message type the server understands.
    Message(ClientMessage),
    /// Any other tag. Forwarded as-is to the rest of the room.
    Unrecognized(Envelope),
}

impl Envelope {
    /// Classifies this envelope by its tag.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` when the tag is recognized but the
    /// payload does not match its shape.
    pub fn into_inbound(self) -> Result<Inbound, ProtocolError> {
        if !ClientMessage::KINDS.contains(&self.kind.as_str()) {
            return Ok(Inbound::Unrecognized(self));
        }
        let value =
            serde_json::to_value(&self).map_err(ProtocolError::Encode)?;
        serde_json::from_value(value)
            .map(Inbound::Message)
            .map_err(ProtocolError::Decode)
    }
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// A chat line as typed by a client. Anything else the client sends along
/// (id, user, playerNumber) is ignored; the server stamps its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatInput {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
}

/// A chat line as relayed by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub player_number: Seat,
    pub user: String,
    pub timestamp: u64,
    pub text: String,
}

/// One segment of a brush stroke.
///
/// Inbound, `player_number` is ignored and overwritten with the sender's
/// seat before the stroke is relayed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stroke {
    pub last_x: f64,
    pub last_y: f64,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub player_number: Seat,
}

/// The Muse's prompt inbound, or the prompt text a player is shown outbound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptData {
    pub prompt: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteData {
    /// The seat being accused.
    pub player_number: Seat,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuessData {
    pub guess: String,
}

/// Welcome message: who you are and where you sit.
///
/// The id and the seat are not interchangeable: a seat can be vacated and
/// taken by a different connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionData {
    pub id: String,
    pub player_number: Seat,
}

/// One roster row. An empty `id` marks an empty slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerEntry {
    pub id: String,
    pub votes: u32,
}

/// The room's roster in seat order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayersData {
    pub players: Vec<PlayerEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateData {
    pub state: GameState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleData {
    pub role: Role,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnData {
    /// The seat that is drawing now.
    pub player_number: Seat,
}

/// A user-facing message from the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
    pub message: String,
    pub is_error: bool,
}

impl Notification {
    /// An informational notification stamped with the current time.
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            timestamp: now_millis(),
            message: message.into(),
            is_error: false,
        }
    }

    /// An error notification stamped with the current time.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            timestamp: now_millis(),
            message: message.into(),
            is_error: true,
        }
    }
}

/// Milliseconds since the Unix epoch, or 0 if the clock is before it.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// Messages a client may send.
///
/// Adjacently tagged, so `ClientMessage::Done` is `{"type":"done"}` and
/// `ClientMessage::Vote(..)` is `{"type":"vote","data":{"playerNumber":2}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum ClientMessage {
    Chat(ChatInput),
    Draw(Stroke),
    /// Start a round. Host only.
    Start,
    /// The Muse's prompt.
    Prompt(PromptData),
    /// The current drawer finished their stroke.
    Done,
    Vote(VoteData),
    /// The caught Poser's guess at the prompt.
    Guess(GuessData),
    /// Abandon the current round. Host only.
    Reset,
}

impl ClientMessage {
    /// Every tag [`ClientMessage`] can decode.
    pub const KINDS: &'static [&'static str] = &[
        "chat", "draw", "start", "prompt", "done", "vote", "guess", "reset",
    ];

    /// The wire tag of this message.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Chat(_) => "chat",
            Self::Draw(_) => "draw",
            Self::Start => "start",
            Self::Prompt(_) => "prompt",
            Self::Done => "done",
            Self::Vote(_) => "vote",
            Self::Guess(_) => "guess",
            Self::Reset => "reset",
        }
    }
}

/// Messages the server sends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum ServerMessage {
    Connection(ConnectionData),
    Players(PlayersData),
    State(StateData),
    Role(RoleData),
    Prompt(PromptData),
    Turn(TurnData),
    Notification(Notification),
    Chat(ChatMessage),
    Draw(Stroke),
}

impl ServerMessage {
    /// The wire tag of this message.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connection(_) => "connection",
            Self::Players(_) => "players",
            Self::State(_) => "state",
            Self::Role(_) => "role",
            Self::Prompt(_) => "prompt",
            Self::Turn(_) => "turn",
            Self::Notification(_) => "notification",
            Self::Chat(_) => "chat",
            Self::Draw(_) => "draw",
        }
    }

    pub fn state(state: GameState) -> Self {
        Self::State(StateData { state })
    }

    pub fn turn(seat: Seat) -> Self {
        Self::Turn(TurnData {
            player_number: seat,
        })
    }

    pub fn role(role: Role) -> Self {
        Self::Role(RoleData { role })
    }

    pub fn prompt(prompt: impl Into<String>) -> Self {
        Self::Prompt(PromptData {
            prompt: prompt.into(),
        })
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::Notification(Notification::info(message))
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Notification(Notification::error(message))
    }
}

// =========================================================================
// Tests
// =========================================================================
