//! Messages queued while a room is locked and delivered after it is not.

use std::sync::Arc;

use poser_protocol::{Seat, ServerMessage};
use poser_session::{Session, SessionId};

/// Who should receive a queued message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    /// Every member of the room.
    All,
    /// Every member except the one in this seat.
    AllExcept(Seat),
    /// Only whoever sits in this seat.
    Seat(Seat),
    /// Only this session.
    Session(SessionId),
}

/// A queued message, either typed or already encoded.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Message(ServerMessage),
    /// Relayed unchanged, as received from a client.
    Raw(Arc<[u8]>),
}

impl From<ServerMessage> for Payload {
    fn from(msg: ServerMessage) -> Self {
        Self::Message(msg)
    }
}

/// `(Recipient, Payload)` pairs collected during one critical section.
///
/// Room operations push here instead of writing to sessions directly.
/// Before unlocking, the room resolves recipients against its slot table
/// and queues each frame on the target sessions.
#[derive(Debug, Default)]
pub struct Outbox {
    items: Vec<(Recipient, Payload)>,
}

impl Outbox {
    pub fn push(&mut self, to: Recipient, payload: impl Into<Payload>) {
        self.items.push((to, payload.into()));
    }

    pub fn all(&mut self, msg: ServerMessage) {
        self.push(Recipient::All, msg);
    }

    pub fn all_except(&mut self, seat: Seat, msg: ServerMessage) {
        self.push(Recipient::AllExcept(seat), msg);
    }

    pub fn seat(&mut self, seat: Seat, msg: ServerMessage) {
        self.push(Recipient::Seat(seat), msg);
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Turns recipients into concrete sessions, given the room's slot
    /// table at this instant.
    pub(crate) fn resolve(self, slots: &[Option<Session>]) -> Delivery {
        let batches = self
            .items
            .into_iter()
            .map(|(to, payload)| {
                let targets = slots
                    .iter()
                    .flatten()
                    .filter(|s| match &to {
                        Recipient::All => true,
                        Recipient::AllExcept(seat) => s.seat() != *seat,
                        Recipient::Seat(seat) => s.seat() == *seat,
                        Recipient::Session(id) => s.id() == id,
                    })
                    .cloned()
                    .collect();
                (targets, payload)
            })
            .collect();
        Delivery { batches }
    }
}

/// An outbox whose recipients have been resolved.
#[derive(Debug, Default)]
pub(crate) struct Delivery {
    pub(crate) batches: Vec<(Vec<Session>, Payload)>,
}
