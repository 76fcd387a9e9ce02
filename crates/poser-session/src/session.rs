//! Session types: the handle a room holds for one connected player.

use std::fmt;
use std::sync::Arc;

use poser_protocol::Seat;
use poser_transport::Connection;
use tokio::sync::mpsc;

use crate::SessionError;

// ---------------------------------------------------------------------------
// SessionId
// ---------------------------------------------------------------------------

/// The stable identity of one connection, shown to clients as their `id`.
///
/// Generated fresh for every socket; a player who reconnects is a new
/// session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(String);

impl SessionId {
    /// Generates a new random id of the form `conn-<uuid>`.
    pub fn generate() -> Self {
        Self(format!("conn-{}", uuid::Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

/// What a session's writer task is asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Write one already-encoded frame. Shared so a broadcast encodes once.
    Frame(Arc<[u8]>),
    /// Close the socket and stop writing.
    Close,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// A connected player, as seen by a room.
///
/// Cheap to clone: the room keeps one copy in its slot table and the
/// connection handler keeps another.
#[derive(Debug, Clone)]
pub struct Session {
    id: SessionId,
    seat: Seat,
    tx: mpsc::UnboundedSender<Outbound>,
}

impl Session {
    /// Creates a session with a fresh id, plus the receiver its writer
    /// task drains.
    pub fn new() -> (Self, SessionReceiver) {
        Self::with_id(SessionId::generate())
    }

    /// Creates a session with a caller-chosen id.
    pub fn with_id(id: SessionId) -> (Self, SessionReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = Self {
            id,
            seat: Seat::UNSEATED,
            tx,
        };
        (session, SessionReceiver { rx })
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// The seat a room assigned, or [`Seat::UNSEATED`].
    pub fn seat(&self) -> Seat {
        self.seat
    }

    /// Records the seat a room assigned. Only the room that owns the slot
    /// table should call this.
    pub fn assign_seat(&mut self, seat: Seat) {
        self.seat = seat;
    }

    /// Queues an encoded frame for delivery. Never waits on the socket.
    ///
    /// # Errors
    /// Returns [`SessionError::Disconnected`] once the writer has stopped.
    pub fn send(&self, frame: Arc<[u8]>) -> Result<(), SessionError> {
        self.tx
            .send(Outbound::Frame(frame))
            .map_err(|_| SessionError::Disconnected(self.id.clone()))
    }

    /// Asks the writer to close the socket after any frames already queued.
    pub fn close(&self) -> Result<(), SessionError> {
        self.tx
            .send(Outbound::Close)
            .map_err(|_| SessionError::Disconnected(self.id.clone()))
    }

    /// Returns `true` once the writer has stopped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// The receiving end of a [`Session`]'s outbound channel.
#[derive(Debug)]
pub struct SessionReceiver {
    rx: mpsc::UnboundedReceiver<Outbound>,
}

impl SessionReceiver {
    /// Waits for the next outbound item. `None` once every [`Session`]
    /// clone has been dropped.
    pub async fn recv(&mut self) -> Option<Outbound> {
        self.rx.recv().await
    }

    /// Takes the next queued item without waiting.
    pub fn try_recv(&mut self) -> Option<Outbound> {
        self.rx.try_recv().ok()
    }
}

/// Drains a session's outbound queue into its connection.
///
/// Runs until a [`Outbound::Close`] arrives, every [`Session`] clone is
/// dropped, or a write fails. The socket is closed on the way out in all
/// three cases.
pub async fn forward<C: Connection>(mut rx: SessionReceiver, conn: Arc<C>) {
    let conn_id = conn.id();
    while let Some(item) = rx.recv().await {
        match item {
            Outbound::Frame(frame) => {
                if let Err(e) = conn.send(&frame).await {
                    tracing::debug!(%conn_id, error = %e, "write failed");
                    break;
                }
            }
            Outbound::Close => break,
        }
    }
    if let Err(e) = conn.close().await {
        tracing::trace!(%conn_id, error = %e, "close after writer exit");
    }
    tracing::debug!(%conn_id, "writer stopped");
}
