//! Per-connection handler: room lookup, seating, and message routing.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Take the room id from the request path
//!   2. Start the writer task and seat the player in the room
//!   3. Tell the player who they are, announce the new roster
//!   4. Loop: receive frames → decode → dispatch to the room

use std::sync::Arc;

use poser_protocol::{
    now_millis, ChatMessage, ClientMessage, Codec, ConnectionData, Inbound,
    Seat, ServerMessage,
};
use poser_room::{Room, RoomError, RoomRegistry};
use poser_session::{forward, Session, SessionId};
use poser_transport::{Connection, WebSocketConnection};

use crate::PoserError;

/// Drop guard that takes a player out of their room when the handler
/// exits, however it exits.
///
/// `Drop` is synchronous, so the async cleanup runs in a spawned task.
struct SeatGuard<C: Codec> {
    session_id: SessionId,
    room: Arc<Room<C>>,
    registry: Arc<RoomRegistry<C>>,
}

impl<C: Codec> Drop for SeatGuard<C> {
    fn drop(&mut self) {
        let session_id = self.session_id.clone();
        let room = Arc::clone(&self.room);
        let registry = Arc::clone(&self.registry);
        tokio::spawn(async move {
            let departure = room.remove(&session_id).await;
            if departure.remaining == 0 {
                registry.evict_if_empty(&room).await;
            } else if !departure.aborted {
                room.broadcast_players().await;
            }
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C: Codec>(
    conn: WebSocketConnection,
    registry: Arc<RoomRegistry<C>>,
) -> Result<(), PoserError> {
    let conn = Arc::new(conn);
    let conn_id = conn.id();

    let Some(room_id) = room_id_from_path(conn.path()).map(str::to_string)
    else {
        tracing::debug!(%conn_id, path = conn.path(), "no room id in path");
        conn.close().await?;
        return Ok(());
    };

    let (session, rx) = Session::new();
    let writer = tokio::spawn(forward(rx, Arc::clone(&conn)));
    tracing::debug!(%conn_id, session = %session.id(), %room_id, "connection opened");

    let (room, seat) = match registry.join(&room_id, session.clone()).await {
        Ok(joined) => joined,
        Err(e) => {
            tracing::info!(%conn_id, %room_id, error = %e, "join refused");
            refuse(registry.codec(), &session, &e)?;
            drop(session);
            let _ = writer.await;
            return Ok(());
        }
    };
    let _guard = SeatGuard {
        session_id: session.id().clone(),
        room: Arc::clone(&room),
        registry: Arc::clone(&registry),
    };

    room.send_to(
        session.id(),
        ServerMessage::Connection(ConnectionData {
            id: session.id().to_string(),
            player_number: seat,
        }),
    )
    .await;
    room.broadcast_players().await;

    loop {
        match conn.recv().await {
            Ok(Some(data)) => {
                dispatch(&room, registry.codec(), &session, seat, data).await;
            }
            Ok(None) => {
                tracing::info!(%room_id, %seat, "connection closed cleanly");
                break;
            }
            Err(e) => {
                tracing::debug!(%room_id, %seat, error = %e, "recv error");
                break;
            }
        }
    }

    // Stop the writer now rather than when the room drops its copy.
    let _ = session.close();
    Ok(())
    // _guard drops here → the seat is given up.
}

/// Tells a player why they could not join, then hangs up.
fn refuse<C: Codec>(
    codec: &C,
    session: &Session,
    err: &RoomError,
) -> Result<(), PoserError> {
    let message = match err {
        RoomError::RoomFull => "This room is full".to_string(),
        RoomError::GameInProgress => {
            "A game is already in progress in this room. Try again when the round is over."
                .to_string()
        }
        other => other.to_string(),
    };
    let frame = codec.encode(&ServerMessage::error(message))?;
    session.send(frame.into())?;
    session.close()?;
    Ok(())
}

/// Routes one inbound frame to the room.
async fn dispatch<C: Codec>(
    room: &Room<C>,
    codec: &C,
    session: &Session,
    seat: Seat,
    data: Vec<u8>,
) {
    let msg = match codec.decode_inbound(&data) {
        Ok(Inbound::Message(msg)) => msg,
        Ok(Inbound::Unrecognized(envelope)) => {
            tracing::debug!(%seat, kind = %envelope.kind, "relaying unrecognized message");
            room.broadcast_raw(Some(seat), data).await;
            return;
        }
        Err(e) => {
            tracing::debug!(%seat, error = %e, "failed to decode message");
            room.send_to(session.id(), ServerMessage::error("Malformed message"))
                .await;
            return;
        }
    };
    tracing::debug!(room_id = room.id(), %seat, kind = msg.kind(), "message");

    let result = match msg {
        ClientMessage::Chat(input) => {
            let chat = ChatMessage {
                id: uuid::Uuid::new_v4().to_string(),
                player_number: seat,
                user: session.id().to_string(),
                timestamp: input.timestamp.unwrap_or_else(now_millis),
                text: input.text,
            };
            room.broadcast(None, ServerMessage::Chat(chat)).await;
            Ok(())
        }
        ClientMessage::Draw(mut stroke) => {
            stroke.player_number = seat;
            room.broadcast(Some(seat), ServerMessage::Draw(stroke)).await;
            Ok(())
        }
        ClientMessage::Start => room.start(seat).await,
        ClientMessage::Prompt(p) => room.set_prompt(seat, &p.prompt).await,
        ClientMessage::Done => room.end_turn(seat).await,
        ClientMessage::Vote(v) => room.vote(seat, v.player_number).await,
        ClientMessage::Guess(g) => room.guess(seat, &g.guess).await,
        ClientMessage::Reset => room.reset(seat).await,
    };
    if let Err(e) = result {
        tracing::debug!(room_id = room.id(), %seat, error = %e, "action rejected");
    }
}

/// The room id a request path names: `/ws/<id>`, with any trailing slash
/// or query string ignored. `None` if it names no room.
pub(crate) fn room_id_from_path(path: &str) -> Option<&str> {
    let path = path.split_once('?').map_or(path, |(p, _)| p);
    let id = path
        .strip_prefix("/ws/")
        .unwrap_or_else(|| path.trim_start_matches('/'))
        .trim_end_matches('/');
    (!id.is_empty()).then_some(id)
}
