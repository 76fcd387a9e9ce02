//! The room registry: room id → live room.

use std::collections::HashMap;
use std::sync::Arc;

use poser_protocol::{Codec, Seat};
use poser_session::Session;
use tokio::sync::Mutex;

use crate::{Room, RoomConfig, RoomError};

/// Creates rooms on first reference and forgets them once they empty out.
///
/// Lock order is registry, then room. The registry only looks at a room's
/// closed flag, never its lock, while holding its own.
pub struct RoomRegistry<C: Codec> {
    rooms: Mutex<HashMap<String, Arc<Room<C>>>>,
    config: RoomConfig,
    codec: Arc<C>,
}

impl<C: Codec> RoomRegistry<C> {
    pub fn new(config: RoomConfig, codec: C) -> Self {
        Self {
            rooms: Mutex::new(HashMap::new()),
            config,
            codec: Arc::new(codec),
        }
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    /// The codec every room in this registry encodes with.
    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Returns the room for `id`, creating it if there is none or the one
    /// on file has already closed.
    pub async fn get_or_create(&self, id: &str) -> Arc<Room<C>> {
        let mut rooms = self.rooms.lock().await;
        if let Some(room) = rooms.get(id).filter(|room| !room.is_closed()) {
            return Arc::clone(room);
        }
        let room = Arc::new(Room::new(
            id,
            self.config.clone(),
            Arc::clone(&self.codec),
        ));
        rooms.insert(id.to_string(), Arc::clone(&room));
        tracing::info!(room_id = %id, rooms = rooms.len(), "room created");
        room
    }

    /// Seats `session` in room `id`, creating the room if needed.
    ///
    /// A room can close between lookup and join when its last player
    /// leaves at that moment; the lookup is then repeated and lands on a
    /// fresh room.
    ///
    /// # Errors
    /// [`RoomError::RoomFull`] or [`RoomError::GameInProgress`] from
    /// [`Room::add`].
    pub async fn join(
        &self,
        id: &str,
        session: Session,
    ) -> Result<(Arc<Room<C>>, Seat), RoomError> {
        loop {
            let room = self.get_or_create(id).await;
            match room.add(session.clone()).await {
                Ok(seat) => return Ok((room, seat)),
                Err(RoomError::Closed) => {
                    tracing::debug!(room_id = %id, "raced a closing room, retrying");
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Drops `room` from the registry if it is closed and still the room
    /// registered under its id. Returns whether it was removed.
    pub async fn evict_if_empty(&self, room: &Arc<Room<C>>) -> bool {
        if !room.is_closed() {
            return false;
        }
        let mut rooms = self.rooms.lock().await;
        let current = rooms
            .get(room.id())
            .is_some_and(|registered| Arc::ptr_eq(registered, room));
        if current {
            rooms.remove(room.id());
            tracing::info!(room_id = %room.id(), rooms = rooms.len(), "room evicted");
        }
        current
    }

    pub async fn get(&self, id: &str) -> Option<Arc<Room<C>>> {
        self.rooms.lock().await.get(id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.rooms.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rooms.lock().await.is_empty()
    }

    pub async fn room_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.rooms.lock().await.keys().cloned().collect();
        ids.sort();
        ids
    }
}
