//! `PoserServer` builder and accept loop.
//!
//! Ties the layers together: transport → protocol → session → room.

use std::sync::Arc;

use poser_protocol::{Codec, JsonCodec};
use poser_room::{RoomConfig, RoomRegistry};
use poser_transport::{Incoming, Transport, WebSocketTransport};

use crate::handler::handle_connection;
use crate::PoserError;

/// Builder for configuring and starting a Poser server.
///
/// # Example
///
/// ```rust,no_run
/// use poser::{PoserServer, RoomConfig};
///
/// # async fn run() -> Result<(), poser::PoserError> {
/// let server = PoserServer::builder()
///     .bind("0.0.0.0:8080")
///     .room_config(RoomConfig { capacity: 6, ..RoomConfig::default() })
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct PoserServerBuilder {
    bind_addr: String,
    room_config: RoomConfig,
}

impl PoserServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            room_config: RoomConfig::default(),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the configuration every room is created with.
    pub fn room_config(mut self, config: RoomConfig) -> Self {
        self.room_config = config;
        self
    }

    /// Binds the listener. Uses `JsonCodec` and `WebSocketTransport`.
    ///
    /// Fails with [`RoomError::InvalidConfig`](poser_room::RoomError) before
    /// binding if the room config cannot seat anyone.
    pub async fn build(self) -> Result<PoserServer<JsonCodec>, PoserError> {
        self.room_config.validate()?;
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;
        let registry = Arc::new(RoomRegistry::new(self.room_config, JsonCodec));
        Ok(PoserServer {
            transport,
            registry,
        })
    }
}

impl Default for PoserServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Poser server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct PoserServer<C: Codec> {
    transport: WebSocketTransport,
    registry: Arc<RoomRegistry<C>>,
}

impl PoserServer<JsonCodec> {
    /// Creates a new builder.
    pub fn builder() -> PoserServerBuilder {
        PoserServerBuilder::new()
    }
}

impl<C: Codec> PoserServer<C> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// The registry of live rooms, shared with every connection.
    pub fn registry(&self) -> Arc<RoomRegistry<C>> {
        Arc::clone(&self.registry)
    }

    /// Runs the accept loop.
    ///
    /// Each accepted socket gets its own task, which performs the WebSocket
    /// upgrade and then runs the handler. Runs until the process is
    /// terminated; a failed accept or handshake only costs that connection.
    pub async fn run(mut self) -> Result<(), PoserError> {
        tracing::info!(addr = ?self.local_addr().ok(), "Poser server running");

        loop {
            match self.transport.accept().await {
                Ok(incoming) => {
                    let registry = Arc::clone(&self.registry);
                    tokio::spawn(async move {
                        let peer = incoming.peer_addr();
                        let conn = match incoming.upgrade().await {
                            Ok(conn) => conn,
                            Err(e) => {
                                tracing::debug!(%peer, error = %e, "handshake failed");
                                return;
                            }
                        };
                        if let Err(e) = handle_connection(conn, registry).await {
                            tracing::debug!(
                                error = %e,
                                "connection ended with error"
                            );
                        }
                    });
                }
                Err(e) => {
                    tracing::warn!(error = %e, "accept failed");
                }
            }
        }
    }
}
