//! Error types for the session layer.

use crate::SessionId;

/// Errors that can occur while talking to a session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The session's writer is gone, so nothing can be delivered to it.
    /// This is the normal state of a connection that is shutting down.
    #[error("session {0} is disconnected")]
    Disconnected(SessionId),
}
