//! Driver error types.
//!
//! Errors the Sans-IO driver returns instead of actions. Anything scoped to a
//! single request (bad payload, illegal move, full room) is answered with a
//! frame to the client and is not an error here.

use std::fmt;

use crate::rooms::RoomError;

/// Errors that can occur while the driver processes an event.
#[derive(Debug)]
pub enum ServerError {
    /// Session not found in registry.
    ///
    /// A frame arrived for a session that was never accepted or was already
    /// closed. May be transient if the close raced the frame.
    SessionNotFound(u64),

    /// Session already registered.
    ///
    /// The runtime reused a session id. Session ids are random 64-bit values,
    /// so this indicates a bug in the runtime.
    SessionAlreadyExists(u64),

    /// Room operation failed.
    ///
    /// Wraps errors from `RoomRegistry`. See `RoomError` for details.
    Room(RoomError),

    /// Frame encoding error.
    ///
    /// Failed to encode a response frame. Indicates a bug since every server
    /// payload is bounded well below the frame limit.
    Protocol(String),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SessionNotFound(id) => write!(f, "session not found: {id}"),
            Self::SessionAlreadyExists(id) => write!(f, "session already exists: {id}"),
            Self::Room(err) => write!(f, "room error: {err}"),
            Self::Protocol(msg) => write!(f, "protocol error: {msg}"),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Room(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RoomError> for ServerError {
    fn from(err: RoomError) -> Self {
        Self::Room(err)
    }
}

impl From<hornfield_proto::ProtocolError> for ServerError {
    fn from(err: hornfield_proto::ProtocolError) -> Self {
        Self::Protocol(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_error_display() {
        let err = ServerError::SessionNotFound(42);
        assert_eq!(err.to_string(), "session not found: 42");

        let err = ServerError::SessionAlreadyExists(123);
        assert_eq!(err.to_string(), "session already exists: 123");

        let err = ServerError::Room(RoomError::InvalidRoomId("room id is empty".to_string()));
        assert_eq!(err.to_string(), "room error: invalid room id: room id is empty");
    }

    #[test]
    fn room_error_is_source() {
        use std::error::Error;

        let err = ServerError::from(RoomError::InvalidRoomId("x".to_string()));
        assert!(err.source().is_some());
        assert!(ServerError::SessionNotFound(1).source().is_none());
    }
}
