//! Runtime error types.

use std::fmt;

use crate::server_error::ServerError as DriverError;

/// Errors from binding, accepting and serving connections.
///
/// Only `Config` is fatal to the process; everything else ends one
/// connection or stream.
#[derive(Debug)]
pub enum ServerError {
    /// Bad bind address or unusable TLS material. Startup aborts.
    Config(String),

    /// QUIC endpoint, connection or stream failure.
    Transport(String),

    /// A frame could not be encoded or its header was malformed.
    Protocol(String),

    /// A runtime task died (panicked or was cancelled).
    Internal(String),

    /// The driver refused an event.
    Driver(DriverError),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {msg}"),
            Self::Transport(msg) => write!(f, "transport error: {msg}"),
            Self::Protocol(msg) => write!(f, "protocol error: {msg}"),
            Self::Internal(msg) => write!(f, "internal error: {msg}"),
            Self::Driver(err) => write!(f, "driver error: {err}"),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Driver(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DriverError> for ServerError {
    fn from(err: DriverError) -> Self {
        Self::Driver(err)
    }
}

impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<hornfield_proto::ProtocolError> for ServerError {
    fn from(err: hornfield_proto::ProtocolError) -> Self {
        Self::Protocol(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::*;

    #[test]
    fn driver_errors_keep_their_source() {
        let err = ServerError::from(DriverError::SessionNotFound(9));

        assert_eq!(err.to_string(), "driver error: session not found: 9");
        assert!(err.source().is_some());
        assert!(ServerError::Config("x".to_string()).source().is_none());
    }

    #[test]
    fn protocol_errors_become_strings() {
        let err = ServerError::from(hornfield_proto::ProtocolError::InvalidMagic);
        assert!(matches!(err, ServerError::Protocol(msg) if msg == "invalid magic number"));
    }
}
