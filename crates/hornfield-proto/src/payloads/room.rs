//! Room membership payloads: joining and seat assignment.

use serde::{Deserialize, Serialize};

use crate::{
    Seat,
    errors::{ProtocolError, Result},
};

/// Longest accepted room identifier, in bytes.
pub const MAX_ROOM_ID_LEN: usize = 64;

/// Check a caller-supplied room identifier.
///
/// Room ids are opaque; the only constraints bound the registry key size.
///
/// # Errors
///
/// - `ProtocolError::InvalidRoomId` if empty or longer than
///   [`MAX_ROOM_ID_LEN`] bytes
pub fn validate_room_id(room_id: &str) -> Result<()> {
    if room_id.is_empty() {
        return Err(ProtocolError::InvalidRoomId("room id is empty".to_string()));
    }
    if room_id.len() > MAX_ROOM_ID_LEN {
        return Err(ProtocolError::InvalidRoomId(format!(
            "room id is {} bytes (max {MAX_ROOM_ID_LEN})",
            room_id.len()
        )));
    }
    Ok(())
}

/// Join a room, creating it on first use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRoom {
    /// Caller-chosen room identifier
    pub room_id: String,
}

/// Seat assigned to the requester.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatAssigned {
    /// Room the seat belongs to
    pub room_id: String,
    /// Assigned seat (1 or 2 on the wire)
    pub seat: Seat,
}

/// Room already has two seated participants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomFull {
    /// Room that refused the join
    pub room_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_id_limits() {
        assert!(validate_room_id("lobby-7").is_ok());
        assert!(validate_room_id(&"x".repeat(MAX_ROOM_ID_LEN)).is_ok());
        assert!(matches!(validate_room_id(""), Err(ProtocolError::InvalidRoomId(_))));
        assert!(matches!(
            validate_room_id(&"x".repeat(MAX_ROOM_ID_LEN + 1)),
            Err(ProtocolError::InvalidRoomId(_))
        ));
    }
}
