//! Connection registry for session and room tracking.
//!
//! Maintains bidirectional mappings: room → sessions (for detaching a room's
//! seats on eviction) and session → room (for cleanup on disconnect and the
//! one-room-per-connection rule). Both directions are O(1).
//!
//! A session is bound to a room before the match lock is taken and unbound
//! again if the join is refused, so two concurrent joins from one session
//! can never seat it in two rooms. Seating re-checks the binding under the
//! match lock, and leaving drops the binding before vacating the seat, so a
//! session that is gone is never seated.

use std::collections::{HashMap, HashSet};

/// Information about a registered session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionInfo {
    /// Room the session is playing in, if any
    pub room_id: Option<String>,
}

/// Result of [`ConnectionRegistry::bind_room`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindResult {
    /// Session was free and is now bound
    Bound,
    /// Session was already bound to this room
    AlreadyBound,
    /// Session is bound to a different room
    Conflict(String),
    /// Session is not registered
    UnknownSession,
}

/// Registry for tracking sessions and their room.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    /// Session ID → session info
    sessions: HashMap<u64, SessionInfo>,
    /// Room ID → bound session IDs
    room_sessions: HashMap<String, HashSet<u64>>,
}

impl ConnectionRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new session.
    ///
    /// Returns `false` if the session already exists.
    pub fn register_session(&mut self, session_id: u64) -> bool {
        if self.sessions.contains_key(&session_id) {
            return false;
        }
        self.sessions.insert(session_id, SessionInfo::default());
        true
    }

    /// Unregister a session and drop its room binding.
    ///
    /// Returns the session info if it existed.
    pub fn unregister_session(&mut self, session_id: u64) -> Option<SessionInfo> {
        let info = self.sessions.remove(&session_id)?;
        if let Some(room_id) = &info.room_id {
            self.forget(room_id, session_id);
        }
        Some(info)
    }

    /// Check if a session is registered.
    pub fn has_session(&self, session_id: u64) -> bool {
        self.sessions.contains_key(&session_id)
    }

    /// Number of registered sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Room a session is bound to.
    pub fn room_of(&self, session_id: u64) -> Option<&str> {
        self.sessions.get(&session_id)?.room_id.as_deref()
    }

    /// Sessions bound to a room.
    pub fn sessions_in_room(&self, room_id: &str) -> impl Iterator<Item = u64> + '_ {
        self.room_sessions.get(room_id).into_iter().flat_map(|sessions| sessions.iter().copied())
    }

    /// Bind a session to a room unless it is already playing elsewhere.
    pub fn bind_room(&mut self, session_id: u64, room_id: &str) -> BindResult {
        let Some(info) = self.sessions.get_mut(&session_id) else {
            return BindResult::UnknownSession;
        };

        match info.room_id.as_deref() {
            Some(current) if current == room_id => BindResult::AlreadyBound,
            Some(current) => BindResult::Conflict(current.to_string()),
            None => {
                info.room_id = Some(room_id.to_string());
                self.room_sessions.entry(room_id.to_string()).or_default().insert(session_id);
                BindResult::Bound
            },
        }
    }

    /// Release a session's binding if it points at `room_id`.
    ///
    /// Returns `true` if a binding was removed.
    pub fn unbind_room(&mut self, session_id: u64, room_id: &str) -> bool {
        let Some(info) = self.sessions.get_mut(&session_id) else {
            return false;
        };
        if info.room_id.as_deref() != Some(room_id) {
            return false;
        }

        info.room_id = None;
        self.forget(room_id, session_id);
        true
    }

    /// Release a session's binding, whatever room it points at.
    ///
    /// Returns the room the session was bound to.
    pub fn release_room(&mut self, session_id: u64) -> Option<String> {
        let room_id = self.sessions.get_mut(&session_id)?.room_id.take()?;
        self.forget(&room_id, session_id);
        Some(room_id)
    }

    /// Release every session bound to `room_id`.
    ///
    /// Returns the sessions that were bound.
    pub fn detach_room(&mut self, room_id: &str) -> Vec<u64> {
        let sessions: Vec<u64> =
            self.room_sessions.remove(room_id).map(|s| s.into_iter().collect()).unwrap_or_default();

        for session_id in &sessions {
            if let Some(info) = self.sessions.get_mut(session_id) {
                info.room_id = None;
            }
        }

        sessions
    }

    fn forget(&mut self, room_id: &str, session_id: u64) {
        if let Some(sessions) = self.room_sessions.get_mut(room_id) {
            sessions.remove(&session_id);
            if sessions.is_empty() {
                self.room_sessions.remove(room_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_unregister() {
        let mut registry = ConnectionRegistry::new();

        assert!(registry.register_session(1));
        assert!(!registry.register_session(1));
        assert!(registry.has_session(1));
        assert_eq!(registry.session_count(), 1);

        assert_eq!(registry.unregister_session(1), Some(SessionInfo::default()));
        assert!(!registry.has_session(1));
        assert_eq!(registry.unregister_session(1), None);
    }

    #[test]
    fn one_room_per_session() {
        let mut registry = ConnectionRegistry::new();
        registry.register_session(1);

        assert_eq!(registry.bind_room(1, "a"), BindResult::Bound);
        assert_eq!(registry.bind_room(1, "a"), BindResult::AlreadyBound);
        assert_eq!(registry.bind_room(1, "b"), BindResult::Conflict("a".to_string()));
        assert_eq!(registry.bind_room(2, "a"), BindResult::UnknownSession);
        assert_eq!(registry.room_of(1), Some("a"));
    }

    #[test]
    fn unbind_only_matching_room() {
        let mut registry = ConnectionRegistry::new();
        registry.register_session(1);
        registry.bind_room(1, "a");

        assert!(!registry.unbind_room(1, "b"));
        assert!(registry.unbind_room(1, "a"));
        assert_eq!(registry.room_of(1), None);
        assert_eq!(registry.sessions_in_room("a").count(), 0);
        assert_eq!(registry.bind_room(1, "b"), BindResult::Bound);
    }

    #[test]
    fn release_room_returns_previous_binding() {
        let mut registry = ConnectionRegistry::new();
        registry.register_session(1);
        registry.bind_room(1, "a");

        assert_eq!(registry.release_room(1), Some("a".to_string()));
        assert_eq!(registry.release_room(1), None);
        assert_eq!(registry.release_room(9), None);
        assert_eq!(registry.sessions_in_room("a").count(), 0);
    }

    #[test]
    fn unregister_cleans_room_index() {
        let mut registry = ConnectionRegistry::new();
        registry.register_session(1);
        registry.register_session(2);
        registry.bind_room(1, "a");
        registry.bind_room(2, "a");

        registry.unregister_session(1);

        let remaining: Vec<u64> = registry.sessions_in_room("a").collect();
        assert_eq!(remaining, vec![2]);
    }

    #[test]
    fn detach_room_frees_all_sessions() {
        let mut registry = ConnectionRegistry::new();
        registry.register_session(1);
        registry.register_session(2);
        registry.bind_room(1, "a");
        registry.bind_room(2, "a");

        let mut detached = registry.detach_room("a");
        detached.sort_unstable();

        assert_eq!(detached, vec![1, 2]);
        assert_eq!(registry.room_of(1), None);
        assert_eq!(registry.room_of(2), None);
        assert!(registry.detach_room("a").is_empty());
    }
}
