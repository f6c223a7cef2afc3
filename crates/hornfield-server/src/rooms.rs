//! Room registry.
//!
//! Maps room ids to matches. Rooms are created lazily on first join; moves
//! against an unknown room never create one.
//!
//! # Locking
//!
//! The map has its own mutex, held for lookup, creation, eviction and the
//! seating step of a join. Each match has its own mutex, so moves in
//! different rooms never contend. Lock order is map, then match, then the
//! connection registry: code holding a match lock never takes the map lock.

use std::{
    collections::HashMap,
    ops::Sub,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use hornfield_core::{Match, ParticipantId, Phase};
use hornfield_proto::payloads::{game::MatchEnded, room::validate_room_id};

/// Shared handle to one match.
pub type SharedMatch<I> = Arc<Mutex<Match<I>>>;

/// Errors from registry operations
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// Room id is empty or too long
    #[error("invalid room id: {0}")]
    InvalidRoomId(String),
}

/// How long finished and idle rooms are kept.
///
/// `None` disables a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Drop ended rooms this long after they ended
    pub ended_ttl: Option<Duration>,
    /// Drop rooms with no join or applied move for this long
    pub idle_ttl: Option<Duration>,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self { ended_ttl: Some(Duration::from_secs(300)), idle_ttl: Some(Duration::from_secs(3600)) }
    }
}

impl RetentionPolicy {
    /// Keep every room forever.
    pub const fn disabled() -> Self {
        Self { ended_ttl: None, idle_ttl: None }
    }

    /// Build from CLI seconds, where `0` disables the rule.
    pub fn from_secs(ended_ttl_secs: u64, idle_ttl_secs: u64) -> Self {
        let ttl = |secs| (secs > 0).then(|| Duration::from_secs(secs));
        Self { ended_ttl: ttl(ended_ttl_secs), idle_ttl: ttl(idle_ttl_secs) }
    }
}

/// A room removed by [`RoomRegistry::evict_expired`].
#[derive(Debug, Clone)]
pub struct Eviction {
    /// Removed room
    pub room_id: String,
    /// Participants that were seated
    pub seats: Vec<ParticipantId>,
    /// Set when a running match was abandoned by the idle rule
    pub abandoned: Option<MatchEnded>,
}

/// Lock a mutex, recovering the data if a previous holder panicked.
///
/// Match state is consistent before any step that can panic, so the guarded
/// value is still usable.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owned table of rooms.
///
/// Generic over `I` (Instant type) to support virtual time in tests.
#[derive(Debug)]
pub struct RoomRegistry<I> {
    rooms: Mutex<HashMap<String, SharedMatch<I>>>,
}

impl<I> Default for RoomRegistry<I> {
    fn default() -> Self {
        Self { rooms: Mutex::new(HashMap::new()) }
    }
}

impl<I> RoomRegistry<I>
where
    I: Copy + Ord + Sub<Output = Duration>,
{
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Existing match for `room_id`, or a fresh one stored atomically.
    ///
    /// Concurrent calls for the same unseen id return the same match.
    ///
    /// # Errors
    ///
    /// - `RoomError::InvalidRoomId` if the id is empty or too long
    pub fn get_or_create(&self, room_id: &str, now: I) -> Result<SharedMatch<I>, RoomError> {
        validate_room_id(room_id).map_err(|e| RoomError::InvalidRoomId(e.to_string()))?;

        let mut rooms = lock(&self.rooms);
        Ok(Arc::clone(Self::entry(&mut rooms, room_id, now)))
    }

    /// Run `f` on the match for `room_id`, creating the room if needed.
    ///
    /// The map lock is held until `f` returns, so the room cannot be evicted
    /// between lookup and `f`. Keep `f` short.
    ///
    /// # Errors
    ///
    /// - `RoomError::InvalidRoomId` if the id is empty or too long
    pub fn with_room<T>(&self, room_id: &str, now: I, f: impl FnOnce(&mut Match<I>) -> T) -> Result<T, RoomError> {
        validate_room_id(room_id).map_err(|e| RoomError::InvalidRoomId(e.to_string()))?;

        let mut rooms = lock(&self.rooms);
        let room = Self::entry(&mut rooms, room_id, now);
        let mut game = lock(room);
        Ok(f(&mut game))
    }

    fn entry<'a>(rooms: &'a mut HashMap<String, SharedMatch<I>>, room_id: &str, now: I) -> &'a SharedMatch<I> {
        rooms.entry(room_id.to_string()).or_insert_with(|| Arc::new(Mutex::new(Match::new(room_id, now))))
    }

    /// Match for `room_id` without creating it.
    pub fn lookup(&self, room_id: &str) -> Option<SharedMatch<I>> {
        lock(&self.rooms).get(room_id).cloned()
    }

    /// Number of live rooms.
    pub fn len(&self) -> usize {
        lock(&self.rooms).len()
    }

    /// Whether no rooms exist.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove rooms that outlived `policy`.
    ///
    /// An ended room goes after `ended_ttl`. Any other room goes after
    /// `idle_ttl` without activity; a running one is abandoned first so its
    /// seats can be told.
    pub fn evict_expired(&self, now: I, policy: &RetentionPolicy) -> Vec<Eviction> {
        if policy.ended_ttl.is_none() && policy.idle_ttl.is_none() {
            return Vec::new();
        }

        let mut rooms = lock(&self.rooms);
        let mut evicted = Vec::new();

        rooms.retain(|room_id, room| {
            let mut game = lock(room);

            let expired = match (game.phase(), game.ended_at()) {
                (Phase::Ended { .. }, Some(ended_at)) => {
                    policy.ended_ttl.is_some_and(|ttl| elapsed(now, ended_at) >= ttl)
                },
                _ => policy.idle_ttl.is_some_and(|ttl| elapsed(now, game.last_activity()) >= ttl),
            };

            if expired {
                let abandoned = game.abandon(now);
                evicted.push(Eviction { room_id: room_id.clone(), seats: game.seats().to_vec(), abandoned });
            }

            !expired
        });

        evicted
    }
}

fn elapsed<I: Copy + Ord + Sub<Output = Duration>>(now: I, since: I) -> Duration {
    if now > since { now - since } else { Duration::ZERO }
}

#[cfg(test)]
mod tests {
    use std::{thread, time::Instant};

    use hornfield_core::{MovePolicy, MoveOutcome};
    use hornfield_proto::Square;

    use super::*;

    fn sq(row: u8, col: u8) -> Square {
        Square::new(row, col).unwrap()
    }

    #[test]
    fn get_or_create_returns_same_match() {
        let registry = RoomRegistry::new();
        let now = Instant::now();

        let a = registry.get_or_create("r1", now).unwrap();
        let b = registry.get_or_create("r1", now).unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn eviction_waits_for_with_room() {
        let registry = Arc::new(RoomRegistry::new());
        let start = Instant::now();
        let policy = RetentionPolicy { ended_ttl: None, idle_ttl: Some(Duration::ZERO) };

        let evictor = registry
            .with_room("r1", start, |game| {
                game.join(1, start);

                let registry = Arc::clone(&registry);
                let evictor = thread::spawn(move || registry.evict_expired(start, &policy));
                thread::sleep(Duration::from_millis(20));
                assert!(!evictor.is_finished(), "eviction must wait for the seating step");
                evictor
            })
            .unwrap();

        // The seat taken under the map lock is in the room that got evicted
        let evicted = evictor.join().unwrap();
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].seats, vec![1]);
        assert!(registry.lookup("r1").is_none());
    }

    #[test]
    fn with_room_mutates_the_stored_match() {
        let registry = RoomRegistry::new();
        let now = Instant::now();

        let seat = registry.with_room("r1", now, |game| game.join(7, now)).unwrap();
        assert!(matches!(seat, hornfield_core::SeatResult::AssignedSeat { .. }));

        let room = registry.lookup("r1").unwrap();
        assert_eq!(lock(&room).seats(), &[7]);
        assert!(matches!(registry.with_room("", now, |_| ()), Err(RoomError::InvalidRoomId(_))));
    }

    #[test]
    fn lookup_never_creates() {
        let registry: RoomRegistry<Instant> = RoomRegistry::new();

        assert!(registry.lookup("r1").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn invalid_room_ids_are_refused() {
        let registry = RoomRegistry::new();
        let now = Instant::now();

        assert!(matches!(registry.get_or_create("", now), Err(RoomError::InvalidRoomId(_))));
        assert!(matches!(registry.get_or_create(&"x".repeat(65), now), Err(RoomError::InvalidRoomId(_))));
        assert!(registry.get_or_create(&"x".repeat(64), now).is_ok());
    }

    #[test]
    fn ended_rooms_expire_after_ttl() {
        let registry = RoomRegistry::new();
        let start = Instant::now();
        let policy = RetentionPolicy { ended_ttl: Some(Duration::from_secs(10)), idle_ttl: None };

        let room = registry.get_or_create("r1", start).unwrap();
        {
            let mut game = lock(&room);
            game.join(1, start);
            game.join(2, start);
            game.disconnect(1, start);
        }

        assert!(registry.evict_expired(start + Duration::from_secs(9), &policy).is_empty());

        let evicted = registry.evict_expired(start + Duration::from_secs(10), &policy);
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].room_id, "r1");
        assert!(evicted[0].abandoned.is_none());
        assert!(registry.lookup("r1").is_none());
    }

    #[test]
    fn idle_running_room_is_abandoned() {
        let registry = RoomRegistry::new();
        let start = Instant::now();
        let policy = RetentionPolicy { ended_ttl: None, idle_ttl: Some(Duration::from_secs(60)) };

        let room = registry.get_or_create("r1", start).unwrap();
        {
            let mut game = lock(&room);
            game.join(1, start);
            game.join(2, start);
            let later = start + Duration::from_secs(30);
            let outcome = game.apply_move(1, sq(0, 2), sq(2, 2), MovePolicy::Geometry, later);
            assert!(matches!(outcome, MoveOutcome::Applied(_)));
        }

        // Activity at +30s keeps it alive until +90s
        assert!(registry.evict_expired(start + Duration::from_secs(80), &policy).is_empty());

        let evicted = registry.evict_expired(start + Duration::from_secs(90), &policy);
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].seats, vec![1, 2]);
        let ended = evicted[0].abandoned.as_ref().unwrap();
        assert_eq!(ended.message, "Match abandoned");
        assert_eq!(ended.winner, None);
    }

    #[test]
    fn disabled_policy_keeps_everything() {
        let registry = RoomRegistry::new();
        let start = Instant::now();
        registry.get_or_create("r1", start).unwrap();

        let evicted = registry.evict_expired(start + Duration::from_secs(1_000_000), &RetentionPolicy::disabled());

        assert!(evicted.is_empty());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn retention_from_secs_treats_zero_as_disabled() {
        let policy = RetentionPolicy::from_secs(0, 30);

        assert_eq!(policy.ended_ttl, None);
        assert_eq!(policy.idle_ttl, Some(Duration::from_secs(30)));
        assert_eq!(RetentionPolicy::default().ended_ttl, Some(Duration::from_secs(300)));
    }
}
