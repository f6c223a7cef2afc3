//! Server driver.
//!
//! Ties together the room registry (matches), the connection registry
//! (session-to-room binding) and frame decoding. Pure logic: events in,
//! actions out. The runtime owns sockets and executes the actions.
//!
//! The driver takes `&self` and locks internally, so connection tasks call it
//! concurrently. Moves in different rooms never contend; moves in one room
//! serialize on that match's mutex.

use hornfield_core::{
    DisconnectOutcome, MoveOutcome, MovePolicy, ParticipantId, Phase, SeatResult, env::Environment,
};
use hornfield_proto::{
    Frame, FrameHeader, Payload, ProtocolError,
    payloads::{
        ErrorPayload,
        game::{MatchEnded, MoveRejected, RequestMove},
        room::{RoomFull, SeatAssigned},
    },
};

use crate::{
    registry::{BindResult, ConnectionRegistry},
    rooms::{RetentionPolicy, RoomError, RoomRegistry, lock},
    server_error::ServerError,
};

/// Driver configuration
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Maximum concurrent connections
    pub max_connections: usize,
    /// How much move validation to perform
    pub move_policy: MovePolicy,
    /// When finished and idle rooms are dropped
    pub retention: RetentionPolicy,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            max_connections: 10_000,
            move_policy: MovePolicy::default(),
            retention: RetentionPolicy::default(),
        }
    }
}

/// Events that the server driver processes.
///
/// These are produced by the runtime.
#[derive(Debug, Clone)]
pub enum ServerEvent {
    /// A new connection was accepted
    ConnectionAccepted {
        /// Unique connection ID assigned by the runtime
        session_id: u64,
    },

    /// A frame was received from a connection
    FrameReceived {
        /// Connection that sent the frame
        session_id: u64,
        /// The received frame
        frame: Frame,
    },

    /// A connection was closed (by peer or error)
    ConnectionClosed {
        /// Connection that was closed
        session_id: u64,
        /// Reason for closure
        reason: String,
    },

    /// Periodic tick for room retention
    Tick,
}

/// Actions that the server driver produces.
///
/// Executed in order by the runtime. Frames for one session must be written
/// in the order their actions appear.
///
/// Generic over `I` (Instant type) to support virtual time in tests.
#[derive(Debug, Clone)]
pub enum ServerAction<I> {
    /// Send a frame to a specific session
    SendToSession {
        /// Target session ID
        session_id: u64,
        /// Frame to send
        frame: Frame,
    },

    /// Send one frame to the seated sessions of a room
    BroadcastToRoom {
        /// Room the frame belongs to
        room_id: String,
        /// Sessions seated when the event was produced
        sessions: Vec<u64>,
        /// Frame to broadcast
        frame: Frame,
    },

    /// Close a connection
    CloseConnection {
        /// Session to close
        session_id: u64,
        /// Reason for closure
        reason: String,
    },

    /// Log a message (for debugging/monitoring)
    Log {
        /// Log level
        level: LogLevel,
        /// Message to log
        message: String,
        /// When the event occurred
        timestamp: I,
    },
}

/// Log levels for server actions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug information
    Debug,
    /// Informational message
    Info,
    /// Warning
    Warn,
    /// Error
    Error,
}

/// Action-based server driver.
pub struct ServerDriver<E: Environment> {
    /// Session/room binding
    connections: std::sync::Mutex<ConnectionRegistry>,
    /// Matches by room id
    rooms: RoomRegistry<E::Instant>,
    /// Environment (time, RNG)
    env: E,
    /// Driver configuration
    config: DriverConfig,
}

type Actions<I> = Vec<ServerAction<I>>;

impl<E: Environment> ServerDriver<E> {
    /// Create a new server driver.
    pub fn new(env: E, config: DriverConfig) -> Self {
        Self {
            connections: std::sync::Mutex::new(ConnectionRegistry::new()),
            rooms: RoomRegistry::new(),
            env,
            config,
        }
    }

    /// Driver configuration.
    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Room table.
    pub fn rooms(&self) -> &RoomRegistry<E::Instant> {
        &self.rooms
    }

    /// Number of accepted, not yet closed connections.
    pub fn connection_count(&self) -> usize {
        lock(&self.connections).session_count()
    }

    /// Room a session is currently playing in.
    pub fn room_of(&self, session_id: u64) -> Option<String> {
        lock(&self.connections).room_of(session_id).map(str::to_string)
    }

    /// Process a server event and return actions to execute.
    ///
    /// This is the main entry point for the server driver.
    pub fn process_event(&self, event: ServerEvent) -> Result<Actions<E::Instant>, ServerError> {
        match event {
            ServerEvent::ConnectionAccepted { session_id } => {
                self.handle_connection_accepted(session_id)
            },
            ServerEvent::FrameReceived { session_id, frame } => {
                self.handle_frame_received(session_id, &frame)
            },
            ServerEvent::ConnectionClosed { session_id, reason } => {
                Ok(self.handle_connection_closed(session_id, &reason))
            },
            ServerEvent::Tick => Ok(self.handle_tick()),
        }
    }

    fn handle_connection_accepted(&self, session_id: u64) -> Result<Actions<E::Instant>, ServerError> {
        let now = self.env.now();
        let mut connections = lock(&self.connections);

        if connections.session_count() >= self.config.max_connections {
            return Ok(vec![ServerAction::CloseConnection {
                session_id,
                reason: "max connections exceeded".to_string(),
            }]);
        }

        if !connections.register_session(session_id) {
            return Err(ServerError::SessionAlreadyExists(session_id));
        }

        Ok(vec![self.log(LogLevel::Debug, format!("session {session_id} accepted"), now)])
    }

    fn handle_frame_received(&self, session_id: u64, frame: &Frame) -> Result<Actions<E::Instant>, ServerError> {
        if !lock(&self.connections).has_session(session_id) {
            return Err(ServerError::SessionNotFound(session_id));
        }

        let request_id = frame.header.request_id();

        // Server-to-client opcodes are refused before their payload is read
        if let Some(opcode) = frame.header.opcode_enum().filter(|op| !op.is_client_intent()) {
            return self.error_reply(session_id, request_id, ErrorPayload::unsupported_opcode(opcode.to_u16()));
        }

        let payload = match Payload::from_frame(frame) {
            Ok(payload) => payload,
            Err(ProtocolError::UnknownOpcode(opcode)) => {
                return self.error_reply(session_id, request_id, ErrorPayload::unsupported_opcode(opcode));
            },
            Err(e) => {
                return self.error_reply(session_id, request_id, ErrorPayload::invalid_payload(e.to_string()));
            },
        };

        match payload {
            Payload::JoinRoom(join) => self.handle_join(session_id, request_id, &join.room_id),
            Payload::RequestMove(request) => self.handle_move(session_id, request_id, &request),
            Payload::Ping => {
                Ok(vec![ServerAction::SendToSession { session_id, frame: reply(Payload::Pong, request_id)? }])
            },
            Payload::Leave => {
                let mut actions = self.leave_room(session_id, "left");
                actions.push(ServerAction::CloseConnection { session_id, reason: "client left".to_string() });
                Ok(actions)
            },
            server_only => {
                let opcode = server_only.opcode().to_u16();
                self.error_reply(session_id, request_id, ErrorPayload::unsupported_opcode(opcode))
            },
        }
    }

    fn handle_join(
        &self,
        session_id: u64,
        request_id: u32,
        room_id: &str,
    ) -> Result<Actions<E::Instant>, ServerError> {
        let now = self.env.now();

        // Reserve before seating so one session cannot land in two rooms
        let newly_bound = match lock(&self.connections).bind_room(session_id, room_id) {
            BindResult::Bound => true,
            BindResult::AlreadyBound => false,
            BindResult::Conflict(current) => {
                return self.error_reply(session_id, request_id, ErrorPayload::already_seated(&current));
            },
            BindResult::UnknownSession => return Err(ServerError::SessionNotFound(session_id)),
        };

        // Seat under the map lock so a Tick cannot evict the room in between.
        // The binding is checked again under the match lock: a close or an
        // eviction may have dropped it since it was reserved.
        let admitted = self.rooms.with_room(room_id, now, |game| {
            let rebound = match lock(&self.connections).bind_room(session_id, room_id) {
                BindResult::Bound => true,
                BindResult::AlreadyBound => false,
                BindResult::Conflict(current) => return Err(Some(current)),
                BindResult::UnknownSession => return Err(None),
            };

            let result = game.join(session_id, now);
            let ended = matches!(game.phase(), Phase::Ended { .. });
            Ok((result, game.snapshot(), game.seats().to_vec(), ended, rebound))
        });

        let (result, snapshot, seats, ended, rebound) = match admitted {
            Ok(Ok(joined)) => joined,
            Ok(Err(Some(current))) => {
                return self.error_reply(session_id, request_id, ErrorPayload::already_seated(&current));
            },
            Ok(Err(None)) => return Err(ServerError::SessionNotFound(session_id)),
            Err(RoomError::InvalidRoomId(reason)) => {
                if newly_bound {
                    lock(&self.connections).unbind_room(session_id, room_id);
                }
                return self.error_reply(session_id, request_id, ErrorPayload::invalid_payload(reason));
            },
        };
        let newly_bound = newly_bound || rebound;

        match result {
            SeatResult::AssignedSeat { seat, match_started } => {
                // A finished room holds nobody in place
                if ended && newly_bound {
                    lock(&self.connections).unbind_room(session_id, room_id);
                }

                let assigned = Payload::SeatAssigned(SeatAssigned { room_id: room_id.to_string(), seat });
                let mut actions = vec![
                    ServerAction::SendToSession { session_id, frame: reply(assigned, request_id)? },
                    self.log(LogLevel::Info, format!("session {session_id} seated as {seat} in room {room_id:?}"), now),
                ];

                if match_started {
                    let frame = Payload::MatchStarted(snapshot).to_frame()?;
                    actions.push(ServerAction::BroadcastToRoom { room_id: room_id.to_string(), sessions: seats, frame });
                    actions.push(self.log(LogLevel::Info, format!("match started in room {room_id:?}"), now));
                }

                Ok(actions)
            },
            SeatResult::RoomFull => {
                if newly_bound {
                    lock(&self.connections).unbind_room(session_id, room_id);
                }

                let full = Payload::RoomFull(RoomFull { room_id: room_id.to_string() });
                Ok(vec![
                    ServerAction::SendToSession { session_id, frame: reply(full, request_id)? },
                    self.log(LogLevel::Debug, format!("session {session_id} refused: room {room_id:?} full"), now),
                ])
            },
        }
    }

    fn handle_move(
        &self,
        session_id: u64,
        request_id: u32,
        request: &RequestMove,
    ) -> Result<Actions<E::Instant>, ServerError> {
        let now = self.env.now();
        let room_id = &request.room_id;

        let Some(room) = self.rooms.lookup(room_id) else {
            return Ok(vec![self.log(LogLevel::Debug, format!("move for unknown room {room_id:?} ignored"), now)]);
        };

        let (outcome, seats) = {
            let mut game = lock(&room);
            let outcome = game.apply_move(session_id, request.from, request.to, self.config.move_policy, now);
            (outcome, game.seats().to_vec())
        };

        match outcome {
            MoveOutcome::Applied(snapshot) => {
                let frame = Payload::BoardUpdated(snapshot).to_frame()?;
                Ok(vec![ServerAction::BroadcastToRoom { room_id: room_id.clone(), sessions: seats, frame }])
            },
            MoveOutcome::GameEnded(ended) => {
                let mut actions = self.end_match(room_id, seats, ended, now)?;
                actions.push(self.log(LogLevel::Info, format!("room {room_id:?} won by session {session_id}"), now));
                Ok(actions)
            },
            MoveOutcome::Rejected(violation) => {
                let rejected = Payload::MoveRejected(MoveRejected {
                    room_id: room_id.clone(),
                    reason: violation.to_string(),
                });
                Ok(vec![
                    ServerAction::SendToSession { session_id, frame: reply(rejected, request_id)? },
                    self.log(LogLevel::Debug, format!("session {session_id} move rejected: {}", violation.detail()), now),
                ])
            },
            MoveOutcome::Ignored(reason) => Ok(vec![self.log(
                LogLevel::Debug,
                format!("session {session_id} move in room {room_id:?} ignored: {reason:?}"),
                now,
            )]),
        }
    }

    fn handle_connection_closed(&self, session_id: u64, reason: &str) -> Actions<E::Instant> {
        let now = self.env.now();

        // Unregister first: a join racing this close then finds the session
        // gone and does not seat it
        let Some(info) = lock(&self.connections).unregister_session(session_id) else {
            return Vec::new();
        };

        let mut actions = match info.room_id {
            Some(room_id) => self.vacate_seat(session_id, &room_id, reason),
            None => Vec::new(),
        };
        actions.push(self.log(LogLevel::Debug, format!("session {session_id} closed: {reason}"), now));
        actions
    }

    /// Detach a session from its room, forfeiting a running match.
    fn leave_room(&self, session_id: u64, reason: &str) -> Actions<E::Instant> {
        let room_id = lock(&self.connections).release_room(session_id);

        match room_id {
            Some(room_id) => self.vacate_seat(session_id, &room_id, reason),
            None => Vec::new(),
        }
    }

    /// Give up the seat of a session whose binding is already dropped.
    fn vacate_seat(&self, session_id: u64, room_id: &str, reason: &str) -> Actions<E::Instant> {
        let now = self.env.now();

        let Some(room) = self.rooms.lookup(room_id) else {
            return Vec::new();
        };

        let (outcome, seats) = {
            let mut game = lock(&room);
            let outcome = game.disconnect(session_id, now);
            (outcome, game.seats().to_vec())
        };

        let mut actions = Vec::new();
        match outcome {
            DisconnectOutcome::Forfeited { leaver, ended } => {
                let remaining: Vec<u64> = seats.into_iter().filter(|s| *s != session_id).collect();
                match self.end_match(room_id, remaining, ended, now) {
                    Ok(ended_actions) => actions.extend(ended_actions),
                    Err(e) => actions.push(self.log(LogLevel::Error, format!("failed to encode result: {e}"), now)),
                }
                actions.push(self.log(LogLevel::Info, format!("{leaver} forfeited room {room_id:?} ({reason})"), now));
            },
            DisconnectOutcome::Vacated(seat) => {
                actions.push(self.log(LogLevel::Debug, format!("{seat} vacated room {room_id:?}"), now));
            },
            DisconnectOutcome::AlreadyEnded | DisconnectOutcome::NotSeated => {},
        }

        actions
    }

    /// Tell `sessions` the match is over and free them for another room.
    fn end_match(
        &self,
        room_id: &str,
        sessions: Vec<ParticipantId>,
        ended: MatchEnded,
        now: E::Instant,
    ) -> Result<Actions<E::Instant>, ServerError> {
        {
            let mut connections = lock(&self.connections);
            for session_id in &sessions {
                connections.unbind_room(*session_id, room_id);
            }
        }

        let message = ended.message.clone();
        let frame = Payload::MatchEnded(ended).to_frame()?;
        Ok(vec![
            ServerAction::BroadcastToRoom { room_id: room_id.to_string(), sessions, frame },
            self.log(LogLevel::Debug, format!("room {room_id:?} ended: {message}"), now),
        ])
    }

    fn handle_tick(&self) -> Actions<E::Instant> {
        let now = self.env.now();
        let mut actions = Vec::new();

        for eviction in self.rooms.evict_expired(now, &self.config.retention) {
            let room_id = eviction.room_id;
            let connected: Vec<u64> = {
                let mut connections = lock(&self.connections);
                connections.detach_room(&room_id);
                eviction.seats.into_iter().filter(|s| connections.has_session(*s)).collect()
            };

            if let Some(ended) = eviction.abandoned {
                match Payload::MatchEnded(ended).to_frame() {
                    Ok(frame) => actions.push(ServerAction::BroadcastToRoom {
                        room_id: room_id.clone(),
                        sessions: connected,
                        frame,
                    }),
                    Err(e) => actions.push(self.log(LogLevel::Error, format!("failed to encode result: {e}"), now)),
                }
            }

            actions.push(self.log(LogLevel::Info, format!("room {room_id:?} evicted"), now));
        }

        actions
    }

    fn error_reply(
        &self,
        session_id: u64,
        request_id: u32,
        error: ErrorPayload,
    ) -> Result<Actions<E::Instant>, ServerError> {
        let message = format!("session {session_id} request failed: {}", error.message);
        let frame = reply(Payload::Error(error), request_id)?;

        Ok(vec![ServerAction::SendToSession { session_id, frame }, self.log(LogLevel::Warn, message, self.env.now())])
    }

    fn log(&self, level: LogLevel, message: String, timestamp: E::Instant) -> ServerAction<E::Instant> {
        ServerAction::Log { level, message, timestamp }
    }
}

/// Frame for a direct reply, echoing the client's request id.
fn reply(payload: Payload, request_id: u32) -> Result<Frame, ServerError> {
    let mut header = FrameHeader::new(payload.opcode());
    header.set_request_id(request_id);
    Ok(payload.into_frame(header)?)
}

#[cfg(test)]
mod tests {
    use hornfield_proto::Opcode;

    use super::*;

    #[test]
    fn reply_echoes_request_id() {
        let frame = reply(Payload::Pong, 77).unwrap();

        assert_eq!(frame.header.request_id(), 77);
        assert_eq!(frame.header.opcode_enum(), Some(Opcode::Pong));
    }

    #[test]
    fn default_config() {
        let config = DriverConfig::default();

        assert_eq!(config.max_connections, 10_000);
        assert_eq!(config.move_policy, MovePolicy::Geometry);
    }
}

