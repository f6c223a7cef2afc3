//! Shared helpers for driver tests.

#![allow(dead_code)]

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use hornfield_core::{MovePolicy, env::Environment};
use hornfield_proto::{
    Frame, FrameHeader, Payload, Square,
    payloads::{game::RequestMove, room::JoinRoom},
};
use hornfield_server::{DriverConfig, RetentionPolicy, ServerAction, ServerDriver, ServerEvent};

/// Test environment with a clock that only moves when told to.
#[derive(Clone)]
pub struct TestEnv {
    base: Instant,
    offset_ms: Arc<AtomicU64>,
}

impl TestEnv {
    pub fn new() -> Self {
        Self { base: Instant::now(), offset_ms: Arc::new(AtomicU64::new(0)) }
    }

    pub fn advance(&self, by: Duration) {
        self.offset_ms.fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }
}

impl Environment for TestEnv {
    type Instant = Instant;

    fn now(&self) -> Self::Instant {
        self.base + Duration::from_millis(self.offset_ms.load(Ordering::SeqCst))
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        async move {
            tokio::time::sleep(duration).await;
        }
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        use rand::RngCore;
        rand::thread_rng().fill_bytes(buffer);
    }
}

pub type Actions = Vec<ServerAction<Instant>>;

pub fn driver_with(config: DriverConfig) -> (ServerDriver<TestEnv>, TestEnv) {
    let env = TestEnv::new();
    (ServerDriver::new(env.clone(), config), env)
}

pub fn driver(policy: MovePolicy) -> ServerDriver<TestEnv> {
    let config = DriverConfig { move_policy: policy, retention: RetentionPolicy::disabled(), ..Default::default() };
    driver_with(config).0
}

pub fn connect(driver: &ServerDriver<TestEnv>, session_id: u64) -> Actions {
    driver.process_event(ServerEvent::ConnectionAccepted { session_id }).unwrap()
}

pub fn close(driver: &ServerDriver<TestEnv>, session_id: u64) -> Actions {
    driver
        .process_event(ServerEvent::ConnectionClosed { session_id, reason: "peer closed".to_string() })
        .unwrap()
}

pub fn send_frame(driver: &ServerDriver<TestEnv>, session_id: u64, frame: Frame) -> Actions {
    driver.process_event(ServerEvent::FrameReceived { session_id, frame }).unwrap()
}

pub fn send(driver: &ServerDriver<TestEnv>, session_id: u64, payload: Payload, request_id: u32) -> Actions {
    let mut header = FrameHeader::new(payload.opcode());
    header.set_request_id(request_id);
    send_frame(driver, session_id, payload.into_frame(header).unwrap())
}

pub fn join(driver: &ServerDriver<TestEnv>, session_id: u64, room_id: &str) -> Actions {
    send(driver, session_id, Payload::JoinRoom(JoinRoom { room_id: room_id.to_string() }), 0)
}

pub fn sq(row: u8, col: u8) -> Square {
    Square::new(row, col).unwrap()
}

pub fn request_move(
    driver: &ServerDriver<TestEnv>,
    session_id: u64,
    room_id: &str,
    from: (u8, u8),
    to: (u8, u8),
) -> Actions {
    let request = RequestMove { room_id: room_id.to_string(), from: sq(from.0, from.1), to: sq(to.0, to.1) };
    send(driver, session_id, Payload::RequestMove(request), 0)
}

/// Frames delivered to `session_id`, in order.
pub fn frames_for(actions: &[ServerAction<Instant>], session_id: u64) -> Vec<Frame> {
    actions
        .iter()
        .filter_map(|action| match action {
            ServerAction::SendToSession { session_id: target, frame } if *target == session_id => {
                Some(frame.clone())
            },
            ServerAction::BroadcastToRoom { sessions, frame, .. } if sessions.contains(&session_id) => {
                Some(frame.clone())
            },
            _ => None,
        })
        .collect()
}

/// Payloads delivered to `session_id`, in order.
pub fn inbox(actions: &[ServerAction<Instant>], session_id: u64) -> Vec<Payload> {
    frames_for(actions, session_id).iter().map(|frame| Payload::from_frame(frame).unwrap()).collect()
}

/// Whether any frame goes to anybody.
pub fn sends_nothing(actions: &[ServerAction<Instant>]) -> bool {
    actions.iter().all(|action| matches!(action, ServerAction::Log { .. }))
}

/// Two connected sessions seated in `room_id`, match started.
pub fn started_match(driver: &ServerDriver<TestEnv>, room_id: &str, p1: u64, p2: u64) {
    connect(driver, p1);
    connect(driver, p2);
    join(driver, p1, room_id);
    join(driver, p2, room_id);
}
