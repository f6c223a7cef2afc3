//! Hornfield match server.
//!
//! Hosts two-player matches on a 5×5 board. Clients join rooms by name, get
//! a seat, and submit moves; the server validates every move against the
//! authoritative board and pushes the result to both seats.
//!
//! # Architecture
//!
//! [`ServerDriver`] is Sans-IO: it turns [`ServerEvent`]s into
//! [`ServerAction`]s and never touches a socket. [`Server`] is the runtime
//! glue that accepts QUIC connections, feeds frames to the driver and
//! executes the resulting actions.
//!
//! # Components
//!
//! - [`ServerDriver`]: Action-based orchestrator (pure logic, no I/O)
//! - [`RoomRegistry`]: Room table with lazy creation and retention
//! - [`ConnectionRegistry`]: Session-to-room binding
//! - [`Server`]: Production runtime that executes driver actions
//! - [`QuinnTransport`]: QUIC transport via Quinn
//! - [`SystemEnv`]: Production environment (real time, OS RNG)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod driver;
mod error;
mod registry;
mod rooms;
mod server_error;
mod system_env;
mod transport;

use std::{collections::HashMap, future::Future, path::PathBuf, sync::Arc, time::Duration};

use bytes::Bytes;
pub use driver::{DriverConfig, LogLevel, ServerAction, ServerDriver, ServerEvent};
pub use error::ServerError;
use hornfield_core::env::Environment;
use hornfield_proto::{Frame, FrameHeader, Payload, payloads::ErrorPayload};
pub use registry::{BindResult, ConnectionRegistry, SessionInfo};
pub use rooms::{Eviction, RetentionPolicy, RoomError, RoomRegistry, SharedMatch};
pub use server_error::ServerError as DriverError;
pub use system_env::SystemEnv;
use tokio::sync::{RwLock, mpsc};
pub use transport::{QuinnConnection, QuinnTransport};

type Driver = ServerDriver<SystemEnv>;

/// Per-session handles shared by connection tasks and the ticker.
///
/// Every session has one outbound queue drained by a single writer task onto
/// the session's unidirectional stream, so frames for a session are written
/// in the order they were queued.
#[derive(Default)]
struct SharedState {
    /// Session ID → QUIC connection (for closing)
    connections: RwLock<HashMap<u64, QuinnConnection>>,
    /// Session ID → outbound frame queue
    outbound: RwLock<HashMap<u64, mpsc::UnboundedSender<Bytes>>>,
}

/// Everything [`Server::bind`] needs.
#[derive(Debug, Clone)]
pub struct ServerRuntimeConfig {
    /// UDP address, e.g. `0.0.0.0:4433`
    pub bind_address: String,
    /// PEM certificate chain
    pub cert_path: Option<PathBuf>,
    /// PEM private key
    pub key_path: Option<PathBuf>,
    /// Interval between retention sweeps
    pub tick_interval: Duration,
    /// Driver configuration (limits, move policy, retention)
    pub driver: DriverConfig,
}

impl Default for ServerRuntimeConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:4433".to_string(),
            cert_path: None,
            key_path: None,
            tick_interval: Duration::from_secs(1),
            driver: DriverConfig::default(),
        }
    }
}

/// Production Hornfield server.
///
/// Runs a [`ServerDriver`] behind a QUIC endpoint on the system clock.
pub struct Server {
    driver: Arc<Driver>,
    transport: QuinnTransport,
    env: SystemEnv,
    tick_interval: Duration,
}

impl Server {
    /// Bind the endpoint and build the driver.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn bind(config: ServerRuntimeConfig) -> Result<Self, ServerError> {
        if config.tick_interval.is_zero() {
            return Err(ServerError::Config("tick interval must be positive".to_string()));
        }

        let env = SystemEnv::new();
        let driver = Arc::new(ServerDriver::new(env.clone(), config.driver));
        let transport = QuinnTransport::bind(
            &config.bind_address,
            config.cert_path.as_deref(),
            config.key_path.as_deref(),
        )?;

        Ok(Self { driver, transport, env, tick_interval: config.tick_interval })
    }

    /// Bound UDP address.
    pub fn local_addr(&self) -> Result<std::net::SocketAddr, ServerError> {
        self.transport.local_addr()
    }

    /// Run the server until the process exits.
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_until(std::future::pending()).await
    }

    /// Run the server until `shutdown` completes.
    ///
    /// On shutdown the endpoint is closed, which closes every connection.
    pub async fn run_until(self, shutdown: impl Future<Output = ()>) -> Result<(), ServerError> {
        tracing::info!("Accepting players on {}", self.transport.local_addr()?);

        let shared = Arc::new(SharedState::default());
        let ticker = tokio::spawn(run_ticker(
            Arc::clone(&self.driver),
            Arc::clone(&shared),
            self.env.clone(),
            self.tick_interval,
        ));

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                () = &mut shutdown => break,
                accepted = self.transport.accept() => match accepted {
                    Ok(conn) => {
                        let driver = Arc::clone(&self.driver);
                        let shared = Arc::clone(&shared);
                        let env = self.env.clone();

                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(conn, driver, shared, env).await {
                                tracing::error!("Connection task failed: {}", e);
                            }
                        });
                    },
                    Err(e) => {
                        tracing::warn!("Incoming connection dropped: {}", e);
                    },
                },
            }
        }

        tracing::info!("Server shutting down");
        ticker.abort();
        self.transport.close();

        Ok(())
    }
}

/// Drive retention sweeps at a fixed interval.
async fn run_ticker(driver: Arc<Driver>, shared: Arc<SharedState>, env: SystemEnv, interval: Duration) {
    loop {
        env.sleep(interval).await;

        match driver.process_event(ServerEvent::Tick) {
            Ok(actions) => execute_actions(actions, &shared).await,
            Err(e) => tracing::error!("Tick failed: {}", e),
        }
    }
}

/// Serve one client connection until it closes.
async fn handle_connection(
    conn: QuinnConnection,
    driver: Arc<Driver>,
    shared: Arc<SharedState>,
    env: SystemEnv,
) -> Result<(), ServerError> {
    let session_id = env.random_u64();

    tracing::debug!("New connection {} from {}", session_id, conn.remote_addr());

    let mut outbound_stream = conn.open_uni().await?;
    let (tx, mut rx) = mpsc::unbounded_channel::<Bytes>();

    let writer = tokio::spawn(async move {
        while let Some(bytes) = rx.recv().await {
            if let Err(e) = outbound_stream.write_all(&bytes).await {
                tracing::debug!("Outbound write failed for {}: {}", session_id, e);
                break;
            }
        }
        let _ = outbound_stream.finish();
    });

    shared.connections.write().await.insert(session_id, conn.clone());
    shared.outbound.write().await.insert(session_id, tx);

    let accepted = driver.process_event(ServerEvent::ConnectionAccepted { session_id });
    match accepted {
        Ok(actions) => execute_actions(actions, &shared).await,
        Err(e) => {
            tracing::error!("Failed to register session {}: {}", session_id, e);
            conn.close(0u32.into(), b"internal error");
        },
    }

    let reason = loop {
        match conn.accept_bi().await {
            Ok((send, recv)) => {
                let driver = Arc::clone(&driver);
                let shared = Arc::clone(&shared);

                tokio::spawn(async move {
                    if let Err(e) = handle_stream(session_id, send, recv, driver, &shared).await {
                        tracing::debug!("Stream of {} failed: {}", session_id, e);
                    }
                });
            },
            Err(e) => {
                tracing::debug!("Connection {} closed: {}", session_id, e);
                break e.to_string();
            },
        }
    };

    let actions = driver.process_event(ServerEvent::ConnectionClosed { session_id, reason })?;
    execute_actions(actions, &shared).await;

    shared.connections.write().await.remove(&session_id);
    // Dropping the sender lets the writer drain and finish the stream
    shared.outbound.write().await.remove(&session_id);
    writer
        .await
        .map_err(|e| ServerError::Internal(format!("outbound writer for {session_id} failed: {e}")))?;

    Ok(())
}

/// Handle a single client-opened stream.
///
/// Reads frames until the client finishes the stream. A frame whose payload
/// fails to decode is answered with an `Error` frame and reading continues;
/// a bad header loses framing, so the stream is dropped after the reply.
async fn handle_stream(
    session_id: u64,
    send: quinn::SendStream,
    mut recv: quinn::RecvStream,
    driver: Arc<Driver>,
    shared: &SharedState,
) -> Result<(), ServerError> {
    drop(send); // replies go through the session's outbound stream

    let mut header_buf = [0u8; FrameHeader::SIZE];

    loop {
        match recv.read_exact(&mut header_buf).await {
            Ok(()) => {},
            Err(quinn::ReadExactError::FinishedEarly(0)) => break,
            Err(e) => {
                tracing::debug!("Stream from {} ended: {}", session_id, e);
                break;
            },
        }

        let header = match FrameHeader::from_bytes(&header_buf) {
            Ok(header) => *header,
            Err(e) => {
                tracing::warn!("Invalid frame header from {}: {}", session_id, e);
                let error = Payload::Error(ErrorPayload::invalid_payload(e.to_string())).to_frame()?;
                send_frame(shared, session_id, &error).await;
                break;
            },
        };

        let mut payload = vec![0u8; header.payload_size() as usize];
        if let Err(e) = recv.read_exact(&mut payload).await {
            tracing::debug!("Truncated frame from {}: {}", session_id, e);
            break;
        }

        let frame = Frame::new(header, payload);
        match driver.process_event(ServerEvent::FrameReceived { session_id, frame }) {
            Ok(actions) => execute_actions(actions, shared).await,
            Err(e) => tracing::warn!("Frame processing error: {}", e),
        }
    }

    Ok(())
}

/// Queue an encoded frame on a session's outbound stream.
async fn send_frame(shared: &SharedState, session_id: u64, frame: &Frame) {
    let bytes = match frame.to_vec() {
        Ok(bytes) => Bytes::from(bytes),
        Err(e) => {
            tracing::error!("Failed to encode frame for {}: {}", session_id, e);
            return;
        },
    };

    let outbound = shared.outbound.read().await;
    match outbound.get(&session_id) {
        Some(tx) => {
            if tx.send(bytes).is_err() {
                tracing::debug!("Outbound queue closed for {}", session_id);
            }
        },
        None => tracing::debug!("Send to unknown session {}", session_id),
    }
}

/// Carry out driver actions in order.
async fn execute_actions(actions: Vec<ServerAction<std::time::Instant>>, shared: &SharedState) {
    for action in actions {
        match action {
            ServerAction::SendToSession { session_id, frame } => {
                send_frame(shared, session_id, &frame).await;
            },

            ServerAction::BroadcastToRoom { room_id, sessions, frame } => {
                let bytes = match frame.to_vec() {
                    Ok(bytes) => Bytes::from(bytes),
                    Err(e) => {
                        tracing::error!("Failed to encode broadcast for room {:?}: {}", room_id, e);
                        continue;
                    },
                };

                let outbound = shared.outbound.read().await;
                for session_id in sessions {
                    if let Some(tx) = outbound.get(&session_id) {
                        if tx.send(bytes.clone()).is_err() {
                            tracing::debug!("Outbound queue closed for {}", session_id);
                        }
                    }
                }
            },

            ServerAction::CloseConnection { session_id, reason } => {
                tracing::info!("Closing connection {}: {}", session_id, reason);
                if let Some(conn) = shared.connections.read().await.get(&session_id) {
                    conn.close(0u32.into(), reason.as_bytes());
                }
            },

            ServerAction::Log { level, message, .. } => match level {
                LogLevel::Debug => tracing::debug!("{}", message),
                LogLevel::Info => tracing::info!("{}", message),
                LogLevel::Warn => tracing::warn!("{}", message),
                LogLevel::Error => tracing::error!("{}", message),
            },
        }
    }
}
