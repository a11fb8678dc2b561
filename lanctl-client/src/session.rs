//! Persistent service session.
//!
//! One session owns one TCP connection. The caller spawns [`read_loop`] as a
//! background task; it decodes inbound frames for the session's lifetime,
//! rebuilds the catalog from each status frame, and publishes immutable
//! snapshots. Commands are written synchronously on the caller's flow and
//! are fire-and-forget: best-effort, at-most-once, no queueing, no retry.
//! The service acknowledges nothing except side-effect handshakes.
//!
//! Any read error is terminal for the session. It surfaces as a
//! [`SessionEvent::Failed`] (or [`SessionEvent::Closed`] on clean EOF) and an
//! `Err` from the read loop; the session never exits the process and never
//! reconnects, leaving restart policy to the caller.
//!
//! [`read_loop`]: ServiceSession::read_loop

use crate::error::SessionError;
use crate::gate::DispatchGate;
use bytes::BytesMut;
use lanctl_protocol::{Catalog, Command, Frame};
use parking_lot::RwLock;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, Mutex};

/// Capacity of the session event channel.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Size of the socket read buffer (8 KiB).
const READ_BUFFER_SIZE: usize = 8 * 1024;

/// Session configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// TCP connect timeout.
    pub connect_timeout: Duration,
}

impl SessionConfig {
    pub fn new() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Events published by the read loop.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A status frame arrived; the catalog was rebuilt and swapped.
    Catalog(Arc<Catalog>),
    /// A handshake frame arrived; the pending side effect completed.
    Handshake { opcode: i32 },
    /// The service closed the connection.
    Closed,
    /// The session failed; no reconnection is attempted.
    Failed { reason: String },
}

/// A persistent connection to a discovered service.
pub struct ServiceSession {
    reader: Mutex<Option<OwnedReadHalf>>,
    writer: Mutex<Option<OwnedWriteHalf>>,
    catalog: RwLock<Arc<Catalog>>,
    events: broadcast::Sender<SessionEvent>,
    gate: DispatchGate,
    connected: AtomicBool,
}

impl ServiceSession {
    /// Opens the persistent connection.
    ///
    /// Unreachable or refused connections return an error and the caller
    /// may retry discovery.
    pub async fn connect(addr: SocketAddr, config: SessionConfig) -> Result<Self, SessionError> {
        tracing::debug!("connecting to {}", addr);
        let stream = tokio::time::timeout(config.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| {
                tracing::debug!("connect timeout");
                SessionError::ConnectTimeout
            })??;
        stream.set_nodelay(true).ok();
        let (read_half, write_half) = stream.into_split();

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        tracing::debug!("connected to {}", addr);

        Ok(Self {
            reader: Mutex::new(Some(read_half)),
            writer: Mutex::new(Some(write_half)),
            catalog: RwLock::new(Arc::new(Catalog::default())),
            events,
            gate: DispatchGate::new(),
            connected: AtomicBool::new(true),
        })
    }

    /// Subscribes to session events. Subscribe before spawning the read
    /// loop to observe every update.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// The latest published catalog snapshot.
    ///
    /// Snapshots are complete by construction: the read loop builds a fresh
    /// catalog and swaps it in one guarded store, so a row is never visible
    /// with the host present but its processes missing.
    pub fn catalog(&self) -> Arc<Catalog> {
        self.catalog.read().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Reads and dispatches inbound frames (call this in a background task).
    ///
    /// Returns only when the session is over; the terminal condition has
    /// already been published as an event by then.
    pub async fn read_loop(&self) -> Result<(), SessionError> {
        tracing::debug!("read loop started");
        let result = self.read_frames().await;

        self.connected.store(false, Ordering::SeqCst);
        // escape transition: a pending side effect will never complete now
        self.gate.complete();

        match &result {
            Err(SessionError::ConnectionClosed) => {
                tracing::debug!("read loop: connection closed");
                let _ = self.events.send(SessionEvent::Closed);
            }
            Err(e) => {
                tracing::debug!("read loop failed: {}", e);
                let _ = self.events.send(SessionEvent::Failed {
                    reason: e.to_string(),
                });
            }
            Ok(()) => {}
        }
        result
    }

    async fn read_frames(&self) -> Result<(), SessionError> {
        let mut buf = vec![0u8; READ_BUFFER_SIZE];
        let mut pending = BytesMut::with_capacity(READ_BUFFER_SIZE);

        loop {
            let n = {
                let mut reader_guard = self.reader.lock().await;
                let reader = reader_guard.as_mut().ok_or(SessionError::NotConnected)?;
                reader.read(&mut buf).await?
            };
            if n == 0 {
                return Err(SessionError::ConnectionClosed);
            }
            pending.extend_from_slice(&buf[..n]);

            // Drain every complete frame; the codec keeps partial frames
            // buffered until the rest arrives.
            while let Some(frame) = Frame::decode(&mut pending)? {
                self.handle_frame(frame);
            }
        }
    }

    fn handle_frame(&self, frame: Frame) {
        if frame.is_handshake() {
            tracing::debug!("handshake frame, opcode {}", frame.opcode);
            self.gate.complete();
            let _ = self.events.send(SessionEvent::Handshake {
                opcode: frame.opcode,
            });
            return;
        }

        // Status frame: rebuild wholesale, then swap. Malformed frames are
        // dropped and the loop keeps reading.
        let text = match std::str::from_utf8(&frame.payload) {
            Ok(text) => text,
            Err(_) => {
                tracing::warn!("dropping status frame: payload is not UTF-8");
                return;
            }
        };
        match Catalog::parse(text) {
            Ok(catalog) => {
                let snapshot = Arc::new(catalog);
                *self.catalog.write() = snapshot.clone();
                tracing::debug!("catalog rebuilt: {} hosts", snapshot.len());
                let _ = self.events.send(SessionEvent::Catalog(snapshot));
            }
            Err(e) => {
                tracing::warn!("dropping malformed status frame: {}", e);
            }
        }
    }

    /// Encodes and writes a command: one synchronous write, fire-and-forget.
    pub async fn dispatch(&self, command: &Command) -> Result<(), SessionError> {
        if !self.is_connected() {
            return Err(SessionError::NotConnected);
        }
        let encoded = command.encode()?;
        tracing::debug!(
            "dispatching opcode {} ({} bytes)",
            command.opcode(),
            encoded.len()
        );
        let mut writer_guard = self.writer.lock().await;
        let writer = writer_guard.as_mut().ok_or(SessionError::NotConnected)?;
        writer.write_all(&encoded).await?;
        Ok(())
    }

    /// Dispatches a command whose side effect completes via a handshake
    /// frame. Rejects further such commands until the handshake arrives or
    /// the session fails.
    pub async fn dispatch_expecting_handshake(
        &self,
        command: &Command,
    ) -> Result<(), SessionError> {
        if !self.gate.try_begin() {
            return Err(SessionError::CommandInFlight);
        }
        match self.dispatch(command).await {
            Ok(()) => Ok(()),
            Err(e) => {
                // the side effect never started
                self.gate.complete();
                Err(e)
            }
        }
    }

    /// The dispatch gate, for callers that render its state.
    pub fn gate(&self) -> &DispatchGate {
        &self.gate
    }

    /// Closes the connection. The read loop observes EOF or a reset and
    /// terminates.
    pub async fn close(&self) {
        tracing::debug!("closing session");
        self.connected.store(false, Ordering::SeqCst);
        if let Some(mut writer) = self.writer.lock().await.take() {
            let _ = writer.shutdown().await;
        }
    }
}
