//! WebSocket link to the debugging target and its event loop.
//!
//! A [`TargetLink`] is one live socket. It spawns a tokio task that:
//!
//! - Writes outbound frames queued by [`TargetLink::send`]
//! - Sends handshake frames right after connecting
//! - Swallows replies to its own handshake requests
//! - Reports every other inbound frame, and the close, to a [`LinkHandler`]

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use rustc_hash::FxHashSet;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, error, trace, warn};

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Timeout for the WebSocket handshake with the target.
pub(crate) const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// Types
// ============================================================================

/// Socket stream type produced by `connect_async`.
pub(crate) type TargetStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Callback receiving link events from the event loop.
pub type LinkHandler = Box<dyn Fn(LinkEvent) + Send + Sync>;

/// Events reported by a link's event loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// Text frame from the target.
    Frame(String),
    /// Socket closed cleanly or stream ended.
    Closed,
    /// Socket failed.
    Failed(String),
}

/// A request the link sends itself after connecting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeFrame {
    /// Protocol id whose reply is swallowed.
    pub id: i64,
    /// Frame text.
    pub frame: String,
}

/// Internal commands for the event loop.
enum LinkCommand {
    /// Write a frame.
    Send(String),
    /// Close the socket.
    Shutdown,
}

// ============================================================================
// TargetLink
// ============================================================================

/// Handle to a live target socket.
///
/// Cloning shares the same event loop. Dropping a handle does not close the
/// socket; call [`TargetLink::shutdown`].
#[derive(Clone)]
pub struct TargetLink {
    /// Channel for sending commands to the event loop.
    command_tx: mpsc::UnboundedSender<LinkCommand>,
}

impl TargetLink {
    /// Connects to `url` and spawns the event loop.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionTimeout`] if the handshake exceeds [`CONNECT_TIMEOUT`]
    /// - [`Error::Connection`] if the socket cannot be opened
    pub async fn connect(
        url: &str,
        handshake: Vec<HandshakeFrame>,
        handler: LinkHandler,
    ) -> Result<Self> {
        let stream = open_socket(url).await?;
        debug!(url, "Target socket connected");
        Ok(Self::spawn(stream, handshake, handler))
    }

    /// Spawns the event loop over an open stream.
    pub(crate) fn spawn(
        stream: TargetStream,
        handshake: Vec<HandshakeFrame>,
        handler: LinkHandler,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        tokio::spawn(Self::run_event_loop(stream, command_rx, handshake, handler));
        Self { command_tx }
    }

    /// Queues a frame for the target.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the event loop has stopped.
    pub fn send(&self, frame: String) -> Result<()> {
        self.command_tx
            .send(LinkCommand::Send(frame))
            .map_err(|_| Error::ConnectionClosed)
    }

    /// Closes the socket.
    pub fn shutdown(&self) {
        let _ = self.command_tx.send(LinkCommand::Shutdown);
    }

    /// Returns `true` once the event loop has stopped.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.command_tx.is_closed()
    }

    /// Event loop that handles WebSocket I/O.
    async fn run_event_loop(
        stream: TargetStream,
        mut command_rx: mpsc::UnboundedReceiver<LinkCommand>,
        handshake: Vec<HandshakeFrame>,
        handler: LinkHandler,
    ) {
        let (mut ws_write, mut ws_read) = stream.split();
        let mut internal_ids: FxHashSet<i64> = FxHashSet::default();

        for frame in handshake {
            internal_ids.insert(frame.id);
            if let Err(e) = ws_write.send(Message::Text(frame.frame.into())).await {
                warn!(error = %e, "Failed to send handshake frame");
            }
        }

        let terminal = loop {
            tokio::select! {
                // Incoming frames from the target
                message = ws_read.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            if Self::is_internal_reply(text.as_str(), &mut internal_ids) {
                                trace!("Swallowed handshake reply");
                                continue;
                            }
                            handler(LinkEvent::Frame(text.to_string()));
                        }

                        Some(Ok(Message::Close(_))) => {
                            debug!("Target socket closed by remote");
                            break LinkEvent::Closed;
                        }

                        Some(Err(e)) => {
                            error!(error = %e, "Target socket error");
                            break LinkEvent::Failed(e.to_string());
                        }

                        None => {
                            debug!("Target socket stream ended");
                            break LinkEvent::Closed;
                        }

                        // Ignore Binary, Ping, Pong
                        _ => {}
                    }
                }

                // Commands from the bridge
                command = command_rx.recv() => {
                    match command {
                        Some(LinkCommand::Send(frame)) => {
                            if let Err(e) = ws_write.send(Message::Text(frame.into())).await {
                                warn!(error = %e, "Failed to send frame to target");
                                break LinkEvent::Failed(e.to_string());
                            }
                            trace!("Frame sent to target");
                        }

                        Some(LinkCommand::Shutdown) => {
                            debug!("Shutdown command received");
                            let _ = ws_write.close().await;
                            break LinkEvent::Closed;
                        }

                        None => {
                            debug!("Command channel closed");
                            let _ = ws_write.close().await;
                            break LinkEvent::Closed;
                        }
                    }
                }
            }
        };

        command_rx.close();
        handler(terminal);
        debug!("Target event loop terminated");
    }

    /// Returns `true` (and forgets the id) if `text` answers a handshake frame.
    fn is_internal_reply(text: &str, internal_ids: &mut FxHashSet<i64>) -> bool {
        if internal_ids.is_empty() {
            return false;
        }

        let Ok(value) = serde_json::from_str::<Value>(text) else {
            return false;
        };

        value
            .get("id")
            .and_then(Value::as_i64)
            .is_some_and(|id| internal_ids.remove(&id))
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Opens a WebSocket with [`CONNECT_TIMEOUT`].
pub(crate) async fn open_socket(url: &str) -> Result<TargetStream> {
    let (stream, _response) = timeout(CONNECT_TIMEOUT, connect_async(url))
        .await
        .map_err(|_| Error::connection_timeout(CONNECT_TIMEOUT.as_millis() as u64))?
        .map_err(|e| Error::connection(format!("{url}: {e}")))?;
    Ok(stream)
}

// ============================================================================
// Tests
// ============================================================================
