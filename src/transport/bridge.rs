//! Socket bridge contract and the state shared by both variants.
//!
//! A bridge owns the link between one display surface and one debugging
//! target. Surface messages enter through [`SocketBridge::on_surface_message`];
//! `websocket` frames go to the target, everything else is emitted to the
//! subscriber. Target frames and socket lifecycle are posted back to the
//! surface as [`SocketNotice`]s.
//!
//! # States
//!
//! ```text
//! Disconnected ──ready──► Connecting ──open──► Connected
//!      ▲                      │                   │
//!      └──────fail────────────┘◄──────ready───────┤
//!      └──────────────────close/error─────────────┘
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::host::DisplaySurface;
use crate::protocol::payload::{self, WebsocketPayload};
use crate::protocol::{Channel, ChannelMessage, ReadyPayload, SocketNotice};

use super::connection::{HandshakeFrame, LinkEvent, LinkHandler, TargetLink};

// ============================================================================
// Types
// ============================================================================

/// Receiver of messages emitted by a bridge.
pub type BridgeEvents = mpsc::UnboundedReceiver<ChannelMessage>;

/// Connection state of a bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BridgeState {
    /// No target socket.
    Disconnected,
    /// Socket being opened.
    Connecting,
    /// Socket open.
    Connected,
}

// ============================================================================
// SocketBridge
// ============================================================================

/// Routes messages between a display surface and a debugging target.
pub trait SocketBridge: Send + Sync {
    /// Handles a raw `<channel>:<payload>` message from the surface.
    ///
    /// `ready` (re)connects to the target. `websocket` frames are forwarded
    /// to the target and emitted. Every other channel is emitted unchanged.
    fn on_surface_message(&self, raw: &str);

    /// Takes the event receiver. Returns `None` after the first call.
    ///
    /// Besides forwarded surface messages, the stream carries a `ready`
    /// message with [`ReadyPayload`] each time the target socket opens.
    fn subscribe(&self) -> Option<BridgeEvents>;

    /// Sends a frame to the target.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] when no target socket is open.
    fn send_to_target(&self, frame: String) -> Result<()>;

    /// Returns `true` while the target socket is open.
    fn is_connected_to_target(&self) -> bool;

    /// Current connection state.
    fn state(&self) -> BridgeState;

    /// Closes the target socket and stops routing. Idempotent.
    fn dispose(&self);
}

// ============================================================================
// BridgeCore
// ============================================================================

/// Link slot guarded by one lock.
struct LinkSlot {
    state: BridgeState,
    link: Option<TargetLink>,
    /// Bumped on every connect attempt; stale link events are ignored.
    generation: u64,
}

/// Routing and lifecycle shared by both bridge variants.
pub(crate) struct BridgeCore {
    surface: Arc<dyn DisplaySurface>,
    slot: Mutex<LinkSlot>,
    connected_once: AtomicBool,
    disposed: AtomicBool,
    events_tx: mpsc::UnboundedSender<ChannelMessage>,
    events_rx: Mutex<Option<BridgeEvents>>,
}

impl BridgeCore {
    /// Creates a core posting notices to `surface`.
    pub(crate) fn new(surface: Arc<dyn DisplaySurface>) -> Arc<Self> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            surface,
            slot: Mutex::new(LinkSlot {
                state: BridgeState::Disconnected,
                link: None,
                generation: 0,
            }),
            connected_once: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
        })
    }

    /// Routes a surface message. Returns `true` when a connect is requested.
    pub(crate) fn route(&self, raw: &str) -> bool {
        if self.is_disposed() {
            trace!("Surface message after dispose dropped");
            return false;
        }

        let message = match ChannelMessage::decode(raw) {
            Ok(message) => message,
            Err(e) => {
                debug!(error = %e, "Dropped surface message");
                return false;
            }
        };

        match message.channel {
            Channel::Ready => return true,

            Channel::Websocket => {
                match payload::decode::<WebsocketPayload>(&message) {
                    Ok(WebsocketPayload {
                        message: Some(frame),
                    }) => {
                        if let Err(e) = self.send_to_target(frame) {
                            debug!(error = %e, "Frame for target dropped");
                        }
                    }
                    Ok(_) => {}
                    Err(e) => debug!(error = %e, "Malformed websocket payload"),
                }
                self.emit(message);
            }

            _ => self.emit(message),
        }

        false
    }

    /// Starts a connect attempt resolving its address with `resolve`.
    ///
    /// Any open socket is closed first.
    pub(crate) fn spawn_connect<F>(self: &Arc<Self>, resolve: F)
    where
        F: Future<Output = Result<(String, Vec<HandshakeFrame>)>> + Send + 'static,
    {
        let Some(generation) = self.begin_connect() else {
            return;
        };

        let core = Arc::clone(self);
        tokio::spawn(async move {
            let result = async {
                let (url, handshake) = resolve.await?;
                debug!(url = %url, generation, "Connecting to target");
                TargetLink::connect(&url, handshake, core.link_handler(generation)).await
            }
            .await;

            match result {
                Ok(link) => core.attach(generation, link),
                Err(e) => core.connect_failed(generation, &e),
            }
        });
    }

    fn begin_connect(&self) -> Option<u64> {
        if self.is_disposed() {
            return None;
        }

        let mut slot = self.slot.lock();
        if let Some(old) = slot.link.take() {
            debug!("Closing previous target socket");
            old.shutdown();
        }
        slot.state = BridgeState::Connecting;
        slot.generation += 1;
        Some(slot.generation)
    }

    fn link_handler(self: &Arc<Self>, generation: u64) -> LinkHandler {
        let core: Weak<Self> = Arc::downgrade(self);
        Box::new(move |event| {
            if let Some(core) = core.upgrade() {
                core.on_link_event(generation, event);
            }
        })
    }

    fn attach(&self, generation: u64, link: TargetLink) {
        {
            let mut slot = self.slot.lock();
            if self.is_disposed() || slot.generation != generation || link.is_closed() {
                trace!(generation, "Discarding stale target socket");
                link.shutdown();
                return;
            }
            slot.link = Some(link);
            slot.state = BridgeState::Connected;
        }

        let reconnect = self.connected_once.swap(true, Ordering::SeqCst);
        debug!(reconnect, "Target socket open");

        self.notify(SocketNotice::Open);
        match ChannelMessage::json(Channel::Ready, &ReadyPayload { reconnect }) {
            Ok(message) => self.emit(message),
            Err(e) => warn!(error = %e, "Failed to encode ready event"),
        }
    }

    fn connect_failed(&self, generation: u64, error: &Error) {
        {
            let mut slot = self.slot.lock();
            if slot.generation != generation {
                return;
            }
            slot.state = BridgeState::Disconnected;
        }

        debug!(error = %error, "Target connect failed");
        if !self.is_disposed() {
            self.notify(SocketNotice::Error);
        }
    }

    fn on_link_event(&self, generation: u64, event: LinkEvent) {
        if self.is_disposed() {
            return;
        }

        let notice = match event {
            LinkEvent::Frame(frame) => {
                if self.slot.lock().generation != generation {
                    return;
                }
                SocketNotice::Message { message: frame }
            }

            LinkEvent::Closed => {
                if !self.detach(generation) {
                    return;
                }
                SocketNotice::Close
            }

            LinkEvent::Failed(reason) => {
                if !self.detach(generation) {
                    return;
                }
                debug!(reason = %reason, "Target socket failed");
                SocketNotice::Error
            }
        };

        self.notify(notice);
    }

    /// Clears the link if `generation` is current.
    fn detach(&self, generation: u64) -> bool {
        let mut slot = self.slot.lock();
        if slot.generation != generation {
            return false;
        }
        slot.link = None;
        slot.state = BridgeState::Disconnected;
        true
    }

    fn notify(&self, notice: SocketNotice) {
        match notice.into_message() {
            Ok(message) => self.surface.post_message(message.encode()),
            Err(e) => warn!(error = %e, "Failed to encode socket notice"),
        }
    }

    fn emit(&self, message: ChannelMessage) {
        if self.events_tx.send(message).is_err() {
            trace!("Bridge subscriber gone");
        }
    }

    pub(crate) fn subscribe(&self) -> Option<BridgeEvents> {
        self.events_rx.lock().take()
    }

    pub(crate) fn send_to_target(&self, frame: String) -> Result<()> {
        let link = self.slot.lock().link.clone();
        match link {
            Some(link) => link.send(frame),
            None => Err(Error::ConnectionClosed),
        }
    }

    pub(crate) fn state(&self) -> BridgeState {
        self.slot.lock().state
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    pub(crate) fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }

        let mut slot = self.slot.lock();
        if let Some(link) = slot.link.take() {
            link.shutdown();
        }
        slot.state = BridgeState::Disconnected;
        slot.generation += 1;
        debug!("Bridge disposed");
    }
}

impl fmt::Debug for BridgeCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeCore")
            .field("state", &self.state())
            .field("connected_once", &self.connected_once.load(Ordering::Relaxed))
            .field("disposed", &self.is_disposed())
            .finish_non_exhaustive()
    }
}
