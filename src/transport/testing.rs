//! Scriptable WebSocket target and transport doubles for tests.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use crate::config::RuntimeConfig;
use crate::error::Result;
use crate::host::DisplaySurface;
use crate::protocol::{Channel, ChannelMessage, VersionParameters};

use super::{
    BridgeEvents, BridgeState, SocketBridge, TargetConnector, VersionDetector, VersionEvents,
};

/// Computes an optional reply for each received frame.
pub(crate) type Responder = fn(&str) -> Option<String>;

enum ServerCommand {
    Frame(String),
    Close,
}

/// Local WebSocket server standing in for a debugging target.
pub(crate) struct MockTarget {
    port: u16,
    received: Arc<Mutex<Vec<String>>>,
    connections: Arc<AtomicUsize>,
    current: Arc<Mutex<Option<mpsc::UnboundedSender<ServerCommand>>>>,
}

impl MockTarget {
    /// Binds to a random localhost port and starts accepting.
    pub async fn start(responder: Responder) -> Self {
        let listener = TcpListener::bind((IpAddr::V4(Ipv4Addr::LOCALHOST), 0))
            .await
            .expect("bind");
        let port = listener.local_addr().expect("local addr").port();

        let target = Self {
            port,
            received: Arc::default(),
            connections: Arc::default(),
            current: Arc::default(),
        };

        let received = Arc::clone(&target.received);
        let connections = Arc::clone(&target.connections);
        let current = Arc::clone(&target.current);

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let Ok(ws) = tokio_tungstenite::accept_async(stream).await else {
                    continue;
                };
                connections.fetch_add(1, Ordering::SeqCst);

                let (tx, mut rx) = mpsc::unbounded_channel();
                *current.lock() = Some(tx);
                let received = Arc::clone(&received);

                tokio::spawn(async move {
                    let (mut write, mut read) = ws.split();
                    loop {
                        tokio::select! {
                            message = read.next() => match message {
                                Some(Ok(Message::Text(text))) => {
                                    received.lock().push(text.to_string());
                                    if let Some(reply) = responder(text.as_str()) {
                                        let _ = write.send(Message::Text(reply.into())).await;
                                    }
                                }
                                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                                _ => {}
                            },
                            command = rx.recv() => match command {
                                Some(ServerCommand::Frame(frame)) => {
                                    let _ = write.send(Message::Text(frame.into())).await;
                                }
                                Some(ServerCommand::Close) | None => {
                                    let _ = write.close().await;
                                    break;
                                }
                            },
                        }
                    }
                });
            }
        });

        target
    }

    /// WebSocket address of the server.
    pub fn url(&self) -> String {
        format!("ws://127.0.0.1:{}/devtools/page/1", self.port)
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn received(&self) -> Vec<String> {
        self.received.lock().clone()
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Pushes a frame on the latest connection.
    pub fn push(&self, frame: &str) {
        if let Some(tx) = self.current.lock().as_ref() {
            let _ = tx.send(ServerCommand::Frame(frame.to_string()));
        }
    }

    /// Closes the latest connection.
    pub fn close_current(&self) {
        if let Some(tx) = self.current.lock().take() {
            let _ = tx.send(ServerCommand::Close);
        }
    }
}

/// Polls `condition` until it holds or five seconds pass.
pub(crate) async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..500 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

// ============================================================================
// Doubles
// ============================================================================

/// Bridge double: records surface messages and forwards them like the real
/// bridge, without a socket. Tests inject lifecycle events with [`MockBridge::emit`].
pub(crate) struct MockBridge {
    pub received: Mutex<Vec<String>>,
    pub sent: Mutex<Vec<String>>,
    pub connected: AtomicBool,
    pub disposed: AtomicUsize,
    events_tx: mpsc::UnboundedSender<ChannelMessage>,
    events_rx: Mutex<Option<BridgeEvents>>,
}

impl Default for MockBridge {
    fn default() -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            received: Mutex::default(),
            sent: Mutex::default(),
            connected: AtomicBool::new(false),
            disposed: AtomicUsize::new(0),
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
        }
    }
}

impl MockBridge {
    pub fn emit(&self, message: ChannelMessage) {
        let _ = self.events_tx.send(message);
    }

    pub fn disposed(&self) -> usize {
        self.disposed.load(Ordering::SeqCst)
    }
}

impl SocketBridge for MockBridge {
    fn on_surface_message(&self, raw: &str) {
        self.received.lock().push(raw.to_string());
        if let Ok(message) = ChannelMessage::decode(raw)
            && message.channel != Channel::Ready
        {
            self.emit(message);
        }
    }

    fn subscribe(&self) -> Option<BridgeEvents> {
        self.events_rx.lock().take()
    }

    fn send_to_target(&self, frame: String) -> Result<()> {
        self.sent.lock().push(frame);
        Ok(())
    }

    fn is_connected_to_target(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn state(&self) -> BridgeState {
        if self.is_connected_to_target() {
            BridgeState::Connected
        } else {
            BridgeState::Disconnected
        }
    }

    fn dispose(&self) {
        self.disposed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Probe double counting arming and disposal.
pub(crate) struct MockProbe {
    pub detections: AtomicUsize,
    pub disposed: AtomicUsize,
    results_tx: mpsc::UnboundedSender<VersionParameters>,
    results_rx: Mutex<Option<VersionEvents>>,
}

impl Default for MockProbe {
    fn default() -> Self {
        let (results_tx, results_rx) = mpsc::unbounded_channel();
        Self {
            detections: AtomicUsize::new(0),
            disposed: AtomicUsize::new(0),
            results_tx,
            results_rx: Mutex::new(Some(results_rx)),
        }
    }
}

impl MockProbe {
    pub fn resolve(&self, parameters: VersionParameters) {
        let _ = self.results_tx.send(parameters);
    }

    pub fn detections(&self) -> usize {
        self.detections.load(Ordering::SeqCst)
    }

    pub fn disposed(&self) -> usize {
        self.disposed.load(Ordering::SeqCst)
    }
}

impl VersionDetector for MockProbe {
    fn detect_version(&self) {
        self.detections.fetch_add(1, Ordering::SeqCst);
    }

    fn subscribe(&self) -> Option<VersionEvents> {
        self.results_rx.lock().take()
    }

    fn dispose(&self) {
        self.disposed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Connector handing out doubles and keeping them for inspection.
#[derive(Default)]
pub(crate) struct MockConnector {
    pub bridges: Mutex<Vec<Arc<MockBridge>>>,
    pub probes: Mutex<Vec<Arc<MockProbe>>>,
}

impl MockConnector {
    pub fn bridge_count(&self) -> usize {
        self.bridges.lock().len()
    }

    pub fn bridge_at(&self, index: usize) -> Arc<MockBridge> {
        Arc::clone(&self.bridges.lock()[index])
    }

    pub fn probe_at(&self, index: usize) -> Arc<MockProbe> {
        Arc::clone(&self.probes.lock()[index])
    }
}

impl TargetConnector for MockConnector {
    fn bridge(
        &self,
        _target_url: &str,
        _config: &RuntimeConfig,
        _surface: Arc<dyn DisplaySurface>,
    ) -> Arc<dyn SocketBridge> {
        let bridge = Arc::new(MockBridge::default());
        self.bridges.lock().push(Arc::clone(&bridge));
        bridge
    }

    fn probe(&self, _target_url: &str) -> Arc<dyn VersionDetector> {
        let probe = Arc::new(MockProbe::default());
        self.probes.lock().push(Arc::clone(&probe));
        probe
    }
}
