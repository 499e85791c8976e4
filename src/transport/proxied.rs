//! Bridge connecting through a debug proxy.
//!
//! The proxy endpoint is resolved per connect from the debug-session id.
//! Once open, the bridge subscribes to the protocol domains the front-end
//! needs; the proxy's replies to those requests never reach the surface.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use serde_json::json;

use crate::error::Result;
use crate::host::{DisplaySurface, ProxyResolver};

use super::bridge::{BridgeCore, BridgeEvents, BridgeState, SocketBridge};
use super::connection::HandshakeFrame;

// ============================================================================
// Constants
// ============================================================================

/// Method asking the proxy to forward events.
pub const SUBSCRIBE_METHOD: &str = "JsDebug.subscribe";

/// Event patterns forwarded by the proxy.
pub const SUBSCRIBED_EVENTS: &[&str] = &[
    "CSS.*",
    "DOM.*",
    "Log.*",
    "Network.*",
    "Overlay.*",
    "Page.*",
    "Runtime.*",
    "Target.*",
];

/// Request id reserved for the subscribe handshake.
///
/// Negative so it can never collide with front-end ids.
const SUBSCRIBE_REQUEST_ID: i64 = -1;

// ============================================================================
// ProxiedBridge
// ============================================================================

/// [`SocketBridge`] through a debug proxy.
pub struct ProxiedBridge {
    core: Arc<BridgeCore>,
    proxies: Arc<dyn ProxyResolver>,
    debug_session_id: String,
}

impl ProxiedBridge {
    /// Creates a bridge for `debug_session_id`.
    #[must_use]
    pub fn new(
        debug_session_id: impl Into<String>,
        proxies: Arc<dyn ProxyResolver>,
        surface: Arc<dyn DisplaySurface>,
    ) -> Self {
        Self {
            core: BridgeCore::new(surface),
            proxies,
            debug_session_id: debug_session_id.into(),
        }
    }

    /// Returns the debug-session id.
    #[inline]
    #[must_use]
    pub fn debug_session_id(&self) -> &str {
        &self.debug_session_id
    }

    /// Builds the subscribe request sent on open.
    #[must_use]
    pub fn subscribe_handshake() -> HandshakeFrame {
        let frame = json!({
            "id": SUBSCRIBE_REQUEST_ID,
            "method": SUBSCRIBE_METHOD,
            "params": { "events": SUBSCRIBED_EVENTS },
        });

        HandshakeFrame {
            id: SUBSCRIBE_REQUEST_ID,
            frame: frame.to_string(),
        }
    }
}

impl SocketBridge for ProxiedBridge {
    fn on_surface_message(&self, raw: &str) {
        if !self.core.route(raw) {
            return;
        }

        let proxies = Arc::clone(&self.proxies);
        let session = self.debug_session_id.clone();
        self.core.spawn_connect(async move {
            let endpoint = proxies.request_proxy(&session).await?;
            Ok((endpoint.ws_url(), vec![Self::subscribe_handshake()]))
        });
    }

    fn subscribe(&self) -> Option<BridgeEvents> {
        self.core.subscribe()
    }

    fn send_to_target(&self, frame: String) -> Result<()> {
        self.core.send_to_target(frame)
    }

    fn is_connected_to_target(&self) -> bool {
        self.core.state() == BridgeState::Connected
    }

    fn state(&self) -> BridgeState {
        self.core.state()
    }

    fn dispose(&self) {
        self.core.dispose();
    }
}

impl fmt::Debug for ProxiedBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxiedBridge")
            .field("debug_session_id", &self.debug_session_id)
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================
