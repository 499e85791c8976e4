//! Bridge connecting straight to the target's WebSocket address.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::host::DisplaySurface;

use super::bridge::{BridgeCore, BridgeEvents, BridgeState, SocketBridge};

// ============================================================================
// DirectBridge
// ============================================================================

/// [`SocketBridge`] over a direct WebSocket to the target.
pub struct DirectBridge {
    core: Arc<BridgeCore>,
    target_url: String,
}

impl DirectBridge {
    /// Creates a bridge for `target_url`, posting notices to `surface`.
    ///
    /// Nothing connects until the surface sends `ready`.
    #[must_use]
    pub fn new(target_url: impl Into<String>, surface: Arc<dyn DisplaySurface>) -> Self {
        Self {
            core: BridgeCore::new(surface),
            target_url: target_url.into(),
        }
    }

    /// Returns the target address.
    #[inline]
    #[must_use]
    pub fn target_url(&self) -> &str {
        &self.target_url
    }
}

impl SocketBridge for DirectBridge {
    fn on_surface_message(&self, raw: &str) {
        if self.core.route(raw) {
            let url = self.target_url.clone();
            self.core.spawn_connect(async move { Ok((url, Vec::new())) });
        }
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

impl fmt::Debug for DirectBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectBridge")
            .field("target_url", &self.target_url)
            .field("core", &self.core)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
