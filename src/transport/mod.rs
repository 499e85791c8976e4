//! WebSocket transport to the debugging target.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐   <channel>:<payload>   ┌──────────────┐    WebSocket    ┌──────────┐
//! │ Display surface │◄───────────────────────►│ SocketBridge │◄───────────────►│  Target  │
//! └─────────────────┘                         └──────────────┘  (direct/proxy) └──────────┘
//!                                                                                   ▲
//!                                             ┌──────────────┐  Browser.getVersion  │
//!                                             │ VersionProbe │──────────────────────┘
//!                                             └──────────────┘
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `bridge` | [`SocketBridge`] contract and shared routing |
//! | `connection` | Target socket and its event loop |
//! | `direct` | Bridge straight to the target address |
//! | `proxied` | Bridge through a debug proxy |
//! | `probe` | Target version detection |

// ============================================================================
// Submodules
// ============================================================================

/// Socket bridge contract.
pub mod bridge;

/// Target socket and event loop.
pub mod connection;

/// Direct bridge variant.
pub mod direct;

/// Proxied bridge variant.
pub mod proxied;

/// Target version probe.
pub mod probe;

/// Scriptable WebSocket target.
#[cfg(test)]
pub(crate) mod testing;

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::config::RuntimeConfig;
use crate::host::{DisplaySurface, ProxyResolver};

// ============================================================================
// Re-exports
// ============================================================================

pub use bridge::{BridgeEvents, BridgeState, SocketBridge};
pub use connection::{LinkEvent, TargetLink};
pub use direct::DirectBridge;
pub use probe::{VersionDetector, VersionEvents, VersionProbe};
pub use proxied::ProxiedBridge;

// ============================================================================
// TargetConnector
// ============================================================================

/// Creates the bridge and probe for a panel.
pub trait TargetConnector: Send + Sync {
    /// Creates the bridge for `target_url`.
    fn bridge(
        &self,
        target_url: &str,
        config: &RuntimeConfig,
        surface: Arc<dyn DisplaySurface>,
    ) -> Arc<dyn SocketBridge>;

    /// Creates the version probe for `target_url`.
    fn probe(&self, target_url: &str) -> Arc<dyn VersionDetector>;
}

/// [`TargetConnector`] over real WebSockets.
///
/// Chooses [`ProxiedBridge`] when the configuration asks for the proxy and
/// names a debug session, [`DirectBridge`] otherwise.
pub struct WebSocketConnector {
    proxies: Arc<dyn ProxyResolver>,
}

impl WebSocketConnector {
    /// Creates a connector resolving proxies with `proxies`.
    #[must_use]
    pub fn new(proxies: Arc<dyn ProxyResolver>) -> Self {
        Self { proxies }
    }
}

impl TargetConnector for WebSocketConnector {
    fn bridge(
        &self,
        target_url: &str,
        config: &RuntimeConfig,
        surface: Arc<dyn DisplaySurface>,
    ) -> Arc<dyn SocketBridge> {
        match config.debug_session_id.as_deref() {
            Some(session) if config.use_proxy => {
                debug!(session, "Using proxied bridge");
                Arc::new(ProxiedBridge::new(session, Arc::clone(&self.proxies), surface))
            }
            _ => {
                debug!(target_url, "Using direct bridge");
                Arc::new(DirectBridge::new(target_url, surface))
            }
        }
    }

    fn probe(&self, target_url: &str) -> Arc<dyn VersionDetector> {
        Arc::new(VersionProbe::new(target_url))
    }
}

impl fmt::Debug for WebSocketConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebSocketConnector").finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================
