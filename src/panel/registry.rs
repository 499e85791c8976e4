//! Owner of the primary panel.
//!
//! The registry holds at most one [`DevToolsPanel`]. Opening the same
//! target again reveals it; opening another target disposes it first. A
//! panel disposed by any path clears its own slot before tearing down.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::debug;

use crate::config::RuntimeConfig;
use crate::error::Result;
use crate::host::HostServices;
use crate::identifiers::PanelId;
use crate::transport::{TargetConnector, WebSocketConnector};

use super::core::{DevToolsPanel, ReleaseHook};

// ============================================================================
// PanelRegistry
// ============================================================================

/// Opens and owns the primary devtools panel.
#[derive(Clone)]
pub struct PanelRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    host: HostServices,
    connector: Arc<dyn TargetConnector>,
    slot: Mutex<Option<DevToolsPanel>>,
    /// Serializes `open` calls.
    opening: Mutex<()>,
}

impl PanelRegistry {
    /// Creates a registry connecting over real WebSockets.
    #[must_use]
    pub fn new(host: HostServices) -> Self {
        let connector = Arc::new(WebSocketConnector::new(Arc::clone(&host.proxies)));
        Self::with_connector(host, connector)
    }

    /// Creates a registry with a custom connector.
    #[must_use]
    pub fn with_connector(host: HostServices, connector: Arc<dyn TargetConnector>) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                host,
                connector,
                slot: Mutex::new(None),
                opening: Mutex::new(()),
            }),
        }
    }

    /// Opens a panel for `target_url`.
    ///
    /// Reveals the current panel when it already serves `target_url`.
    /// Otherwise disposes the current panel, then creates a new one.
    ///
    /// # Errors
    ///
    /// - [`crate::Error::Config`] if `config` is invalid
    /// - [`crate::Error::Host`] if the surface cannot be created
    pub fn open(&self, target_url: &str, config: RuntimeConfig) -> Result<DevToolsPanel> {
        config.validate()?;
        let _opening = self.inner.opening.lock();

        let existing = self.inner.slot.lock().clone();
        if let Some(panel) = existing {
            if !panel.is_disposed() && panel.target_url() == target_url {
                debug!(panel = %panel.id(), "Revealing existing panel");
                panel.reveal();
                return Ok(panel);
            }
            debug!(panel = %panel.id(), "Replacing panel for new target");
            panel.dispose();
        }

        let registry: Weak<RegistryInner> = Arc::downgrade(&self.inner);
        let release: ReleaseHook = Box::new(move |id| {
            if let Some(registry) = registry.upgrade() {
                registry.release(id);
            }
        });

        let panel = DevToolsPanel::create(
            target_url,
            config,
            self.inner.host.clone(),
            self.inner.connector.as_ref(),
            Some(release),
        )?;

        *self.inner.slot.lock() = Some(panel.clone());
        Ok(panel)
    }

    /// Returns the primary panel.
    #[must_use]
    pub fn current(&self) -> Option<DevToolsPanel> {
        self.inner.slot.lock().clone()
    }

    /// Disposes the primary panel, if any.
    pub fn close(&self) {
        let current = self.inner.slot.lock().clone();
        if let Some(panel) = current {
            panel.dispose();
        }
    }
}

impl RegistryInner {
    /// Clears the slot if it still holds `id`.
    fn release(&self, id: PanelId) {
        let released = {
            let mut slot = self.slot.lock();
            if slot.as_ref().is_some_and(|panel| panel.id() == id) {
                slot.take()
            } else {
                None
            }
        };

        if released.is_some() {
            debug!(panel = %id, "Registry slot cleared");
        }
    }
}

impl fmt::Debug for PanelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PanelRegistry")
            .field("current", &self.current().map(|p| p.id()))
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::Ordering;

    use crate::host::SurfaceEvent;
    use crate::host::testing::TestHost;
    use crate::transport::testing::{MockConnector, wait_until};

    const T1: &str = "ws://127.0.0.1:9222/devtools/page/1";
    const T2: &str = "ws://127.0.0.1:9222/devtools/page/2";

    fn registry() -> (TestHost, Arc<MockConnector>, PanelRegistry) {
        let host = TestHost::new();
        let connector = Arc::new(MockConnector::default());
        let registry = PanelRegistry::with_connector(host.services(), connector.clone());
        (host, connector, registry)
    }

    #[tokio::test]
    async fn test_open_same_target_reveals() {
        let (host, connector, registry) = registry();

        let first = registry.open(T1, RuntimeConfig::default()).expect("open");
        let second = registry.open(T1, RuntimeConfig::default()).expect("open");

        assert_eq!(first.id(), second.id());
        assert_eq!(connector.bridge_count(), 1);
        assert_eq!(host.surfaces.count(), 1);
        assert_eq!(host.surfaces.surface(0).reveals.load(Ordering::SeqCst), 1);
        assert!(!first.is_disposed());
    }

    #[tokio::test]
    async fn test_open_other_target_disposes_first_once() {
        let (host, connector, registry) = registry();

        let first = registry.open(T1, RuntimeConfig::default()).expect("open");
        let second = registry.open(T2, RuntimeConfig::default()).expect("open");

        assert!(first.is_disposed());
        assert!(!second.is_disposed());
        assert_eq!(connector.bridge_at(0).disposed(), 1);
        assert_eq!(host.surfaces.surface(0).disposed.load(Ordering::SeqCst), 1);
        assert_eq!(connector.bridge_count(), 2);
        assert_eq!(registry.current().map(|p| p.id()), Some(second.id()));
    }

    #[tokio::test]
    async fn test_dispose_clears_slot() {
        let (_host, _connector, registry) = registry();

        let panel = registry.open(T1, RuntimeConfig::default()).expect("open");
        panel.dispose();
        assert!(registry.current().is_none());
    }

    #[tokio::test]
    async fn test_stale_release_keeps_new_panel() {
        let (_host, _connector, registry) = registry();

        let first = registry.open(T1, RuntimeConfig::default()).expect("open");
        let second = registry.open(T2, RuntimeConfig::default()).expect("open");
        first.dispose();

        assert_eq!(registry.current().map(|p| p.id()), Some(second.id()));
    }

    #[tokio::test]
    async fn test_reopen_after_close_creates_new_panel() {
        let (_host, connector, registry) = registry();

        let first = registry.open(T1, RuntimeConfig::default()).expect("open");
        registry.close();
        let second = registry.open(T1, RuntimeConfig::default()).expect("open");

        assert_ne!(first.id(), second.id());
        assert_eq!(connector.bridge_count(), 2);
    }

    #[tokio::test]
    async fn test_surface_close_clears_slot() {
        let (host, _connector, registry) = registry();

        registry.open(T1, RuntimeConfig::default()).expect("open");
        host.surfaces
            .sender(0)
            .send(SurfaceEvent::Disposed)
            .expect("send");

        assert!(wait_until(|| registry.current().is_none()).await);
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let (host, _connector, registry) = registry();
        let config = RuntimeConfig {
            use_proxy: true,
            ..RuntimeConfig::default()
        };

        let err = registry.open(T1, config).expect_err("must fail");
        assert!(matches!(err, crate::Error::Config { .. }));
        assert_eq!(host.surfaces.count(), 0);
    }
}
