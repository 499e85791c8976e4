//! Panel lifecycle and event loop.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::config::RuntimeConfig;
use crate::document::{
    self, DocumentParams, SCRIPT_ASSET, STYLESHEET_ASSET, build_document, hosted_document_url,
};
use crate::error::Result;
use crate::host::{
    DisplaySurface, HostServices, Measures, Properties, SurfaceEvent, SurfaceEvents,
    SurfaceOptions,
};
use crate::identifiers::PanelId;
use crate::protocol::{Channel, ChannelMessage, VersionParameters};
use crate::transport::{
    BridgeEvents, BridgeState, SocketBridge, TargetConnector, VersionDetector, VersionEvents,
};

use super::session::Session;

// ============================================================================
// Constants
// ============================================================================

/// Surface title.
pub const PANEL_TITLE: &str = "DevTools";

/// Telemetry event for the first target connection of a session.
pub const CONNECT_EVENT: &str = "websocket/connect";

/// Telemetry event for later target connections.
pub const RECONNECT_EVENT: &str = "websocket/reconnect";

/// Telemetry event carrying the session duration on dispose.
pub const DISPOSE_EVENT: &str = "websocket/dispose";

// ============================================================================
// Types
// ============================================================================

/// Called once on dispose so the owner can drop its reference.
pub(crate) type ReleaseHook = Box<dyn FnOnce(PanelId) + Send>;

/// Control messages for the event loop.
#[derive(Debug)]
enum Control {
    /// Stop the loop.
    Stop,
}

// ============================================================================
// DevToolsPanel
// ============================================================================

/// A devtools panel bound to one debugging target.
///
/// Cloning is cheap and shares the panel. The panel stays alive until it is
/// disposed, whether through [`DevToolsPanel::dispose`], the `close`
/// channel, or the surface closing.
#[derive(Clone)]
pub struct DevToolsPanel {
    pub(crate) inner: Arc<PanelInner>,
}

/// Shared panel state.
pub(crate) struct PanelInner {
    pub(crate) id: PanelId,
    pub(crate) config: RuntimeConfig,
    pub(crate) host: HostServices,
    pub(crate) surface: Arc<dyn DisplaySurface>,
    pub(crate) bridge: Arc<dyn SocketBridge>,
    pub(crate) probe: Arc<dyn VersionDetector>,
    pub(crate) session: Mutex<Session>,
    disposed: AtomicBool,
    release: Mutex<Option<ReleaseHook>>,
    control_tx: mpsc::UnboundedSender<Control>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl DevToolsPanel {
    /// Creates the surface, bridge and probe, starts the event loop and
    /// arms the version probe.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Host`] if the surface cannot be created.
    pub(crate) fn create(
        target_url: &str,
        config: RuntimeConfig,
        host: HostServices,
        connector: &dyn TargetConnector,
        release: Option<ReleaseHook>,
    ) -> Result<Self> {
        let options = SurfaceOptions {
            title: PANEL_TITLE.to_string(),
            column: None,
        };
        let (surface, surface_events) = host.surfaces.create(&options)?;

        let bridge = connector.bridge(target_url, &config, Arc::clone(&surface));
        let probe = connector.probe(target_url);

        let bridge_events = bridge
            .subscribe()
            .unwrap_or_else(|| mpsc::unbounded_channel().1);
        let version_events = probe
            .subscribe()
            .unwrap_or_else(|| mpsc::unbounded_channel().1);

        let (control_tx, control_rx) = mpsc::unbounded_channel();

        let inner = Arc::new(PanelInner {
            id: PanelId::generate(),
            config,
            host,
            surface,
            bridge,
            probe,
            session: Mutex::new(Session::new(target_url)),
            disposed: AtomicBool::new(false),
            release: Mutex::new(release),
            control_tx,
            tasks: Mutex::new(Vec::new()),
        });

        tokio::spawn(PanelInner::run_event_loop(
            Arc::clone(&inner),
            surface_events,
            bridge_events,
            version_events,
            control_rx,
        ));

        inner.probe.detect_version();
        info!(panel = %inner.id, target = target_url, "Panel opened");

        Ok(Self { inner })
    }

    /// Returns the panel id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> PanelId {
        self.inner.id
    }

    /// Returns the target address.
    #[must_use]
    pub fn target_url(&self) -> String {
        self.inner.session.lock().target_url().to_string()
    }

    /// Returns a snapshot of the session.
    #[must_use]
    pub fn session(&self) -> Session {
        self.inner.session.lock().clone()
    }

    /// Returns the bridge connection state.
    #[must_use]
    pub fn bridge_state(&self) -> BridgeState {
        self.inner.bridge.state()
    }

    /// Returns the session configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    /// Brings the surface forward in its current column.
    pub fn reveal(&self) {
        self.inner.surface.reveal(self.inner.surface.view_column());
    }

    /// Returns `true` once disposed.
    #[inline]
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }

    /// Tears the panel down. Idempotent.
    pub fn dispose(&self) {
        self.inner.dispose();
    }

    /// Waits for every spawned fetch and editor task.
    #[cfg(test)]
    pub(crate) async fn settle(&self) {
        loop {
            let tasks = std::mem::take(&mut *self.inner.tasks.lock());
            if tasks.is_empty() {
                break;
            }
            for task in tasks {
                let _ = task.await;
            }
        }
    }
}

impl fmt::Debug for DevToolsPanel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DevToolsPanel")
            .field("id", &self.inner.id)
            .field("session", &*self.inner.session.lock())
            .field("disposed", &self.is_disposed())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// PanelInner
// ============================================================================

impl PanelInner {
    /// Single task multiplexing every event source of the panel.
    async fn run_event_loop(
        self: Arc<Self>,
        mut surface_events: SurfaceEvents,
        mut bridge_events: BridgeEvents,
        mut version_events: VersionEvents,
        mut control_rx: mpsc::UnboundedReceiver<Control>,
    ) {
        loop {
            tokio::select! {
                event = surface_events.recv() => {
                    match event {
                        Some(event) => self.on_surface_event(event),
                        None => {
                            debug!(panel = %self.id, "Surface event stream ended");
                            self.dispose();
                            break;
                        }
                    }
                }

                Some(message) = bridge_events.recv() => {
                    self.handle_message(message);
                }

                Some(version) = version_events.recv() => {
                    self.on_version(version);
                }

                control = control_rx.recv() => {
                    trace!(?control, "Control message received");
                    break;
                }
            }
        }

        debug!(panel = %self.id, "Panel event loop terminated");
    }

    pub(crate) fn on_surface_event(self: &Arc<Self>, event: SurfaceEvent) {
        if self.is_disposed() {
            return;
        }

        match event {
            SurfaceEvent::Message(raw) => self.bridge.on_surface_message(&raw),
            SurfaceEvent::ViewStateChanged { visible } => self.on_view_state_changed(visible),
            SurfaceEvent::ThemeChanged => self.on_theme_changed(),
            SurfaceEvent::Disposed => self.dispose(),
        }
    }

    fn on_view_state_changed(&self, visible: bool) {
        if !visible {
            return;
        }

        if self.bridge.is_connected_to_target() {
            self.render();
        } else {
            debug!(panel = %self.id, "Visible without target connection, re-arming probe");
            self.probe.detect_version();
        }
    }

    fn on_theme_changed(&self) {
        if self.surface.is_visible() {
            self.render();
        }
    }

    /// Stores a resolved version and re-renders.
    pub(crate) fn on_version(&self, version: VersionParameters) {
        if self.is_disposed() {
            return;
        }

        debug!(
            panel = %self.id,
            revision = %version.revision,
            headless = version.is_headless,
            "Version parameters received"
        );
        self.session.lock().set_version(version);
        self.render();
    }

    /// Headless rendering: detected by the probe or forced by settings.
    pub(crate) fn headless(&self) -> bool {
        self.session.lock().is_headless() || self.host.settings.headless_enabled()
    }

    /// Synthesizes the hosted document into the surface.
    pub(crate) fn render(&self) {
        if self.is_disposed() {
            return;
        }

        let settings = &self.host.settings;
        let revision = self.session.lock().revision().to_string();
        let hosted_url = hosted_document_url(&revision, self.config.devtools_base_uri.as_deref());
        let theme = settings.theme();
        let stylesheet_uri = self.surface.asset_uri(STYLESHEET_ASSET);
        let script_uri = self.surface.asset_uri(SCRIPT_ASSET);
        let csp_source = self.surface.csp_source();
        let nonce = document::generate_nonce();

        let params = DocumentParams {
            hosted_url: &hosted_url,
            theme: &theme,
            headless: self.headless(),
            standalone_screencast: settings.standalone_screencast_enabled(),
            stylesheet_uri: &stylesheet_uri,
            script_uri: &script_uri,
            csp_source: &csp_source,
            nonce: &nonce,
        };

        trace!(panel = %self.id, hosted = %hosted_url, "Rendering document");
        self.surface.set_html(build_document(&params));
    }

    /// Posts an encoded message to the surface.
    pub(crate) fn post(&self, message: &ChannelMessage) {
        if self.is_disposed() {
            trace!(channel = %message.channel, "Post after dispose dropped");
            return;
        }
        self.surface.post_message(message.encode());
    }

    /// Serializes and posts a reply.
    pub(crate) fn reply<T: Serialize>(&self, channel: Channel, payload: &T) {
        match ChannelMessage::json(channel, payload) {
            Ok(message) => self.post(&message),
            Err(e) => warn!(channel = %channel, error = %e, "Failed to encode reply"),
        }
    }

    /// Runs `future` off the event loop.
    pub(crate) fn spawn_task<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(future);
        let mut tasks = self.tasks.lock();
        tasks.retain(|task| !task.is_finished());
        tasks.push(handle);
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Tears down in order: owner release, surface, bridge, probe, duration
    /// telemetry, event loop.
    pub(crate) fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }

        let release = self.release.lock().take();
        if let Some(release) = release {
            release(self.id);
        }

        self.surface.dispose();
        self.bridge.dispose();
        self.probe.dispose();

        let elapsed = self.session.lock().elapsed();
        if let Some(elapsed) = elapsed {
            let mut measures = Measures::default();
            measures.insert("duration".to_string(), elapsed.as_secs_f64() * 1000.0);
            self.host
                .telemetry
                .send_event(DISPOSE_EVENT, Properties::default(), measures);
        }

        let _ = self.control_tx.send(Control::Stop);
        info!(panel = %self.id, "Panel disposed");
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::host::testing::TestHost;
    use crate::protocol::ReadyPayload;
    use crate::transport::testing::{MockConnector, wait_until};

    struct Fixture {
        host: TestHost,
        connector: MockConnector,
        panel: DevToolsPanel,
    }

    fn fixture() -> Fixture {
        let host = TestHost::new();
        let connector = MockConnector::default();
        let panel = DevToolsPanel::create(
            "ws://127.0.0.1:9222/devtools/page/1",
            RuntimeConfig::default(),
            host.services(),
            &connector,
            None,
        )
        .expect("panel");
        Fixture {
            host,
            connector,
            panel,
        }
    }

    fn ready(reconnect: bool) -> ChannelMessage {
        ChannelMessage::json(Channel::Ready, &ReadyPayload { reconnect }).expect("encode")
    }

    fn version(revision: &str, headless: bool) -> VersionParameters {
        VersionParameters {
            revision: revision.into(),
            is_headless: headless,
        }
    }

    #[tokio::test]
    async fn test_create_arms_probe() {
        let f = fixture();
        assert_eq!(f.connector.probe_at(0).detections(), 1);
        assert_eq!(f.host.surfaces.count(), 1);
        assert_eq!(f.host.surfaces.surface(0).render_count(), 0);
    }

    #[tokio::test]
    async fn test_version_resolution_renders_every_time() {
        let f = fixture();
        let surface = f.host.surfaces.surface(0);
        let probe = f.connector.probe_at(0);

        probe.resolve(version("@aaa", false));
        assert!(wait_until(|| surface.render_count() == 1).await);
        assert!(surface.last_html().is_some_and(|h| h.contains("/@aaa/vscode_app.html")));

        probe.resolve(version("@bbb", true));
        assert!(wait_until(|| surface.render_count() == 2).await);
        let html = surface.last_html().unwrap_or_default();
        assert!(html.contains("/@bbb/vscode_app.html"));
        assert!(html.contains("headless=true"));
    }

    #[tokio::test]
    async fn test_standalone_screencast_suppresses_headless() {
        let f = fixture();
        f.host.settings.screencast.store(true, Ordering::SeqCst);

        f.panel.inner.on_version(version("@aaa", true));
        let html = f.host.surfaces.surface(0).last_html().unwrap_or_default();
        assert!(html.contains("headless=false"));
        assert!(html.contains("standaloneScreencast=true"));
    }

    #[tokio::test]
    async fn test_theme_change_renders_only_when_visible() {
        let f = fixture();
        let surface = f.host.surfaces.surface(0);

        f.panel.inner.on_surface_event(SurfaceEvent::ThemeChanged);
        assert_eq!(surface.render_count(), 1);

        surface.visible.store(false, Ordering::SeqCst);
        f.panel.inner.on_surface_event(SurfaceEvent::ThemeChanged);
        assert_eq!(surface.render_count(), 1);
    }

    #[tokio::test]
    async fn test_visibility_regained_without_connection_rearms_probe() {
        let f = fixture();
        let probe = f.connector.probe_at(0);

        f.panel
            .inner
            .on_surface_event(SurfaceEvent::ViewStateChanged { visible: true });
        assert_eq!(probe.detections(), 2);
        assert_eq!(f.host.surfaces.surface(0).render_count(), 0);

        f.panel
            .inner
            .on_surface_event(SurfaceEvent::ViewStateChanged { visible: false });
        assert_eq!(probe.detections(), 2);
    }

    #[tokio::test]
    async fn test_visibility_regained_while_connected_renders() {
        let f = fixture();
        f.connector.bridge_at(0).connected.store(true, Ordering::SeqCst);

        f.panel
            .inner
            .on_surface_event(SurfaceEvent::ViewStateChanged { visible: true });
        assert_eq!(f.host.surfaces.surface(0).render_count(), 1);
        assert_eq!(f.connector.probe_at(0).detections(), 1);
    }

    #[tokio::test]
    async fn test_surface_messages_go_through_bridge() {
        let f = fixture();
        let sender = f.host.surfaces.sender(0);
        sender
            .send(SurfaceEvent::Message("copyText:{\"clipboardData\":\"hi\"}".into()))
            .expect("send");

        assert!(wait_until(|| f.host.clipboard.texts.lock().len() == 1).await);
        assert_eq!(f.connector.bridge_at(0).received.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_dispose_is_idempotent_with_one_duration_event() {
        let f = fixture();
        f.panel.inner.handle_message(ready(false));

        f.panel.dispose();
        f.panel.dispose();

        assert!(f.panel.is_disposed());
        assert_eq!(f.host.surfaces.surface(0).disposed.load(Ordering::SeqCst), 1);
        assert_eq!(f.connector.bridge_at(0).disposed(), 1);
        assert_eq!(f.connector.probe_at(0).disposed(), 1);
        assert_eq!(f.host.telemetry.count(DISPOSE_EVENT), 1);

        let event = f
            .host
            .telemetry
            .events()
            .into_iter()
            .find(|e| e.name == DISPOSE_EVENT)
            .expect("dispose event");
        assert!(event.measures.contains_key("duration"));
    }

    #[tokio::test]
    async fn test_dispose_without_session_emits_no_duration() {
        let f = fixture();
        f.panel.dispose();
        assert_eq!(f.host.telemetry.count(DISPOSE_EVENT), 0);
    }

    #[tokio::test]
    async fn test_surface_disposed_event_disposes_panel() {
        let f = fixture();
        f.host
            .surfaces
            .sender(0)
            .send(SurfaceEvent::Disposed)
            .expect("send");
        assert!(wait_until(|| f.panel.is_disposed()).await);
        assert_eq!(f.connector.bridge_at(0).disposed(), 1);
    }

    #[tokio::test]
    async fn test_release_hook_runs_once() {
        let host = TestHost::new();
        let connector = MockConnector::default();
        let released = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&released);

        let panel = DevToolsPanel::create(
            "ws://t",
            RuntimeConfig::default(),
            host.services(),
            &connector,
            Some(Box::new(move |id| sink.lock().push(id))),
        )
        .expect("panel");

        panel.dispose();
        panel.dispose();
        assert_eq!(*released.lock(), vec![panel.id()]);
    }

    #[tokio::test]
    async fn test_render_uses_base_override() {
        let host = TestHost::new();
        let connector = MockConnector::default();
        let config = RuntimeConfig::builder()
            .devtools_base_uri("http://localhost:9000/app.html")
            .build()
            .expect("config");
        let panel = DevToolsPanel::create("ws://t", config, host.services(), &connector, None)
            .expect("panel");

        panel.inner.render();
        let html = host.surfaces.surface(0).last_html().unwrap_or_default();
        assert!(html.contains("src=\"http://localhost:9000/app.html?experiments=true"));
        assert!(html.contains("frame-src 'self' vscode-webview://panel http://localhost:9000;"));
    }
}
