//! In-memory collaborators recording every call.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::config::PathMappings;
use crate::error::{Error, Result};

use super::{
    Clipboard, ContentFetcher, Dialogs, DisplaySurface, EditorHost, ExternalOpener, HostServices,
    Measures, Properties, ProxyEndpoint, ProxyResolver, ResolvedPath, ScreencastControl,
    SettingsProvider, StateStore, SurfaceEvent, SurfaceEvents, SurfaceFactory, SurfaceOptions,
    TelemetrySink, WorkspaceResolver,
};

// ============================================================================
// Surface
// ============================================================================

#[derive(Default)]
pub(crate) struct RecordingSurface {
    pub posted: Mutex<Vec<String>>,
    pub html: Mutex<Vec<String>>,
    pub visible: AtomicBool,
    pub disposed: AtomicUsize,
    pub reveals: AtomicUsize,
}

impl RecordingSurface {
    pub fn visible() -> Self {
        let surface = Self::default();
        surface.visible.store(true, Ordering::SeqCst);
        surface
    }

    pub fn posted(&self) -> Vec<String> {
        self.posted.lock().clone()
    }

    pub fn render_count(&self) -> usize {
        self.html.lock().len()
    }

    pub fn last_html(&self) -> Option<String> {
        self.html.lock().last().cloned()
    }
}

impl DisplaySurface for RecordingSurface {
    fn post_message(&self, message: String) {
        self.posted.lock().push(message);
    }

    fn set_html(&self, html: String) {
        self.html.lock().push(html);
    }

    fn is_visible(&self) -> bool {
        self.visible.load(Ordering::SeqCst)
    }

    fn view_column(&self) -> Option<u32> {
        Some(1)
    }

    fn reveal(&self, _column: Option<u32>) {
        self.reveals.fetch_add(1, Ordering::SeqCst);
    }

    fn dispose(&self) {
        self.disposed.fetch_add(1, Ordering::SeqCst);
    }

    fn csp_source(&self) -> String {
        "vscode-webview://panel".to_string()
    }

    fn asset_uri(&self, asset: &str) -> String {
        format!("vscode-webview://panel/{asset}")
    }
}

#[derive(Default)]
pub(crate) struct RecordingSurfaceFactory {
    pub created: Mutex<Vec<(Arc<RecordingSurface>, mpsc::UnboundedSender<SurfaceEvent>)>>,
}

impl RecordingSurfaceFactory {
    pub fn count(&self) -> usize {
        self.created.lock().len()
    }

    pub fn surface(&self, index: usize) -> Arc<RecordingSurface> {
        Arc::clone(&self.created.lock()[index].0)
    }

    pub fn sender(&self, index: usize) -> mpsc::UnboundedSender<SurfaceEvent> {
        self.created.lock()[index].1.clone()
    }
}

impl SurfaceFactory for RecordingSurfaceFactory {
    fn create(
        &self,
        _options: &SurfaceOptions,
    ) -> Result<(Arc<dyn DisplaySurface>, SurfaceEvents)> {
        let surface = Arc::new(RecordingSurface::visible());
        let (tx, rx) = mpsc::unbounded_channel();
        self.created.lock().push((Arc::clone(&surface), tx));
        Ok((surface, rx))
    }
}

// ============================================================================
// Storage and Settings
// ============================================================================

#[derive(Default)]
pub(crate) struct MemoryStore {
    pub values: Mutex<FxHashMap<String, Value>>,
}

impl StateStore for MemoryStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.lock().get(key).cloned()
    }

    fn update(&self, key: &str, value: Value) {
        self.values.lock().insert(key.to_string(), value);
    }
}

pub(crate) struct StaticSettings {
    pub theme: Mutex<String>,
    pub network: bool,
    pub welcome: bool,
    pub headless: AtomicBool,
    pub screencast: AtomicBool,
    pub css_mirror: AtomicBool,
}

impl Default for StaticSettings {
    fn default() -> Self {
        Self {
            theme: Mutex::new("dark".to_string()),
            network: true,
            welcome: true,
            headless: AtomicBool::new(false),
            screencast: AtomicBool::new(false),
            css_mirror: AtomicBool::new(true),
        }
    }
}

impl SettingsProvider for StaticSettings {
    fn network_enabled(&self) -> bool {
        self.network
    }

    fn theme(&self) -> String {
        self.theme.lock().clone()
    }

    fn welcome_enabled(&self) -> bool {
        self.welcome
    }

    fn headless_enabled(&self) -> bool {
        self.headless.load(Ordering::SeqCst)
    }

    fn standalone_screencast_enabled(&self) -> bool {
        self.screencast.load(Ordering::SeqCst)
    }

    fn css_mirror_enabled(&self) -> bool {
        self.css_mirror.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Telemetry
// ============================================================================

#[derive(Debug, Clone)]
pub(crate) struct RecordedEvent {
    pub name: String,
    pub properties: Properties,
    pub measures: Measures,
    pub is_error: bool,
}

#[derive(Default)]
pub(crate) struct RecordingTelemetry {
    pub recorded: Mutex<Vec<RecordedEvent>>,
}

impl RecordingTelemetry {
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.recorded.lock().clone()
    }

    pub fn count(&self, name: &str) -> usize {
        self.recorded.lock().iter().filter(|e| e.name == name).count()
    }
}

impl TelemetrySink for RecordingTelemetry {
    fn send_event(&self, name: &str, properties: Properties, measures: Measures) {
        self.recorded.lock().push(RecordedEvent {
            name: name.to_string(),
            properties,
            measures,
            is_error: false,
        });
    }

    fn send_error_event(&self, name: &str, properties: Properties) {
        self.recorded.lock().push(RecordedEvent {
            name: name.to_string(),
            properties,
            measures: Measures::default(),
            is_error: true,
        });
    }
}

// ============================================================================
// Workspace and Editor
// ============================================================================

/// Treats every path under `root` as local.
pub(crate) struct PrefixResolver {
    pub root: String,
}

impl PrefixResolver {
    pub fn new(root: impl Into<String>) -> Self {
        Self { root: root.into() }
    }
}

impl WorkspaceResolver for PrefixResolver {
    fn resolve(&self, path: &str, _mapping: &PathMappings) -> ResolvedPath {
        let origin = if path.starts_with(&self.root) {
            String::new()
        } else {
            "http://remote".to_string()
        };
        ResolvedPath {
            path: path.to_string(),
            origin,
        }
    }
}

#[derive(Default)]
pub(crate) struct RecordingDialogs {
    pub messages: Mutex<Vec<String>>,
}

impl RecordingDialogs {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }
}

impl Dialogs for RecordingDialogs {
    fn show_information(&self, message: &str) {
        self.messages.lock().push(message.to_string());
    }
}

#[derive(Default)]
pub(crate) struct RecordingEditor {
    pub opened: Mutex<Vec<(String, Option<(u32, u32)>)>>,
    pub replaced: Mutex<Vec<(String, String)>>,
    pub focus: Mutex<Vec<(&'static str, bool)>>,
    pub fail: AtomicBool,
}

#[async_trait]
impl EditorHost for RecordingEditor {
    async fn open_document(
        &self,
        path: &str,
        position: Option<(u32, u32)>,
        _preserve_focus: bool,
    ) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::host(format!("cannot open {path}")));
        }
        self.opened.lock().push((path.to_string(), position));
        Ok(())
    }

    async fn replace_document_content(&self, path: &str, content: &str) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::host(format!("cannot edit {path}")));
        }
        self.replaced
            .lock()
            .push((path.to_string(), content.to_string()));
        Ok(())
    }

    fn focus_editor(&self, next: bool) {
        self.focus.lock().push(("editor", next));
    }

    fn focus_editor_group(&self, next: bool) {
        self.focus.lock().push(("group", next));
    }
}

// ============================================================================
// Misc Collaborators
// ============================================================================

#[derive(Default)]
pub(crate) struct RecordingClipboard {
    pub texts: Mutex<Vec<String>>,
}

impl Clipboard for RecordingClipboard {
    fn write_text(&self, text: &str) {
        self.texts.lock().push(text.to_string());
    }
}

#[derive(Default)]
pub(crate) struct RecordingOpener {
    pub urls: Mutex<Vec<String>>,
}

impl ExternalOpener for RecordingOpener {
    fn open_external(&self, url: &str) {
        self.urls.lock().push(url.to_string());
    }
}

#[derive(Default)]
pub(crate) struct StaticFetcher {
    pub content: Mutex<FxHashMap<String, String>>,
}

#[async_trait]
impl ContentFetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        self.content
            .lock()
            .get(url)
            .cloned()
            .ok_or_else(|| Error::host(format!("404 for {url}")))
    }
}

#[derive(Default)]
pub(crate) struct RecordingScreencast {
    pub toggles: AtomicUsize,
    pub inspect: Mutex<Vec<bool>>,
}

impl ScreencastControl for RecordingScreencast {
    fn toggle(&self) {
        self.toggles.fetch_add(1, Ordering::SeqCst);
    }

    fn set_inspect_mode(&self, active: bool) {
        self.inspect.lock().push(active);
    }
}

pub(crate) struct StaticProxyResolver {
    pub endpoint: Option<ProxyEndpoint>,
}

#[async_trait]
impl ProxyResolver for StaticProxyResolver {
    async fn request_proxy(&self, debug_session_id: &str) -> Result<ProxyEndpoint> {
        self.endpoint
            .clone()
            .ok_or_else(|| Error::host(format!("no proxy for {debug_session_id}")))
    }
}

// ============================================================================
// TestHost
// ============================================================================

/// Concrete handles to every recording collaborator.
pub(crate) struct TestHost {
    pub surfaces: Arc<RecordingSurfaceFactory>,
    pub state: Arc<MemoryStore>,
    pub settings: Arc<StaticSettings>,
    pub telemetry: Arc<RecordingTelemetry>,
    pub dialogs: Arc<RecordingDialogs>,
    pub editor: Arc<RecordingEditor>,
    pub clipboard: Arc<RecordingClipboard>,
    pub opener: Arc<RecordingOpener>,
    pub fetcher: Arc<StaticFetcher>,
    pub screencast: Arc<RecordingScreencast>,
}

impl TestHost {
    pub fn new() -> Self {
        Self {
            surfaces: Arc::default(),
            state: Arc::default(),
            settings: Arc::default(),
            telemetry: Arc::default(),
            dialogs: Arc::default(),
            editor: Arc::default(),
            clipboard: Arc::default(),
            opener: Arc::default(),
            fetcher: Arc::default(),
            screencast: Arc::default(),
        }
    }

    pub fn services(&self) -> HostServices {
        HostServices {
            surfaces: self.surfaces.clone(),
            state: self.state.clone(),
            settings: self.settings.clone(),
            telemetry: self.telemetry.clone(),
            workspace: Arc::new(PrefixResolver::new("/workspace")),
            dialogs: self.dialogs.clone(),
            editor: self.editor.clone(),
            clipboard: self.clipboard.clone(),
            opener: self.opener.clone(),
            fetcher: self.fetcher.clone(),
            screencast: self.screencast.clone(),
            proxies: Arc::new(StaticProxyResolver { endpoint: None }),
        }
    }
}
