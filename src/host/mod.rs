//! Host collaborator interfaces.
//!
//! Everything outside the routing core (panel windowing, storage, settings,
//! telemetry, editor, network fetch, screencast) is reached through the
//! traits in this module. The embedding application supplies one
//! implementation of each, bundled in [`HostServices`].
//!
//! # Collaborators
//!
//! | Trait | Responsibility |
//! |-------|----------------|
//! | [`SurfaceFactory`] / [`DisplaySurface`] | Create and drive the webview panel |
//! | [`StateStore`] | Key-value persistence for front-end preferences |
//! | [`SettingsProvider`] | Read-only user settings |
//! | [`TelemetrySink`] | Event emission |
//! | [`WorkspaceResolver`] | Map a path to a document inside a workspace root |
//! | [`Dialogs`] | Non-fatal information messages |
//! | [`EditorHost`] | Open documents, replace content, move focus |
//! | [`Clipboard`] | Clipboard writes |
//! | [`ExternalOpener`] | Open addresses in the system browser |
//! | [`ContentFetcher`] | Fetch remote resource content |
//! | [`ScreencastControl`] | Standalone screencast panel |
//! | [`ProxyResolver`] | Request a debug-proxy endpoint |

// ============================================================================
// Submodules
// ============================================================================

/// Filesystem-backed workspace resolver.
pub mod workspace;

/// In-memory collaborators for tests.
#[cfg(test)]
pub(crate) mod testing;

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::config::PathMappings;
use crate::error::Result;

pub use workspace::FsWorkspaceResolver;

// ============================================================================
// Types
// ============================================================================

/// String properties attached to a telemetry event.
pub type Properties = FxHashMap<String, String>;

/// Numeric measures attached to a telemetry event.
pub type Measures = FxHashMap<String, f64>;

/// Receiver half of a surface's event stream.
pub type SurfaceEvents = mpsc::UnboundedReceiver<SurfaceEvent>;

// ============================================================================
// Display Surface
// ============================================================================

/// Events raised by a display surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceEvent {
    /// Raw `<channel>:<payload>` message from the front-end.
    Message(String),
    /// Visibility changed.
    ViewStateChanged {
        /// New visibility.
        visible: bool,
    },
    /// Workspace color theme changed.
    ThemeChanged,
    /// The surface was closed by the user or host.
    Disposed,
}

/// Options for creating a surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceOptions {
    /// Panel title.
    pub title: String,
    /// Preferred editor column.
    pub column: Option<u32>,
}

/// The webview panel hosting the devtools front-end.
pub trait DisplaySurface: Send + Sync {
    /// Queues an encoded message for the front-end.
    fn post_message(&self, message: String);

    /// Replaces the surface markup.
    fn set_html(&self, html: String);

    /// Returns whether the surface is currently visible.
    fn is_visible(&self) -> bool;

    /// Returns the editor column the surface lives in.
    fn view_column(&self) -> Option<u32>;

    /// Brings the surface forward.
    fn reveal(&self, column: Option<u32>);

    /// Closes the surface.
    fn dispose(&self);

    /// Origin the surface's own resources are served from (CSP source).
    fn csp_source(&self) -> String;

    /// Maps a bundled asset path to a surface-local address.
    fn asset_uri(&self, asset: &str) -> String;
}

/// Creates display surfaces.
pub trait SurfaceFactory: Send + Sync {
    /// Creates a surface and returns it with its event stream.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Host`] if the host cannot create the panel.
    fn create(&self, options: &SurfaceOptions)
    -> Result<(Arc<dyn DisplaySurface>, SurfaceEvents)>;
}

// ============================================================================
// Storage and Settings
// ============================================================================

/// Key-value persistence.
pub trait StateStore: Send + Sync {
    /// Reads a stored value.
    fn get(&self, key: &str) -> Option<Value>;

    /// Writes a value.
    fn update(&self, key: &str, value: Value);
}

/// Read-only user settings.
pub trait SettingsProvider: Send + Sync {
    /// Network panel enabled.
    fn network_enabled(&self) -> bool;

    /// Front-end theme name (`dark`, `light`, `systemPreferred`).
    fn theme(&self) -> String;

    /// Welcome page enabled.
    fn welcome_enabled(&self) -> bool;

    /// Headless screencast enabled.
    fn headless_enabled(&self) -> bool;

    /// Standalone screencast panel enabled.
    fn standalone_screencast_enabled(&self) -> bool;

    /// Stylesheet edits are mirrored into workspace files.
    fn css_mirror_enabled(&self) -> bool;
}

// ============================================================================
// Telemetry
// ============================================================================

/// Telemetry event sink.
pub trait TelemetrySink: Send + Sync {
    /// Emits an event.
    fn send_event(&self, name: &str, properties: Properties, measures: Measures);

    /// Emits an error event.
    fn send_error_event(&self, name: &str, properties: Properties);
}

// ============================================================================
// Workspace and Editor
// ============================================================================

/// Result of a workspace path lookup.
///
/// An empty `origin` means the path was confirmed inside a workspace root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    /// Local path (possibly rewritten).
    pub path: String,
    /// Remote origin the path could not be mapped away from; empty on success.
    pub origin: String,
}

impl ResolvedPath {
    /// Returns `true` if the lookup succeeded.
    #[inline]
    #[must_use]
    pub fn is_local(&self) -> bool {
        self.origin.is_empty()
    }
}

/// Maps a path to a document inside a known workspace root.
pub trait WorkspaceResolver: Send + Sync {
    /// Resolves `path`, honoring `mapping`.
    fn resolve(&self, path: &str, mapping: &PathMappings) -> ResolvedPath;
}

/// Non-fatal user-visible messages.
pub trait Dialogs: Send + Sync {
    /// Shows an information message.
    fn show_information(&self, message: &str);
}

/// Editor operations.
#[async_trait]
pub trait EditorHost: Send + Sync {
    /// Opens a document, optionally placing the cursor.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Host`] if the document cannot be opened.
    async fn open_document(
        &self,
        path: &str,
        position: Option<(u32, u32)>,
        preserve_focus: bool,
    ) -> Result<()>;

    /// Replaces the full text of a document.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Host`] if the document cannot be edited.
    async fn replace_document_content(&self, path: &str, content: &str) -> Result<()>;

    /// Moves focus to the next or previous editor.
    fn focus_editor(&self, next: bool);

    /// Moves focus to the next or previous editor group.
    fn focus_editor_group(&self, next: bool);
}

// ============================================================================
// Misc Collaborators
// ============================================================================

/// Clipboard writes.
pub trait Clipboard: Send + Sync {
    /// Replaces the clipboard text.
    fn write_text(&self, text: &str);
}

/// Opens addresses outside the IDE.
pub trait ExternalOpener: Send + Sync {
    /// Opens `url` in the system browser.
    fn open_external(&self, url: &str);
}

/// Remote content fetch.
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    /// Fetches `url` as text.
    ///
    /// # Errors
    ///
    /// Any error; the caller degrades to empty content.
    async fn fetch(&self, url: &str) -> Result<String>;
}

/// Standalone screencast panel.
pub trait ScreencastControl: Send + Sync {
    /// Opens or closes the screencast.
    fn toggle(&self);

    /// Tells the screencast whether element picking is active.
    fn set_inspect_mode(&self, active: bool);
}

/// Debug-proxy endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyEndpoint {
    /// Proxy host.
    pub host: String,
    /// Proxy port.
    pub port: u16,
    /// Optional path component.
    pub path: Option<String>,
}

impl ProxyEndpoint {
    /// Returns the WebSocket address of the proxy.
    #[must_use]
    pub fn ws_url(&self) -> String {
        format!(
            "ws://{}:{}{}",
            self.host,
            self.port,
            self.path.as_deref().unwrap_or_default()
        )
    }
}

/// Requests a debug-proxy endpoint for a debug session.
#[async_trait]
pub trait ProxyResolver: Send + Sync {
    /// Resolves the proxy serving `debug_session_id`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Host`] if the debug session has no proxy.
    async fn request_proxy(&self, debug_session_id: &str) -> Result<ProxyEndpoint>;
}

// ============================================================================
// HostServices
// ============================================================================

/// Bundle of host collaborators shared by every panel.
#[derive(Clone)]
pub struct HostServices {
    /// Surface creation.
    pub surfaces: Arc<dyn SurfaceFactory>,
    /// Preference persistence.
    pub state: Arc<dyn StateStore>,
    /// User settings.
    pub settings: Arc<dyn SettingsProvider>,
    /// Telemetry.
    pub telemetry: Arc<dyn TelemetrySink>,
    /// Workspace path lookup.
    pub workspace: Arc<dyn WorkspaceResolver>,
    /// Information messages.
    pub dialogs: Arc<dyn Dialogs>,
    /// Editor operations.
    pub editor: Arc<dyn EditorHost>,
    /// Clipboard.
    pub clipboard: Arc<dyn Clipboard>,
    /// External browser.
    pub opener: Arc<dyn ExternalOpener>,
    /// Remote content fetch.
    pub fetcher: Arc<dyn ContentFetcher>,
    /// Screencast panel.
    pub screencast: Arc<dyn ScreencastControl>,
    /// Debug-proxy lookup.
    pub proxies: Arc<dyn ProxyResolver>,
}

impl fmt::Debug for HostServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostServices").finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================
