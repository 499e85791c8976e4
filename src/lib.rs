//! DevTools Bridge - Message-routing core for an embedded devtools panel.
//!
//! This library connects a browser devtools front-end running inside an IDE
//! panel to a live browser debugging target.
//!
//! # Architecture
//!
//! The bridge sits between two peers:
//!
//! - **Display surface**: The IDE webview hosting the devtools front-end
//! - **Debugging target**: A browser page reachable over WebSocket
//!
//! Key design principles:
//!
//! - Each [`DevToolsPanel`] owns: surface + socket bridge + version probe + event loop
//! - Surface messages use `<channel>:<payload>` framing over a closed [`Channel`] set
//! - One [`PanelRegistry`] owns the primary panel (no process-wide global)
//! - Every host capability is a trait in [`host`]; nothing here talks to an IDE directly
//!
//! # Quick Start
//!
//! ```no_run
//! use devtools_bridge::{HostServices, PanelRegistry, Result, RuntimeConfig};
//!
//! fn open(host: HostServices) -> Result<()> {
//!     let registry = PanelRegistry::new(host);
//!
//!     let config = RuntimeConfig::builder()
//!         .default_entrypoint("index.html")
//!         .path_mapping("/src/", "${webRoot}/src/")
//!         .web_root("/home/me/project")
//!         .build()?;
//!
//!     let panel = registry.open("ws://127.0.0.1:9222/devtools/page/1", config)?;
//!     println!("Opened panel {}", panel.id());
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`config`] | [`RuntimeConfig`] and path-mapping rules |
//! | [`document`] | Hosted document synthesis |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`host`] | Host collaborator traits |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`panel`] | Panel orchestration and registry |
//! | [`protocol`] | Surface channel envelope and payloads |
//! | [`translate`] | Remote URL to workspace path translation |
//! | [`transport`] | Target WebSocket bridge and version probe |

// ============================================================================
// Modules
// ============================================================================

/// Session configuration.
///
/// Use [`RuntimeConfig::builder()`] or [`RuntimeConfig::from_json()`].
pub mod config;

/// Hosted document synthesis.
pub mod document;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Host collaborator traits.
pub mod host;

/// Type-safe identifiers for sessions, panels and requests.
pub mod identifiers;

/// Panel orchestration.
///
/// - [`DevToolsPanel`] - One surface bound to one target
/// - [`PanelRegistry`] - Owner of the primary panel
pub mod panel;

/// Surface message protocol.
pub mod protocol;

/// Remote URL to workspace path translation.
pub mod translate;

/// Target WebSocket transport.
///
/// Socket bridge variants and the version probe.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Configuration
pub use config::{PathMapping, PathMappings, RuntimeConfig, RuntimeConfigBuilder};

// Error types
pub use error::{Error, Result};

// Host collaborators
pub use host::{FsWorkspaceResolver, HostServices, SurfaceEvent};

// Identifier types
pub use identifiers::{PanelId, RequestId, SessionId};

// Panel types
pub use panel::{DevToolsPanel, PanelRegistry, Session};

// Protocol types
pub use protocol::{Channel, ChannelMessage, TelemetryData};

// Translation
pub use translate::{EditorTarget, UnresolvedReason};

// Transport types
pub use transport::{
    BridgeState, DirectBridge, ProxiedBridge, SocketBridge, TargetConnector, VersionProbe,
    WebSocketConnector,
};
