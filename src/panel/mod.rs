//! Panel orchestration.
//!
//! A panel pairs one display surface with one socket bridge and one version
//! probe, and routes every surface channel to its handler.
//!
//! # Event Flow
//!
//! ```text
//! surface ──SurfaceEvent──► event loop ──raw──► SocketBridge ──ChannelMessage──┐
//!    ▲                          ▲                                             │
//!    │                          └───────────────── handle_message ◄───────────┘
//!    └────── replies, set_html ◄───── handlers
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `core` | [`DevToolsPanel`] lifecycle, rendering and event loop |
//! | `handlers` | Per-channel dispatch |
//! | `registry` | [`PanelRegistry`] owning the primary panel |
//! | `session` | [`Session`] state |

// ============================================================================
// Submodules
// ============================================================================

/// Panel lifecycle and event loop.
pub mod core;

/// Per-channel handlers.
pub mod handlers;

/// Primary-panel owner.
pub mod registry;

/// Session state.
pub mod session;

// ============================================================================
// Re-exports
// ============================================================================

pub use core::{CONNECT_EVENT, DISPOSE_EVENT, DevToolsPanel, PANEL_TITLE, RECONNECT_EVENT};
pub use handlers::PREFERENCES_KEY;
pub use registry::PanelRegistry;
pub use session::Session;
