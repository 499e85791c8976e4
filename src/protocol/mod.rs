//! Surface message protocol.
//!
//! This module defines the envelope and payload formats exchanged between
//! the display surface (devtools front-end) and the bridge.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | [`ChannelMessage`] | Both | `<channel>:<payload>` envelope |
//! | Request payloads | Surface → Bridge | Typed inbound data per channel |
//! | Reply payloads | Bridge → Surface | Responses echoing the request id |
//! | [`SocketNotice`] | Bridge → Surface | Target socket lifecycle and frames |
//! | [`TelemetryData`] | Surface → Bridge | Front-end telemetry records |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `channel` | Channel names and envelope framing |
//! | `payload` | Typed payloads and best-effort decoding |
//! | `telemetry` | Telemetry record types |

// ============================================================================
// Submodules
// ============================================================================

/// Channel names and envelope framing.
pub mod channel;

/// Typed payloads per channel.
pub mod payload;

/// Front-end telemetry records.
pub mod telemetry;

// ============================================================================
// Re-exports
// ============================================================================

pub use channel::{Channel, ChannelMessage};
pub use payload::{ReadyPayload, SocketNotice, VersionParameters};
pub use telemetry::TelemetryData;
