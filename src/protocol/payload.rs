//! Typed payloads carried on each channel.
//!
//! Inbound payloads are decoded lazily by the handler for their channel;
//! outbound replies are serialized into [`ChannelMessage`]s.
//!
//! # Formats
//!
//! | Channel | Inbound | Reply |
//! |---------|---------|-------|
//! | `getState` | `{id}` | `{id, preferences}` |
//! | `getVscodeSettings` | `{id}` | `{id, enableNetwork, themeString, ...}` |
//! | `getUrl` | `{id, url}` | `{id, content}` |
//! | `websocket` | `{message}` | `{event, message?}` |

// ============================================================================
// Imports
// ============================================================================

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::identifiers::RequestId;

use super::channel::{Channel, ChannelMessage};

// ============================================================================
// Constants
// ============================================================================

/// Protocol method toggling element-picking in the target.
const SET_INSPECT_MODE_METHOD: &str = "Overlay.setInspectMode";

/// Inspect mode value meaning "picking is active".
const SEARCH_FOR_NODE_MODE: &str = "searchForNode";

// ============================================================================
// Decoding
// ============================================================================

/// Decodes a message payload into `T`.
///
/// An empty payload is treated as `{}` so channels with all-default fields
/// accept bare messages.
///
/// # Errors
///
/// Returns [`Error::InvalidPayload`] naming the channel on shape mismatch.
pub fn decode<T: DeserializeOwned>(message: &ChannelMessage) -> Result<T> {
    let payload = if message.payload.trim().is_empty() {
        "{}"
    } else {
        message.payload.as_str()
    };

    serde_json::from_str(payload)
        .map_err(|e| Error::invalid_payload(message.channel.as_str(), e.to_string()))
}

// ============================================================================
// Inbound Payloads
// ============================================================================

/// Bare request carrying only an id (`getState`, `getVscodeSettings`).
#[derive(Debug, Clone, Deserialize)]
pub struct IdRequest {
    /// Caller's request id.
    pub id: RequestId,
}

/// Remote content request.
#[derive(Debug, Clone, Deserialize)]
pub struct GetUrlRequest {
    /// Caller's request id.
    pub id: RequestId,
    /// Address to fetch. Missing or `null` replies with empty content.
    #[serde(default)]
    pub url: Option<String>,
}

/// Preference update.
#[derive(Debug, Clone, Deserialize)]
pub struct SetStateRequest {
    /// Preference name.
    pub name: String,
    /// New value (any JSON).
    #[serde(default)]
    pub value: Value,
}

/// External URL open request.
#[derive(Debug, Clone, Deserialize)]
pub struct OpenUrlRequest {
    /// Address to open.
    pub url: String,
}

/// Editor open request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenInEditorRequest {
    /// Remote resource URL.
    pub url: String,
    /// Zero-based line hint.
    #[serde(default)]
    pub line: Option<u32>,
    /// Zero-based column hint.
    #[serde(default)]
    pub column: Option<u32>,
    /// Open without stealing focus.
    #[serde(default)]
    pub ignore_tab_changes: bool,
}

/// Stylesheet mirror request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CssMirrorRequest {
    /// Remote stylesheet URL.
    pub url: String,
    /// Full new stylesheet text.
    pub new_content: String,
}

/// Clipboard write request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CopyTextRequest {
    /// Text to copy.
    pub clipboard_data: String,
}

/// Editor focus movement.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct FocusRequest {
    /// `true` moves forward, `false` backward.
    #[serde(default = "default_next")]
    pub next: bool,
}

fn default_next() -> bool {
    true
}

/// Connection lifecycle notification produced by the bridge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadyPayload {
    /// The bridge had already connected to the target once.
    #[serde(default)]
    pub reconnect: bool,
}

/// Hosted-document parameters resolved by the version probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionParameters {
    /// Hosted-document revision (`@<hash>`).
    pub revision: String,
    /// The target is a headless build.
    #[serde(default)]
    pub is_headless: bool,
}

/// Raw protocol frame sent by the front-end on `websocket`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebsocketPayload {
    /// Frame text destined for the target.
    #[serde(default)]
    pub message: Option<String>,
}

// ============================================================================
// Outbound Payloads
// ============================================================================

/// Target socket notification relayed to the front-end on `websocket`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum SocketNotice {
    /// Target socket opened.
    Open,
    /// Target socket closed.
    Close,
    /// Target socket failed.
    Error,
    /// Frame received from the target.
    Message {
        /// Frame text.
        message: String,
    },
}

impl SocketNotice {
    /// Wraps the notice into a `websocket` channel message.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if serialization fails.
    pub fn into_message(self) -> Result<ChannelMessage> {
        ChannelMessage::json(Channel::Websocket, &self)
    }
}

/// Reply to `getState`.
#[derive(Debug, Clone, Serialize)]
pub struct StateReply {
    /// Echoed request id.
    pub id: RequestId,
    /// Stored preferences, `{}` when nothing is stored.
    pub preferences: Value,
}

/// Reply to `getVscodeSettings`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HostSettingsReply {
    /// Echoed request id.
    pub id: RequestId,
    /// Network panel enabled.
    pub enable_network: bool,
    /// Front-end theme name.
    pub theme_string: String,
    /// Welcome page enabled.
    pub welcome: bool,
    /// Target is headless.
    pub is_headless: bool,
    /// Standalone screencast enabled.
    pub standalone_screencast: bool,
}

/// Reply to `getUrl`.
#[derive(Debug, Clone, Serialize)]
pub struct UrlReply {
    /// Echoed request id.
    pub id: RequestId,
    /// Fetched content, empty on failure.
    pub content: String,
}

// ============================================================================
// Best-effort Inspection
// ============================================================================

/// Detects an inspect-mode toggle inside a front-end protocol frame.
///
/// Returns `Some(active)` when the frame is `Overlay.setInspectMode`,
/// `None` for any other frame or any frame that fails to parse.
#[must_use]
pub fn detect_inspect_mode(payload: &str) -> Option<bool> {
    if !payload.contains(SET_INSPECT_MODE_METHOD) {
        return None;
    }

    let outer: WebsocketPayload = serde_json::from_str(payload).ok()?;
    let frame: Value = serde_json::from_str(outer.message.as_deref()?).ok()?;

    if frame.get("method").and_then(Value::as_str) != Some(SET_INSPECT_MODE_METHOD) {
        return None;
    }

    let mode = frame
        .get("params")
        .and_then(|p| p.get("mode"))
        .and_then(Value::as_str)?;

    Some(mode == SEARCH_FOR_NODE_MODE)
}

// ============================================================================
// Tests
// ============================================================================
