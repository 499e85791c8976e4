//! Channel names and the surface message envelope.
//!
//! Every message crossing the display-surface transport is framed as
//! `<channel>:<payload>`, where the payload is an opaque string (usually
//! JSON). Only the orchestrator's handler for a channel interprets it.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Separator between channel name and payload.
const CHANNEL_SEPARATOR: char = ':';

// ============================================================================
// Channel
// ============================================================================

/// Logical sub-streams multiplexed over the surface transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Connection lifecycle (`ready`).
    Ready,
    /// Raw protocol frames to or from the target (`websocket`).
    Websocket,
    /// Telemetry events from the front-end (`telemetry`).
    Telemetry,
    /// Persisted preferences request (`getState`).
    GetState,
    /// Host settings request (`getVscodeSettings`).
    GetHostSettings,
    /// Persisted preference update (`setState`).
    SetState,
    /// Remote URL content request (`getUrl`).
    GetUrl,
    /// Open an address in the external browser (`openUrl`).
    OpenUrl,
    /// Open a remote resource in the local editor (`openInEditor`).
    OpenInEditor,
    /// Toggle the standalone screencast (`toggleScreencast`).
    ToggleScreencast,
    /// Mirror a stylesheet edit into the workspace (`cssMirrorContent`).
    CssMirrorContent,
    /// Close the session (`close`).
    Close,
    /// Copy text to the clipboard (`copyText`).
    CopyText,
    /// Move focus to the next/previous editor (`focusEditor`).
    FocusEditor,
    /// Move focus to the next/previous editor group (`focusEditorGroup`).
    FocusEditorGroup,
    /// Resolved hosted-document parameters (`setCdnParameters`).
    VersionParameters,
}

impl Channel {
    /// Every channel, in wire-table order.
    pub const ALL: [Self; 16] = [
        Self::Ready,
        Self::Websocket,
        Self::Telemetry,
        Self::GetState,
        Self::GetHostSettings,
        Self::SetState,
        Self::GetUrl,
        Self::OpenUrl,
        Self::OpenInEditor,
        Self::ToggleScreencast,
        Self::CssMirrorContent,
        Self::Close,
        Self::CopyText,
        Self::FocusEditor,
        Self::FocusEditorGroup,
        Self::VersionParameters,
    ];

    /// Returns the wire name.
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Websocket => "websocket",
            Self::Telemetry => "telemetry",
            Self::GetState => "getState",
            Self::GetHostSettings => "getVscodeSettings",
            Self::SetState => "setState",
            Self::GetUrl => "getUrl",
            Self::OpenUrl => "openUrl",
            Self::OpenInEditor => "openInEditor",
            Self::ToggleScreencast => "toggleScreencast",
            Self::CssMirrorContent => "cssMirrorContent",
            Self::Close => "close",
            Self::CopyText => "copyText",
            Self::FocusEditor => "focusEditor",
            Self::FocusEditorGroup => "focusEditorGroup",
            Self::VersionParameters => "setCdnParameters",
        }
    }

    /// Returns `true` for channels that must reply with the request id.
    #[inline]
    #[must_use]
    pub const fn is_request(&self) -> bool {
        matches!(self, Self::GetState | Self::GetHostSettings | Self::GetUrl)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|channel| channel.as_str() == name)
            .ok_or_else(|| Error::unknown_channel(name))
    }
}

// ============================================================================
// ChannelMessage
// ============================================================================

/// A `(channel, payload)` envelope exchanged in both directions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelMessage {
    /// Logical channel.
    pub channel: Channel,
    /// Opaque payload; empty when the channel carries no data.
    pub payload: String,
}

impl ChannelMessage {
    /// Creates a message with a raw payload.
    #[inline]
    #[must_use]
    pub fn new(channel: Channel, payload: impl Into<String>) -> Self {
        Self {
            channel,
            payload: payload.into(),
        }
    }

    /// Creates a message with a JSON-serialized payload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if serialization fails.
    pub fn json<T: Serialize>(channel: Channel, payload: &T) -> Result<Self> {
        Ok(Self::new(channel, serde_json::to_string(payload)?))
    }

    /// Decodes a raw surface message.
    ///
    /// Messages without a separator carry an empty payload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownChannel`] if the channel name is not recognized.
    pub fn decode(raw: &str) -> Result<Self> {
        let (name, payload) = raw.split_once(CHANNEL_SEPARATOR).unwrap_or((raw, ""));
        let channel = name.parse()?;
        Ok(Self::new(channel, payload))
    }

    /// Encodes into the `<channel>:<payload>` wire form.
    #[must_use]
    pub fn encode(&self) -> String {
        let mut out = String::with_capacity(self.channel.as_str().len() + 1 + self.payload.len());
        out.push_str(self.channel.as_str());
        out.push(CHANNEL_SEPARATOR);
        out.push_str(&self.payload);
        out
    }
}

// ============================================================================
// Tests
// ============================================================================
