//! Channel dispatch.
//!
//! Every [`Channel`] has exactly one handler. Request channels (`getState`,
//! `getVscodeSettings`, `getUrl`) reply once with the request id echoed;
//! the rest are fire-and-forget. Malformed payloads are logged and dropped.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, trace, warn};

use crate::host::{Measures, Properties};
use crate::protocol::payload::{
    self, CopyTextRequest, CssMirrorRequest, FocusRequest, GetUrlRequest, HostSettingsReply,
    IdRequest, OpenInEditorRequest, OpenUrlRequest, SetStateRequest, StateReply, UrlReply,
    detect_inspect_mode,
};
use crate::protocol::{Channel, ChannelMessage, ReadyPayload, TelemetryData, VersionParameters};
use crate::translate::{EditorTarget, to_workspace_uri, unresolved_message};

use super::core::{CONNECT_EVENT, PanelInner, RECONNECT_EVENT};

// ============================================================================
// Constants
// ============================================================================

/// State-store key holding the front-end preferences object.
pub const PREFERENCES_KEY: &str = "devtools-preferences";

// ============================================================================
// Dispatch
// ============================================================================

impl PanelInner {
    /// Dispatches one message from the bridge.
    pub(crate) fn handle_message(self: &Arc<Self>, message: ChannelMessage) {
        if self.is_disposed() {
            trace!(channel = %message.channel, "Message after dispose dropped");
            return;
        }

        trace!(channel = %message.channel, "Dispatching");

        match message.channel {
            Channel::Ready => self.on_ready(&message),
            Channel::Websocket => self.on_websocket(&message),
            Channel::Telemetry => self.on_telemetry(&message),
            Channel::GetState => self.on_get_state(&message),
            Channel::GetHostSettings => self.on_get_host_settings(&message),
            Channel::SetState => self.on_set_state(&message),
            Channel::GetUrl => self.on_get_url(&message),
            Channel::OpenUrl => self.on_open_url(&message),
            Channel::OpenInEditor => self.on_open_in_editor(&message),
            Channel::ToggleScreencast => self.host.screencast.toggle(),
            Channel::CssMirrorContent => self.on_css_mirror(&message),
            Channel::Close => self.dispose(),
            Channel::CopyText => self.on_copy_text(&message),
            Channel::FocusEditor => self.on_focus(&message, false),
            Channel::FocusEditorGroup => self.on_focus(&message, true),
            Channel::VersionParameters => self.on_version_parameters(&message),
        }
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    fn on_ready(&self, message: &ChannelMessage) {
        let ready: ReadyPayload = decode_or_log(message).unwrap_or_default();
        let first = self.session.lock().start();

        // Session start alone decides connect vs reconnect.
        let event = if first { CONNECT_EVENT } else { RECONNECT_EVENT };

        debug!(panel = %self.id, event, socket_reconnect = ready.reconnect, "Target connected");
        self.host
            .telemetry
            .send_event(event, Properties::default(), Measures::default());
    }

    fn on_version_parameters(&self, message: &ChannelMessage) {
        if let Some(version) = decode_or_log::<VersionParameters>(message) {
            self.on_version(version);
        }
    }

    // ------------------------------------------------------------------------
    // Protocol and telemetry
    // ------------------------------------------------------------------------

    fn on_websocket(&self, message: &ChannelMessage) {
        if let Some(active) = detect_inspect_mode(&message.payload) {
            trace!(active, "Inspect mode toggled");
            self.host.screencast.set_inspect_mode(active);
        }
    }

    fn on_telemetry(&self, message: &ChannelMessage) {
        if let Some(data) = decode_or_log::<TelemetryData>(message) {
            data.emit(self.host.telemetry.as_ref());
        }
    }

    // ------------------------------------------------------------------------
    // State and settings
    // ------------------------------------------------------------------------

    fn on_get_state(&self, message: &ChannelMessage) {
        let Some(IdRequest { id }) = decode_or_log(message) else {
            return;
        };

        let preferences = self
            .host
            .state
            .get(PREFERENCES_KEY)
            .unwrap_or_else(|| json!({}));

        self.reply(Channel::GetState, &StateReply { id, preferences });
    }

    fn on_set_state(&self, message: &ChannelMessage) {
        let Some(SetStateRequest { name, value }) = decode_or_log(message) else {
            return;
        };

        let mut preferences = self
            .host
            .state
            .get(PREFERENCES_KEY)
            .filter(Value::is_object)
            .unwrap_or_else(|| json!({}));

        if let Some(map) = preferences.as_object_mut() {
            map.insert(name, value);
        }
        self.host.state.update(PREFERENCES_KEY, preferences);
    }

    fn on_get_host_settings(&self, message: &ChannelMessage) {
        let Some(IdRequest { id }) = decode_or_log(message) else {
            return;
        };

        let settings = &self.host.settings;
        let reply = HostSettingsReply {
            id,
            enable_network: settings.network_enabled(),
            theme_string: settings.theme(),
            welcome: settings.welcome_enabled(),
            is_headless: self.headless(),
            standalone_screencast: settings.standalone_screencast_enabled(),
        };

        self.reply(Channel::GetHostSettings, &reply);
    }

    // ------------------------------------------------------------------------
    // Network and editor
    // ------------------------------------------------------------------------

    fn on_get_url(self: &Arc<Self>, message: &ChannelMessage) {
        let Some(GetUrlRequest { id, url }) = decode_or_log(message) else {
            return;
        };
        let Some(url) = url.filter(|url| !url.is_empty()) else {
            self.reply(Channel::GetUrl, &UrlReply { id, content: String::new() });
            return;
        };

        let panel = Arc::clone(self);
        self.spawn_task(async move {
            let content = match panel.host.fetcher.fetch(&url).await {
                Ok(content) => content,
                Err(e) => {
                    debug!(url = %url, error = %e, "Fetch failed, replying empty");
                    String::new()
                }
            };
            panel.reply(Channel::GetUrl, &UrlReply { id, content });
        });
    }

    fn on_open_url(&self, message: &ChannelMessage) {
        if let Some(OpenUrlRequest { url }) = decode_or_log(message) {
            self.host.opener.open_external(&url);
        }
    }

    fn on_open_in_editor(self: &Arc<Self>, message: &ChannelMessage) {
        let Some(request) = decode_or_log::<OpenInEditorRequest>(message) else {
            return;
        };

        let panel = Arc::clone(self);
        self.spawn_task(async move { panel.open_in_editor(request).await });
    }

    async fn open_in_editor(&self, request: OpenInEditorRequest) {
        let lookup = to_workspace_uri(&request.url, &self.config, self.host.workspace.as_ref());
        let appended = lookup.entrypoint_appended;

        match lookup.target.with_position(request.line, request.column) {
            EditorTarget::Resolved { path, position } => {
                let opened = self
                    .host
                    .editor
                    .open_document(&path, position, request.ignore_tab_changes)
                    .await;

                if let Err(e) = opened {
                    warn!(path = %path, error = %e, "Editor open failed");
                    self.host
                        .dialogs
                        .show_information(&format!("Could not open '{path}' in the editor: {e}"));
                }
            }
            EditorTarget::Unresolved { reason } => {
                debug!(url = %request.url, reason = %reason, "No workspace document");
                self.host
                    .dialogs
                    .show_information(&unresolved_message(&request.url, &reason, appended));
            }
        }
    }

    fn on_css_mirror(self: &Arc<Self>, message: &ChannelMessage) {
        if !self.host.settings.css_mirror_enabled() {
            trace!("Stylesheet mirroring disabled");
            return;
        }

        let Some(request) = decode_or_log::<CssMirrorRequest>(message) else {
            return;
        };

        let panel = Arc::clone(self);
        self.spawn_task(async move { panel.mirror_stylesheet(request).await });
    }

    async fn mirror_stylesheet(&self, request: CssMirrorRequest) {
        let lookup = to_workspace_uri(&request.url, &self.config, self.host.workspace.as_ref());

        match lookup.target {
            EditorTarget::Resolved { path, .. } => {
                let replaced = self
                    .host
                    .editor
                    .replace_document_content(&path, &request.new_content)
                    .await;

                if let Err(e) = replaced {
                    warn!(path = %path, error = %e, "Stylesheet mirror failed");
                    self.host
                        .dialogs
                        .show_information(&format!("Could not update '{path}': {e}"));
                }
            }
            EditorTarget::Unresolved { reason } => {
                self.host.dialogs.show_information(&unresolved_message(
                    &request.url,
                    &reason,
                    lookup.entrypoint_appended,
                ));
            }
        }
    }

    // ------------------------------------------------------------------------
    // Clipboard and focus
    // ------------------------------------------------------------------------

    fn on_copy_text(&self, message: &ChannelMessage) {
        if let Some(CopyTextRequest { clipboard_data }) = decode_or_log(message) {
            self.host.clipboard.write_text(&clipboard_data);
        }
    }

    fn on_focus(&self, message: &ChannelMessage, group: bool) {
        let next = decode_or_log::<FocusRequest>(message).is_none_or(|r| r.next);
        if group {
            self.host.editor.focus_editor_group(next);
        } else {
            self.host.editor.focus_editor(next);
        }
    }
}

/// Decodes a payload, logging and discarding malformed input.
fn decode_or_log<T: DeserializeOwned>(message: &ChannelMessage) -> Option<T> {
    match payload::decode(message) {
        Ok(value) => Some(value),
        Err(e) if message.channel.is_request() => {
            warn!(channel = %message.channel, error = %e, "Request without usable id left unanswered");
            None
        }
        Err(e) => {
            debug!(channel = %message.channel, error = %e, "Malformed payload ignored");
            None
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
