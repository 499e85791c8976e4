//! Hosted document synthesis.
//!
//! Builds the markup loaded into the display surface: a thin shell page
//! with a strict content-security policy that embeds the externally hosted
//! devtools front-end in an iframe.
//!
//! # Layout
//!
//! 1. CSP meta tag scoped to the surface origin and the hosted origin
//! 2. Bundled stylesheet and host script (surface-local assets)
//! 3. `<iframe>` pointing at the hosted document with theme/mode flags
//! 4. Hidden error panel revealed by the host script if the frame fails

// ============================================================================
// Imports
// ============================================================================

use base64::Engine;
use base64::engine::general_purpose::STANDARD as Base64Standard;
use url::Url;
use uuid::Uuid;

// ============================================================================
// Constants
// ============================================================================

/// Base address of the hosted devtools front-end.
pub const DEFAULT_DEVTOOLS_BASE: &str = "https://devtools.azureedge.net/serve_file";

/// Hosted document served under each revision.
pub const HOSTED_DOCUMENT: &str = "vscode_app.html";

/// Bundled stylesheet path passed to [`crate::host::DisplaySurface::asset_uri`].
pub const STYLESHEET_ASSET: &str = "out/common/styles.css";

/// Bundled host script path passed to [`crate::host::DisplaySurface::asset_uri`].
pub const SCRIPT_ASSET: &str = "out/host/mainHost.bundle.js";

// ============================================================================
// DocumentParams
// ============================================================================

/// Inputs to [`build_document`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentParams<'a> {
    /// Full address of the hosted document.
    pub hosted_url: &'a str,
    /// Front-end theme name.
    pub theme: &'a str,
    /// Target is headless and the screencast should be embedded.
    pub headless: bool,
    /// Standalone screencast panel enabled.
    pub standalone_screencast: bool,
    /// Surface-local stylesheet address.
    pub stylesheet_uri: &'a str,
    /// Surface-local host script address.
    pub script_uri: &'a str,
    /// Surface origin for the CSP.
    pub csp_source: &'a str,
    /// Script nonce.
    pub nonce: &'a str,
}

impl DocumentParams<'_> {
    /// Headless flag as rendered: always `false` with the standalone screencast.
    #[inline]
    #[must_use]
    pub fn effective_headless(&self) -> bool {
        self.headless && !self.standalone_screencast
    }
}

// ============================================================================
// Public Functions
// ============================================================================

/// Returns the hosted document address for a revision.
///
/// `base_override` replaces the whole address when set.
#[must_use]
pub fn hosted_document_url(revision: &str, base_override: Option<&str>) -> String {
    match base_override {
        Some(base) => base.to_string(),
        None => format!("{DEFAULT_DEVTOOLS_BASE}/{revision}/{HOSTED_DOCUMENT}"),
    }
}

/// Generates a random CSP script nonce.
#[must_use]
pub fn generate_nonce() -> String {
    Base64Standard.encode(Uuid::new_v4().as_bytes())
}

/// Builds the iframe address with mode flags.
#[must_use]
pub fn frame_url(params: &DocumentParams<'_>) -> String {
    let separator = if params.hosted_url.contains('?') { '&' } else { '?' };
    format!(
        "{}{separator}experiments=true&theme={}&headless={}&standaloneScreencast={}",
        params.hosted_url,
        urlencoding::encode(params.theme),
        params.effective_headless(),
        params.standalone_screencast,
    )
}

/// Builds the content-security policy.
#[must_use]
pub fn content_security_policy(params: &DocumentParams<'_>) -> String {
    let csp = params.csp_source;
    let hosted = hosted_origin(params.hosted_url);

    format!(
        "default-src 'none'; \
         img-src 'self' data: {csp}; \
         style-src 'self' 'unsafe-inline' {csp}; \
         script-src 'self' 'nonce-{nonce}' {csp}; \
         frame-src 'self' {csp} {hosted}; \
         connect-src 'self' data: {csp} {hosted};",
        nonce = params.nonce,
    )
}

/// Builds the complete surface markup.
///
/// Each input is escaped and placed exactly once.
#[must_use]
pub fn build_document(params: &DocumentParams<'_>) -> String {
    format!(
        r##"<!doctype html>
<html>
<head>
    <meta http-equiv="Content-Type" content="text/html; charset=UTF-8">
    <meta http-equiv="Content-Security-Policy" content="{csp}">
    <link href="{stylesheet}" rel="stylesheet"/>
    <script nonce="{nonce}" src="{script}"></script>
</head>
<body>
    <iframe id="devtools-frame" frameBorder="0" src="{frame_src}"></iframe>
    {ERROR_PANEL}
</body>
</html>"##,
        csp = escape_attr(&content_security_policy(params)),
        stylesheet = escape_attr(params.stylesheet_uri),
        nonce = escape_attr(params.nonce),
        script = escape_attr(params.script_uri),
        frame_src = escape_attr(&frame_url(params)),
    )
}

// ============================================================================
// Internal Functions
// ============================================================================

/// Origin of the hosted document, or the raw address if it does not parse.
fn hosted_origin(hosted_url: &str) -> String {
    Url::parse(hosted_url)
        .map(|u| u.origin().ascii_serialization())
        .unwrap_or_else(|_| hosted_url.to_string())
}

fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

// ============================================================================
// Template
// ============================================================================

/// Hidden panel shown by the host script when the frame fails to load.
const ERROR_PANEL: &str = r#"<div id="error-message" class="hidden">
        <h1>Unable to download DevTools for the current target.</h1>
        <p>Try these troubleshooting steps:</p>
        <ol>
            <li>Check your network connection</li>
            <li>Close and re-launch the DevTools panel</li>
            <li>Check that the hosted DevTools address is reachable</li>
        </ol>
    </div>"#;

// ============================================================================
// Tests
// ============================================================================
