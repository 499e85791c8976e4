//! Remote URL to local workspace path translation.
//!
//! The devtools front-end names resources by their remote address
//! (`http://localhost:8080/src/app.js`), the editor by local path. The
//! functions here bridge the two using the session's [`RuntimeConfig`].
//!
//! # Pipeline
//!
//! ```text
//! url ──► resolve_entrypoint ──► apply_path_mapping ──► WorkspaceResolver
//!         (default entrypoint       (source maps            (collaborator)
//!          configured)               enabled)
//! ```
//!
//! Each stage is skipped when its configuration is absent.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use tracing::debug;
use url::Url;

use crate::config::{PathMapping, RuntimeConfig};
use crate::error::{Error, Result};
use crate::host::WorkspaceResolver;

// ============================================================================
// Constants
// ============================================================================

/// Placeholder in mapping replacements expanded to the configured web root.
const WEB_ROOT_PLACEHOLDER: &str = "${webRoot}";

// ============================================================================
// Types
// ============================================================================

/// Why a URL could not be mapped to a local document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnresolvedReason {
    /// The address is not a well-formed URL.
    InvalidUrl {
        /// Parser message.
        message: String,
    },
    /// No workspace root contains the translated path.
    NoMapping {
        /// Translated path handed to the resolver.
        path: String,
        /// Origin reported by the resolver.
        origin: String,
    },
}

/// Local identity for a remote resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorTarget {
    /// A document inside the workspace.
    Resolved {
        /// Local document path.
        path: String,
        /// Zero-based `(line, column)` cursor hint.
        position: Option<(u32, u32)>,
    },
    /// No local document could be confirmed.
    Unresolved {
        /// Diagnostic reason.
        reason: UnresolvedReason,
    },
}

impl EditorTarget {
    /// Attaches a cursor hint to a resolved target.
    ///
    /// A line without a column places the cursor at column 0.
    #[must_use]
    pub fn with_position(self, line: Option<u32>, column: Option<u32>) -> Self {
        match self {
            Self::Resolved { path, .. } => Self::Resolved {
                path,
                position: line.map(|l| (l, column.unwrap_or(0))),
            },
            unresolved => unresolved,
        }
    }
}

/// Outcome of [`to_workspace_uri`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceLookup {
    /// Resolved or unresolved target.
    pub target: EditorTarget,
    /// The default entrypoint changed the URL for this request.
    pub entrypoint_appended: bool,
}

impl fmt::Display for UnresolvedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidUrl { message } => write!(f, "invalid URL ({message})"),
            Self::NoMapping { path, origin } if origin.is_empty() => {
                write!(f, "'{path}' is not inside a workspace folder")
            }
            Self::NoMapping { path, origin } => {
                write!(f, "'{path}' from {origin} is not inside a workspace folder")
            }
        }
    }
}

// ============================================================================
// Public Functions
// ============================================================================

/// Appends `default_entrypoint` when `url` names only a base.
///
/// A URL "names only a base" when its path ends in `/`. Otherwise the input
/// is returned unchanged (byte for byte).
///
/// # Returns
///
/// `(resolved_url, was_appended)`.
///
/// # Errors
///
/// Returns [`Error::InvalidUrl`] if `url` is not a hierarchical URL.
pub fn resolve_entrypoint(url: &str, default_entrypoint: &str) -> Result<(String, bool)> {
    let mut parsed = Url::parse(url).map_err(|e| Error::invalid_url(url, e.to_string()))?;

    if parsed.cannot_be_a_base() {
        return Err(Error::invalid_url(url, "address has no path hierarchy"));
    }

    let entrypoint = default_entrypoint.trim_start_matches('/');
    if entrypoint.is_empty() || !parsed.path().ends_with('/') {
        return Ok((url.to_string(), false));
    }

    let path = format!("{}{entrypoint}", parsed.path());
    parsed.set_path(&path);

    Ok((parsed.to_string(), true))
}

/// Applies the first matching prefix rule.
///
/// Rules are tried against the full input first. If none matches and the
/// input is an `http(s)` URL, they are tried against its path. Unmatched
/// input passes through unchanged.
#[must_use]
pub fn apply_path_mapping(url: &str, rules: &[PathMapping]) -> String {
    if let Some(mapped) = first_match(url, rules) {
        return mapped;
    }

    if let Ok(parsed) = Url::parse(url)
        && matches!(parsed.scheme(), "http" | "https")
        && let Some(mapped) = first_match(parsed.path(), rules)
    {
        return mapped;
    }

    url.to_string()
}

/// Expands `${webRoot}` in every replacement.
///
/// Rules are returned unchanged when no web root is configured.
#[must_use]
pub fn expand_web_root(rules: &[PathMapping], web_root: Option<&str>) -> Vec<PathMapping> {
    let Some(root) = web_root else {
        return rules.to_vec();
    };
    let root = root.trim_end_matches('/');

    rules
        .iter()
        .map(|rule| PathMapping::new(rule.from.clone(), rule.to.replace(WEB_ROOT_PLACEHOLDER, root)))
        .collect()
}

/// Resolves a remote URL to a workspace document.
///
/// Entrypoint resolution runs only with a default entrypoint configured;
/// path mapping only with source maps enabled.
pub fn to_workspace_uri(
    url: &str,
    config: &RuntimeConfig,
    resolver: &dyn WorkspaceResolver,
) -> WorkspaceLookup {
    let mut current = url.to_string();
    let mut entrypoint_appended = false;

    if let Some(entrypoint) = &config.default_entrypoint {
        match resolve_entrypoint(url, entrypoint) {
            Ok((resolved, appended)) => {
                current = resolved;
                entrypoint_appended = appended;
            }
            Err(e) => {
                debug!(url, error = %e, "Entrypoint resolution failed");
                return WorkspaceLookup {
                    target: EditorTarget::Unresolved {
                        reason: UnresolvedReason::InvalidUrl {
                            message: invalid_url_message(e),
                        },
                    },
                    entrypoint_appended: false,
                };
            }
        }
    }

    if config.source_maps {
        let rules = expand_web_root(&config.path_mapping, config.web_root.as_deref());
        current = apply_path_mapping(&current, &rules);
    }

    let resolved = resolver.resolve(&current, &config.path_mapping);
    debug!(url, mapped = %current, local = resolved.is_local(), "Workspace lookup");

    let target = if resolved.is_local() {
        EditorTarget::Resolved {
            path: resolved.path,
            position: None,
        }
    } else {
        EditorTarget::Unresolved {
            reason: UnresolvedReason::NoMapping {
                path: resolved.path,
                origin: resolved.origin,
            },
        }
    };

    WorkspaceLookup {
        target,
        entrypoint_appended,
    }
}

/// Builds the user-facing message for an unresolved lookup.
///
/// The entrypoint hint is added only when appending changed the URL.
#[must_use]
pub fn unresolved_message(url: &str, reason: &UnresolvedReason, entrypoint_appended: bool) -> String {
    let mut message = format!("Could not open '{url}' in the editor: {reason}.");

    if matches!(reason, UnresolvedReason::NoMapping { .. }) {
        message.push_str(" Check the 'pathMapping' and 'webRoot' settings.");
    }

    if entrypoint_appended {
        message.push_str(
            " The default entrypoint was appended to this URL; \
             check the 'defaultEntrypoint' setting.",
        );
    }

    message
}

// ============================================================================
// Internal Functions
// ============================================================================

fn first_match(input: &str, rules: &[PathMapping]) -> Option<String> {
    rules.iter().find_map(|rule| {
        let from = strip_wildcard(rule.from.trim());
        if from.is_empty() {
            return None;
        }
        input
            .strip_prefix(from)
            .map(|rest| format!("{}{rest}", strip_wildcard(&rule.to)))
    })
}

fn strip_wildcard(pattern: &str) -> &str {
    pattern.strip_suffix('*').unwrap_or(pattern)
}

fn invalid_url_message(err: Error) -> String {
    match err {
        Error::InvalidUrl { message, .. } => message,
        other => other.to_string(),
    }
}

// ============================================================================
// Tests
// ============================================================================
