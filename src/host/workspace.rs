//! Filesystem-backed [`WorkspaceResolver`].
//!
//! Confirms that a path lies inside one of a fixed set of workspace roots.
//! Remote `http(s)` addresses are matched by looking for their path under
//! each root; anything else is reported with its origin so the caller can
//! build a diagnostic.

// ============================================================================
// Imports
// ============================================================================

use std::path::{Component, Path, PathBuf};

use tracing::trace;
use url::Url;

use crate::config::PathMappings;

use super::{ResolvedPath, WorkspaceResolver};

// ============================================================================
// FsWorkspaceResolver
// ============================================================================

/// Resolves paths against a list of workspace roots.
#[derive(Debug, Clone, Default)]
pub struct FsWorkspaceResolver {
    roots: Vec<PathBuf>,
}

impl FsWorkspaceResolver {
    /// Creates a resolver over the given roots.
    #[must_use]
    pub fn new(roots: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        Self {
            roots: roots.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns the configured roots.
    #[inline]
    #[must_use]
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Lexical containment. Paths with `..` are never inside a root.
    fn contains(&self, path: &Path) -> bool {
        !escapes(path) && self.roots.iter().any(|root| path.starts_with(root))
    }

    /// Finds `relative` under the first root where it exists.
    fn find_under_roots(&self, relative: &str) -> Option<PathBuf> {
        let relative = Path::new(relative.trim_start_matches('/'));
        if escapes(relative) {
            return None;
        }

        self.roots
            .iter()
            .map(|root| root.join(relative))
            .find(|candidate| candidate.is_file())
    }
}

impl WorkspaceResolver for FsWorkspaceResolver {
    fn resolve(&self, path: &str, _mapping: &PathMappings) -> ResolvedPath {
        if let Ok(url) = Url::parse(path) {
            match url.scheme() {
                "file" => {
                    if let Ok(local) = url.to_file_path()
                        && self.contains(&local)
                    {
                        return local_path(local);
                    }
                }
                "http" | "https" => {
                    if let Some(found) = self.find_under_roots(url.path()) {
                        trace!(url = %url, path = %found.display(), "Remote path found in workspace");
                        return local_path(found);
                    }
                }
                _ => {}
            }

            return ResolvedPath {
                path: url.path().to_string(),
                origin: url.origin().ascii_serialization(),
            };
        }

        let candidate = Path::new(path);
        if candidate.is_absolute() && self.contains(candidate) {
            return local_path(candidate.to_path_buf());
        }

        if let Some(found) = self.find_under_roots(path) {
            return local_path(found);
        }

        ResolvedPath {
            path: path.to_string(),
            origin: "file://".to_string(),
        }
    }
}

fn escapes(path: &Path) -> bool {
    path.components().any(|c| matches!(c, Component::ParentDir))
}

fn local_path(path: PathBuf) -> ResolvedPath {
    ResolvedPath {
        path: path.to_string_lossy().into_owned(),
        origin: String::new(),
    }
}

// ============================================================================
// Tests
// ============================================================================
