//! Per-panel session state.

// ============================================================================
// Imports
// ============================================================================

use std::time::{Duration, Instant};

use crate::identifiers::SessionId;
use crate::protocol::VersionParameters;
use crate::transport::probe::FALLBACK_REVISION;

// ============================================================================
// Session
// ============================================================================

/// One pairing of a debugging target and a display surface.
///
/// Survives visibility changes; dropped with its panel.
#[derive(Debug, Clone)]
pub struct Session {
    id: SessionId,
    target_url: String,
    started_at: Option<Instant>,
    version: Option<VersionParameters>,
}

impl Session {
    /// Creates an unstarted session for `target_url`.
    #[must_use]
    pub fn new(target_url: impl Into<String>) -> Self {
        Self {
            id: SessionId::next(),
            target_url: target_url.into(),
            started_at: None,
            version: None,
        }
    }

    /// Returns the session id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Returns the target address.
    #[inline]
    #[must_use]
    pub fn target_url(&self) -> &str {
        &self.target_url
    }

    /// Records the session start. Returns `false` if already started.
    pub fn start(&mut self) -> bool {
        if self.started_at.is_some() {
            return false;
        }
        self.started_at = Some(Instant::now());
        true
    }

    /// Returns `true` once the target has connected.
    #[inline]
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.started_at.is_some()
    }

    /// Time since the session started.
    #[must_use]
    pub fn elapsed(&self) -> Option<Duration> {
        self.started_at.map(|t| t.elapsed())
    }

    /// Stores the probe result.
    pub fn set_version(&mut self, version: VersionParameters) {
        self.version = Some(version);
    }

    /// Hosted-document revision, or the fallback before resolution.
    #[must_use]
    pub fn revision(&self) -> &str {
        self.version
            .as_ref()
            .map_or(FALLBACK_REVISION, |v| v.revision.as_str())
    }

    /// Headless flag reported by the probe.
    #[must_use]
    pub fn is_headless(&self) -> bool {
        self.version.as_ref().is_some_and(|v| v.is_headless)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_once() {
        let mut session = Session::new("ws://t");
        assert!(!session.is_started());
        assert!(session.elapsed().is_none());
        assert!(session.start());
        assert!(!session.start());
        assert!(session.elapsed().is_some());
    }

    #[test]
    fn test_version_defaults() {
        let mut session = Session::new("ws://t");
        assert_eq!(session.revision(), FALLBACK_REVISION);
        assert!(!session.is_headless());

        session.set_version(VersionParameters {
            revision: "@abc".into(),
            is_headless: true,
        });
        assert_eq!(session.revision(), "@abc");
        assert!(session.is_headless());
    }

    #[test]
    fn test_ids_unique() {
        assert_ne!(Session::new("a").id(), Session::new("a").id());
    }
}
