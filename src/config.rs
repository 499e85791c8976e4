//! Runtime configuration for a panel session.
//!
//! [`RuntimeConfig`] is read-only to the bridge and immutable for the
//! lifetime of a session. It is usually deserialized from a launch
//! configuration (camelCase JSON) or assembled with [`RuntimeConfigBuilder`].
//!
//! # Example
//!
//! ```
//! use devtools_bridge::RuntimeConfig;
//!
//! # fn example() -> devtools_bridge::Result<()> {
//! let config = RuntimeConfig::builder()
//!     .default_entrypoint("index.html")
//!     .source_maps(true)
//!     .path_mapping("/src/", "/workspace/src/")
//!     .build()?;
//!
//! assert_eq!(config.path_mapping.len(), 1);
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::ops::Deref;

use serde::de::{self, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use url::Url;

use crate::error::{Error, Result};

// ============================================================================
// PathMapping
// ============================================================================

/// One prefix-substitution rule.
///
/// A trailing `*` on both sides is accepted and treated as a plain prefix
/// (`"webpack:///./*": "${webRoot}/*"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathMapping {
    /// Prefix matched against the remote URL or path.
    pub from: String,
    /// Replacement prefix. May contain `${webRoot}`.
    pub to: String,
}

impl PathMapping {
    /// Creates a new rule.
    ///
    /// Surrounding whitespace in `from` is dropped.
    #[must_use]
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        let from: String = from.into();
        Self {
            from: from.trim().to_string(),
            to: to.into(),
        }
    }
}

// ============================================================================
// PathMappings
// ============================================================================

/// Ordered list of path-mapping rules. First match wins.
///
/// Deserializes from either a JSON object (source order preserved) or an
/// array of `{from, to}` rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PathMappings(Vec<PathMapping>);

impl PathMappings {
    /// Creates an empty rule list.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Appends a rule.
    #[inline]
    pub fn push(&mut self, rule: PathMapping) {
        self.0.push(rule);
    }
}

impl Deref for PathMappings {
    type Target = [PathMapping];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Vec<PathMapping>> for PathMappings {
    fn from(rules: Vec<PathMapping>) -> Self {
        Self(rules)
    }
}

impl<'de> Deserialize<'de> for PathMappings {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct RulesVisitor;

        impl<'de> Visitor<'de> for RulesVisitor {
            type Value = PathMappings;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object of prefix substitutions or an array of {from, to} rules")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut map: A,
            ) -> std::result::Result<Self::Value, A::Error> {
                let mut rules = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((from, to)) = map.next_entry::<String, String>()? {
                    let rule = PathMapping::new(from, to);
                    if rule.from.is_empty() {
                        return Err(de::Error::custom("path mapping key must not be empty"));
                    }
                    rules.push(rule);
                }
                Ok(PathMappings(rules))
            }

            fn visit_seq<A: SeqAccess<'de>>(
                self,
                mut seq: A,
            ) -> std::result::Result<Self::Value, A::Error> {
                let mut rules = Vec::with_capacity(seq.size_hint().unwrap_or(0));
                while let Some(PathMapping { from, to }) = seq.next_element()? {
                    let rule = PathMapping::new(from, to);
                    if rule.from.is_empty() {
                        return Err(de::Error::custom("path mapping 'from' must not be empty"));
                    }
                    rules.push(rule);
                }
                Ok(PathMappings(rules))
            }
        }

        deserializer.deserialize_any(RulesVisitor)
    }
}

// ============================================================================
// RuntimeConfig
// ============================================================================

/// Session configuration supplied by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RuntimeConfig {
    /// Document appended to URLs that name only a base (`index.html`).
    pub default_entrypoint: Option<String>,

    /// Apply path mapping when resolving URLs to local files.
    pub source_maps: bool,

    /// Ordered prefix-substitution rules.
    #[serde(alias = "sourceMapPathOverrides")]
    pub path_mapping: PathMappings,

    /// Value substituted for `${webRoot}` in mapping replacements.
    pub web_root: Option<String>,

    /// Overrides the hosted devtools document address.
    pub devtools_base_uri: Option<String>,

    /// Route target traffic through the debug proxy instead of a direct socket.
    pub use_proxy: bool,

    /// Debug session used to request a proxy endpoint.
    pub debug_session_id: Option<String>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            default_entrypoint: None,
            source_maps: true,
            path_mapping: PathMappings::new(),
            web_root: None,
            devtools_base_uri: None,
            use_proxy: false,
            debug_session_id: None,
        }
    }
}

impl RuntimeConfig {
    /// Creates a configuration builder.
    #[inline]
    #[must_use]
    pub fn builder() -> RuntimeConfigBuilder {
        RuntimeConfigBuilder::new()
    }

    /// Parses and validates a launch configuration.
    ///
    /// # Errors
    ///
    /// - [`Error::Json`] if the document is not valid JSON
    /// - [`Error::Config`] if a field fails validation
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first violated constraint.
    pub fn validate(&self) -> Result<()> {
        if let Some(entrypoint) = &self.default_entrypoint {
            if entrypoint.trim().is_empty() {
                return Err(Error::config("defaultEntrypoint must not be empty"));
            }
            if Url::parse(entrypoint).is_ok() {
                return Err(Error::config(format!(
                    "defaultEntrypoint must be a relative document path, got '{entrypoint}'"
                )));
            }
        }

        if let Some(base) = &self.devtools_base_uri {
            let parsed = Url::parse(base).map_err(|e| {
                Error::config(format!("devtoolsBaseUri '{base}' is not a valid URL: {e}"))
            })?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(Error::config(format!(
                    "devtoolsBaseUri must use http or https, got '{}'",
                    parsed.scheme()
                )));
            }
        }

        if self.use_proxy && self.debug_session_id.is_none() {
            return Err(Error::config(
                "useProxy requires debugSessionId to request a proxy endpoint",
            ));
        }

        Ok(())
    }
}

// ============================================================================
// RuntimeConfigBuilder
// ============================================================================

/// Builder for [`RuntimeConfig`].
///
/// Use [`RuntimeConfig::builder()`] to create a new builder.
#[derive(Debug, Default, Clone)]
pub struct RuntimeConfigBuilder {
    config: RuntimeConfig,
}

impl RuntimeConfigBuilder {
    /// Creates a builder with default settings.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the default entrypoint document.
    #[inline]
    #[must_use]
    pub fn default_entrypoint(mut self, entrypoint: impl Into<String>) -> Self {
        self.config.default_entrypoint = Some(entrypoint.into());
        self
    }

    /// Enables or disables path mapping.
    #[inline]
    #[must_use]
    pub fn source_maps(mut self, enabled: bool) -> Self {
        self.config.source_maps = enabled;
        self
    }

    /// Appends a path-mapping rule.
    #[inline]
    #[must_use]
    pub fn path_mapping(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.config.path_mapping.push(PathMapping::new(from, to));
        self
    }

    /// Sets the `${webRoot}` substitution.
    #[inline]
    #[must_use]
    pub fn web_root(mut self, web_root: impl Into<String>) -> Self {
        self.config.web_root = Some(web_root.into());
        self
    }

    /// Overrides the hosted devtools document address.
    #[inline]
    #[must_use]
    pub fn devtools_base_uri(mut self, uri: impl Into<String>) -> Self {
        self.config.devtools_base_uri = Some(uri.into());
        self
    }

    /// Routes traffic through the debug proxy for the given debug session.
    #[inline]
    #[must_use]
    pub fn proxied(mut self, debug_session_id: impl Into<String>) -> Self {
        self.config.use_proxy = true;
        self.config.debug_session_id = Some(debug_session_id.into());
        self
    }

    /// Validates and returns the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if validation fails.
    pub fn build(self) -> Result<RuntimeConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

// ============================================================================
// Tests
// ============================================================================
