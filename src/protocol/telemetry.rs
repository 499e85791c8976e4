//! Telemetry events emitted by the devtools front-end.
//!
//! Telemetry is forwarded immediately to the host sink; nothing is
//! aggregated or persisted here.

// ============================================================================
// Imports
// ============================================================================

use serde::Deserialize;
use serde_json::Value;

use crate::host::{Measures, Properties, TelemetrySink};

// ============================================================================
// Constants
// ============================================================================

/// Prefix for every forwarded front-end event name.
const EVENT_PREFIX: &str = "devtools";

// ============================================================================
// TelemetryData
// ============================================================================

/// A telemetry record from the front-end.
///
/// # Format
///
/// ```json
/// { "event": "performance", "name": "DevTools.Launch", "data": 1234.5 }
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum TelemetryData {
    /// Duration measurement in milliseconds.
    Performance {
        /// Measure name.
        name: String,
        /// Duration.
        data: f64,
    },
    /// Enumerated histogram value (panel shown, action taken, ...).
    Enumerated {
        /// Histogram name.
        name: String,
        /// Enumerated value.
        data: i64,
    },
    /// Front-end error report.
    Error {
        /// Error name.
        name: String,
        /// Arbitrary error details.
        #[serde(default)]
        data: Value,
    },
}

impl TelemetryData {
    /// Returns the record name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Performance { name, .. }
            | Self::Enumerated { name, .. }
            | Self::Error { name, .. } => name,
        }
    }

    /// Returns the sink event name (`devtools/<name>`).
    #[must_use]
    pub fn event_name(&self) -> String {
        format!("{EVENT_PREFIX}/{}", self.name())
    }

    /// Forwards the record to the sink.
    pub fn emit(&self, sink: &dyn TelemetrySink) {
        let event_name = self.event_name();
        match self {
            Self::Performance { data, .. } => {
                let mut measures = Measures::default();
                measures.insert("duration".to_string(), *data);
                sink.send_event(&event_name, Properties::default(), measures);
            }
            Self::Enumerated { data, .. } => {
                let mut properties = Properties::default();
                properties.insert("value".to_string(), data.to_string());
                sink.send_event(&event_name, properties, Measures::default());
            }
            Self::Error { data, .. } => {
                let mut properties = Properties::default();
                properties.insert("value".to_string(), data.to_string());
                sink.send_error_event(&event_name, properties);
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
