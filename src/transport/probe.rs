//! Target version probe.
//!
//! Opens a short-lived socket to the target, asks for `Browser.getVersion`
//! and turns the answer into the hosted-document revision and headless
//! flag. A probe that cannot reach the target stays silent.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use regex::Regex;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::protocol::VersionParameters;

use super::connection::open_socket;

// ============================================================================
// Constants
// ============================================================================

/// Revision used when the target is too old or its version is unknown.
pub const FALLBACK_REVISION: &str = "@1e0bfa7ba5b1d6d82ad7f9b04d87b4ac4d8a0db1";

/// Oldest target version whose own revision is served.
pub const MIN_SUPPORTED_VERSION: [u32; 4] = [94, 0, 975, 0];

/// Protocol method queried by the probe.
pub const VERSION_METHOD: &str = "Browser.getVersion";

/// Timeout for the version reply.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Request id of the version query.
const PROBE_REQUEST_ID: i64 = 0;

static VERSION_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"/(\d+)\.(\d+)\.(\d+)\.(\d+)").ok());

// ============================================================================
// Types
// ============================================================================

/// Receiver of probe results.
pub type VersionEvents = mpsc::UnboundedReceiver<VersionParameters>;

/// Detects the target version on demand.
pub trait VersionDetector: Send + Sync {
    /// Starts a probe. Ignored while one is in flight.
    fn detect_version(&self);

    /// Takes the result receiver. Returns `None` after the first call.
    fn subscribe(&self) -> Option<VersionEvents>;

    /// Cancels any probe in flight. Idempotent.
    fn dispose(&self);
}

// ============================================================================
// VersionProbe
// ============================================================================

/// [`VersionDetector`] querying the target over WebSocket.
pub struct VersionProbe {
    target_url: String,
    in_flight: Arc<AtomicBool>,
    disposed: AtomicBool,
    task: Mutex<Option<JoinHandle<()>>>,
    results_tx: mpsc::UnboundedSender<VersionParameters>,
    results_rx: Mutex<Option<VersionEvents>>,
}

impl VersionProbe {
    /// Creates a probe for `target_url`.
    #[must_use]
    pub fn new(target_url: impl Into<String>) -> Self {
        let (results_tx, results_rx) = mpsc::unbounded_channel();
        Self {
            target_url: target_url.into(),
            in_flight: Arc::new(AtomicBool::new(false)),
            disposed: AtomicBool::new(false),
            task: Mutex::new(None),
            results_tx,
            results_rx: Mutex::new(Some(results_rx)),
        }
    }

    /// Queries the target once.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionTimeout`] if the target does not answer in time
    /// - [`Error::Connection`] if the socket cannot be opened
    /// - [`Error::ConnectionClosed`] if the socket closes before answering
    pub async fn query(url: &str) -> Result<VersionParameters> {
        let mut stream = open_socket(url).await?;

        let request = json!({ "id": PROBE_REQUEST_ID, "method": VERSION_METHOD });
        stream.send(Message::Text(request.to_string().into())).await?;

        let result = loop {
            let message = timeout(PROBE_TIMEOUT, stream.next())
                .await
                .map_err(|_| Error::connection_timeout(PROBE_TIMEOUT.as_millis() as u64))?;

            match message {
                Some(Ok(Message::Text(text))) => {
                    let value: Value = serde_json::from_str(text.as_str())?;
                    if value.get("id").and_then(Value::as_i64) == Some(PROBE_REQUEST_ID) {
                        break value.get("result").cloned().unwrap_or(Value::Null);
                    }
                    trace!("Ignoring unrelated frame during probe");
                }
                Some(Ok(Message::Close(_))) | None => return Err(Error::ConnectionClosed),
                Some(Err(e)) => return Err(e.into()),
                Some(Ok(_)) => {}
            }
        };

        let _ = stream.close(None).await;
        Ok(resolve_parameters(&result))
    }
}

impl VersionDetector for VersionProbe {
    fn detect_version(&self) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }
        if self.in_flight.swap(true, Ordering::SeqCst) {
            trace!("Version probe already in flight");
            return;
        }

        let url = self.target_url.clone();
        let in_flight = Arc::clone(&self.in_flight);
        let results_tx = self.results_tx.clone();

        let handle = tokio::spawn(async move {
            match Self::query(&url).await {
                Ok(parameters) => {
                    debug!(
                        revision = %parameters.revision,
                        headless = parameters.is_headless,
                        "Target version resolved"
                    );
                    let _ = results_tx.send(parameters);
                }
                Err(e) => debug!(url = %url, error = %e, "Version probe failed"),
            }
            in_flight.store(false, Ordering::SeqCst);
        });

        *self.task.lock() = Some(handle);
    }

    fn subscribe(&self) -> Option<VersionEvents> {
        self.results_rx.lock().take()
    }

    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
    }
}

impl fmt::Debug for VersionProbe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VersionProbe")
            .field("target_url", &self.target_url)
            .field("in_flight", &self.in_flight.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Version Resolution
// ============================================================================

/// Extracts a four-part version from a product string such as
/// `Edg/120.0.2210.91` or `HeadlessChrome/119.0.6045.105`.
#[must_use]
pub fn parse_version(product: &str) -> Option<[u32; 4]> {
    let captures = VERSION_PATTERN.as_ref()?.captures(product)?;
    let mut version = [0; 4];
    for (i, part) in version.iter_mut().enumerate() {
        *part = captures.get(i + 1)?.as_str().parse().ok()?;
    }
    Some(version)
}

/// Chooses the hosted-document revision.
#[must_use]
pub fn resolve_revision(product: &str, revision: Option<&str>) -> String {
    let supported = parse_version(product).is_some_and(|v| v >= MIN_SUPPORTED_VERSION);

    match revision.map(str::trim) {
        Some(rev) if supported && !rev.is_empty() => {
            if rev.starts_with('@') {
                rev.to_string()
            } else {
                format!("@{rev}")
            }
        }
        _ => FALLBACK_REVISION.to_string(),
    }
}

/// Builds [`VersionParameters`] from a `Browser.getVersion` result.
#[must_use]
pub fn resolve_parameters(result: &Value) -> VersionParameters {
    let product = result.get("product").and_then(Value::as_str).unwrap_or_default();
    let revision = result.get("revision").and_then(Value::as_str);
    let user_agent = result.get("userAgent").and_then(Value::as_str).unwrap_or_default();

    VersionParameters {
        revision: resolve_revision(product, revision),
        is_headless: product.contains("Headless") || user_agent.contains("Headless"),
    }
}

// ============================================================================
// Tests
// ============================================================================
