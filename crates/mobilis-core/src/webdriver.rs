//! Minimal W3C WebDriver client.
//!
//! [`WebDriverClient`] sends JSON commands to an Appium server and unwraps
//! the `{"value": ...}` envelope of each response. W3C error envelopes become
//! [`DriverError::WebDriver`] with the server's code and message preserved.
//!
//! The client is session-agnostic: callers pass full command paths. Session
//! scoping lives in [`Session`](crate::session::Session).
//!
//! # Example
//!
//! ```no_run
//! use mobilis_core::webdriver::WebDriverClient;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = WebDriverClient::new("http://127.0.0.1:4723")?;
//! let status = client.get("/status").await?;
//! println!("server ready: {}", status["ready"]);
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug_span, trace, Instrument};

use crate::driver::DriverError;
use crate::element::Point;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Timeout for establishing a TCP connection to the server.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Timeout for an ordinary command round-trip.
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

/// Timeout for a new-session request. App installation happens inside it.
pub const NEW_SESSION_TIMEOUT: Duration = Duration::from_secs(600);

/// Pause between touch-down and the drag of a swipe, in milliseconds.
const SWIPE_HOLD_MS: u64 = 100;

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// Result of a successful new-session request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSession {
    pub session_id: String,
    /// Capabilities the server reports for the session.
    #[serde(default)]
    pub capabilities: Value,
}

#[derive(Debug, Deserialize)]
struct ErrorValue {
    error: String,
    #[serde(default)]
    message: String,
}

// ---------------------------------------------------------------------------
// WebDriverClient
// ---------------------------------------------------------------------------

/// JSON-over-HTTP client for one automation server endpoint.
#[derive(Debug, Clone)]
pub struct WebDriverClient {
    http: reqwest::Client,
    base_url: String,
}

impl WebDriverClient {
    /// Creates a client for `base_url` (e.g. `http://127.0.0.1:4723`).
    ///
    /// No request is made until a command is sent.
    pub fn new(base_url: &str) -> Result<Self, DriverError> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| DriverError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Requests a new session with the given `alwaysMatch` capabilities.
    pub async fn new_session(
        &self,
        always_match: Map<String, Value>,
    ) -> Result<NewSession, DriverError> {
        let body = json!({
            "capabilities": {
                "alwaysMatch": Value::Object(always_match),
                "firstMatch": [{}],
            }
        });
        let value = self
            .command_with_timeout(Method::POST, "/session", Some(body), NEW_SESSION_TIMEOUT)
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn get(&self, path: &str) -> Result<Value, DriverError> {
        self.command(Method::GET, path, None).await
    }

    pub async fn post(&self, path: &str, body: Value) -> Result<Value, DriverError> {
        self.command(Method::POST, path, Some(body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<Value, DriverError> {
        self.command(Method::DELETE, path, None).await
    }

    /// Sends a command with the default [`COMMAND_TIMEOUT`].
    pub async fn command(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, DriverError> {
        self.command_with_timeout(method, path, body, COMMAND_TIMEOUT)
            .await
    }

    /// Sends a command and returns the unwrapped `value` of the response.
    pub async fn command_with_timeout(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        timeout: Duration,
    ) -> Result<Value, DriverError> {
        let span = debug_span!("webdriver", method = %method, path);
        async {
            let url = format!("{}{}", self.base_url, path);
            let mut request = self.http.request(method, &url).timeout(timeout);
            if let Some(body) = body {
                trace!(%body, "request body");
                request = request.json(&body);
            }

            let response = request.send().await?;
            let status = response.status();
            let text = response.text().await?;
            trace!(status = status.as_u16(), bytes = text.len(), "response");

            unwrap_response(status, &text)
        }
        .instrument(span)
        .await
    }
}

/// Extracts `value` from a response body, mapping W3C error envelopes.
fn unwrap_response(status: reqwest::StatusCode, text: &str) -> Result<Value, DriverError> {
    let parsed: Option<Value> = serde_json::from_str(text).ok();

    let Some(body) = parsed else {
        if status.is_success() {
            return Err(DriverError::Protocol(format!(
                "response is not JSON: {}",
                truncate(text)
            )));
        }
        return Err(DriverError::WebDriver {
            error: format!("HTTP {}", status.as_u16()),
            message: text.to_string(),
        });
    };

    let value = body.get("value").cloned().unwrap_or(Value::Null);

    if let Ok(err) = ErrorValue::deserialize(&value) {
        return Err(DriverError::WebDriver {
            error: err.error,
            message: err.message,
        });
    }
    if !status.is_success() {
        return Err(DriverError::WebDriver {
            error: format!("HTTP {}", status.as_u16()),
            message: body.to_string(),
        });
    }
    Ok(value)
}

fn truncate(text: &str) -> String {
    const MAX: usize = 200;
    match text.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

// ---------------------------------------------------------------------------
// W3C action payloads
// ---------------------------------------------------------------------------

fn touch_pointer(steps: Vec<Value>) -> Value {
    json!({
        "actions": [{
            "type": "pointer",
            "id": "finger1",
            "parameters": {"pointerType": "touch"},
            "actions": steps,
        }]
    })
}

/// Actions body for a one-finger drag from `start` to `end`.
pub fn swipe_actions(start: Point, end: Point, duration_ms: u64) -> Value {
    touch_pointer(vec![
        json!({"type": "pointerMove", "duration": 0, "x": start.x, "y": start.y}),
        json!({"type": "pointerDown", "button": 0}),
        json!({"type": "pause", "duration": SWIPE_HOLD_MS}),
        json!({"type": "pointerMove", "duration": duration_ms, "origin": "viewport", "x": end.x, "y": end.y}),
        json!({"type": "pointerUp", "button": 0}),
    ])
}

/// Actions body for a press-and-hold at `at`.
pub fn long_press_actions(at: Point, duration_ms: u64) -> Value {
    touch_pointer(vec![
        json!({"type": "pointerMove", "duration": 0, "x": at.x, "y": at.y}),
        json!({"type": "pointerDown", "button": 0}),
        json!({"type": "pause", "duration": duration_ms}),
        json!({"type": "pointerUp", "button": 0}),
    ])
}

/// Body for `POST /session/{id}/execute/sync` running an Appium `mobile:` command.
pub fn mobile_command(name: &str, args: Value) -> Value {
    json!({
        "script": format!("mobile: {name}"),
        "args": [args],
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
