//! Native session command set.
//!
//! This module defines the [`AutomationDriver`] trait, the small set of
//! commands the page facade is written against. [`Session`](crate::session::Session)
//! implements it by forwarding each call to the automation server over HTTP;
//! tests implement it in-process. Nothing above this trait knows about the
//! wire protocol.
//!
//! Element search reports "no such element" as `Ok(None)` so that waiting
//! loops can tell a miss apart from a broken session.

use async_trait::async_trait;
use thiserror::Error;

use crate::element::{ElementRef, Point, Rect};
use crate::locator::Locator;

/// Errors that can occur while forwarding a command to the automation server.
#[derive(Error, Debug)]
pub enum DriverError {
    /// The server answered with a W3C error envelope.
    #[error("{error}: {message}")]
    WebDriver {
        /// W3C error code, e.g. `no such element` or `session not created`.
        error: String,
        /// Server diagnostic, unmodified.
        message: String,
    },

    /// The session was already closed.
    #[error("session is not active")]
    NotConnected,

    /// The HTTP request could not be completed.
    #[error("transport error: {0}")]
    Transport(String),

    /// The response body did not have the expected shape.
    #[error("unexpected response: {0}")]
    Protocol(String),

    /// The command is not available for this session.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// An I/O error occurred.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DriverError {
    /// W3C code for a locator that matched nothing.
    pub const NO_SUCH_ELEMENT: &'static str = "no such element";

    /// Returns true if the server reported that no element matched.
    pub fn is_no_such_element(&self) -> bool {
        matches!(self, DriverError::WebDriver { error, .. } if error == Self::NO_SUCH_ELEMENT)
    }
}

impl From<reqwest::Error> for DriverError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            DriverError::Protocol(err.to_string())
        } else {
            DriverError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for DriverError {
    fn from(err: serde_json::Error) -> Self {
        DriverError::Protocol(err.to_string())
    }
}

/// Backend-agnostic mobile automation commands.
///
/// All coordinates are screen points. Durations are milliseconds unless the
/// method says otherwise.
#[async_trait]
pub trait AutomationDriver: Send + Sync {
    /// Finds the first element matching `locator`.
    ///
    /// Returns `Ok(None)` when nothing matches.
    async fn find_element(&self, locator: &Locator) -> Result<Option<ElementRef>, DriverError>;

    /// Finds every element matching `locator`. An empty list is not an error.
    async fn find_elements(&self, locator: &Locator) -> Result<Vec<ElementRef>, DriverError>;

    async fn is_displayed(&self, element: &ElementRef) -> Result<bool, DriverError>;

    async fn is_enabled(&self, element: &ElementRef) -> Result<bool, DriverError>;

    async fn click(&self, element: &ElementRef) -> Result<(), DriverError>;

    /// Clears an editable element's content.
    async fn clear(&self, element: &ElementRef) -> Result<(), DriverError>;

    /// Types `text` into an element.
    async fn send_keys(&self, element: &ElementRef, text: &str) -> Result<(), DriverError>;

    /// The element's visible text.
    async fn text(&self, element: &ElementRef) -> Result<String, DriverError>;

    async fn element_rect(&self, element: &ElementRef) -> Result<Rect, DriverError>;

    /// Bounds of the current viewport.
    async fn window_rect(&self) -> Result<Rect, DriverError>;

    /// A single touch drag from `start` to `end` over `duration_ms`.
    async fn swipe(&self, start: Point, end: Point, duration_ms: u64) -> Result<(), DriverError>;

    /// Touch down at `at`, hold for `duration_ms`, release.
    async fn long_press(&self, at: Point, duration_ms: u64) -> Result<(), DriverError>;

    async fn is_keyboard_shown(&self) -> Result<bool, DriverError>;

    async fn hide_keyboard(&self) -> Result<(), DriverError>;

    /// Sends the app under test to the background for `seconds`.
    async fn background_app(&self, seconds: u64) -> Result<(), DriverError>;

    /// Brings an installed app to the foreground, launching it if needed.
    async fn activate_app(&self, app_id: &str) -> Result<(), DriverError>;

    /// Stops an installed app.
    async fn terminate_app(&self, app_id: &str) -> Result<(), DriverError>;

    /// Wipes an installed app's data and cache.
    ///
    /// Backends that cannot do this return [`DriverError::Unsupported`].
    async fn clear_app(&self, app_id: &str) -> Result<(), DriverError> {
        Err(DriverError::Unsupported(format!(
            "clearing data of {app_id} is not supported"
        )))
    }

    /// Raw PNG bytes of the current screen.
    async fn screenshot(&self) -> Result<Vec<u8>, DriverError>;

    /// The current UI hierarchy as XML.
    async fn page_source(&self) -> Result<String, DriverError>;

    /// Identifier of the app under test (`appPackage` / `bundleId`), if known.
    fn app_id(&self) -> Option<String> {
        None
    }

    /// Ends the session. Calling it again is a no-op.
    async fn quit(&self) -> Result<(), DriverError>;
}
