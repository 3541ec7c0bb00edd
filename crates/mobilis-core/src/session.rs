//! Session creation and the live session handle.
//!
//! [`SessionFactory`] turns a capability file plus call-time overrides into a
//! live [`Session`]. Platform dispatch is a plain `match`; the factory holds
//! nothing but the immutable capability file, so it can be shared freely.
//!
//! Validation happens before any network traffic: an unknown platform or an
//! incomplete capability set fails with [`Error::Configuration`] without the
//! server ever seeing a request. Server-side rejections surface as
//! [`Error::SessionCreation`] with the server's message. There is no retry.
//!
//! # Example
//!
//! ```no_run
//! use mobilis_core::capabilities::CapabilitySet;
//! use mobilis_core::driver::AutomationDriver;
//! use mobilis_core::session::SessionFactory;
//!
//! # async fn example() -> mobilis_core::error::Result<()> {
//! let factory = SessionFactory::discover()?;
//! let session = factory.create_session("android", &CapabilitySet::default()).await?;
//! println!("session {}", session.id());
//! session.quit().await?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, info_span, warn, Instrument};

use crate::capabilities::{CapabilitySet, Platform};
use crate::config::CapabilityFile;
use crate::driver::{AutomationDriver, DriverError};
use crate::element::{ElementRef, Point, Rect};
use crate::error::{Error, Result};
use crate::locator::Locator;
use crate::webdriver::{self, WebDriverClient, COMMAND_TIMEOUT};

// ---------------------------------------------------------------------------
// SessionFactory
// ---------------------------------------------------------------------------

/// Creates sessions from a capability file.
#[derive(Debug, Clone, Default)]
pub struct SessionFactory {
    config: CapabilityFile,
}

impl SessionFactory {
    pub fn new(config: CapabilityFile) -> Self {
        Self { config }
    }

    /// Loads the capability file at `path`.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(CapabilityFile::load(path)?))
    }

    /// Loads the capability file from its default locations.
    pub fn discover() -> Result<Self> {
        Ok(Self::new(CapabilityFile::discover()?))
    }

    pub fn config(&self) -> &CapabilityFile {
        &self.config
    }

    /// Merges `overrides` onto the platform's base set and validates it.
    ///
    /// This is exactly the capability set a session would be requested with.
    pub fn resolve(&self, platform: Platform, overrides: &CapabilitySet) -> Result<CapabilitySet> {
        let empty = CapabilitySet::default();
        let base = self.config.platform(platform).unwrap_or(&empty);
        base.resolve(platform, overrides)
    }

    /// Server endpoint for a resolved capability set.
    pub fn server_url(&self, caps: &CapabilitySet) -> String {
        caps.appium_url
            .clone()
            .unwrap_or_else(|| self.config.server_url())
    }

    /// Creates a session for a platform given by name (`android` or `ios`).
    pub async fn create_session(&self, platform: &str, overrides: &CapabilitySet) -> Result<Session> {
        let platform: Platform = platform.parse()?;
        self.create(platform, overrides).await
    }

    /// Creates an Android (UiAutomator2) session.
    pub async fn create_android_session(&self, overrides: &CapabilitySet) -> Result<Session> {
        self.create(Platform::Android, overrides).await
    }

    /// Creates an iOS (XCUITest) session.
    pub async fn create_ios_session(&self, overrides: &CapabilitySet) -> Result<Session> {
        self.create(Platform::Ios, overrides).await
    }

    /// Creates a session for `platform`.
    pub async fn create(&self, platform: Platform, overrides: &CapabilitySet) -> Result<Session> {
        let caps = self.resolve(platform, overrides)?;
        let url = self.server_url(&caps);
        let span = info_span!("create_session", %platform, server = %url);

        async move {
            info!(device = caps.device_name.as_deref().unwrap_or_default(), "requesting session");

            let always_match = caps.to_w3c()?;
            let client = WebDriverClient::new(&url).map_err(|e| Error::SessionCreation(e.to_string()))?;
            let created = client.new_session(always_match).await.map_err(|e| match e {
                DriverError::WebDriver { message, .. } if !message.is_empty() => {
                    Error::SessionCreation(message)
                }
                other => Error::SessionCreation(other.to_string()),
            })?;

            info!(session_id = %created.session_id, "session created");
            debug!(capabilities = %created.capabilities, "server capabilities");

            Ok::<_, Error>(Session {
                id: created.session_id,
                platform,
                capabilities: caps,
                server_capabilities: created.capabilities,
                client,
                closed: AtomicBool::new(false),
            })
        }
        .instrument(span)
        .await
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// A live automation session on one device/app instance.
///
/// Owned by the test that requested it. Call [`quit`](AutomationDriver::quit)
/// when done; the [`fixture`](crate::fixture) module does this automatically.
#[derive(Debug)]
pub struct Session {
    id: String,
    platform: Platform,
    capabilities: CapabilitySet,
    server_capabilities: Value,
    client: WebDriverClient,
    closed: AtomicBool,
}

impl Session {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// The merged capability set this session was requested with.
    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    /// Capabilities as reported back by the server.
    pub fn server_capabilities(&self) -> &Value {
        &self.server_capabilities
    }

    pub fn is_active(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }

    fn path(&self, suffix: &str) -> String {
        format!("/session/{}{}", self.id, suffix)
    }

    fn element_path(&self, element: &ElementRef, suffix: &str) -> String {
        self.path(&format!("/element/{}{}", element.id, suffix))
    }

    fn ensure_active(&self) -> Result<(), DriverError> {
        if self.is_active() {
            Ok(())
        } else {
            Err(DriverError::NotConnected)
        }
    }

    async fn get(&self, suffix: &str) -> Result<Value, DriverError> {
        self.ensure_active()?;
        self.client.get(&self.path(suffix)).await
    }

    async fn post(&self, suffix: &str, body: Value) -> Result<Value, DriverError> {
        self.ensure_active()?;
        self.client.post(&self.path(suffix), body).await
    }

    async fn mobile(&self, name: &str, args: Value) -> Result<Value, DriverError> {
        self.post("/execute/sync", webdriver::mobile_command(name, args))
            .await
    }

    /// Argument object naming an installed app for `mobile:` app commands.
    fn app_args(&self, app_id: &str) -> Value {
        match self.platform {
            Platform::Android => json!({"appId": app_id}),
            Platform::Ios => json!({"bundleId": app_id}),
        }
    }
}

fn expect_bool(value: Value) -> Result<bool, DriverError> {
    value
        .as_bool()
        .ok_or_else(|| DriverError::Protocol(format!("expected boolean, got {value}")))
}

#[async_trait]
impl AutomationDriver for Session {
    async fn find_element(&self, locator: &Locator) -> Result<Option<ElementRef>, DriverError> {
        match self.post("/element", serde_json::to_value(locator)?).await {
            Ok(value) => Ok(Some(serde_json::from_value(value)?)),
            Err(e) if e.is_no_such_element() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn find_elements(&self, locator: &Locator) -> Result<Vec<ElementRef>, DriverError> {
        let value = self.post("/elements", serde_json::to_value(locator)?).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn is_displayed(&self, element: &ElementRef) -> Result<bool, DriverError> {
        self.ensure_active()?;
        let value = self
            .client
            .get(&self.element_path(element, "/displayed"))
            .await?;
        expect_bool(value)
    }

    async fn is_enabled(&self, element: &ElementRef) -> Result<bool, DriverError> {
        self.ensure_active()?;
        let value = self
            .client
            .get(&self.element_path(element, "/enabled"))
            .await?;
        expect_bool(value)
    }

    async fn click(&self, element: &ElementRef) -> Result<(), DriverError> {
        self.ensure_active()?;
        self.client
            .post(&self.element_path(element, "/click"), json!({}))
            .await?;
        Ok(())
    }

    async fn clear(&self, element: &ElementRef) -> Result<(), DriverError> {
        self.ensure_active()?;
        self.client
            .post(&self.element_path(element, "/clear"), json!({}))
            .await?;
        Ok(())
    }

    async fn send_keys(&self, element: &ElementRef, text: &str) -> Result<(), DriverError> {
        self.ensure_active()?;
        self.client
            .post(&self.element_path(element, "/value"), json!({"text": text}))
            .await?;
        Ok(())
    }

    async fn text(&self, element: &ElementRef) -> Result<String, DriverError> {
        self.ensure_active()?;
        let value = self.client.get(&self.element_path(element, "/text")).await?;
        match value {
            Value::String(s) => Ok(s),
            Value::Null => Ok(String::new()),
            other => Err(DriverError::Protocol(format!("expected text, got {other}"))),
        }
    }

    async fn element_rect(&self, element: &ElementRef) -> Result<Rect, DriverError> {
        self.ensure_active()?;
        let value = self.client.get(&self.element_path(element, "/rect")).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn window_rect(&self) -> Result<Rect, DriverError> {
        let value = self.get("/window/rect").await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn swipe(&self, start: Point, end: Point, duration_ms: u64) -> Result<(), DriverError> {
        self.post("/actions", webdriver::swipe_actions(start, end, duration_ms))
            .await?;
        Ok(())
    }

    async fn long_press(&self, at: Point, duration_ms: u64) -> Result<(), DriverError> {
        self.post("/actions", webdriver::long_press_actions(at, duration_ms))
            .await?;
        Ok(())
    }

    async fn is_keyboard_shown(&self) -> Result<bool, DriverError> {
        let value = self.mobile("isKeyboardShown", json!({})).await?;
        expect_bool(value)
    }

    async fn hide_keyboard(&self) -> Result<(), DriverError> {
        self.mobile("hideKeyboard", json!({})).await?;
        Ok(())
    }

    async fn background_app(&self, seconds: u64) -> Result<(), DriverError> {
        self.ensure_active()?;
        // The server holds the request for the whole background period.
        let timeout = COMMAND_TIMEOUT + Duration::from_secs(seconds);
        self.client
            .command_with_timeout(
                Method::POST,
                &self.path("/execute/sync"),
                Some(webdriver::mobile_command("backgroundApp", json!({"seconds": seconds}))),
                timeout,
            )
            .await?;
        Ok(())
    }

    async fn activate_app(&self, app_id: &str) -> Result<(), DriverError> {
        self.mobile("activateApp", self.app_args(app_id)).await?;
        Ok(())
    }

    async fn terminate_app(&self, app_id: &str) -> Result<(), DriverError> {
        self.mobile("terminateApp", self.app_args(app_id)).await?;
        Ok(())
    }

    async fn clear_app(&self, app_id: &str) -> Result<(), DriverError> {
        match self.platform {
            Platform::Android => {
                self.mobile("clearApp", self.app_args(app_id)).await?;
                Ok(())
            }
            Platform::Ios => Err(DriverError::Unsupported(
                "XCUITest cannot clear app data".into(),
            )),
        }
    }

    async fn screenshot(&self) -> Result<Vec<u8>, DriverError> {
        use base64::Engine;

        let value = self.get("/screenshot").await?;
        let encoded = value
            .as_str()
            .ok_or_else(|| DriverError::Protocol("screenshot is not a string".into()))?;
        // Some servers wrap the payload at 76 columns.
        let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
        base64::engine::general_purpose::STANDARD
            .decode(compact)
            .map_err(|e| DriverError::Protocol(format!("invalid screenshot encoding: {e}")))
    }

    async fn page_source(&self) -> Result<String, DriverError> {
        let value = self.get("/source").await?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| DriverError::Protocol("page source is not a string".into()))
    }

    fn app_id(&self) -> Option<String> {
        if let Some(id) = self.capabilities.app_id() {
            return Some(id.to_string());
        }
        // Sessions started from an app path learn the id from the server.
        let key = match self.platform {
            Platform::Android => "appPackage",
            Platform::Ios => "bundleId",
        };
        let prefixed = format!("appium:{key}");
        let id = [key, prefixed.as_str()]
            .into_iter()
            .find_map(|k| self.server_capabilities.get(k)?.as_str())
            .filter(|id| !id.trim().is_empty())
            .map(str::to_string);
        id
    }

    async fn quit(&self) -> Result<(), DriverError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        match self.client.delete(&self.path("")).await {
            Ok(_) => {
                info!(session_id = %self.id, "session closed");
                Ok(())
            }
            Err(e) => {
                warn!(session_id = %self.id, error = %e, "error closing session");
                Err(e)
            }
        }
    }
}
