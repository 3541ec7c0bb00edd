//! Page-object base with common mobile interactions.
//!
//! [`BasePage`] wraps a live [`AutomationDriver`] and turns a fixed
//! vocabulary of mobile actions (tap, type, swipe, long-press,
//! scroll-until-visible, background, hide keyboard) into native session
//! commands with default tunables from [`PageDefaults`].
//!
//! Every element operation first waits for its locator by polling at a fixed
//! interval until the element satisfies the operation's condition or the
//! timeout elapses, in which case it fails with
//! [`Error::ElementNotFound`]. Only [`BasePage::is_element_present`],
//! [`BasePage::wait_for_text`] and [`BasePage::hide_keyboard`] swallow
//! failures.
//!
//! Page-specific types compose a `BasePage` rather than extend it:
//!
//! ```no_run
//! use mobilis_core::locator::Locator;
//! use mobilis_core::page::BasePage;
//!
//! struct LoginPage {
//!     base: BasePage,
//! }
//!
//! impl LoginPage {
//!     async fn login(&self, user: &str, password: &str) -> mobilis_core::error::Result<()> {
//!         self.base.send_keys(&Locator::accessibility_id("username"), user).await?;
//!         self.base.send_keys(&Locator::accessibility_id("password"), password).await?;
//!         self.base.hide_keyboard().await;
//!         self.base.tap(&Locator::accessibility_id("login-button")).await
//!     }
//! }
//! ```

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::driver::{AutomationDriver, DriverError};
use crate::element::ElementRef;
use crate::error::{Error, Result};
use crate::gesture::{swipe_path, SwipeDirection, DEFAULT_SWIPE_FRACTION};
use crate::locator::Locator;

/// Default tunables for facade operations.
///
/// Loadable from the `[defaults]` table of the capability file; keys left
/// out keep their built-in values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageDefaults {
    /// Wait applied to every element operation.
    pub timeout_ms: u64,
    /// Sleep between polls while waiting.
    pub poll_interval_ms: u64,
    /// Wait used for each presence check inside `scroll_to_element`.
    pub presence_check_timeout_ms: u64,
    /// Share of the viewport a swipe travels.
    pub swipe_fraction: f64,
    pub swipe_duration_ms: u64,
    pub long_press_ms: u64,
    /// Swipe budget of `scroll_to_element`.
    pub max_swipes: u32,
}

impl Default for PageDefaults {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            poll_interval_ms: 500,
            presence_check_timeout_ms: 2_000,
            swipe_fraction: DEFAULT_SWIPE_FRACTION,
            swipe_duration_ms: 800,
            long_press_ms: 1_000,
            max_swipes: 10,
        }
    }
}

impl PageDefaults {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn presence_check_timeout(&self) -> Duration {
        Duration::from_millis(self.presence_check_timeout_ms)
    }
}

/// What a waiting operation requires of the located element.
#[derive(Debug, Clone, Copy)]
enum Condition<'a> {
    Present,
    Visible,
    /// Displayed and enabled.
    Clickable,
    TextContains(&'a str),
}

/// Returns true if polling cannot recover from this error.
fn is_fatal(err: &DriverError) -> bool {
    match err {
        DriverError::NotConnected => true,
        DriverError::WebDriver { error, .. } => {
            error == "invalid selector" || error == "invalid session id"
        }
        _ => false,
    }
}

/// Common mobile interactions over a live session.
#[derive(Clone)]
pub struct BasePage {
    driver: Arc<dyn AutomationDriver>,
    defaults: PageDefaults,
}

impl BasePage {
    pub fn new(driver: Arc<dyn AutomationDriver>) -> Self {
        Self::with_defaults(driver, PageDefaults::default())
    }

    pub fn with_defaults(driver: Arc<dyn AutomationDriver>, defaults: PageDefaults) -> Self {
        Self { driver, defaults }
    }

    /// The underlying driver, for commands the facade does not wrap.
    pub fn driver(&self) -> &Arc<dyn AutomationDriver> {
        &self.driver
    }

    pub fn defaults(&self) -> &PageDefaults {
        &self.defaults
    }

    // -----------------------------------------------------------------------
    // Waiting
    // -----------------------------------------------------------------------

    async fn check(
        &self,
        locator: &Locator,
        condition: Condition<'_>,
    ) -> Result<Option<ElementRef>, DriverError> {
        let Some(element) = self.driver.find_element(locator).await? else {
            return Ok(None);
        };
        let satisfied = match condition {
            Condition::Present => true,
            Condition::Visible => self.driver.is_displayed(&element).await?,
            Condition::Clickable => {
                self.driver.is_displayed(&element).await?
                    && self.driver.is_enabled(&element).await?
            }
            Condition::TextContains(expected) => {
                self.driver.text(&element).await?.contains(expected)
            }
        };
        Ok(satisfied.then_some(element))
    }

    /// Polls until `condition` holds or `timeout` elapses.
    ///
    /// Fails no earlier than `timeout` and no later than `timeout` plus one
    /// poll interval (plus the duration of the last check).
    async fn wait_until(
        &self,
        locator: &Locator,
        condition: Condition<'_>,
        timeout: Duration,
    ) -> Result<ElementRef> {
        let poll_interval = self.defaults.poll_interval();
        let start = Instant::now();

        loop {
            match self.check(locator, condition).await {
                Ok(Some(element)) => {
                    debug!(%locator, ?condition, elapsed_ms = start.elapsed().as_millis() as u64, "element ready");
                    return Ok(element);
                }
                Ok(None) => {}
                Err(e) if is_fatal(&e) => return Err(e.into()),
                Err(e) => debug!(%locator, error = %e, "check failed, polling again"),
            }

            let elapsed = start.elapsed();
            if elapsed >= timeout {
                warn!(%locator, ?condition, elapsed_ms = elapsed.as_millis() as u64, "element not found");
                return Err(Error::ElementNotFound {
                    locator: locator.clone(),
                    timeout,
                });
            }
            tokio::time::sleep(poll_interval.min(timeout - elapsed)).await;
        }
    }

    /// Waits until the element is displayed and returns it.
    ///
    /// This is the polling primitive the other element operations share.
    pub async fn wait_for_element_visible(
        &self,
        locator: &Locator,
        timeout: Duration,
    ) -> Result<ElementRef> {
        self.wait_until(locator, Condition::Visible, timeout).await
    }

    /// Waits until the element is displayed and enabled.
    pub async fn wait_for_element_clickable(
        &self,
        locator: &Locator,
        timeout: Duration,
    ) -> Result<ElementRef> {
        self.wait_until(locator, Condition::Clickable, timeout).await
    }

    /// Waits for the element's text to contain `expected`.
    ///
    /// Returns false on timeout instead of failing.
    pub async fn wait_for_text(&self, locator: &Locator, expected: &str, timeout: Duration) -> bool {
        self.wait_until(locator, Condition::TextContains(expected), timeout)
            .await
            .is_ok()
    }

    // -----------------------------------------------------------------------
    // Element finding
    // -----------------------------------------------------------------------

    /// Waits for the element to be present with the default timeout.
    pub async fn find_element(&self, locator: &Locator) -> Result<ElementRef> {
        self.find_element_within(locator, self.defaults.timeout())
            .await
    }

    pub async fn find_element_within(&self, locator: &Locator, timeout: Duration) -> Result<ElementRef> {
        self.wait_until(locator, Condition::Present, timeout).await
    }

    /// All current matches, without waiting.
    pub async fn find_elements(&self, locator: &Locator) -> Result<Vec<ElementRef>> {
        Ok(self.driver.find_elements(locator).await?)
    }

    /// Waits up to the default timeout for the element. Never fails.
    pub async fn is_element_present(&self, locator: &Locator) -> bool {
        self.is_element_present_within(locator, self.defaults.timeout())
            .await
    }

    pub async fn is_element_present_within(&self, locator: &Locator, timeout: Duration) -> bool {
        match self.wait_until(locator, Condition::Present, timeout).await {
            Ok(_) => true,
            Err(e) => {
                debug!(%locator, error = %e, "element not present");
                false
            }
        }
    }

    // -----------------------------------------------------------------------
    // Basic interactions
    // -----------------------------------------------------------------------

    /// Waits until the element is interactable, then taps it.
    pub async fn tap(&self, locator: &Locator) -> Result<()> {
        self.tap_within(locator, self.defaults.timeout()).await
    }

    pub async fn tap_within(&self, locator: &Locator, timeout: Duration) -> Result<()> {
        let span = info_span!("tap", %locator);
        async {
            let element = self.wait_until(locator, Condition::Clickable, timeout).await?;
            self.driver.click(&element).await?;
            info!("tapped element");
            Ok::<_, Error>(())
        }
        .instrument(span)
        .await
    }

    /// Waits for the element, clears it, and types `text`.
    pub async fn send_keys(&self, locator: &Locator, text: &str) -> Result<()> {
        self.send_keys_within(locator, text, self.defaults.timeout())
            .await
    }

    pub async fn send_keys_within(&self, locator: &Locator, text: &str, timeout: Duration) -> Result<()> {
        let span = info_span!("send_keys", %locator);
        async {
            let element = self.find_element_within(locator, timeout).await?;
            self.driver.clear(&element).await?;
            self.driver.send_keys(&element, text).await?;
            info!(chars = text.chars().count(), "typed text");
            Ok::<_, Error>(())
        }
        .instrument(span)
        .await
    }

    /// Waits for the element and returns its text.
    pub async fn get_text(&self, locator: &Locator) -> Result<String> {
        self.get_text_within(locator, self.defaults.timeout())
            .await
    }

    pub async fn get_text_within(&self, locator: &Locator, timeout: Duration) -> Result<String> {
        let element = self.find_element_within(locator, timeout).await?;
        Ok(self.driver.text(&element).await?)
    }

    // -----------------------------------------------------------------------
    // Gestures
    // -----------------------------------------------------------------------

    /// Swipes across the default fraction of the viewport.
    pub async fn swipe(&self, direction: SwipeDirection) -> Result<()> {
        self.swipe_by(direction, self.defaults.swipe_fraction).await
    }

    /// Swipes across `fraction` of the viewport along the direction's axis.
    pub async fn swipe_by(&self, direction: SwipeDirection, fraction: f64) -> Result<()> {
        let viewport = self.driver.window_rect().await?;
        let (start, end) = swipe_path(viewport, direction, fraction);
        self.driver
            .swipe(start, end, self.defaults.swipe_duration_ms)
            .await?;
        debug!(%direction, ?start, ?end, "swiped");
        Ok(())
    }

    pub async fn swipe_up(&self) -> Result<()> {
        self.swipe(SwipeDirection::Up).await
    }

    pub async fn swipe_down(&self) -> Result<()> {
        self.swipe(SwipeDirection::Down).await
    }

    pub async fn swipe_left(&self) -> Result<()> {
        self.swipe(SwipeDirection::Left).await
    }

    pub async fn swipe_right(&self) -> Result<()> {
        self.swipe(SwipeDirection::Right).await
    }

    /// Presses and holds the element's center for the default duration.
    pub async fn long_press(&self, locator: &Locator) -> Result<()> {
        self.long_press_for(locator, self.defaults.long_press_ms)
            .await
    }

    pub async fn long_press_for(&self, locator: &Locator, duration_ms: u64) -> Result<()> {
        let element = self.find_element(locator).await?;
        let rect = self.driver.element_rect(&element).await?;
        self.driver.long_press(rect.center(), duration_ms).await?;
        info!(%locator, duration_ms, "long pressed element");
        Ok(())
    }

    /// Swipes up until the element is present, within the default budget.
    pub async fn scroll_to_element(&self, locator: &Locator) -> Result<ElementRef> {
        self.scroll_to_element_within(locator, self.defaults.max_swipes)
            .await
    }

    /// Checks the current viewport, then swipes up at most `max_swipes`
    /// times, checking after each swipe.
    ///
    /// Only scrolls in one direction: an element above the current viewport
    /// is never found.
    pub async fn scroll_to_element_within(&self, locator: &Locator, max_swipes: u32) -> Result<ElementRef> {
        let check = self.defaults.presence_check_timeout();
        let span = info_span!("scroll_to_element", %locator, max_swipes);
        async {
            let mut swipes = 0;
            loop {
                if let Ok(element) = self.find_element_within(locator, check).await {
                    info!(swipes, "found element");
                    return Ok(element);
                }
                if swipes == max_swipes {
                    break;
                }
                self.swipe(SwipeDirection::Up).await?;
                swipes += 1;
            }
            warn!(swipes, "element not found after swipe budget");
            Err(Error::ElementNotFound {
                locator: locator.clone(),
                timeout: check.saturating_mul(max_swipes.saturating_add(1)),
            })
        }
        .instrument(span)
        .await
    }

    // -----------------------------------------------------------------------
    // Keyboard and app management
    // -----------------------------------------------------------------------

    /// Dismisses the on-screen keyboard if it is shown. Never fails.
    pub async fn hide_keyboard(&self) {
        match self.driver.is_keyboard_shown().await {
            Ok(false) => debug!("keyboard not shown"),
            Ok(true) | Err(_) => match self.driver.hide_keyboard().await {
                Ok(()) => debug!("keyboard hidden"),
                Err(e) => debug!(error = %e, "could not hide keyboard"),
            },
        }
    }

    /// Sends the app to the background for `seconds`.
    ///
    /// Does not return before `seconds` of wall-clock time have elapsed, even
    /// if the server answers early.
    pub async fn background_app(&self, seconds: u64) -> Result<()> {
        let start = Instant::now();
        self.driver.background_app(seconds).await?;
        let wanted = Duration::from_secs(seconds);
        let elapsed = start.elapsed();
        if elapsed < wanted {
            tokio::time::sleep(wanted - elapsed).await;
        }
        info!(seconds, "app backgrounded");
        Ok(())
    }

    fn require_app_id(&self) -> Result<String> {
        self.driver.app_id().ok_or_else(|| {
            DriverError::Unsupported(
                "app id unknown; set appPackage or bundleId to manage the app".into(),
            )
            .into()
        })
    }

    /// Brings the app under test to the foreground.
    pub async fn launch_app(&self) -> Result<()> {
        let app_id = self.require_app_id()?;
        self.driver.activate_app(&app_id).await?;
        info!(%app_id, "app launched");
        Ok(())
    }

    /// Stops the app under test.
    pub async fn close_app(&self) -> Result<()> {
        let app_id = self.require_app_id()?;
        self.driver.terminate_app(&app_id).await?;
        info!(%app_id, "app closed");
        Ok(())
    }

    /// Restarts the app under test with its data cleared.
    ///
    /// Where the backend cannot clear app data the app is only restarted.
    pub async fn reset_app(&self) -> Result<()> {
        let app_id = self.require_app_id()?;
        self.driver.terminate_app(&app_id).await?;
        match self.driver.clear_app(&app_id).await {
            Ok(()) => {}
            Err(DriverError::Unsupported(reason)) => {
                debug!(%app_id, %reason, "app data not cleared")
            }
            Err(e) => return Err(e.into()),
        }
        self.driver.activate_app(&app_id).await?;
        info!(%app_id, "app reset");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Artifacts
    // -----------------------------------------------------------------------

    /// Saves a PNG screenshot to `path`.
    pub async fn take_screenshot(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let png = self.driver.screenshot().await?;
        tokio::fs::write(path, png).await?;
        info!(path = %path.display(), "screenshot saved");
        Ok(())
    }

    /// The current UI hierarchy as XML.
    pub async fn page_source(&self) -> Result<String> {
        Ok(self.driver.page_source().await?)
    }
}
