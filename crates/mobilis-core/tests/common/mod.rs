//! Shared test helpers for mobilis-core integration tests.
//!
//! [`MockDriver`] is an in-process [`AutomationDriver`] with a scripted
//! screen: elements can be present from the start or appear after a number
//! of swipes, and every command the facade sends is recorded for
//! assertions.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;

use mobilis_core::driver::{AutomationDriver, DriverError};
use mobilis_core::element::{ElementRef, Point, Rect};
use mobilis_core::locator::Locator;

// ---------------------------------------------------------------------------
// Scripted elements
// ---------------------------------------------------------------------------

/// One element on the mock screen, keyed by its locator value.
#[derive(Debug, Clone)]
pub struct MockElement {
    pub id: String,
    pub displayed: bool,
    pub enabled: bool,
    pub text: String,
    pub rect: Rect,
    /// Number of swipes after which the element becomes findable.
    pub appears_after_swipes: usize,
}

impl MockElement {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            displayed: true,
            enabled: true,
            text: String::new(),
            rect: Rect::new(100, 200, 300, 80),
            appears_after_swipes: 0,
        }
    }

    pub fn hidden(mut self) -> Self {
        self.displayed = false;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn rect(mut self, rect: Rect) -> Self {
        self.rect = rect;
        self
    }

    pub fn after_swipes(mut self, swipes: usize) -> Self {
        self.appears_after_swipes = swipes;
        self
    }
}

/// A recorded facade command.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Click(String),
    Clear(String),
    SendKeys(String, String),
    Swipe(Point, Point, u64),
    LongPress(Point, u64),
    HideKeyboard,
    BackgroundApp(u64),
    ActivateApp(String),
    TerminateApp(String),
    ClearApp(String),
}

// ---------------------------------------------------------------------------
// MockDriver
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct State {
    elements: HashMap<String, MockElement>,
    window: Rect,
    /// `None` makes the keyboard query fail.
    keyboard_shown: Option<bool>,
    hide_keyboard_fails: bool,
    /// WebDriver error code returned by every `find_element`.
    find_error: Option<String>,
    screenshot_fails: bool,
    app_id: Option<String>,
    /// Makes `clear_app` answer `Unsupported`, as on iOS.
    clear_unsupported: bool,
    calls: Vec<Call>,
    find_count: usize,
    quit_count: usize,
}

/// In-process driver with a scripted screen.
#[derive(Debug)]
pub struct MockDriver {
    state: Mutex<State>,
}

pub const MOCK_PNG: &[u8] = b"\x89PNG\r\n\x1a\nmock";
pub const MOCK_SOURCE: &str = "<hierarchy><node text=\"mock\"/></hierarchy>";

impl Default for MockDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDriver {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                elements: HashMap::new(),
                window: Rect::new(0, 0, 1080, 2400),
                keyboard_shown: Some(false),
                hide_keyboard_fails: false,
                find_error: None,
                screenshot_fails: false,
                app_id: None,
                clear_unsupported: false,
                calls: Vec::new(),
                find_count: 0,
                quit_count: 0,
            }),
        }
    }

    /// Places `element` on screen under `locator`'s value.
    pub fn with_element(self, locator: &Locator, element: MockElement) -> Self {
        self.state
            .lock()
            .unwrap()
            .elements
            .insert(locator.value.clone(), element);
        self
    }

    pub fn with_window(self, window: Rect) -> Self {
        self.state.lock().unwrap().window = window;
        self
    }

    pub fn with_keyboard(self, shown: Option<bool>, hide_fails: bool) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.keyboard_shown = shown;
            state.hide_keyboard_fails = hide_fails;
        }
        self
    }

    pub fn with_find_error(self, code: &str) -> Self {
        self.state.lock().unwrap().find_error = Some(code.to_string());
        self
    }

    pub fn with_failing_screenshot(self) -> Self {
        self.state.lock().unwrap().screenshot_fails = true;
        self
    }

    pub fn with_app_id(self, app_id: &str) -> Self {
        self.state.lock().unwrap().app_id = Some(app_id.to_string());
        self
    }

    pub fn without_clear_app(self) -> Self {
        self.state.lock().unwrap().clear_unsupported = true;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn swipes(&self) -> Vec<(Point, Point, u64)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Swipe(start, end, ms) => Some((start, end, ms)),
                _ => None,
            })
            .collect()
    }

    pub fn find_count(&self) -> usize {
        self.state.lock().unwrap().find_count
    }

    pub fn quit_count(&self) -> usize {
        self.state.lock().unwrap().quit_count
    }

    fn record(&self, call: Call) {
        self.state.lock().unwrap().calls.push(call);
    }

    fn element(&self, element: &ElementRef) -> Result<MockElement, DriverError> {
        self.state
            .lock()
            .unwrap()
            .elements
            .values()
            .find(|e| e.id == element.id)
            .cloned()
            .ok_or_else(|| DriverError::WebDriver {
                error: "stale element reference".into(),
                message: format!("element {} is gone", element.id),
            })
    }
}

#[async_trait]
impl AutomationDriver for MockDriver {
    async fn find_element(&self, locator: &Locator) -> Result<Option<ElementRef>, DriverError> {
        let mut state = self.state.lock().unwrap();
        state.find_count += 1;
        if let Some(code) = &state.find_error {
            return Err(DriverError::WebDriver {
                error: code.clone(),
                message: "scripted failure".into(),
            });
        }
        let swipes = state
            .calls
            .iter()
            .filter(|c| matches!(c, Call::Swipe(..)))
            .count();
        Ok(state
            .elements
            .get(&locator.value)
            .filter(|e| swipes >= e.appears_after_swipes)
            .map(|e| ElementRef::new(e.id.clone())))
    }

    async fn find_elements(&self, locator: &Locator) -> Result<Vec<ElementRef>, DriverError> {
        Ok(self.find_element(locator).await?.into_iter().collect())
    }

    async fn is_displayed(&self, element: &ElementRef) -> Result<bool, DriverError> {
        Ok(self.element(element)?.displayed)
    }

    async fn is_enabled(&self, element: &ElementRef) -> Result<bool, DriverError> {
        Ok(self.element(element)?.enabled)
    }

    async fn click(&self, element: &ElementRef) -> Result<(), DriverError> {
        self.record(Call::Click(element.id.clone()));
        Ok(())
    }

    async fn clear(&self, element: &ElementRef) -> Result<(), DriverError> {
        self.record(Call::Clear(element.id.clone()));
        Ok(())
    }

    async fn send_keys(&self, element: &ElementRef, text: &str) -> Result<(), DriverError> {
        self.record(Call::SendKeys(element.id.clone(), text.to_string()));
        Ok(())
    }

    async fn text(&self, element: &ElementRef) -> Result<String, DriverError> {
        Ok(self.element(element)?.text)
    }

    async fn element_rect(&self, element: &ElementRef) -> Result<Rect, DriverError> {
        Ok(self.element(element)?.rect)
    }

    async fn window_rect(&self) -> Result<Rect, DriverError> {
        Ok(self.state.lock().unwrap().window)
    }

    async fn swipe(&self, start: Point, end: Point, duration_ms: u64) -> Result<(), DriverError> {
        self.record(Call::Swipe(start, end, duration_ms));
        Ok(())
    }

    async fn long_press(&self, at: Point, duration_ms: u64) -> Result<(), DriverError> {
        self.record(Call::LongPress(at, duration_ms));
        Ok(())
    }

    async fn is_keyboard_shown(&self) -> Result<bool, DriverError> {
        self.state
            .lock()
            .unwrap()
            .keyboard_shown
            .ok_or_else(|| DriverError::Transport("keyboard query failed".into()))
    }

    async fn hide_keyboard(&self) -> Result<(), DriverError> {
        self.record(Call::HideKeyboard);
        if self.state.lock().unwrap().hide_keyboard_fails {
            return Err(DriverError::WebDriver {
                error: "unknown error".into(),
                message: "soft keyboard not present".into(),
            });
        }
        Ok(())
    }

    async fn background_app(&self, seconds: u64) -> Result<(), DriverError> {
        self.record(Call::BackgroundApp(seconds));
        Ok(())
    }

    async fn activate_app(&self, app_id: &str) -> Result<(), DriverError> {
        self.record(Call::ActivateApp(app_id.to_string()));
        Ok(())
    }

    async fn terminate_app(&self, app_id: &str) -> Result<(), DriverError> {
        self.record(Call::TerminateApp(app_id.to_string()));
        Ok(())
    }

    async fn clear_app(&self, app_id: &str) -> Result<(), DriverError> {
        if self.state.lock().unwrap().clear_unsupported {
            return Err(DriverError::Unsupported("scripted: no clearApp".into()));
        }
        self.record(Call::ClearApp(app_id.to_string()));
        Ok(())
    }

    async fn screenshot(&self) -> Result<Vec<u8>, DriverError> {
        if self.state.lock().unwrap().screenshot_fails {
            return Err(DriverError::Transport("screenshot failed".into()));
        }
        Ok(MOCK_PNG.to_vec())
    }

    async fn page_source(&self) -> Result<String, DriverError> {
        Ok(MOCK_SOURCE.to_string())
    }

    fn app_id(&self) -> Option<String> {
        self.state.lock().unwrap().app_id.clone()
    }

    async fn quit(&self) -> Result<(), DriverError> {
        self.state.lock().unwrap().quit_count += 1;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Temp dirs
// ---------------------------------------------------------------------------

/// A unique, not-yet-created directory under the system temp dir.
pub fn unique_temp_dir(prefix: &str) -> PathBuf {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    std::env::temp_dir().join(format!("{prefix}-{}", &suffix[..8]))
}
