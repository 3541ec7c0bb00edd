//! Element locators.
//!
//! A [`Locator`] is a `(strategy, value)` pair handed to the automation
//! server's element search. The facade never interprets the value; it is
//! passed through on every call.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Element search strategy understood by Appium.
///
/// Serializes to the `using` string of the W3C find-element command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Strategy {
    /// Resource id (Android) or element id.
    #[serde(rename = "id")]
    Id,
    /// Content description (Android) / accessibility identifier (iOS).
    #[serde(rename = "accessibility id")]
    AccessibilityId,
    #[serde(rename = "xpath")]
    XPath,
    #[serde(rename = "class name")]
    ClassName,
    #[serde(rename = "name")]
    Name,
    /// UiSelector expression, Android only.
    #[serde(rename = "-android uiautomator")]
    AndroidUiAutomator,
    /// NSPredicate expression, iOS only.
    #[serde(rename = "-ios predicate string")]
    IosPredicate,
    /// XCUITest class chain, iOS only.
    #[serde(rename = "-ios class chain")]
    IosClassChain,
}

impl Strategy {
    /// The wire name sent as `using`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Id => "id",
            Strategy::AccessibilityId => "accessibility id",
            Strategy::XPath => "xpath",
            Strategy::ClassName => "class name",
            Strategy::Name => "name",
            Strategy::AndroidUiAutomator => "-android uiautomator",
            Strategy::IosPredicate => "-ios predicate string",
            Strategy::IosClassChain => "-ios class chain",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `(strategy, value)` pair identifying zero or more on-screen elements.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Locator {
    #[serde(rename = "using")]
    pub strategy: Strategy,
    pub value: String,
}

impl Locator {
    pub fn new(strategy: Strategy, value: impl Into<String>) -> Self {
        Self {
            strategy,
            value: value.into(),
        }
    }

    pub fn id(value: impl Into<String>) -> Self {
        Self::new(Strategy::Id, value)
    }

    pub fn accessibility_id(value: impl Into<String>) -> Self {
        Self::new(Strategy::AccessibilityId, value)
    }

    pub fn xpath(value: impl Into<String>) -> Self {
        Self::new(Strategy::XPath, value)
    }

    pub fn class_name(value: impl Into<String>) -> Self {
        Self::new(Strategy::ClassName, value)
    }

    pub fn name(value: impl Into<String>) -> Self {
        Self::new(Strategy::Name, value)
    }

    pub fn android_uiautomator(value: impl Into<String>) -> Self {
        Self::new(Strategy::AndroidUiAutomator, value)
    }

    pub fn ios_predicate(value: impl Into<String>) -> Self {
        Self::new(Strategy::IosPredicate, value)
    }

    pub fn ios_class_chain(value: impl Into<String>) -> Self {
        Self::new(Strategy::IosClassChain, value)
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.strategy, self.value)
    }
}
