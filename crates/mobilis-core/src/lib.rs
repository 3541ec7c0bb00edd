//! # mobilis-core
//!
//! Core library for Appium-driven mobile UI tests on Android and iOS.
//!
//! This crate centralizes device-capability configuration, creates sessions
//! against a running Appium server, and wraps each session in a page-object
//! base exposing common mobile interactions. Session negotiation, element
//! location and gesture dispatch are all done by the server; this crate only
//! configures and forwards.
//!
//! ## Modules
//!
//! - [`capabilities`] - Typed capability sets, merging and per-platform validation
//! - [`config`] - Capability file loading (TOML or JSON)
//! - [`session`] - Session factory and the live [`Session`](session::Session) handle
//! - [`page`] - [`BasePage`](page::BasePage): tap, type, swipe, long-press, scroll, waits
//! - [`driver`] - The [`AutomationDriver`](driver::AutomationDriver) command seam
//! - [`webdriver`] - Minimal W3C WebDriver JSON client
//! - [`fixture`] - Scoped sessions with failure artifacts for test bodies
//! - [`locator`], [`element`], [`gesture`] - Locators, geometry, swipe paths
//!
//! ## External Dependencies
//!
//! An Appium 2 server with the UiAutomator2 and/or XCUITest drivers must be
//! running and reachable (default `http://127.0.0.1:4723`).
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use mobilis_core::capabilities::CapabilitySet;
//! use mobilis_core::locator::Locator;
//! use mobilis_core::page::BasePage;
//! use mobilis_core::session::SessionFactory;
//!
//! # async fn example() -> mobilis_core::error::Result<()> {
//! let factory = SessionFactory::from_file("config/capabilities.toml")?;
//! let session = Arc::new(factory.create_session("android", &CapabilitySet::default()).await?);
//! let page = BasePage::new(session.clone());
//!
//! page.tap(&Locator::accessibility_id("login-button")).await?;
//! page.scroll_to_element(&Locator::accessibility_id("terms")).await?;
//!
//! use mobilis_core::driver::AutomationDriver;
//! session.quit().await?;
//! # Ok(())
//! # }
//! ```

pub mod capabilities;
pub mod config;
pub mod driver;
pub mod element;
pub mod error;
pub mod fixture;
pub mod gesture;
pub mod locator;
pub mod page;
pub mod session;
pub mod webdriver;

pub use error::{Error, Result};
