//! Error taxonomy surfaced to tests.
//!
//! Everything a facade or factory call can fail with funnels into [`Error`].
//! Transport and protocol failures from the driver layer are wrapped as
//! [`Error::Driver`]; the remaining variants are the conditions a test author
//! actually branches on.

use std::time::Duration;

use thiserror::Error;

use crate::driver::DriverError;
use crate::locator::Locator;

/// Errors returned by the session factory and the page facade.
#[derive(Error, Debug)]
pub enum Error {
    /// Capability data is malformed or incomplete. Raised before any network call.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The automation server refused or could not start a session.
    ///
    /// The message is the server's diagnostic, unmodified.
    #[error("session creation failed: {0}")]
    SessionCreation(String),

    /// The locator did not resolve before the timeout elapsed.
    #[error("element not found after {}ms: {locator}", timeout.as_millis())]
    ElementNotFound {
        /// The locator that was being waited on.
        locator: Locator,
        /// How long the facade waited.
        timeout: Duration,
    },

    /// A native session command failed.
    #[error(transparent)]
    Driver(#[from] DriverError),

    /// Reading configuration or writing an artifact failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Error::Configuration(message.into())
    }

    /// Returns true for [`Error::ElementNotFound`].
    pub fn is_element_not_found(&self) -> bool {
        matches!(self, Error::ElementNotFound { .. })
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;
