//! Scoped sessions for test bodies.
//!
//! [`SessionFixture`] creates a session, hands the test body a [`BasePage`],
//! and quits the session afterwards on every exit path: normal return, an
//! `Err` from the body, or a panic (e.g. a failed assertion). When the body
//! fails, a screenshot and the page source are written to the artifact
//! directory before the session is closed.
//!
//! # Example
//!
//! ```no_run
//! use mobilis_core::capabilities::CapabilitySet;
//! use mobilis_core::fixture::SessionFixture;
//! use mobilis_core::locator::Locator;
//! use mobilis_core::session::SessionFactory;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let fixture = SessionFixture::new(SessionFactory::discover()?, "android")
//!     .artifacts_dir("target/artifacts");
//!
//! fixture
//!     .run("login_succeeds", |page| async move {
//!         page.tap(&Locator::accessibility_id("login-button")).await?;
//!         assert!(page.is_element_present(&Locator::accessibility_id("home")).await);
//!         Ok::<_, mobilis_core::Error>(())
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use futures::FutureExt;
use tracing::{error, info, info_span, warn, Instrument};

use crate::capabilities::CapabilitySet;
use crate::driver::AutomationDriver;
use crate::error::Result;
use crate::page::BasePage;
use crate::session::SessionFactory;

/// Default directory for failure artifacts.
pub const DEFAULT_ARTIFACTS_DIR: &str = "artifacts";

/// Files written when a test body fails.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailureArtifacts {
    pub screenshot: Option<PathBuf>,
    pub page_source: Option<PathBuf>,
}

/// Session-per-test fixture.
#[derive(Debug, Clone)]
pub struct SessionFixture {
    factory: SessionFactory,
    platform: String,
    overrides: CapabilitySet,
    artifacts_dir: PathBuf,
}

impl SessionFixture {
    pub fn new(factory: SessionFactory, platform: impl Into<String>) -> Self {
        Self {
            factory,
            platform: platform.into(),
            overrides: CapabilitySet::default(),
            artifacts_dir: PathBuf::from(DEFAULT_ARTIFACTS_DIR),
        }
    }

    /// Capability overrides applied to every session this fixture creates.
    pub fn overrides(mut self, overrides: CapabilitySet) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn artifacts_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifacts_dir = dir.into();
        self
    }

    /// Runs `body` against a fresh session.
    ///
    /// The session is always quit before this returns. A panic inside the
    /// body is resumed after cleanup.
    pub async fn run<F, Fut, T>(&self, name: &str, body: F) -> Result<T>
    where
        F: FnOnce(BasePage) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let span = info_span!("fixture", test = name, platform = %self.platform);
        async {
            let session = self
                .factory
                .create_session(&self.platform, &self.overrides)
                .await?;
            let driver: Arc<dyn AutomationDriver> = Arc::new(session);
            let page = BasePage::with_defaults(driver.clone(), self.factory.config().defaults);

            run_scoped(driver.as_ref(), &self.artifacts_dir, name, body(page)).await
        }
        .instrument(span)
        .await
    }
}

/// Awaits `body`, captures artifacts if it fails, and quits `driver` on every
/// path.
pub async fn run_scoped<Fut, T>(
    driver: &dyn AutomationDriver,
    artifacts_dir: &Path,
    name: &str,
    body: Fut,
) -> Result<T>
where
    Fut: Future<Output = Result<T>>,
{
    let outcome = AssertUnwindSafe(body).catch_unwind().await;

    let failed = !matches!(outcome, Ok(Ok(_)));
    if failed {
        match &outcome {
            Ok(Err(e)) => error!(test = name, error = %e, "test body failed"),
            _ => error!(test = name, "test body panicked"),
        }
        let artifacts = capture_failure_artifacts(driver, artifacts_dir, name).await;
        info!(?artifacts, "failure artifacts");
    }

    if let Err(e) = driver.quit().await {
        warn!(test = name, error = %e, "session teardown failed");
    }

    match outcome {
        Ok(result) => result,
        Err(panic) => std::panic::resume_unwind(panic),
    }
}

/// Writes a screenshot and the page source for a failed test.
///
/// Best effort: anything that cannot be captured is skipped and logged.
pub async fn capture_failure_artifacts(
    driver: &dyn AutomationDriver,
    dir: &Path,
    name: &str,
) -> FailureArtifacts {
    let mut artifacts = FailureArtifacts::default();

    if let Err(e) = tokio::fs::create_dir_all(dir).await {
        warn!(dir = %dir.display(), error = %e, "cannot create artifacts directory");
        return artifacts;
    }

    let stem = format!(
        "{}-{}",
        sanitize(name),
        Utc::now().format("%Y%m%dT%H%M%S%.3fZ")
    );

    match driver.screenshot().await {
        Ok(png) => {
            let path = dir.join(format!("{stem}.png"));
            match tokio::fs::write(&path, png).await {
                Ok(()) => artifacts.screenshot = Some(path),
                Err(e) => warn!(error = %e, "cannot write screenshot"),
            }
        }
        Err(e) => warn!(error = %e, "cannot capture screenshot"),
    }

    match driver.page_source().await {
        Ok(source) => {
            let path = dir.join(format!("{stem}.xml"));
            match tokio::fs::write(&path, source).await {
                Ok(()) => artifacts.page_source = Some(path),
                Err(e) => warn!(error = %e, "cannot write page source"),
            }
        }
        Err(e) => warn!(error = %e, "cannot capture page source"),
    }

    artifacts
}

/// Replaces characters that are awkward in file names.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}
