//! Capability file loading.
//!
//! The capability file holds one table per platform (`android`, `ios`) plus
//! optional `server` and `defaults` tables. TOML and JSON are both accepted;
//! the format is picked from the file extension.
//!
//! ```toml
//! [server]
//! url = "http://127.0.0.1:4723"
//!
//! [android]
//! deviceName = "Pixel_6"
//! platformVersion = "14"
//! app = "/tmp/app.apk"
//! noReset = false
//!
//! [ios]
//! deviceName = "iPhone 15"
//! bundleId = "com.example.app"
//!
//! [defaults]
//! timeout_ms = 10000
//! ```
//!
//! # Example
//!
//! ```no_run
//! use mobilis_core::config::CapabilityFile;
//!
//! let file = CapabilityFile::load("config/capabilities.toml").expect("bad capability file");
//! println!("server: {}", file.server_url());
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::capabilities::{CapabilitySet, Platform};
use crate::error::{Error, Result};
use crate::page::PageDefaults;

/// Endpoint used when neither the capability set, the file, nor the
/// environment name one.
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:4723";

/// Environment variable overriding the server endpoint.
pub const SERVER_URL_ENV: &str = "MOBILIS_SERVER_URL";

/// Environment variable pointing at the capability file.
pub const CONFIG_PATH_ENV: &str = "MOBILIS_CONFIG";

/// Project-relative default location of the capability file.
pub const DEFAULT_CONFIG_PATH: &str = "config/capabilities.toml";

/// Automation server settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Parsed capability file. Immutable once loaded.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CapabilityFile {
    #[serde(default)]
    pub server: ServerSettings,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub android: Option<CapabilitySet>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ios: Option<CapabilitySet>,

    /// Facade tunables; unset keys keep the built-in values.
    #[serde(default)]
    pub defaults: PageDefaults,
}

impl CapabilityFile {
    /// Reads and parses a capability file.
    ///
    /// `.json` files are parsed as JSON, everything else as TOML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("cannot read capability file {}: {e}", path.display()))
        })?;
        let file = Self::parse(&text, Format::from_path(path))
            .map_err(|e| Error::config(format!("{}: {e}", path.display())))?;
        info!(path = %path.display(), "loaded capability file");
        Ok(file)
    }

    /// Loads from `$MOBILIS_CONFIG`, then `config/capabilities.toml`, then
    /// `~/.mobilis/capabilities.toml`.
    ///
    /// Returns [`Default`] (no platform entries) if none of them exist. A file
    /// that exists but does not parse is still an error.
    pub fn discover() -> Result<Self> {
        match Self::discover_path() {
            Some(path) => Self::load(path),
            None => {
                debug!("no capability file found, using empty configuration");
                Ok(Self::default())
            }
        }
    }

    fn discover_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            return Some(PathBuf::from(path));
        }
        let local = PathBuf::from(DEFAULT_CONFIG_PATH);
        if local.is_file() {
            return Some(local);
        }
        let home = mobilis_dir()?.join("capabilities.toml");
        home.is_file().then_some(home)
    }

    /// Parses capability text in the given format.
    pub fn parse(text: &str, format: Format) -> std::result::Result<Self, String> {
        match format {
            Format::Toml => toml::from_str(text).map_err(|e| e.to_string()),
            Format::Json => serde_json::from_str(text).map_err(|e| e.to_string()),
        }
    }

    /// The base capability set for `platform`.
    pub fn platform(&self, platform: Platform) -> Option<&CapabilitySet> {
        match platform {
            Platform::Android => self.android.as_ref(),
            Platform::Ios => self.ios.as_ref(),
        }
    }

    /// Server endpoint from the file, then `$MOBILIS_SERVER_URL`, then the
    /// loopback default.
    pub fn server_url(&self) -> String {
        self.server
            .url
            .clone()
            .or_else(|| std::env::var(SERVER_URL_ENV).ok())
            .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string())
    }
}

/// Capability file syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Toml,
    Json,
}

impl Format {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Format::Json,
            _ => Format::Toml,
        }
    }
}

/// Returns `~/.mobilis`, if a home directory is known.
pub fn mobilis_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".mobilis"))
}
