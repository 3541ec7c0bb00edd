//! Capability sets and their per-platform rules.
//!
//! A [`CapabilitySet`] is the typed form of the key/value map Appium expects
//! when a session is requested. The same type is used for the base entry
//! loaded from the capability file and for call-time overrides, so every
//! field is optional until [`CapabilitySet::resolve`] merges, fills defaults,
//! and validates.
//!
//! Keys the record does not recognize are kept in [`CapabilitySet::extra`]
//! and passed through to the server verbatim. On the wire they receive the
//! `appium:` vendor prefix unless they already carry a prefix or are one of
//! the W3C standard capability names.
//!
//! Known keys may also be written in their wire spelling (`appium:app`,
//! `appium:deviceName`). [`CapabilitySet::normalized`] folds those into the
//! typed fields before anything is merged or validated.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Default `newCommandTimeout`, in seconds.
pub const DEFAULT_NEW_COMMAND_TIMEOUT: u64 = 300;

/// Capability names defined by W3C WebDriver. These are sent without
/// a vendor prefix.
const W3C_STANDARD_KEYS: &[&str] = &[
    "acceptInsecureCerts",
    "browserName",
    "browserVersion",
    "pageLoadStrategy",
    "platformName",
    "proxy",
    "setWindowRect",
    "strictFileInteractability",
    "timeouts",
    "unhandledPromptBehavior",
    "webSocketUrl",
];

/// Wire names of the typed [`CapabilitySet`] fields sent to the server.
const TYPED_KEYS: &[&str] = &[
    "platformName",
    "automationName",
    "deviceName",
    "platformVersion",
    "udid",
    "app",
    "appPackage",
    "appActivity",
    "bundleId",
    "noReset",
    "fullReset",
    "newCommandTimeout",
];

const VENDOR_PREFIX: &str = "appium:";

/// Target mobile platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Android,
    Ios,
}

impl Platform {
    /// Key of this platform's table in the capability file.
    pub fn config_key(&self) -> &'static str {
        match self {
            Platform::Android => "android",
            Platform::Ios => "ios",
        }
    }

    /// Value sent as `platformName`.
    pub fn platform_name(&self) -> &'static str {
        match self {
            Platform::Android => "Android",
            Platform::Ios => "iOS",
        }
    }

    /// Appium driver used when `automationName` is not set.
    pub fn default_automation_name(&self) -> &'static str {
        match self {
            Platform::Android => "UiAutomator2",
            Platform::Ios => "XCUITest",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.config_key())
    }
}

impl FromStr for Platform {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "android" => Ok(Platform::Android),
            "ios" => Ok(Platform::Ios),
            other => Err(Error::config(format!(
                "unsupported platform '{other}' (expected 'android' or 'ios')"
            ))),
        }
    }
}

/// Typed capability record.
///
/// Field names serialize in Appium's camelCase spelling so the same struct
/// reads the capability file and the `--set` overrides of the CLI.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilitySet {
    /// `Android` or `iOS`. Filled from the platform when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform_name: Option<String>,

    /// Appium driver name. Defaults to `UiAutomator2` / `XCUITest`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub automation_name: Option<String>,

    /// Device or simulator name. Mandatory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,

    /// OS version of the device, e.g. `"14"` or `"17.2"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform_version: Option<String>,

    /// Serial / UDID of a specific device.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub udid: Option<String>,

    /// Path or URL of the app binary to install.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app: Option<String>,

    /// Installed Android package. Requires `appActivity`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_package: Option<String>,

    /// Launchable activity of `appPackage`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_activity: Option<String>,

    /// Installed iOS app.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle_id: Option<String>,

    /// Keep app state between sessions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_reset: Option<bool>,

    /// Uninstall and reinstall the app around the session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_reset: Option<bool>,

    /// Seconds the server waits for a command before ending the session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_command_timeout: Option<u64>,

    /// Automation server endpoint for this platform. Never sent to the server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appium_url: Option<String>,

    /// Unrecognized keys, forwarded verbatim.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl CapabilitySet {
    /// Builds an override set from `key=value` pairs.
    ///
    /// Values for known string keys stay strings (so `platformVersion=14`
    /// works). Other values are read as JSON when they parse, otherwise as
    /// plain strings.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: AsRef<str>,
    {
        const STRING_KEYS: &[&str] = &[
            "platformName",
            "automationName",
            "deviceName",
            "platformVersion",
            "udid",
            "app",
            "appPackage",
            "appActivity",
            "bundleId",
            "appiumUrl",
        ];

        let mut map = Map::new();
        for (key, raw) in pairs {
            let key = key.into();
            let raw = raw.as_ref();
            let bare = key.strip_prefix(VENDOR_PREFIX).unwrap_or(&key);
            let value = if STRING_KEYS.contains(&bare) {
                Value::String(raw.to_string())
            } else {
                serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
            };
            map.insert(key, value);
        }

        serde_json::from_value(Value::Object(map))
            .map_err(|e| Error::config(format!("invalid capability override: {e}")))
    }

    /// Returns a new set with `overrides` applied on top of `self`.
    ///
    /// Every field set in `overrides` wins; pass-through keys are merged key
    /// by key.
    pub fn merged_with(&self, overrides: &CapabilitySet) -> CapabilitySet {
        fn pick<T: Clone>(base: &Option<T>, over: &Option<T>) -> Option<T> {
            over.clone().or_else(|| base.clone())
        }

        let mut extra = self.extra.clone();
        extra.extend(overrides.extra.iter().map(|(k, v)| (k.clone(), v.clone())));

        CapabilitySet {
            platform_name: pick(&self.platform_name, &overrides.platform_name),
            automation_name: pick(&self.automation_name, &overrides.automation_name),
            device_name: pick(&self.device_name, &overrides.device_name),
            platform_version: pick(&self.platform_version, &overrides.platform_version),
            udid: pick(&self.udid, &overrides.udid),
            app: pick(&self.app, &overrides.app),
            app_package: pick(&self.app_package, &overrides.app_package),
            app_activity: pick(&self.app_activity, &overrides.app_activity),
            bundle_id: pick(&self.bundle_id, &overrides.bundle_id),
            no_reset: pick(&self.no_reset, &overrides.no_reset),
            full_reset: pick(&self.full_reset, &overrides.full_reset),
            new_command_timeout: pick(&self.new_command_timeout, &overrides.new_command_timeout),
            appium_url: pick(&self.appium_url, &overrides.appium_url),
            extra,
        }
    }

    /// Folds `appium:`-prefixed spellings of the typed keys into their fields.
    ///
    /// Giving the same key both with and without the prefix is a
    /// configuration error.
    pub fn normalized(&self) -> Result<CapabilitySet> {
        let mut map = self.to_map()?;
        let prefixed: Vec<String> = map
            .keys()
            .filter(|k| {
                k.strip_prefix(VENDOR_PREFIX)
                    .is_some_and(|bare| TYPED_KEYS.contains(&bare))
            })
            .cloned()
            .collect();
        if prefixed.is_empty() {
            return Ok(self.clone());
        }

        for key in prefixed {
            let bare = key[VENDOR_PREFIX.len()..].to_string();
            if map.contains_key(&bare) {
                return Err(Error::config(format!(
                    "capability '{bare}' is given twice, as '{bare}' and '{key}'"
                )));
            }
            if let Some(value) = map.remove(&key) {
                map.insert(bare, value);
            }
        }

        serde_json::from_value(Value::Object(map))
            .map_err(|e| Error::config(format!("invalid capability: {e}")))
    }

    /// Merges `overrides`, fills platform defaults, and validates the result.
    pub fn resolve(&self, platform: Platform, overrides: &CapabilitySet) -> Result<CapabilitySet> {
        let mut caps = self.normalized()?.merged_with(&overrides.normalized()?);
        caps.apply_defaults(platform);
        caps.validate(platform)?;
        Ok(caps)
    }

    fn apply_defaults(&mut self, platform: Platform) {
        self.platform_name
            .get_or_insert_with(|| platform.platform_name().to_string());
        self.automation_name
            .get_or_insert_with(|| platform.default_automation_name().to_string());
        self.new_command_timeout
            .get_or_insert(DEFAULT_NEW_COMMAND_TIMEOUT);
    }

    /// Checks the mandatory keys for `platform`.
    pub fn validate(&self, platform: Platform) -> Result<()> {
        if let Some(name) = &self.platform_name {
            if !name.eq_ignore_ascii_case(platform.platform_name()) {
                return Err(Error::config(format!(
                    "platformName '{name}' does not match platform '{platform}'"
                )));
            }
        }

        if is_blank(&self.device_name) {
            return Err(Error::config(format!("{platform}: deviceName is required")));
        }

        let has_app = !is_blank(&self.app);
        match platform {
            Platform::Android => {
                if self.bundle_id.is_some() {
                    return Err(Error::config("android: bundleId is an iOS capability"));
                }
                let has_package = !is_blank(&self.app_package);
                let has_activity = !is_blank(&self.app_activity);
                if has_package != has_activity {
                    return Err(Error::config(
                        "android: appPackage and appActivity must be given together",
                    ));
                }
                match (has_app, has_package) {
                    (true, true) => Err(Error::config(
                        "android: ambiguous app identification, give either app or appPackage/appActivity",
                    )),
                    (false, false) => Err(Error::config(
                        "android: missing app identification, give app or appPackage/appActivity",
                    )),
                    _ => Ok(()),
                }
            }
            Platform::Ios => {
                if self.app_package.is_some() || self.app_activity.is_some() {
                    return Err(Error::config(
                        "ios: appPackage/appActivity are Android capabilities",
                    ));
                }
                let has_bundle = !is_blank(&self.bundle_id);
                match (has_app, has_bundle) {
                    (true, true) => Err(Error::config(
                        "ios: ambiguous app identification, give either app or bundleId",
                    )),
                    (false, false) => Err(Error::config(
                        "ios: missing app identification, give app or bundleId",
                    )),
                    _ => Ok(()),
                }
            }
        }
    }

    /// Identifier of the app under test for app-management commands.
    ///
    /// `appPackage` on Android, `bundleId` on iOS. `None` when the session was
    /// started from an app path only.
    pub fn app_id(&self) -> Option<&str> {
        self.app_package.as_deref().or(self.bundle_id.as_deref())
    }

    /// The W3C `alwaysMatch` object for a new-session request.
    pub fn to_w3c(&self) -> Result<Map<String, Value>> {
        let mut out = Map::new();
        for (key, value) in self.to_map()? {
            if key == "appiumUrl" {
                continue;
            }
            out.insert(wire_key(&key), value);
        }
        Ok(out)
    }

    /// Flat camelCase map of every set field plus the pass-through keys.
    fn to_map(&self) -> Result<Map<String, Value>> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(other) => Err(Error::config(format!(
                "capabilities encode to {other}, not an object"
            ))),
            Err(e) => Err(Error::config(format!("cannot encode capabilities: {e}"))),
        }
    }
}

fn wire_key(key: &str) -> String {
    if key.contains(':') || W3C_STANDARD_KEYS.contains(&key) {
        key.to_string()
    } else {
        format!("{VENDOR_PREFIX}{key}")
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn android_base() -> CapabilitySet {
        CapabilitySet {
            device_name: Some("Pixel_6".into()),
            app: Some("/tmp/app.apk".into()),
            ..Default::default()
        }
    }

    fn ios_base() -> CapabilitySet {
        CapabilitySet {
            device_name: Some("iPhone 15".into()),
            bundle_id: Some("com.example.app".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_platform_parses_case_insensitively() {
        assert_eq!("Android".parse::<Platform>().unwrap(), Platform::Android);
        assert_eq!(" IOS ".parse::<Platform>().unwrap(), Platform::Ios);
    }

    #[test]
    fn test_unknown_platform_is_configuration_error() {
        for bad in ["windows", "", "web", "androidx"] {
            let err = bad.parse::<Platform>().unwrap_err();
            assert!(matches!(err, Error::Configuration(_)), "{bad}: {err}");
        }
    }

    #[test]
    fn test_overrides_win() {
        let overrides = CapabilitySet {
            device_name: Some("Pixel_8".into()),
            no_reset: Some(true),
            ..Default::default()
        };
        let merged = android_base().merged_with(&overrides);
        assert_eq!(merged.device_name.as_deref(), Some("Pixel_8"));
        assert_eq!(merged.app.as_deref(), Some("/tmp/app.apk"));
        assert_eq!(merged.no_reset, Some(true));
    }

    #[test]
    fn test_extra_keys_merge_per_key() {
        let mut base = android_base();
        base.extra.insert("autoGrantPermissions".into(), Value::Bool(false));
        base.extra.insert("language".into(), Value::String("en".into()));
        let mut overrides = CapabilitySet::default();
        overrides
            .extra
            .insert("autoGrantPermissions".into(), Value::Bool(true));

        let merged = base.merged_with(&overrides);
        assert_eq!(merged.extra["autoGrantPermissions"], Value::Bool(true));
        assert_eq!(merged.extra["language"], Value::String("en".into()));
    }

    #[test]
    fn test_resolve_fills_defaults() {
        let caps = android_base()
            .resolve(Platform::Android, &CapabilitySet::default())
            .unwrap();
        assert_eq!(caps.platform_name.as_deref(), Some("Android"));
        assert_eq!(caps.automation_name.as_deref(), Some("UiAutomator2"));
        assert_eq!(caps.new_command_timeout, Some(DEFAULT_NEW_COMMAND_TIMEOUT));

        let caps = ios_base()
            .resolve(Platform::Ios, &CapabilitySet::default())
            .unwrap();
        assert_eq!(caps.platform_name.as_deref(), Some("iOS"));
        assert_eq!(caps.automation_name.as_deref(), Some("XCUITest"));
    }

    #[test]
    fn test_device_name_is_required() {
        let base = CapabilitySet {
            app: Some("/tmp/app.apk".into()),
            ..Default::default()
        };
        let err = base
            .resolve(Platform::Android, &CapabilitySet::default())
            .unwrap_err();
        assert!(err.to_string().contains("deviceName"));
    }

    #[test]
    fn test_both_android_identifications_are_ambiguous() {
        let overrides = CapabilitySet {
            app_package: Some("com.example".into()),
            app_activity: Some(".MainActivity".into()),
            ..Default::default()
        };
        let err = android_base()
            .resolve(Platform::Android, &overrides)
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(ref m) if m.contains("ambiguous")));
    }

    #[test]
    fn test_both_ios_identifications_are_ambiguous() {
        let overrides = CapabilitySet {
            app: Some("/tmp/App.app".into()),
            ..Default::default()
        };
        let err = ios_base().resolve(Platform::Ios, &overrides).unwrap_err();
        assert!(matches!(err, Error::Configuration(ref m) if m.contains("ambiguous")));
    }

    #[test]
    fn test_missing_identification_is_rejected() {
        let base = CapabilitySet {
            device_name: Some("Pixel_6".into()),
            ..Default::default()
        };
        let err = base
            .resolve(Platform::Android, &CapabilitySet::default())
            .unwrap_err();
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn test_package_without_activity_is_rejected() {
        let base = CapabilitySet {
            device_name: Some("Pixel_6".into()),
            app_package: Some("com.example".into()),
            ..Default::default()
        };
        assert!(base
            .resolve(Platform::Android, &CapabilitySet::default())
            .is_err());
    }

    #[test]
    fn test_foreign_identification_is_rejected() {
        let overrides = CapabilitySet {
            bundle_id: Some("com.example".into()),
            ..Default::default()
        };
        assert!(android_base()
            .resolve(Platform::Android, &overrides)
            .is_err());

        let overrides = CapabilitySet {
            app_package: Some("com.example".into()),
            ..Default::default()
        };
        assert!(ios_base().resolve(Platform::Ios, &overrides).is_err());
    }

    #[test]
    fn test_platform_name_mismatch_is_rejected() {
        let overrides = CapabilitySet {
            platform_name: Some("iOS".into()),
            ..Default::default()
        };
        assert!(android_base()
            .resolve(Platform::Android, &overrides)
            .is_err());
    }

    #[test]
    fn test_w3c_payload_prefixes_vendor_keys() {
        let mut caps = android_base()
            .resolve(Platform::Android, &CapabilitySet::default())
            .unwrap();
        caps.appium_url = Some("http://grid:4723".into());
        caps.extra
            .insert("autoGrantPermissions".into(), Value::Bool(true));
        caps.extra
            .insert("appium:options".into(), serde_json::json!({"a": 1}));
        caps.extra
            .insert("acceptInsecureCerts".into(), Value::Bool(true));

        let w3c = caps.to_w3c().unwrap();
        assert_eq!(w3c["platformName"], "Android");
        assert_eq!(w3c["appium:deviceName"], "Pixel_6");
        assert_eq!(w3c["appium:app"], "/tmp/app.apk");
        assert_eq!(w3c["appium:automationName"], "UiAutomator2");
        assert_eq!(w3c["appium:newCommandTimeout"], 300);
        assert_eq!(w3c["appium:autoGrantPermissions"], true);
        assert_eq!(w3c["appium:options"], serde_json::json!({"a": 1}));
        assert_eq!(w3c["acceptInsecureCerts"], true);
        assert!(!w3c.contains_key("appium:appiumUrl"));
        assert!(!w3c.contains_key("appiumUrl"));
    }

    #[test]
    fn test_from_pairs_keeps_known_strings() {
        let caps = CapabilitySet::from_pairs([
            ("platformVersion", "14"),
            ("noReset", "true"),
            ("newCommandTimeout", "60"),
            ("locale", "US"),
        ])
        .unwrap();
        assert_eq!(caps.platform_version.as_deref(), Some("14"));
        assert_eq!(caps.no_reset, Some(true));
        assert_eq!(caps.new_command_timeout, Some(60));
        assert_eq!(caps.extra["locale"], Value::String("US".into()));
    }

    #[test]
    fn test_from_pairs_rejects_bad_types() {
        let err = CapabilitySet::from_pairs([("noReset", "sometimes")]).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_app_id_prefers_installed_identifier() {
        let caps = CapabilitySet {
            app_package: Some("com.example".into()),
            ..Default::default()
        };
        assert_eq!(caps.app_id(), Some("com.example"));
        assert_eq!(android_base().app_id(), None);
        assert_eq!(ios_base().app_id(), Some("com.example.app"));
    }

    #[test]
    fn test_prefixed_keys_fill_typed_fields() {
        let mut base = CapabilitySet::default();
        base.extra
            .insert("appium:deviceName".into(), Value::String("Pixel_6".into()));
        base.extra
            .insert("appium:app".into(), Value::String("/tmp/app.apk".into()));
        base.extra
            .insert("appium:autoGrantPermissions".into(), Value::Bool(true));

        let caps = base
            .resolve(Platform::Android, &CapabilitySet::default())
            .unwrap();
        assert_eq!(caps.device_name.as_deref(), Some("Pixel_6"));
        assert_eq!(caps.app.as_deref(), Some("/tmp/app.apk"));
        assert!(!caps.extra.contains_key("appium:app"));
        assert_eq!(caps.extra["appium:autoGrantPermissions"], Value::Bool(true));

        let w3c = caps.to_w3c().unwrap();
        assert_eq!(w3c["appium:app"], "/tmp/app.apk");
        assert_eq!(w3c["appium:deviceName"], "Pixel_6");
    }

    #[test]
    fn test_prefixed_app_with_installed_package_is_ambiguous() {
        let base = CapabilitySet {
            device_name: Some("Pixel_6".into()),
            app_package: Some("com.example.app".into()),
            app_activity: Some(".MainActivity".into()),
            ..Default::default()
        };
        let overrides = CapabilitySet::from_pairs([("appium:app", "/tmp/app.apk")]).unwrap();

        let err = base.resolve(Platform::Android, &overrides).unwrap_err();
        assert!(matches!(err, Error::Configuration(ref m) if m.contains("ambiguous")), "{err}");
    }

    #[test]
    fn test_prefixed_override_replaces_bare_base_key() {
        let overrides = CapabilitySet::from_pairs([("appium:deviceName", "Pixel_8")]).unwrap();
        let caps = android_base()
            .resolve(Platform::Android, &overrides)
            .unwrap();
        assert_eq!(caps.device_name.as_deref(), Some("Pixel_8"));
    }

    #[test]
    fn test_same_key_with_and_without_prefix_is_rejected() {
        let mut base = android_base();
        base.extra
            .insert("appium:app".into(), Value::String("/tmp/other.apk".into()));

        let err = base
            .resolve(Platform::Android, &CapabilitySet::default())
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(ref m) if m.contains("appium:app")), "{err}");
    }

    #[test]
    fn test_prefixed_value_of_wrong_type_is_configuration_error() {
        let mut base = android_base();
        base.extra
            .insert("appium:noReset".into(), Value::String("sometimes".into()));

        let err = base.normalized().unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_from_pairs_keeps_prefixed_strings() {
        let caps = CapabilitySet::from_pairs([("appium:platformVersion", "14")]).unwrap();
        assert_eq!(caps.extra["appium:platformVersion"], Value::String("14".into()));
        let caps = caps.normalized().unwrap();
        assert_eq!(caps.platform_version.as_deref(), Some("14"));
    }
}
