//! Configuration loading and management
//!
//! Sources, lowest to highest precedence: built-in defaults, the JSON
//! settings file in the data directory, environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::hotkey::{HotkeyConfig, DEFAULT_DEBOUNCE};

const ENV_DATA_DIR: &str = "SHORTCUT_OVERLAY_DATA_DIR";
const ENV_HOTKEY: &str = "SHORTCUT_OVERLAY_HOTKEY";
const ENV_DEBOUNCE_MS: &str = "SHORTCUT_OVERLAY_DEBOUNCE_MS";

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory for settings and runtime data
    pub data_dir: PathBuf,

    /// Hotkey that toggles the overlay
    pub hotkey: HotkeyConfig,

    /// Minimum spacing between two activations
    pub debounce: Duration,
}

/// Differences between a reloaded configuration and what is running
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReloadPlan {
    /// Hotkey to apply, when it changed
    pub hotkey: Option<HotkeyConfig>,
    /// Requested debounce, when it changed; only a restart applies it
    pub debounce: Option<Duration>,
}

impl ReloadPlan {
    pub fn is_empty(&self) -> bool {
        self.hotkey.is_none() && self.debounce.is_none()
    }
}

/// On-disk settings file (`settings.json`)
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SettingsFile {
    hotkey: Option<HotkeyConfig>,
    debounce_ms: Option<u64>,
}

/// Environment overrides, captured so loading stays testable
#[derive(Debug, Default)]
struct Overrides {
    hotkey: Option<String>,
    debounce_ms: Option<String>,
}

impl Config {
    /// Load configuration from defaults, the settings file and environment
    pub fn load() -> Result<Self> {
        let data_dir = match std::env::var_os(ENV_DATA_DIR) {
            Some(dir) => PathBuf::from(dir),
            None => default_data_dir()?,
        };

        let overrides = Overrides {
            hotkey: std::env::var(ENV_HOTKEY).ok(),
            debounce_ms: std::env::var(ENV_DEBOUNCE_MS).ok(),
        };

        Self::from_sources(data_dir, overrides)
    }

    /// Path of the JSON settings file
    pub fn settings_path(&self) -> PathBuf {
        self.data_dir.join("settings.json")
    }

    /// Ensure data directory exists
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)
            .with_context(|| format!("failed to create {}", self.data_dir.display()))?;
        Ok(())
    }

    /// Compare against the values the listener is actually using
    pub fn reload_plan(&self, live_hotkey: &HotkeyConfig, live_debounce: Duration) -> ReloadPlan {
        ReloadPlan {
            hotkey: (self.hotkey != *live_hotkey).then(|| self.hotkey.clone()),
            debounce: (self.debounce != live_debounce).then_some(self.debounce),
        }
    }

    fn from_sources(data_dir: PathBuf, overrides: Overrides) -> Result<Self> {
        let settings = read_settings(&data_dir.join("settings.json"))?;

        let mut hotkey = settings.hotkey.unwrap_or_default();
        if let Some(spec) = overrides.hotkey {
            match spec.parse::<HotkeyConfig>() {
                Ok(parsed) => hotkey = parsed,
                Err(e) => warn!(value = %spec, error = %e, "ignoring {}", ENV_HOTKEY),
            }
        }

        // An unusable hotkey falls back to the default rather than failing startup
        if let Err(e) = hotkey.required_keys() {
            let fallback = HotkeyConfig::default();
            warn!(error = %e, fallback = %fallback, "configured hotkey rejected");
            hotkey = fallback;
        }

        let mut debounce = settings
            .debounce_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_DEBOUNCE);
        if let Some(value) = overrides.debounce_ms {
            match value.trim().parse::<u64>() {
                Ok(ms) => debounce = Duration::from_millis(ms),
                Err(e) => warn!(%value, error = %e, "ignoring {}", ENV_DEBOUNCE_MS),
            }
        }

        Ok(Self {
            data_dir,
            hotkey,
            debounce,
        })
    }
}

fn default_data_dir() -> Result<PathBuf> {
    #[cfg(windows)]
    {
        let appdata = std::env::var("APPDATA").context("APPDATA is not set")?;
        Ok(PathBuf::from(appdata).join("shortcut-overlay"))
    }

    #[cfg(not(windows))]
    {
        let home = std::env::var("HOME").context("HOME is not set")?;
        Ok(PathBuf::from(home)
            .join(".local")
            .join("share")
            .join("shortcut-overlay"))
    }
}

fn read_settings(path: &Path) -> Result<SettingsFile> {
    if !path.exists() {
        debug!(?path, "no settings file, using defaults");
        return Ok(SettingsFile::default());
    }

    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "shortcut-overlay-test-{}-{}",
            name,
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_defaults_without_settings() {
        let dir = temp_dir("defaults");
        let config = Config::from_sources(dir.clone(), Overrides::default()).unwrap();

        assert_eq!(config.hotkey, HotkeyConfig::default());
        assert_eq!(config.debounce, Duration::from_millis(50));
        assert_eq!(config.settings_path(), dir.join("settings.json"));
    }

    #[test]
    fn test_settings_file() {
        let dir = temp_dir("settings");
        std::fs::write(
            dir.join("settings.json"),
            r#"{"hotkey": {"ctrl": false, "shift": false, "alt": true, "key": "F1"}, "debounce_ms": 80}"#,
        )
        .unwrap();

        let config = Config::from_sources(dir, Overrides::default()).unwrap();
        assert_eq!(config.hotkey.to_string(), "Alt+F1");
        assert_eq!(config.debounce, Duration::from_millis(80));
    }

    #[test]
    fn test_env_overrides_settings() {
        let dir = temp_dir("overrides");
        std::fs::write(dir.join("settings.json"), r#"{"hotkey": {"key": "F1"}}"#).unwrap();

        let overrides = Overrides {
            hotkey: Some("ctrl+alt+k".to_string()),
            debounce_ms: Some("0".to_string()),
        };
        let config = Config::from_sources(dir, overrides).unwrap();
        assert_eq!(config.hotkey.to_string(), "Ctrl+Alt+K");
        assert_eq!(config.debounce, Duration::ZERO);
    }

    #[test]
    fn test_invalid_hotkey_falls_back() {
        let dir = temp_dir("fallback");
        std::fs::write(dir.join("settings.json"), r#"{"hotkey": {"key": "hyper"}}"#).unwrap();

        let overrides = Overrides {
            hotkey: Some("ctrl+".to_string()),
            debounce_ms: Some("soon".to_string()),
        };
        let config = Config::from_sources(dir, overrides).unwrap();
        assert_eq!(config.hotkey, HotkeyConfig::default());
        assert_eq!(config.debounce, DEFAULT_DEBOUNCE);
    }

    #[test]
    fn test_reload_plan() {
        let dir = temp_dir("reload");
        std::fs::write(dir.join("settings.json"), r#"{"debounce_ms": 120}"#).unwrap();
        let config = Config::from_sources(dir, Overrides::default()).unwrap();

        // Only the debounce differs from what is running
        let plan = config.reload_plan(&HotkeyConfig::default(), DEFAULT_DEBOUNCE);
        assert_eq!(plan.hotkey, None);
        assert_eq!(plan.debounce, Some(Duration::from_millis(120)));
        assert!(!plan.is_empty());

        let plan = config.reload_plan(&HotkeyConfig::default(), Duration::from_millis(120));
        assert!(plan.is_empty());

        let live: HotkeyConfig = "alt+q".parse().unwrap();
        let plan = config.reload_plan(&live, Duration::from_millis(120));
        assert_eq!(plan.hotkey, Some(HotkeyConfig::default()));
        assert_eq!(plan.debounce, None);
    }

    #[test]
    fn test_malformed_settings_is_an_error() {
        let dir = temp_dir("malformed");
        std::fs::write(dir.join("settings.json"), "{not json").unwrap();

        assert!(Config::from_sources(dir, Overrides::default()).is_err());
    }
}
