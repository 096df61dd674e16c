//! Daemon configuration management

use anyhow::{Context, Result, anyhow};
use driver::{ControllerSettings, SessionSettings};
use protocol::packets::MAX_LED_LEVEL;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Accepted range for `controller.sync_period_ms`
const SYNC_PERIOD_RANGE_MS: std::ops::RangeInclusive<u64> = 1..=1000;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default)]
    pub daemon: DaemonSettings,
    #[serde(default)]
    pub controller: ControllerConfig,
    #[serde(default)]
    pub mapper: MapperSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaemonSettings {
    #[serde(default = "DaemonSettings::default_log_level")]
    pub log_level: String,
    /// Report readiness to systemd
    #[serde(default)]
    pub service_mode: bool,
}

impl Default for DaemonSettings {
    fn default() -> Self {
        Self {
            log_level: Self::default_log_level(),
            service_mode: false,
        }
    }
}

impl DaemonSettings {
    fn default_log_level() -> String {
        "info".to_string()
    }
}

/// Per-controller settings applied when a session is opened
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Period of the synchronization loop
    #[serde(default = "ControllerConfig::default_sync_period_ms")]
    pub sync_period_ms: u64,
    /// Seconds without input before the controller powers its radio down
    #[serde(default = "ControllerConfig::default_idle_timeout_secs")]
    pub idle_timeout_secs: u16,
    /// Logo LED brightness, 0 to 100
    #[serde(default = "ControllerConfig::default_led_level")]
    pub led_level: u8,
    #[serde(default)]
    pub enable_gyros: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            sync_period_ms: Self::default_sync_period_ms(),
            idle_timeout_secs: Self::default_idle_timeout_secs(),
            led_level: Self::default_led_level(),
            enable_gyros: false,
        }
    }
}

impl ControllerConfig {
    fn default_sync_period_ms() -> u64 {
        10
    }

    fn default_idle_timeout_secs() -> u16 {
        600
    }

    fn default_led_level() -> u8 {
        50
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapperSettings {
    /// Bind the input-logging mapper to every ready controller
    #[serde(default = "MapperSettings::default_log_input")]
    pub log_input: bool,
}

impl Default for MapperSettings {
    fn default() -> Self {
        Self {
            log_input: Self::default_log_input(),
        }
    }
}

impl MapperSettings {
    fn default_log_input() -> bool {
        true
    }
}

impl DaemonConfig {
    /// Load configuration from `path`, or from the first standard location
    /// that exists
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(p) => expand_path(&p),
            None => Self::candidate_paths()
                .into_iter()
                .find(|p| p.exists())
                .ok_or_else(|| anyhow!("No configuration file found"))?,
        };

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: DaemonConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

        config.validate()?;

        tracing::info!("Loaded configuration from: {}", config_path.display());
        Ok(config)
    }

    /// Load configuration or return defaults if not found
    pub fn load_or_default() -> Self {
        match Self::load(None) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("{:#}, using defaults", e);
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::info!("Saved configuration to: {}", path.display());
        Ok(())
    }

    /// Per-user configuration file
    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("sc-cable").join("daemon.toml")
        } else {
            expand_path(Path::new("~/.config/sc-cable/daemon.toml"))
        }
    }

    fn candidate_paths() -> Vec<PathBuf> {
        vec![
            Self::default_path(),
            PathBuf::from("/etc/sc-cable/daemon.toml"),
        ]
    }

    pub fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.daemon.log_level.as_str()) {
            return Err(anyhow!(
                "Invalid log level '{}', must be one of: {}",
                self.daemon.log_level,
                valid_levels.join(", ")
            ));
        }

        if !SYNC_PERIOD_RANGE_MS.contains(&self.controller.sync_period_ms) {
            return Err(anyhow!(
                "Invalid sync period {} ms, must be between {} and {}",
                self.controller.sync_period_ms,
                SYNC_PERIOD_RANGE_MS.start(),
                SYNC_PERIOD_RANGE_MS.end()
            ));
        }

        if self.controller.led_level > MAX_LED_LEVEL {
            return Err(anyhow!(
                "Invalid LED level {}, must be at most {}",
                self.controller.led_level,
                MAX_LED_LEVEL
            ));
        }

        Ok(())
    }

    /// Settings for every session opened by the daemon
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            sync_period: Duration::from_millis(self.controller.sync_period_ms),
            controller: ControllerSettings {
                idle_timeout_secs: self.controller.idle_timeout_secs,
                led_level: self.controller.led_level,
                enable_gyros: self.controller.enable_gyros,
            },
        }
    }
}

/// Expand a leading `~` in a user-supplied path
pub fn expand_path(path: &Path) -> PathBuf {
    match path.to_str() {
        Some(s) => PathBuf::from(shellexpand::tilde(s).as_ref()),
        None => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DaemonConfig::default();
        assert_eq!(config.daemon.log_level, "info");
        assert!(!config.daemon.service_mode);
        assert_eq!(config.controller.sync_period_ms, 10);
        assert_eq!(config.controller.idle_timeout_secs, 600);
        assert_eq!(config.controller.led_level, 50);
        assert!(!config.controller.enable_gyros);
        assert!(config.mapper.log_input);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_log_level() {
        let mut config = DaemonConfig::default();

        config.daemon.log_level = "verbose".to_string();
        assert!(config.validate().is_err());

        config.daemon.log_level = "trace".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_sync_period() {
        let mut config = DaemonConfig::default();

        config.controller.sync_period_ms = 0;
        assert!(config.validate().is_err());

        config.controller.sync_period_ms = 1001;
        assert!(config.validate().is_err());

        config.controller.sync_period_ms = 1000;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_led_level() {
        let mut config = DaemonConfig::default();
        config.controller.led_level = 101;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: DaemonConfig = toml::from_str(
            r#"
[controller]
led_level = 80
"#,
        )
        .unwrap();

        assert_eq!(config.controller.led_level, 80);
        assert_eq!(config.controller.sync_period_ms, 10);
        assert_eq!(config.daemon.log_level, "info");
        assert!(config.mapper.log_input);
    }

    #[test]
    fn test_session_settings() {
        let mut config = DaemonConfig::default();
        config.controller.sync_period_ms = 4;
        config.controller.enable_gyros = true;

        let settings = config.session_settings();
        assert_eq!(settings.sync_period, Duration::from_millis(4));
        assert!(settings.controller.enable_gyros);
        assert_eq!(settings.controller.idle_timeout_secs, 600);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("daemon.toml");

        let mut config = DaemonConfig::default();
        config.daemon.log_level = "debug".to_string();
        config.mapper.log_input = false;
        config.save(&path).unwrap();

        let loaded = DaemonConfig::load(Some(path)).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daemon.toml");
        fs::write(&path, "[controller]\nsync_period_ms = 0\n").unwrap();

        assert!(DaemonConfig::load(Some(path)).is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(DaemonConfig::load(Some(dir.path().join("absent.toml"))).is_err());
    }

    #[test]
    fn test_expand_path() {
        let plain = Path::new("/etc/sc-cable/daemon.toml");
        assert_eq!(expand_path(plain), plain.to_path_buf());

        if let Some(home) = dirs::home_dir() {
            assert_eq!(
                expand_path(Path::new("~/daemon.toml")),
                home.join("daemon.toml")
            );
        }
    }
}
