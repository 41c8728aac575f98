//! Configuration file support for msblflash.
//!
//! Configuration is loaded from multiple sources with the following priority (highest first):
//! 1. Command-line arguments
//! 2. Environment variables (MSBLFLASH_*)
//! 3. Local config file (./msblflash.toml)
//! 4. Global config file (~/.config/msblflash/config.toml)
//!
//! `--config PATH` replaces both files.

use directories::ProjectDirs;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the per-project config file.
pub(crate) const LOCAL_CONFIG_FILE: &str = "msblflash.toml";

/// Baud rate used when nothing else is configured.
pub(crate) const DEFAULT_BAUD: u32 = 9600;

/// Response timeout used when nothing else is configured.
pub(crate) const DEFAULT_TIMEOUT_MS: u64 = 3000;

/// Settle delay used when nothing else is configured.
pub(crate) const DEFAULT_SETTLE_DELAY_MS: u64 = 3000;

/// Connection configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub(crate) struct ConnectionConfig {
    /// Serial port of the bridge board (e.g., "/dev/ttyACM0" or "COM3").
    pub port: Option<String>,
    /// Baud rate.
    pub baud: Option<u32>,
    /// Response timeout in milliseconds.
    pub timeout_ms: Option<u64>,
}

/// Flash configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub(crate) struct FlashConfig {
    /// Delay after `exit` in milliseconds.
    pub settle_delay_ms: Option<u64>,
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub(crate) struct Config {
    /// Connection settings.
    #[serde(default)]
    pub connection: ConnectionConfig,
    /// Flash settings.
    #[serde(default)]
    pub flash: FlashConfig,
}

impl Config {
    /// Load configuration from the global and local files.
    pub fn load() -> Self {
        let mut config = Self::default();

        if let Some(global_path) = Self::global_config_path() {
            if let Some(global_config) = Self::load_from_file(&global_path) {
                debug!("Loaded global config from {}", global_path.display());
                config.merge(global_config);
            }
        }

        // Local config overrides global
        if let Some(local_config) = Self::load_from_file(Path::new(LOCAL_CONFIG_FILE)) {
            debug!("Loaded local config from {LOCAL_CONFIG_FILE}");
            config.merge(local_config);
        }

        config
    }

    /// Load configuration from a specific file path (--config flag).
    pub fn load_from_path(path: &Path) -> Self {
        if let Some(config) = Self::load_from_file(path) {
            debug!("Loaded config from {}", path.display());
            config
        } else {
            warn!(
                "Could not load config from {}, using defaults",
                path.display()
            );
            Self::default()
        }
    }

    fn load_from_file(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }

        match fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => Some(config),
                Err(e) => {
                    warn!("Failed to parse config file {}: {}", path.display(), e);
                    None
                },
            },
            Err(e) => {
                warn!("Failed to read config file {}: {}", path.display(), e);
                None
            },
        }
    }

    /// Get the global configuration directory.
    pub fn global_config_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "msblflash").map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the global configuration file path.
    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Merge another config into this one; set fields in `other` win.
    fn merge(&mut self, other: Self) {
        if other.connection.port.is_some() {
            self.connection.port = other.connection.port;
        }
        if other.connection.baud.is_some() {
            self.connection.baud = other.connection.baud;
        }
        if other.connection.timeout_ms.is_some() {
            self.connection.timeout_ms = other.connection.timeout_ms;
        }
        if other.flash.settle_delay_ms.is_some() {
            self.flash.settle_delay_ms = other.flash.settle_delay_ms;
        }
    }

    /// Serial port: flag/env value first, then the file.
    pub fn port(&self, cli: Option<&str>) -> Option<String> {
        cli.map(str::to_string)
            .or_else(|| self.connection.port.clone())
    }

    /// Baud rate: flag/env value first, then the file, then the default.
    pub fn baud(&self, cli: Option<u32>) -> u32 {
        cli.or(self.connection.baud).unwrap_or(DEFAULT_BAUD)
    }

    /// Response timeout: flag/env value first, then the file, then the default.
    pub fn timeout(&self, cli: Option<u64>) -> Duration {
        Duration::from_millis(
            cli.or(self.connection.timeout_ms)
                .unwrap_or(DEFAULT_TIMEOUT_MS),
        )
    }

    /// Settle delay: flag/env value first, then the file, then the default.
    pub fn settle_delay(&self, cli: Option<u64>) -> Duration {
        Duration::from_millis(
            cli.or(self.flash.settle_delay_ms)
                .unwrap_or(DEFAULT_SETTLE_DELAY_MS),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.connection.port.is_none());
        assert!(config.connection.baud.is_none());
        assert!(config.connection.timeout_ms.is_none());
        assert!(config.flash.settle_delay_ms.is_none());
    }

    #[test]
    fn test_defaults_resolve_to_bridge_settings() {
        let config = Config::default();
        assert_eq!(config.port(None), None);
        assert_eq!(config.baud(None), 9600);
        assert_eq!(config.timeout(None), Duration::from_secs(3));
        assert_eq!(config.settle_delay(None), Duration::from_secs(3));
    }

    #[test]
    fn test_cli_value_beats_file() {
        let mut config = Config::default();
        config.connection.port = Some("/dev/ttyACM0".into());
        config.connection.baud = Some(115_200);
        config.flash.settle_delay_ms = Some(500);

        assert_eq!(config.port(Some("COM7")).as_deref(), Some("COM7"));
        assert_eq!(config.port(None).as_deref(), Some("/dev/ttyACM0"));
        assert_eq!(config.baud(Some(57_600)), 57_600);
        assert_eq!(config.baud(None), 115_200);
        assert_eq!(config.settle_delay(Some(0)), Duration::ZERO);
        assert_eq!(config.settle_delay(None), Duration::from_millis(500));
    }

    #[test]
    fn test_config_merge_overrides_set_fields() {
        let mut base = Config::default();
        base.connection.port = Some("/dev/ttyUSB0".into());
        base.connection.baud = Some(9600);

        let mut other = Config::default();
        other.connection.baud = Some(19_200);
        other.flash.settle_delay_ms = Some(1000);
        base.merge(other);

        assert_eq!(base.connection.port.as_deref(), Some("/dev/ttyUSB0"));
        assert_eq!(base.connection.baud, Some(19_200));
        assert_eq!(base.flash.settle_delay_ms, Some(1000));
    }

    #[test]
    fn test_config_merge_does_not_overwrite_with_none() {
        let mut base = Config::default();
        base.connection.timeout_ms = Some(5000);
        base.merge(Config::default());
        assert_eq!(base.connection.timeout_ms, Some(5000));
    }

    #[test]
    fn test_config_from_toml() {
        let toml_str = r#"
[connection]
port = "/dev/ttyACM0"
baud = 9600
timeout_ms = 2500

[flash]
settle_delay_ms = 4000
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.connection.port.as_deref(), Some("/dev/ttyACM0"));
        assert_eq!(config.connection.baud, Some(9600));
        assert_eq!(config.connection.timeout_ms, Some(2500));
        assert_eq!(config.flash.settle_delay_ms, Some(4000));
    }

    #[test]
    fn test_config_from_partial_toml() {
        let config: Config = toml::from_str("[flash]\nsettle_delay_ms = 0\n").unwrap();
        assert!(config.connection.port.is_none());
        assert_eq!(config.flash.settle_delay_ms, Some(0));
    }

    #[test]
    fn test_config_roundtrip_toml() {
        let mut config = Config::default();
        config.connection.port = Some("COM3".to_string());
        config.connection.timeout_ms = Some(1000);

        let serialized = toml::to_string_pretty(&config).unwrap();
        let deserialized: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(deserialized, config);
    }

    #[test]
    fn test_load_from_path_valid() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[connection]\nport = \"/dev/ttyS9\"\nbaud = 38400").unwrap();

        let config = Config::load_from_path(file.path());
        assert_eq!(config.connection.port.as_deref(), Some("/dev/ttyS9"));
        assert_eq!(config.connection.baud, Some(38_400));
    }

    #[test]
    fn test_load_from_path_invalid_toml_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[connection\nport = ").unwrap();

        assert_eq!(Config::load_from_path(file.path()), Config::default());
    }

    #[test]
    fn test_load_from_path_nonexistent() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from_path(&dir.path().join("missing.toml"));
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_global_config_path_ends_with_config_toml() {
        if let Some(path) = Config::global_config_path() {
            assert!(path.ends_with("config.toml"));
        }
    }
}
