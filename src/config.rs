//! Persistent configuration
//!
//! Stored as TOML under the user config directory. Every field has a
//! default, so a partial file (or none at all) is valid.

use std::path::{Path, PathBuf};
use std::time::Duration;

use macrobridge_input::{QueueConfig, WindowGeometry};
use macrobridge_transport::{LinkSettings, BAUD_RATE, WRITE_TIMEOUT_MS};
use serde::{Deserialize, Serialize};

use crate::bind_table::BindTable;
use crate::error::ConfigError;

const APP_DIR: &str = "macrobridge";

/// Serial output settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Device path, e.g. `/dev/ttyUSB0`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
    /// Connect to `port` on start-up
    pub auto_connect: bool,
    pub baud_rate: u32,
    pub write_timeout_ms: u64,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: None,
            auto_connect: false,
            baud_rate: BAUD_RATE,
            write_timeout_ms: WRITE_TIMEOUT_MS,
        }
    }
}

/// Dispatch cadence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub interval_ms: u64,
    /// Max events handed to the script per tick
    pub batch_size: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            interval_ms: 7,
            batch_size: 100,
        }
    }
}

/// Input capture
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub poll_interval_ms: u64,
    /// Key name reported as `G_PRESSED` / `G_RELEASED`
    pub hotkey: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1,
            hotkey: "f".to_string(),
        }
    }
}

/// Event queue watermarks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueSettings {
    pub high_watermark: usize,
    pub low_watermark: usize,
    pub backlog_threshold: usize,
    pub backlog_cooldown_ms: u64,
}

impl Default for QueueSettings {
    fn default() -> Self {
        let q = QueueConfig::default();
        Self {
            high_watermark: q.high_watermark,
            low_watermark: q.low_watermark,
            backlog_threshold: q.backlog_threshold,
            backlog_cooldown_ms: q.backlog_cooldown.as_millis() as u64,
        }
    }
}

/// Complete application configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Script file (default: `<config dir>/macrobridge/user_script.lua`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script_path: Option<PathBuf>,
    /// Start with relative-move jitter enabled
    pub randomize: bool,
    /// Labels for the 13 macro slots
    pub binds: BindTable,
    pub serial: SerialConfig,
    pub dispatch: DispatchConfig,
    pub capture: CaptureConfig,
    pub queue: QueueSettings,
    /// Window context for `MoveMouseTo`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window: Option<WindowGeometry>,
}

impl AppConfig {
    /// Get the default config file path
    pub fn default_path() -> PathBuf {
        config_dir().join("config.toml")
    }

    /// Load config from a file, or return default if not found
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Save config to a file, creating parent directories
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let write_error = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_error)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(write_error)
    }

    /// Configured script path, or the default next to the config file
    pub fn script_path(&self) -> PathBuf {
        self.script_path
            .clone()
            .unwrap_or_else(|| config_dir().join("user_script.lua"))
    }

    pub fn link_settings(&self) -> LinkSettings {
        LinkSettings {
            baud_rate: self.serial.baud_rate,
            write_timeout_ms: self.serial.write_timeout_ms,
        }
    }

    pub fn queue_config(&self) -> QueueConfig {
        QueueConfig {
            high_watermark: self.queue.high_watermark,
            low_watermark: self.queue.low_watermark,
            backlog_threshold: self.queue.backlog_threshold,
            backlog_cooldown: Duration::from_millis(self.queue.backlog_cooldown_ms),
        }
    }

    pub fn dispatch_interval(&self) -> Duration {
        Duration::from_millis(self.dispatch.interval_ms.max(1))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.capture.poll_interval_ms.max(1))
    }
}

fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.serial.baud_rate, 921_600);
        assert_eq!(config.serial.write_timeout_ms, 50);
        assert_eq!(config.dispatch.batch_size, 100);
        assert_eq!(config.queue.high_watermark, 1000);
        assert_eq!(config.queue.low_watermark, 800);
        assert_eq!(config.capture.hotkey, "f");
        assert!(!config.randomize);
        assert!(config.window.is_none());
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(&dir.path().join("none.toml")).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
randomize = true

[serial]
port = "/dev/ttyACM0"
auto_connect = true

[window]
x = 10
y = 20
screen_width = 2560
screen_height = 1440
"#,
        )
        .unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert!(config.randomize);
        assert_eq!(config.serial.port.as_deref(), Some("/dev/ttyACM0"));
        assert_eq!(config.serial.baud_rate, 921_600);
        assert_eq!(config.dispatch.interval_ms, 7);
        assert_eq!(config.window.map(|w| w.screen_width), Some(2560));
    }

    #[test]
    fn test_save_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("config.toml");
        let mut config = AppConfig::default();
        config.binds.set(0, "Recoil");
        config.serial.port = Some("/dev/ttyUSB1".to_string());
        config.save(&path).unwrap();
        assert_eq!(AppConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "randomize = \"maybe\"").unwrap();
        assert!(matches!(
            AppConfig::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }
}
