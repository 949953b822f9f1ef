//! Configuration file management
//!
//! Loads TOML configuration files and provides system settings.
//! Default config path: ~/.config/eglgbm/config.toml

use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::constants::{ARENA_DIR_NAME, DEFAULT_DEVICE, DEVICE_ENV, DEVICE_NAME_MAX};
use crate::framework::PixelFormat;
use crate::rotation::Rotation;

/// System settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Device and runtime settings
    pub system: SystemConfig,
    /// Mode overrides
    pub mode: ModeConfig,
    /// Primary layer settings
    pub layer: LayerSettings,
}

/// Device and runtime settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    /// DRM device node (takes priority over $DRICARD)
    pub device: Option<String>,
    /// Directory holding the shared arena (defaults to $XDG_RUNTIME_DIR/eglgbm)
    pub runtime_dir: Option<String>,
}

/// Mode overrides; unset fields fall back to the discovered output
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModeConfig {
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Default pixel format of the primary layer: "argb", "rgb16", ...
    pub format: Option<PixelFormat>,
}

/// Primary layer settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerSettings {
    /// Fixed rotation in degrees (0, 90, 180, 270); overrides panel orientation
    pub rotation: Option<Rotation>,
}

/// Where the device path came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceSource {
    Config,
    Environment,
    Default,
}

impl Config {
    const SYSTEM_CONFIG_PATH: &'static str = "/etc/eglgbm/config.toml";

    /// Get config file path
    ///
    /// Search order:
    /// 1. $EGLGBM_CONFIG
    /// 2. ~/.config/eglgbm/config.toml
    /// 3. /etc/eglgbm/config.toml
    pub fn config_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("EGLGBM_CONFIG") {
            let p = std::path::Path::new(&path);
            if p.exists() {
                return Some(p.to_path_buf());
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            let config_path = config_dir.join("eglgbm").join("config.toml");
            if config_path.exists() {
                return Some(config_path);
            }
        }

        let system_config = std::path::Path::new(Self::SYSTEM_CONFIG_PATH);
        if system_config.exists() {
            return Some(system_config.to_path_buf());
        }

        None
    }

    /// Load settings, falling back to built-in defaults
    pub fn load() -> Self {
        if let Some(path) = Self::config_path() {
            match Self::load_from_file(path.to_string_lossy().as_ref()) {
                Ok(config) => {
                    info!("Loaded config: {}", path.display());
                    return config;
                }
                Err(e) => {
                    warn!("Failed to load config {}: {:#}", path.display(), e);
                }
            }
        }
        info!("Using built-in default config");
        Self::default()
    }

    /// Load settings from specified path
    pub fn load_from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path))?;
        Ok(config)
    }

    /// Device path: config file, then $DRICARD, then the default node
    pub fn resolve_device(&self) -> (String, DeviceSource) {
        self.resolve_device_with(|key| std::env::var(key).ok())
    }

    /// [`resolve_device`](Self::resolve_device) with an injectable environment
    pub fn resolve_device_with<F>(&self, env: F) -> (String, DeviceSource)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(device) = self.system.device.as_deref().filter(|d| !d.is_empty()) {
            return (truncate_device(device), DeviceSource::Config);
        }

        if let Some(device) = env(DEVICE_ENV).filter(|d| !d.is_empty()) {
            return (truncate_device(&device), DeviceSource::Environment);
        }

        (DEFAULT_DEVICE.to_string(), DeviceSource::Default)
    }

    /// Directory of the shared arena
    pub fn runtime_dir(&self) -> PathBuf {
        if let Some(dir) = &self.system.runtime_dir {
            return PathBuf::from(dir);
        }
        dirs::runtime_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join(ARENA_DIR_NAME)
    }
}

/// Clip to the shared block's capacity without splitting a character
fn truncate_device(device: &str) -> String {
    if device.len() <= DEVICE_NAME_MAX {
        return device.to_string();
    }
    let mut end = DEVICE_NAME_MAX;
    while !device.is_char_boundary(end) {
        end -= 1;
    }
    device[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_from_config_wins() {
        let mut config = Config::default();
        config.system.device = Some("/dev/dri/card1".to_string());
        let (device, source) = config.resolve_device_with(|_| Some("/dev/dri/card2".to_string()));
        assert_eq!(device, "/dev/dri/card1");
        assert_eq!(source, DeviceSource::Config);
    }

    #[test]
    fn test_device_from_environment() {
        let config = Config::default();
        let (device, source) = config.resolve_device_with(|key| {
            assert_eq!(key, DEVICE_ENV);
            Some("/dev/dri/card2".to_string())
        });
        assert_eq!(device, "/dev/dri/card2");
        assert_eq!(source, DeviceSource::Environment);
    }

    #[test]
    fn test_empty_environment_uses_default() {
        let config = Config::default();
        let (device, source) = config.resolve_device_with(|_| Some(String::new()));
        assert_eq!(device, DEFAULT_DEVICE);
        assert_eq!(source, DeviceSource::Default);
    }

    #[test]
    fn test_long_device_is_truncated() {
        let mut config = Config::default();
        config.system.device = Some("x".repeat(400));
        let (device, _) = config.resolve_device_with(|_| None);
        assert_eq!(device.len(), DEVICE_NAME_MAX);
    }

    #[test]
    fn test_parse_config() {
        let config: Config = toml::from_str(
            r#"
            [system]
            device = "/dev/dri/card1"

            [mode]
            width = 1280
            height = 720
            format = "rgb16"

            [layer]
            rotation = 90
            "#,
        )
        .unwrap();
        assert_eq!(config.system.device.as_deref(), Some("/dev/dri/card1"));
        assert_eq!(config.mode.width, Some(1280));
        assert_eq!(config.mode.format, Some(PixelFormat::Rgb16));
        assert_eq!(config.layer.rotation, Some(Rotation::Deg90));
    }

    #[test]
    fn test_runtime_dir_override() {
        let mut config = Config::default();
        config.system.runtime_dir = Some("/tmp/arena".to_string());
        assert_eq!(config.runtime_dir(), PathBuf::from("/tmp/arena"));
    }
}
