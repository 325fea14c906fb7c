// SPDX-License-Identifier: GPL-3.0-only

use crate::backends::camera::DecodeMode;
use crate::constants::{
    DEFAULT_FRAME_READER_CAPACITY, DEFAULT_MAX_DECODE_DIMENSION, DEFAULT_SYMBOL_FORMATS,
    ResolutionPreset,
};
use crate::frame_processor::resolve_formats;
use crate::session::SessionSettings;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Scanner settings
///
/// Read from a JSON file; every field is optional. Nothing is ever written
/// back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// Frame reader buffer pool size
    pub frame_reader_capacity: usize,
    /// Where decode work runs (inline or offloaded)
    pub decode_mode: DecodeMode,
    /// Frames larger than this on either side are downscaled before decoding
    pub max_decode_dimension: u32,
    /// Symbol formats used when a request names none
    pub default_formats: Vec<String>,
    /// Preset used when a request names none
    pub default_preset: ResolutionPreset,
    /// How long the CLI waits for a decode
    pub scan_timeout_secs: u64,
    /// Tracing filter directive, overridden by `RUST_LOG`
    pub log_filter: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            frame_reader_capacity: DEFAULT_FRAME_READER_CAPACITY,
            decode_mode: DecodeMode::default(),
            max_decode_dimension: DEFAULT_MAX_DECODE_DIMENSION,
            default_formats: DEFAULT_SYMBOL_FORMATS
                .iter()
                .map(|name| name.to_string())
                .collect(),
            default_preset: ResolutionPreset::default(),
            scan_timeout_secs: 10,
            log_filter: None,
        }
    }
}

/// Errors loading a config file
#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, std::io::Error),
    Parse(PathBuf, serde_json::Error),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(path, e) => write!(f, "Failed to read {}: {}", path.display(), e),
            ConfigError::Parse(path, e) => write!(f, "Invalid config {}: {}", path.display(), e),
            ConfigError::Invalid(msg) => write!(f, "Invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(_, e) => Some(e),
            ConfigError::Parse(_, e) => Some(e),
            ConfigError::Invalid(_) => None,
        }
    }
}

impl Config {
    /// `$XDG_CONFIG_HOME/camera-scanner/config.json` or the platform equivalent
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("camera-scanner").join("config.json"))
    }

    /// Load and validate a config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        let config = Self::from_json(&text).map_err(|e| match e {
            ConfigError::Parse(_, e) => ConfigError::Parse(path.to_path_buf(), e),
            other => other,
        })?;
        debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Load `path`, or the default file when present, or defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.is_file() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Config =
            serde_json::from_str(text).map_err(|e| ConfigError::Parse(PathBuf::new(), e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.frame_reader_capacity == 0 {
            return Err(ConfigError::Invalid(
                "frameReaderCapacity must be at least 1".into(),
            ));
        }
        if self.max_decode_dimension < 16 {
            return Err(ConfigError::Invalid(
                "maxDecodeDimension must be at least 16".into(),
            ));
        }
        resolve_formats(&self.default_formats)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(())
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            frame_reader_capacity: self.frame_reader_capacity,
            decode_mode: self.decode_mode,
            max_decode_dimension: self.max_decode_dimension,
        }
    }

    pub fn scan_timeout(&self) -> Duration {
        Duration::from_secs(self.scan_timeout_secs)
    }
}
