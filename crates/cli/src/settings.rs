use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use faceguide_core::detection::domain::face_detector::PerformanceMode;
use faceguide_core::guidance::domain::center_target::CenterTarget;
use faceguide_core::guidance::domain::guidance_error::GuidanceError;
use faceguide_core::shared::constants::{
    APP_DIR_NAME, DEFAULT_OFFSET_X, DEFAULT_OFFSET_Y, DEFAULT_TARGET_HEIGHT, DEFAULT_TARGET_WIDTH,
    DEFAULT_TOLERANCE,
};

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("failed to read settings from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed settings in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write settings to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not determine config directory")]
    NoConfigDir,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionMode {
    Fast,
    Accurate,
}

impl From<DetectionMode> for PerformanceMode {
    fn from(mode: DetectionMode) -> Self {
        match mode {
            DetectionMode::Fast => PerformanceMode::Fast,
            DetectionMode::Accurate => PerformanceMode::Accurate,
        }
    }
}

impl From<PerformanceMode> for DetectionMode {
    fn from(mode: PerformanceMode) -> Self {
        match mode {
            PerformanceMode::Fast => DetectionMode::Fast,
            PerformanceMode::Accurate => DetectionMode::Accurate,
        }
    }
}

/// Persisted guidance settings. Missing keys take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub target_width: u32,
    pub target_height: u32,
    pub offset_x: i32,
    pub offset_y: i32,
    pub tolerance: f64,
    pub mode: DetectionMode,
    /// Pace file input at its frame rate, as a live camera would deliver it.
    pub realtime: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            target_width: DEFAULT_TARGET_WIDTH,
            target_height: DEFAULT_TARGET_HEIGHT,
            offset_x: DEFAULT_OFFSET_X,
            offset_y: DEFAULT_OFFSET_Y,
            tolerance: DEFAULT_TOLERANCE,
            mode: DetectionMode::Fast,
            realtime: true,
        }
    }
}

/// Values given on the command line; `None` keeps the file or default value.
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub target_width: Option<u32>,
    pub target_height: Option<u32>,
    pub offset_x: Option<i32>,
    pub offset_y: Option<i32>,
    pub tolerance: Option<f64>,
    pub mode: Option<PerformanceMode>,
    pub realtime: Option<bool>,
}

impl Settings {
    /// `<config dir>/FaceGuide/settings.json`.
    pub fn default_path() -> Result<PathBuf, SettingsError> {
        dirs::config_dir()
            .map(|d| d.join(APP_DIR_NAME).join("settings.json"))
            .ok_or(SettingsError::NoConfigDir)
    }

    /// Loads `explicit` if given (it must exist), otherwise the default
    /// location, falling back to defaults when no file is there.
    pub fn load(explicit: Option<&Path>) -> Result<Self, SettingsError> {
        if let Some(path) = explicit {
            return Self::load_from(path);
        }
        match Self::default_path() {
            Ok(path) if path.exists() => Self::load_from(&path),
            Ok(_) => Ok(Self::default()),
            Err(e) => {
                log::debug!("{e}; using default settings");
                Ok(Self::default())
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        let json = fs::read_to_string(path).map_err(|e| SettingsError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        let settings = serde_json::from_str(&json).map_err(|e| SettingsError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        log::debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        let write_err = |e| SettingsError::Write {
            path: path.to_path_buf(),
            source: e,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| write_err(std::io::Error::other(e)))?;
        fs::write(path, json).map_err(write_err)
    }

    /// Command-line values win over whatever was loaded.
    pub fn apply(&mut self, overrides: &SettingsOverrides) {
        if let Some(v) = overrides.target_width {
            self.target_width = v;
        }
        if let Some(v) = overrides.target_height {
            self.target_height = v;
        }
        if let Some(v) = overrides.offset_x {
            self.offset_x = v;
        }
        if let Some(v) = overrides.offset_y {
            self.offset_y = v;
        }
        if let Some(v) = overrides.tolerance {
            self.tolerance = v;
        }
        if let Some(v) = overrides.mode {
            self.mode = v.into();
        }
        if let Some(v) = overrides.realtime {
            self.realtime = v;
        }
    }

    pub fn center_target(&self) -> Result<CenterTarget, GuidanceError> {
        CenterTarget::new(
            self.target_width,
            self.target_height,
            self.offset_x,
            self.offset_y,
            self.tolerance,
        )
    }

    pub fn performance_mode(&self) -> PerformanceMode {
        self.mode.into()
    }
}
