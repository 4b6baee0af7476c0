use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{FilmError, Result};
use crate::export::{DEFAULT_MAX_EXPORT_BYTES, ExportFormat};
use crate::processing::{BlurMode, PipelineOptions, TINT_BLEND};

/// Environment variable that overrides [`EditorConfig::blur_mode`].
pub const BLUR_MODE_ENV: &str = "MONOS_BLUR_MODE";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
/// Persisted editor settings for monos.
pub struct EditorConfig {
    /// Longest edge of the working copy used for live previews.
    pub preview_max_edge: u32,
    /// Quiet period after a slider move before a preview render starts.
    pub debounce_ms: u64,
    pub tint_blend: f32,
    pub blur_mode: BlurMode,
    pub export_format: ExportFormat,
    pub export_max_bytes: u64,
    /// Fixed grain seed; a random one is picked per session when unset.
    pub grain_seed: Option<u64>,
    pub output_dir: Option<PathBuf>,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            preview_max_edge: 2048,
            debounce_ms: 150,
            tint_blend: TINT_BLEND,
            blur_mode: BlurMode::Box,
            export_format: ExportFormat::Jpeg,
            export_max_bytes: DEFAULT_MAX_EXPORT_BYTES,
            grain_seed: None,
            output_dir: None,
        }
    }
}

impl EditorConfig {
    /// Returns the user config file path, if a config directory is available.
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("monos").join("config.toml"))
    }

    /// Loads config from disk, falling back to defaults on any error, then
    /// applies environment overrides.
    pub fn load() -> Self {
        let mut config = Self::load_file();
        if let Ok(raw) = std::env::var(BLUR_MODE_ENV) {
            config.apply_blur_mode_override(&raw);
        }
        config
    }

    fn load_file() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };
        let Ok(contents) = std::fs::read_to_string(&path) else {
            return Self::default();
        };
        Self::from_toml(&contents)
    }

    /// Parses TOML, falling back to defaults when it does not deserialize.
    pub fn from_toml(contents: &str) -> Self {
        match toml::from_str(contents) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(%err, "ignoring unreadable config file");
                Self::default()
            }
        }
    }

    fn apply_blur_mode_override(&mut self, raw: &str) {
        match BlurMode::parse(raw) {
            Some(mode) => self.blur_mode = mode,
            None => tracing::warn!(value = raw, "unknown {BLUR_MODE_ENV}, keeping configured mode"),
        }
    }

    /// Writes config to the user config file and returns where it went.
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::config_path().ok_or_else(|| FilmError::Io {
            path: PathBuf::from("monos/config.toml"),
            source: io::Error::new(io::ErrorKind::NotFound, "no user config directory"),
        })?;
        self.write_to(&path)?;
        Ok(path)
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| FilmError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(path, self.to_toml()?).map_err(|source| FilmError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            tint_blend: self.tint_blend.clamp(0.0, 1.0),
            blur_mode: self.blur_mode,
        }
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}
