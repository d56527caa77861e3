use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Default leaf folder inside every `{date}_{label}` destination
pub const DEFAULT_SUBFOLDER: &str = "BF";

/// Default number of thumbnails prepared per folder
pub const DEFAULT_THUMBNAIL_LIMIT: usize = 5;

/// User configuration, persisted as JSON.
///
/// The file lives at `~/.bf-copy/config.json` on every platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    pub photo_destination: Option<PathBuf>,
    pub video_destination: Option<PathBuf>,
    pub subfolder: String,
    /// Overrides the OS cache directory for thumbnails
    pub cache_dir: Option<PathBuf>,
    pub thumbnail_limit: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            photo_destination: None,
            video_destination: None,
            subfolder: DEFAULT_SUBFOLDER.to_string(),
            cache_dir: None,
            thumbnail_limit: DEFAULT_THUMBNAIL_LIMIT,
        }
    }
}

/// Whether each configured destination currently exists as a directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathCheck {
    pub photo_destination_exists: bool,
    pub video_destination_exists: bool,
}

impl AppConfig {
    /// Get the path where the config file should be stored
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let mut path = dirs::home_dir().ok_or(ConfigError::NoHomeDirectory)?;
        path.push(".bf-copy");
        path.push("config.json");
        Ok(path)
    }

    /// Load the config from the default location. `Ok(None)` if none saved yet.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        Self::load_from(&Self::default_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Some(config))
    }

    pub fn save(&self) -> Result<PathBuf, ConfigError> {
        let path = Self::default_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let text = serde_json::to_string_pretty(self)?;
        fs::write(path, text).map_err(io_err)?;
        info!(path = %path.display(), "config saved");
        Ok(())
    }

    /// Problems that prevent a copy run, empty when the config is usable
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if is_blank(&self.photo_destination) {
            errors.push("photo destination is not set".to_string());
        }
        if is_blank(&self.video_destination) {
            errors.push("video destination is not set".to_string());
        }
        if self.subfolder.trim().is_empty() {
            errors.push("subfolder must not be empty".to_string());
        }
        errors
    }

    pub fn check_paths(&self) -> PathCheck {
        let is_dir = |p: &Option<PathBuf>| p.as_deref().map(Path::is_dir).unwrap_or(false);
        PathCheck {
            photo_destination_exists: is_dir(&self.photo_destination),
            video_destination_exists: is_dir(&self.video_destination),
        }
    }
}

fn is_blank(path: &Option<PathBuf>) -> bool {
    path.as_ref()
        .map(|p| p.as_os_str().is_empty())
        .unwrap_or(true)
}
