/// Incremental camera-to-disk transfer
///
/// This module handles:
/// - Classifying files as photo or video
/// - Resolving dated destination folders
/// - Listing capture sessions on the camera
/// - Diffing a session against what was already copied
/// - Copying the difference without overwriting anything

pub mod classify;
pub mod destination;
pub mod executor;
pub mod scanner;
pub mod sessions;

use crate::state::config::DEFAULT_SUBFOLDER;
use std::path::PathBuf;

pub use classify::classify;
pub use destination::{build_destination_path, parse_folder_date};
pub use executor::{execute, plan_and_copy};
pub use scanner::plan;
pub use sessions::{format_file_size, list_sessions};

/// Everything needed to plan one copy run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyRequest {
    pub source_folder: PathBuf,
    pub photo_root: PathBuf,
    pub video_root: PathBuf,
    /// User-chosen name, appended to the date in the destination folder
    pub label: String,
    pub subfolder: String,
}

impl CopyRequest {
    pub fn new(
        source_folder: impl Into<PathBuf>,
        photo_root: impl Into<PathBuf>,
        video_root: impl Into<PathBuf>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            source_folder: source_folder.into(),
            photo_root: photo_root.into(),
            video_root: video_root.into(),
            label: label.into(),
            subfolder: DEFAULT_SUBFOLDER.to_string(),
        }
    }

    pub fn with_subfolder(mut self, subfolder: impl Into<String>) -> Self {
        self.subfolder = subfolder.into();
        self
    }
}
