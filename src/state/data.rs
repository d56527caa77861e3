/// Shared data structures for the importer
///
/// These structs represent the data model that flows between the
/// scanner, the copy executor, the preview layer and the front end.
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Which destination a file is routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Photo,
    Video,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Photo => "photo",
            Category::Video => "video",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A capture-session folder on the camera (e.g. `DCIM/250518_1`)
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureSession {
    /// Folder name only (e.g., "250518_1")
    pub name: String,
    pub path: PathBuf,
    /// Number of files with a known capture extension
    pub files: usize,
    /// Date derived from the folder name, None if it does not parse
    pub date: Option<NaiveDate>,
    /// Human-readable aggregate size (e.g., "1.5 GB")
    pub size: String,
}

/// A single file found in the source folder
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CopyPlanEntry {
    pub file_name: String,
    pub source_path: PathBuf,
    pub category: Category,
}

/// Output of the differential scan, consumed once by the executor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyPlan {
    pub to_copy: Vec<CopyPlanEntry>,
    pub already_present: Vec<CopyPlanEntry>,
    pub photo_dest: PathBuf,
    pub video_dest: PathBuf,
    /// The source holds at least one photo
    pub needs_photo_dir: bool,
    /// The source holds at least one video
    pub needs_video_dir: bool,
    pub photo_dir_existed: bool,
    pub video_dir_existed: bool,
}

impl CopyPlan {
    pub fn total_files(&self) -> usize {
        self.to_copy.len() + self.already_present.len()
    }

    pub fn destination_for(&self, category: Category) -> &Path {
        match category {
            Category::Photo => &self.photo_dest,
            Category::Video => &self.video_dest,
        }
    }

    pub fn dir_existed(&self, category: Category) -> bool {
        match category {
            Category::Photo => self.photo_dir_existed,
            Category::Video => self.video_dir_existed,
        }
    }

    /// Whether either destination directory was already on disk
    pub fn already_exists(&self) -> bool {
        self.photo_dir_existed || self.video_dir_existed
    }

    /// A destination directory must be created for `category` only when
    /// something of that category is actually going to be written there.
    pub fn must_create(&self, category: Category) -> bool {
        let needed = match category {
            Category::Photo => self.needs_photo_dir,
            Category::Video => self.needs_video_dir,
        };
        needed
            && !self.dir_existed(category)
            && self.to_copy.iter().any(|entry| entry.category == category)
    }
}

/// Emitted after each successfully copied file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CopyProgress {
    pub current: usize,
    pub total: usize,
    pub file_name: String,
    pub percentage: u8,
}

impl CopyProgress {
    pub fn new(current: usize, total: usize, file_name: impl Into<String>) -> Self {
        let percentage = if total == 0 {
            100
        } else {
            ((current as f64 / total as f64) * 100.0).round() as u8
        };
        Self {
            current,
            total,
            file_name: file_name.into(),
            percentage,
        }
    }
}

/// A per-file copy failure that did not stop the batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileError {
    pub file_name: String,
    pub error: String,
}

/// Summary of one copy run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CopyResult {
    pub success: bool,
    /// Set only when the run failed as a whole
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub total_files: usize,
    pub copied_photos: usize,
    pub copied_videos: usize,
    pub skipped_photos: usize,
    pub skipped_videos: usize,
    pub errors: Vec<FileError>,
    pub photo_dest_path: Option<PathBuf>,
    pub video_dest_path: Option<PathBuf>,
    pub already_exists: bool,
}

impl CopyResult {
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn copied(&self) -> usize {
        self.copied_photos + self.copied_videos
    }

    pub fn skipped(&self) -> usize {
        self.skipped_photos + self.skipped_videos
    }

    /// Nothing new to copy: every file was already at its destination.
    pub fn is_up_to_date(&self) -> bool {
        self.success && self.copied() == 0 && self.errors.is_empty() && self.skipped() > 0
    }
}

/// A preview prepared for a folder listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Thumbnail {
    pub file_name: String,
    pub file_path: PathBuf,
    /// `data:image/jpeg;base64,...`
    pub preview: String,
}
