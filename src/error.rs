/// Error types for the copy engine, the thumbnail cache and the preview generator
///
/// Each concern gets its own enum so callers can tell a fatal transfer
/// failure apart from a cache write failure or an undecodable image.
use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors for a whole copy operation.
///
/// Per-file failures are not errors at this level; they are collected
/// into `CopyResult::errors` instead.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("cannot read source folder {}: {source}", .path.display())]
    ReadSource {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot create destination folder {}: {source}", .path.display())]
    CreateDestination {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("source file not found: {}", .0.display())]
    SourceMissing(PathBuf),

    #[error("cannot write cache index {}: {source}", .path.display())]
    WriteIndex {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot encode cache index: {0}")]
    EncodeIndex(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum PreviewError {
    #[error("cannot open image {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot decode image {}: {source}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("cannot encode preview: {0}")]
    Encode(#[source] image::ImageError),

    #[error("preview task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine home directory")]
    NoHomeDirectory,

    #[error("config I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot encode config: {0}")]
    Encode(#[from] serde_json::Error),
}
