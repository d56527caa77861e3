/// Image previews for the camera browser
///
/// This module handles:
/// - Generating cropped listing thumbnails and bounded full-size previews
/// - Caching generated thumbnails on disk, keyed by source path
/// - Preparing the thumbnail strip for a session folder

pub mod cache;
pub mod generator;

use crate::error::{CacheError, PreviewError};
use crate::state::config::DEFAULT_THUMBNAIL_LIMIT;
use crate::state::data::Thumbnail;
use crate::transfer::classify::is_thumbnail_source;
use futures::{future, stream, StreamExt};
use std::path::{Path, PathBuf};
use tokio::sync::OnceCell;
use tracing::{debug, warn};
use walkdir::WalkDir;

pub use cache::{CachePolicy, CacheStats, MaintenanceReport, OrphanReport, ThumbnailCache};
pub use generator::{make_preview, Fit};

/// Thumbnails generated at the same time for one folder
const THUMBNAIL_CONCURRENCY: usize = 2;

/// Entry point for the preview side of the application.
///
/// The cache is opened lazily on first use and at most once.
#[derive(Debug)]
pub struct PreviewService {
    cache_dir: PathBuf,
    policy: CachePolicy,
    thumbnail_limit: usize,
    cache: OnceCell<ThumbnailCache>,
}

impl PreviewService {
    /// `cache_dir` defaults to the OS cache directory
    pub fn new(cache_dir: Option<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.unwrap_or_else(ThumbnailCache::default_dir),
            policy: CachePolicy::default(),
            thumbnail_limit: DEFAULT_THUMBNAIL_LIMIT,
            cache: OnceCell::new(),
        }
    }

    pub fn with_policy(mut self, policy: CachePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_thumbnail_limit(mut self, limit: usize) -> Self {
        self.thumbnail_limit = limit;
        self
    }

    /// Open the cache. Later calls return the same instance.
    pub async fn init_cache(&self) -> Result<&ThumbnailCache, CacheError> {
        self.cache
            .get_or_try_init(|| async {
                ThumbnailCache::open(&self.cache_dir)
                    .await
                    .map(|cache| cache.with_policy(self.policy))
            })
            .await
    }

    /// Thumbnails for the first JPEGs (by name) in `folder`.
    ///
    /// Files that cannot be decoded are left out. A missing folder gives
    /// an empty list.
    pub async fn get_thumbnails(&self, folder: &Path) -> Vec<Thumbnail> {
        let candidates = match list_candidates(folder.to_path_buf(), self.thumbnail_limit).await {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(folder = %folder.display(), error = %e, "cannot list folder for thumbnails");
                return Vec::new();
            }
        };

        stream::iter(candidates)
            .map(|(file_name, file_path)| async move {
                match self.thumbnail(&file_path).await {
                    Ok(preview) => Some(Thumbnail {
                        file_name,
                        file_path,
                        preview,
                    }),
                    Err(e) => {
                        warn!(file = %file_name, error = %e, "thumbnail skipped");
                        None
                    }
                }
            })
            .buffered(THUMBNAIL_CONCURRENCY)
            .filter_map(future::ready)
            .collect()
            .await
    }

    /// Cached thumbnail for one image, generated and stored on a miss
    pub async fn thumbnail(&self, path: &Path) -> Result<String, PreviewError> {
        let cache = match self.init_cache().await {
            Ok(cache) => Some(cache),
            Err(e) => {
                warn!(error = %e, "thumbnail cache unavailable, generating uncached");
                None
            }
        };

        if let Some(cache) = cache {
            match cache.lookup(path).await {
                Ok(Some(preview)) => {
                    debug!(path = %path.display(), "thumbnail cache hit");
                    return Ok(preview);
                }
                Ok(None) => {}
                Err(e) => warn!(path = %path.display(), error = %e, "cache lookup failed"),
            }
        }

        let preview = generator::make_preview_async(path.to_path_buf(), Fit::THUMBNAIL).await?;

        if let Some(cache) = cache {
            if let Err(e) = cache.store(path, &preview).await {
                warn!(path = %path.display(), error = %e, "could not cache thumbnail");
            }
        }
        Ok(preview)
    }

    /// Aspect-preserving preview at most 1200 px wide. Not cached.
    pub async fn get_full_size_preview(&self, path: &Path) -> Result<String, PreviewError> {
        generator::make_preview_async(path.to_path_buf(), Fit::FULL_SIZE).await
    }

    pub async fn clear_cache(&self) -> Result<(), CacheError> {
        self.init_cache().await?.clear().await
    }

    pub async fn cache_stats(&self) -> Result<CacheStats, CacheError> {
        self.init_cache().await?.stats().await
    }

    pub async fn cache_maintenance(&self) -> Result<MaintenanceReport, CacheError> {
        self.init_cache().await?.maintenance().await
    }

    pub async fn remove_orphans(&self) -> Result<OrphanReport, CacheError> {
        self.init_cache().await?.remove_orphans().await
    }
}

/// JPEG files directly in `folder`, sorted by name, at most `limit`
async fn list_candidates(
    folder: PathBuf,
    limit: usize,
) -> Result<Vec<(String, PathBuf)>, PreviewError> {
    let listed = tokio::task::spawn_blocking(move || {
        if !folder.is_dir() {
            return Vec::new();
        }
        let mut files: Vec<_> = WalkDir::new(&folder)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| (e.file_name().to_string_lossy().to_string(), e.into_path()))
            .filter(|(name, _)| is_thumbnail_source(name))
            .collect();
        files.truncate(limit);
        files
    })
    .await?;
    Ok(listed)
}
