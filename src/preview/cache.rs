/// Persistent thumbnail cache
///
/// Previews are stored as individual files named by a hash of the source
/// path. A single JSON index maps each source path to its preview file and
/// to the source's (mtime, size) at generation time. An entry is only
/// served while the live source still matches that pair.
///
/// Index keys are the source path as text. A path with no UTF-8 form is
/// keyed by its raw bytes in base64 behind `RAW_KEY_PREFIX`, so every key
/// names exactly one path and can be turned back into it.
///
/// The in-memory index is the source of truth while the cache is open.
/// Every mutation happens under one mutex and rewrites the index file
/// through a temp file and rename.
use crate::error::CacheError;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub const INDEX_FILE_NAME: &str = "cache-meta.json";
const INDEX_VERSION: &str = "1.0.0";
const PREVIEW_EXTENSION: &str = "b64";
const RAW_KEY_PREFIX: &str = "os-bytes:";

/// Limits applied by `maintenance`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    /// Total size of preview files above which least-recently-used entries are evicted
    pub max_bytes: u64,
    /// Entries created longer ago than this are dropped
    pub max_age: Duration,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            max_bytes: 100 * 1024 * 1024,
            max_age: Duration::days(30),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub cache_file_name: String,
    /// Source modification time, milliseconds since the Unix epoch
    pub mtime: i64,
    pub size: u64,
    pub created: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub total_entries: usize,
    pub total_size: u64,
    pub cache_dir: PathBuf,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrphanReport {
    pub deleted_count: usize,
    pub remaining_count: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceReport {
    pub evicted: usize,
    pub expired: usize,
    pub orphaned: usize,
    pub remaining: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IndexDocumentRef<'a> {
    version: &'static str,
    entries: &'a BTreeMap<String, CacheEntry>,
    last_updated: DateTime<Utc>,
}

#[derive(Deserialize)]
struct IndexDocument {
    #[serde(default)]
    entries: BTreeMap<String, CacheEntry>,
}

type Entries = BTreeMap<String, CacheEntry>;

pub struct ThumbnailCache {
    dir: PathBuf,
    index_path: PathBuf,
    policy: CachePolicy,
    entries: Mutex<Entries>,
}

impl ThumbnailCache {
    /// Get the default cache directory
    /// Returns ~/.cache/bf-copy/thumbnails on Linux
    pub fn default_dir() -> PathBuf {
        dirs::cache_dir()
            .map(|dir| dir.join("bf-copy").join("thumbnails"))
            .unwrap_or_else(|| std::env::temp_dir().join("bf-copy-thumbnails"))
    }

    /// Open (or create) a cache rooted at `dir` and load its index.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let dir = dir.into();
        let index_path = dir.join(INDEX_FILE_NAME);
        fs::create_dir_all(&dir).await.map_err(|source| CacheError::Io {
            path: dir.clone(),
            source,
        })?;

        let cache = Self {
            dir,
            index_path,
            policy: CachePolicy::default(),
            entries: Mutex::new(Entries::new()),
        };

        let loaded = cache.load_index().await?;
        let mut entries = cache.entries.lock().await;
        *entries = loaded;
        if !cache.index_path.exists() {
            cache.persist(&entries).await?;
        }
        info!(dir = %cache.dir.display(), entries = entries.len(), "thumbnail cache ready");
        drop(entries);

        Ok(cache)
    }

    pub fn with_policy(mut self, policy: CachePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Return the cached preview for `source`, or `None` on a miss.
    ///
    /// Stale entries (source changed or gone, preview file missing) are
    /// removed before the miss is reported.
    pub async fn lookup(&self, source: &Path) -> Result<Option<String>, CacheError> {
        let key = cache_key(source);
        let mut entries = self.entries.lock().await;
        let Some(entry) = entries.get(&key).cloned() else {
            return Ok(None);
        };

        let current = file_signature(source).await;
        if current != Some((entry.mtime, entry.size)) {
            debug!(source = %source.display(), "cache entry is stale");
            self.remove_entries(&mut entries, &[key]).await?;
            return Ok(None);
        }

        let preview_path = self.dir.join(&entry.cache_file_name);
        match fs::read_to_string(&preview_path).await {
            Ok(preview) => {
                if let Some(entry) = entries.get_mut(&key) {
                    entry.last_accessed = Utc::now();
                }
                self.persist(&entries).await?;
                Ok(Some(preview))
            }
            Err(e) => {
                if e.kind() != ErrorKind::NotFound {
                    warn!(path = %preview_path.display(), error = %e, "unreadable cache file");
                }
                self.remove_entries(&mut entries, &[key]).await?;
                Ok(None)
            }
        }
    }

    /// Save `preview` for `source`, replacing any previous entry.
    pub async fn store(&self, source: &Path, preview: &str) -> Result<(), CacheError> {
        let (mtime, size) = file_signature(source)
            .await
            .ok_or_else(|| CacheError::SourceMissing(source.to_path_buf()))?;
        let key = cache_key(source);
        let cache_file_name = preview_file_name(&key);
        let preview_path = self.dir.join(&cache_file_name);

        let mut entries = self.entries.lock().await;
        write_atomic(&preview_path, preview.as_bytes())
            .await
            .map_err(|source| CacheError::Io {
                path: preview_path.clone(),
                source,
            })?;

        let now = Utc::now();
        let previous = entries.insert(
            key.clone(),
            CacheEntry {
                cache_file_name,
                mtime,
                size,
                created: now,
                last_accessed: now,
            },
        );
        if let Err(e) = self.persist(&entries).await {
            // Keep memory in step with the index still on disk
            match previous {
                Some(previous) => entries.insert(key, previous),
                None => entries.remove(&key),
            };
            return Err(e);
        }
        debug!(source = %source.display(), "preview cached");
        Ok(())
    }

    /// Drop every entry whose source file no longer exists.
    pub async fn remove_orphans(&self) -> Result<OrphanReport, CacheError> {
        let mut entries = self.entries.lock().await;
        let deleted_count = self.remove_orphans_locked(&mut entries).await?;
        Ok(OrphanReport {
            deleted_count,
            remaining_count: entries.len(),
        })
    }

    /// Size ceiling (LRU eviction), then age limit, then orphan removal.
    pub async fn maintenance(&self) -> Result<MaintenanceReport, CacheError> {
        let mut entries = self.entries.lock().await;
        let mut report = MaintenanceReport::default();

        let sizes = self.preview_sizes(&entries).await;
        let total: u64 = sizes.values().sum();
        if total > self.policy.max_bytes {
            let to_free = total - self.policy.max_bytes;
            let mut by_access: Vec<_> = entries
                .iter()
                .filter_map(|(key, entry)| sizes.get(key).map(|size| (key, entry.last_accessed, *size)))
                .collect();
            by_access.sort_by_key(|(_, last_accessed, _)| *last_accessed);

            let mut freed = 0;
            let mut victims = Vec::new();
            for (key, _, size) in by_access {
                if freed >= to_free {
                    break;
                }
                freed += size;
                victims.push(key.clone());
            }
            report.evicted = self.remove_entries(&mut entries, &victims).await?;
            info!(evicted = report.evicted, freed, "cache over size limit");
        }

        let cutoff = Utc::now() - self.policy.max_age;
        let expired: Vec<_> = entries
            .iter()
            .filter(|(_, entry)| entry.created < cutoff)
            .map(|(key, _)| key.clone())
            .collect();
        report.expired = self.remove_entries(&mut entries, &expired).await?;

        report.orphaned = self.remove_orphans_locked(&mut entries).await?;
        report.remaining = entries.len();
        info!(
            evicted = report.evicted,
            expired = report.expired,
            orphaned = report.orphaned,
            remaining = report.remaining,
            "cache maintenance done"
        );
        Ok(report)
    }

    pub async fn stats(&self) -> Result<CacheStats, CacheError> {
        let entries = self.entries.lock().await;
        let total_size = self.preview_sizes(&entries).await.values().sum();
        Ok(CacheStats {
            total_entries: entries.len(),
            total_size,
            cache_dir: self.dir.clone(),
        })
    }

    /// Delete the whole cache directory and start over with an empty index.
    pub async fn clear(&self) -> Result<(), CacheError> {
        let mut entries = self.entries.lock().await;
        let io_err = |source| CacheError::Io {
            path: self.dir.clone(),
            source,
        };
        match fs::remove_dir_all(&self.dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(io_err(e)),
        }
        fs::create_dir_all(&self.dir).await.map_err(io_err)?;
        entries.clear();
        self.persist(&entries).await?;
        info!(dir = %self.dir.display(), "thumbnail cache cleared");
        Ok(())
    }

    async fn load_index(&self) -> Result<Entries, CacheError> {
        let text = match fs::read_to_string(&self.index_path).await {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Entries::new()),
            Err(source) => {
                return Err(CacheError::Io {
                    path: self.index_path.clone(),
                    source,
                })
            }
        };
        // A corrupt index only costs regeneration
        match serde_json::from_str::<IndexDocument>(&text) {
            Ok(doc) => Ok(doc.entries),
            Err(e) => {
                warn!(path = %self.index_path.display(), error = %e, "discarding unreadable cache index");
                Ok(Entries::new())
            }
        }
    }

    async fn persist(&self, entries: &Entries) -> Result<(), CacheError> {
        let doc = IndexDocumentRef {
            version: INDEX_VERSION,
            entries,
            last_updated: Utc::now(),
        };
        let bytes = serde_json::to_vec_pretty(&doc)?;
        write_atomic(&self.index_path, &bytes)
            .await
            .map_err(|source| CacheError::WriteIndex {
                path: self.index_path.clone(),
                source,
            })
    }

    /// Remove `keys` from the index and delete their preview files. Persists once.
    async fn remove_entries(&self, entries: &mut Entries, keys: &[String]) -> Result<usize, CacheError> {
        let mut removed = 0;
        for key in keys {
            let Some(entry) = entries.remove(key) else {
                continue;
            };
            removed += 1;
            let path = self.dir.join(&entry.cache_file_name);
            if let Err(e) = fs::remove_file(&path).await {
                if e.kind() != ErrorKind::NotFound {
                    warn!(path = %path.display(), error = %e, "cannot delete cache file");
                }
            }
        }
        if removed > 0 {
            self.persist(entries).await?;
        }
        Ok(removed)
    }

    async fn remove_orphans_locked(&self, entries: &mut Entries) -> Result<usize, CacheError> {
        let mut orphans = Vec::new();
        for key in entries.keys() {
            let Some(source) = source_of_key(key) else {
                warn!(key = %key, "cannot rebuild source path on this platform, keeping entry");
                continue;
            };
            // Only a definite "not there" counts; permission errors keep the entry
            if matches!(fs::try_exists(&source).await, Ok(false)) {
                orphans.push(key.clone());
            }
        }
        let deleted = self.remove_entries(entries, &orphans).await?;
        if deleted > 0 {
            debug!(deleted, "orphaned cache entries removed");
        }
        Ok(deleted)
    }

    /// Sizes of the preview files that are actually on disk, by key
    async fn preview_sizes(&self, entries: &Entries) -> BTreeMap<String, u64> {
        let mut sizes = BTreeMap::new();
        for (key, entry) in entries {
            let path = self.dir.join(&entry.cache_file_name);
            if let Ok(meta) = fs::metadata(&path).await {
                sizes.insert(key.clone(), meta.len());
            }
        }
        sizes
    }
}

impl std::fmt::Debug for ThumbnailCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThumbnailCache")
            .field("dir", &self.dir)
            .field("policy", &self.policy)
            .finish()
    }
}

fn cache_key(source: &Path) -> String {
    match source.to_str() {
        Some(text) if !text.starts_with(RAW_KEY_PREFIX) => text.to_owned(),
        _ => format!(
            "{}{}",
            RAW_KEY_PREFIX,
            URL_SAFE_NO_PAD.encode(source.as_os_str().as_encoded_bytes())
        ),
    }
}

/// The source path a key was built from, None if this platform cannot rebuild it
fn source_of_key(key: &str) -> Option<PathBuf> {
    let Some(encoded) = key.strip_prefix(RAW_KEY_PREFIX) else {
        return Some(PathBuf::from(key));
    };
    let bytes = URL_SAFE_NO_PAD.decode(encoded).ok()?;
    match String::from_utf8(bytes) {
        Ok(text) => Some(PathBuf::from(text)),
        Err(e) => path_from_raw(e.into_bytes()),
    }
}

#[cfg(unix)]
fn path_from_raw(bytes: Vec<u8>) -> Option<PathBuf> {
    use std::os::unix::ffi::OsStringExt;
    Some(PathBuf::from(std::ffi::OsString::from_vec(bytes)))
}

#[cfg(not(unix))]
fn path_from_raw(_bytes: Vec<u8>) -> Option<PathBuf> {
    None
}

/// Preview file name: hash of the source path plus extension
fn preview_file_name(key: &str) -> String {
    format!("{}.{}", blake3::hash(key.as_bytes()).to_hex(), PREVIEW_EXTENSION)
}

/// (mtime in ms, size) of a regular file, None if it is gone
async fn file_signature(path: &Path) -> Option<(i64, u64)> {
    let meta = fs::metadata(path).await.ok()?;
    if !meta.is_file() {
        return None;
    }
    let modified: DateTime<Utc> = meta.modified().ok()?.into();
    Some((modified.timestamp_millis(), meta.len()))
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, bytes).await?;
    fs::rename(&tmp, path).await
}
