/// Copy execution for a differential plan
///
/// Files are written with create-new semantics so an existing
/// destination file is never replaced, even if it appeared after the
/// plan was built.
use super::{scanner, CopyRequest};
use crate::error::TransferError;
use crate::state::data::{Category, CopyPlan, CopyProgress, CopyResult, FileError};
use std::ffi::OsStr;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Scan `request.source_folder` and copy whatever is missing.
///
/// Fatal failures come back as `CopyResult { success: false, message }`.
pub async fn plan_and_copy<F>(request: CopyRequest, on_progress: F) -> CopyResult
where
    F: FnMut(&CopyProgress),
{
    info!(
        source = %request.source_folder.display(),
        photos = %request.photo_root.display(),
        videos = %request.video_root.display(),
        label = %request.label,
        "copy started"
    );

    let outcome = match scanner::plan(request).await {
        Ok(plan) => execute(&plan, on_progress).await,
        Err(e) => Err(e),
    };

    match outcome {
        Ok(result) => result,
        Err(e) => {
            error!(error = %e, "copy failed");
            CopyResult::failed(e.to_string())
        }
    }
}

/// Copy every `to_copy` entry of `plan`, reporting progress after each file.
///
/// Destination directories are created only for categories that have
/// something to copy. Per-file failures are collected, not returned.
pub async fn execute<F>(plan: &CopyPlan, mut on_progress: F) -> Result<CopyResult, TransferError>
where
    F: FnMut(&CopyProgress),
{
    let mut result = CopyResult {
        success: true,
        total_files: plan.total_files(),
        photo_dest_path: Some(plan.photo_dest.clone()),
        video_dest_path: Some(plan.video_dest.clone()),
        already_exists: plan.already_exists(),
        ..CopyResult::default()
    };

    for entry in &plan.already_present {
        match entry.category {
            Category::Photo => result.skipped_photos += 1,
            Category::Video => result.skipped_videos += 1,
        }
    }

    if plan.to_copy.is_empty() {
        info!(skipped = result.skipped(), "nothing to copy");
        return Ok(result);
    }

    for category in [Category::Photo, Category::Video] {
        if plan.must_create(category) {
            let dir = plan.destination_for(category);
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|source| TransferError::CreateDestination {
                    path: dir.to_path_buf(),
                    source,
                })?;
            debug!(path = %dir.display(), %category, "destination created");
        }
    }

    let total = plan.to_copy.len();
    let mut current = 0;
    for entry in &plan.to_copy {
        let name = entry
            .source_path
            .file_name()
            .unwrap_or_else(|| OsStr::new(&entry.file_name));
        let target = plan.destination_for(entry.category).join(name);

        match copy_file(entry.source_path.clone(), target).await {
            Ok(bytes) => {
                match entry.category {
                    Category::Photo => result.copied_photos += 1,
                    Category::Video => result.copied_videos += 1,
                }
                current += 1;
                on_progress(&CopyProgress::new(current, total, entry.file_name.as_str()));
                debug!(file = %entry.file_name, bytes, current, total, "copied");
            }
            Err(e) => {
                warn!(file = %entry.file_name, error = %e, "copy failed");
                result.errors.push(FileError {
                    file_name: entry.file_name.clone(),
                    error: describe(&e),
                });
            }
        }
    }

    info!(
        copied_photos = result.copied_photos,
        copied_videos = result.copied_videos,
        skipped = result.skipped(),
        failed = result.errors.len(),
        "copy complete"
    );
    Ok(result)
}

async fn copy_file(source: PathBuf, target: PathBuf) -> io::Result<u64> {
    tokio::task::spawn_blocking(move || copy_file_blocking(&source, &target))
        .await
        .map_err(io::Error::other)?
}

/// Copy one file without overwriting, keeping the source modification time.
fn copy_file_blocking(source: &Path, target: &Path) -> io::Result<u64> {
    let mut reader = File::open(source)?;
    let modified = reader.metadata()?.modified().ok();

    let mut writer = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(target)?;

    // From here on the target is ours, so a partial file can be removed
    let copied = match io::copy(&mut reader, &mut writer) {
        Ok(n) => n,
        Err(e) => {
            drop(writer);
            let _ = fs::remove_file(target);
            return Err(e);
        }
    };

    if let Some(modified) = modified {
        if let Err(e) = writer.set_modified(modified) {
            debug!(path = %target.display(), error = %e, "could not preserve mtime");
        }
    }
    Ok(copied)
}

fn describe(e: &io::Error) -> String {
    match e.kind() {
        io::ErrorKind::AlreadyExists => "file already exists at destination".to_string(),
        _ => e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer::scanner::plan_blocking;
    use std::sync::{Arc, Mutex};
    use tempfile::{tempdir, TempDir};

    struct Fixture {
        root: TempDir,
        source: PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            let root = tempdir().unwrap();
            let source = root.path().join("250518_1");
            fs::create_dir(&source).unwrap();
            Self { root, source }
        }

        fn write(&self, name: &str, contents: &[u8]) {
            fs::write(self.source.join(name), contents).unwrap();
        }

        fn request(&self) -> CopyRequest {
            CopyRequest::new(
                self.source.clone(),
                self.root.path().join("photos"),
                self.root.path().join("videos"),
                "trip1",
            )
        }

        fn photo_dest(&self) -> PathBuf {
            self.root.path().join("photos/2025-05-18_trip1/BF")
        }

        fn video_dest(&self) -> PathBuf {
            self.root.path().join("videos/2025-05-18_trip1/BF")
        }
    }

    #[tokio::test]
    async fn single_photo_creates_only_photo_dir() {
        let fx = Fixture::new();
        fx.write("a.jpg", &[7u8; 500]);

        let result = plan_and_copy(fx.request(), |_| {}).await;
        assert!(result.success);
        assert_eq!(result.total_files, 1);
        assert_eq!(result.copied_photos, 1);
        assert_eq!(result.copied_videos, 0);
        assert_eq!(result.video_dest_path, Some(fx.video_dest()));
        assert!(!fx.video_dest().exists());
        assert!(!result.already_exists);
        assert_eq!(fs::read(fx.photo_dest().join("a.jpg")).unwrap(), vec![7u8; 500]);
    }

    #[tokio::test]
    async fn existing_destination_file_is_skipped_and_untouched() {
        let fx = Fixture::new();
        fx.write("a.jpg", b"NEW");
        fx.write("b.mp4", b"VIDEO");
        fs::create_dir_all(fx.photo_dest()).unwrap();
        fs::write(fx.photo_dest().join("a.jpg"), b"EXISTING").unwrap();

        let result = plan_and_copy(fx.request(), |_| {}).await;
        assert!(result.success);
        assert_eq!(result.copied_photos, 0);
        assert_eq!(result.skipped_photos, 1);
        assert_eq!(result.copied_videos, 1);
        assert!(result.already_exists);
        assert_eq!(fs::read(fx.photo_dest().join("a.jpg")).unwrap(), b"EXISTING");
        assert_eq!(fs::read(fx.video_dest().join("b.mp4")).unwrap(), b"VIDEO");
    }

    #[tokio::test]
    async fn second_run_copies_nothing() {
        let fx = Fixture::new();
        fx.write("a.jpg", b"A");
        fx.write("b.jpeg", b"B");
        fx.write("c.mov", b"C");

        let first = plan_and_copy(fx.request(), |_| {}).await;
        assert_eq!(first.copied(), 3);

        let second = plan_and_copy(fx.request(), |_| {}).await;
        assert!(second.success);
        assert_eq!(second.copied(), 0);
        assert_eq!(second.skipped(), second.total_files);
        assert_eq!(second.skipped_photos, 2);
        assert_eq!(second.skipped_videos, 1);
        assert!(second.is_up_to_date());
    }

    #[tokio::test]
    async fn empty_source_creates_nothing() {
        let fx = Fixture::new();

        let result = plan_and_copy(fx.request(), |_| {}).await;
        assert!(result.success);
        assert_eq!(result.total_files, 0);
        assert!(!fx.root.path().join("photos").exists());
        assert!(!fx.root.path().join("videos").exists());
    }

    #[tokio::test]
    async fn progress_is_monotonic() {
        let fx = Fixture::new();
        for name in ["1.jpg", "2.jpg", "3.mp4", "4.dng"] {
            fx.write(name, name.as_bytes());
        }

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        plan_and_copy(fx.request(), move |p| sink.lock().unwrap().push(p.clone())).await;

        let seen = seen.lock().unwrap();
        let currents: Vec<_> = seen.iter().map(|p| p.current).collect();
        assert_eq!(currents, [1, 2, 3, 4]);
        assert!(seen.iter().all(|p| p.total == 4));
        assert_eq!(seen.last().unwrap().percentage, 100);
    }

    #[tokio::test]
    async fn file_appearing_after_plan_is_a_per_file_error() {
        let fx = Fixture::new();
        fx.write("a.jpg", b"A");
        fx.write("b.jpg", b"B");

        let plan = plan_blocking(&fx.request()).unwrap();
        fs::create_dir_all(fx.photo_dest()).unwrap();
        fs::write(fx.photo_dest().join("a.jpg"), b"RACE").unwrap();

        let result = execute(&plan, |_| {}).await.unwrap();
        assert!(result.success);
        assert_eq!(result.copied_photos, 1);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].file_name, "a.jpg");
        assert_eq!(fs::read(fx.photo_dest().join("a.jpg")).unwrap(), b"RACE");
    }

    #[tokio::test]
    async fn uncreatable_destination_is_fatal() {
        let fx = Fixture::new();
        fx.write("a.jpg", b"A");
        let blocker = fx.root.path().join("blocker");
        fs::write(&blocker, b"not a dir").unwrap();

        let mut request = fx.request();
        request.photo_root = blocker;
        let result = plan_and_copy(request, |_| {}).await;
        assert!(!result.success);
        assert!(result.message.unwrap().contains("cannot create destination"));
    }

    #[tokio::test]
    async fn missing_source_is_reported_not_panicked() {
        let fx = Fixture::new();
        let mut request = fx.request();
        request.source_folder = fx.root.path().join("gone");

        let result = plan_and_copy(request, |_| {}).await;
        assert!(!result.success);
        assert!(result.message.is_some());
    }

    #[test]
    fn copy_keeps_modification_time() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("a.jpg");
        let target = dir.path().join("b.jpg");
        fs::write(&source, b"data").unwrap();

        copy_file_blocking(&source, &target).unwrap();
        let src_time = fs::metadata(&source).unwrap().modified().unwrap();
        let dst_time = fs::metadata(&target).unwrap().modified().unwrap();
        assert_eq!(src_time, dst_time);
    }
}
