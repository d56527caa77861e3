/// Differential scan: which source files still need copying
use super::classify::classify;
use super::destination::{build_destination_path, parse_folder_date};
use super::CopyRequest;
use crate::error::TransferError;
use crate::state::data::{Category, CopyPlan, CopyPlanEntry};
use std::collections::HashSet;
use std::ffi::OsString;
use std::fs::{self, FileType};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Build a copy plan on a blocking worker thread
pub async fn plan(request: CopyRequest) -> Result<CopyPlan, TransferError> {
    tokio::task::spawn_blocking(move || plan_blocking(&request)).await?
}

/// Split the source folder's files into `to_copy` and `already_present`.
///
/// Only regular files directly inside the source folder are considered.
/// A file is already present when a same-named entry exists in the
/// destination directory of its category.
pub fn plan_blocking(request: &CopyRequest) -> Result<CopyPlan, TransferError> {
    let source = &request.source_folder;
    let read_err = |e: io::Error| TransferError::ReadSource {
        path: source.clone(),
        source: e,
    };
    if !fs::metadata(source).map_err(read_err)?.is_dir() {
        return Err(read_err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "not a directory",
        )));
    }

    let capture_date = source
        .file_name()
        .and_then(|name| parse_folder_date(&name.to_string_lossy()));
    let photo_dest = build_destination_path(
        &request.photo_root,
        &request.label,
        capture_date,
        &request.subfolder,
    );
    let video_dest = build_destination_path(
        &request.video_root,
        &request.label,
        capture_date,
        &request.subfolder,
    );

    let photo_dir_existed = photo_dest.is_dir();
    let video_dir_existed = video_dest.is_dir();
    let existing = ExistingNames {
        photo: existing_names(&photo_dest, photo_dir_existed),
        video: existing_names(&video_dest, video_dir_existed),
    };

    let mut plan = CopyPlan {
        to_copy: Vec::new(),
        already_present: Vec::new(),
        photo_dest,
        video_dest,
        needs_photo_dir: false,
        needs_video_dir: false,
        photo_dir_existed,
        video_dir_existed,
    };

    for entry in WalkDir::new(source).min_depth(1).max_depth(1) {
        match entry {
            Ok(entry) => {
                let file_type = entry.file_type();
                place_entry(&mut plan, &existing, entry.into_path(), Ok(file_type));
            }
            // The folder itself could not be listed
            Err(e) if e.depth() == 0 => return Err(read_err(e.into())),
            Err(e) => {
                let path = e.path().map_or_else(|| source.clone(), Path::to_path_buf);
                place_entry(&mut plan, &existing, path, Err(e.into()));
            }
        }
    }

    debug!(
        source = %source.display(),
        to_copy = plan.to_copy.len(),
        already_present = plan.already_present.len(),
        "copy plan ready"
    );
    Ok(plan)
}

/// Names already in each category's destination
#[derive(Debug, Default)]
struct ExistingNames {
    photo: HashSet<OsString>,
    video: HashSet<OsString>,
}

/// Route one source entry into the plan.
///
/// An entry whose type cannot be read is logged and lands in neither bucket.
fn place_entry(
    plan: &mut CopyPlan,
    existing: &ExistingNames,
    path: PathBuf,
    file_type: io::Result<FileType>,
) {
    let file_type = match file_type {
        Ok(t) => t,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "skipping file that cannot be stat'ed");
            return;
        }
    };
    // Symlinks report their own type here, so they are excluded too
    if !file_type.is_file() {
        return;
    }
    let Some(os_name) = path.file_name().map(|name| name.to_os_string()) else {
        return;
    };

    let file_name = os_name.to_string_lossy().to_string();
    let category = classify(&file_name);
    let names = match category {
        Category::Photo => {
            plan.needs_photo_dir = true;
            &existing.photo
        }
        Category::Video => {
            plan.needs_video_dir = true;
            &existing.video
        }
    };

    let item = CopyPlanEntry {
        file_name,
        source_path: path,
        category,
    };
    if names.contains(&os_name) {
        plan.already_present.push(item);
    } else {
        plan.to_copy.push(item);
    }
}

/// Names of the non-directory entries in `dir`, empty if it does not exist
fn existing_names(dir: &Path, exists: bool) -> HashSet<OsString> {
    if !exists {
        return HashSet::new();
    }
    let mut names = HashSet::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        match entry {
            Ok(entry) if !entry.file_type().is_dir() => {
                names.insert(entry.file_name().to_os_string());
            }
            Ok(_) => {}
            // Without the listing, the no-overwrite copy still protects existing files
            Err(e) => warn!(path = %dir.display(), error = %e, "cannot list destination entry"),
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn request(root: &Path, source: PathBuf) -> CopyRequest {
        CopyRequest::new(source, root.join("photos"), root.join("videos"), "trip")
    }

    #[test]
    fn splits_by_category_and_presence() {
        let root = tempdir().unwrap();
        let source = root.path().join("250518_1");
        fs::create_dir(&source).unwrap();
        fs::write(source.join("a.jpg"), b"A").unwrap();
        fs::write(source.join("b.JPG"), b"B").unwrap();
        fs::write(source.join("c.mp4"), b"C").unwrap();
        fs::create_dir(source.join("sub")).unwrap();

        let req = request(root.path(), source);
        let photo_dest = root.path().join("photos/2025-05-18_trip/BF");
        fs::create_dir_all(&photo_dest).unwrap();
        fs::write(photo_dest.join("a.jpg"), b"OLD").unwrap();

        let plan = plan_blocking(&req).unwrap();
        assert_eq!(plan.photo_dest, photo_dest);
        assert!(plan.photo_dir_existed);
        assert!(!plan.video_dir_existed);
        assert!(plan.needs_photo_dir && plan.needs_video_dir);
        assert_eq!(plan.total_files(), 3);

        let present: Vec<_> = plan.already_present.iter().map(|e| e.file_name.as_str()).collect();
        assert_eq!(present, ["a.jpg"]);

        let mut pending: Vec<_> = plan.to_copy.iter().map(|e| e.file_name.as_str()).collect();
        pending.sort();
        assert_eq!(pending, ["b.JPG", "c.mp4"]);
    }

    #[test]
    fn same_name_in_other_category_dir_does_not_count() {
        let root = tempdir().unwrap();
        let source = root.path().join("250518_1");
        fs::create_dir(&source).unwrap();
        fs::write(source.join("a.jpg"), b"A").unwrap();

        let req = request(root.path(), source);
        let video_dest = root.path().join("videos/2025-05-18_trip/BF");
        fs::create_dir_all(&video_dest).unwrap();
        fs::write(video_dest.join("a.jpg"), b"A").unwrap();

        let plan = plan_blocking(&req).unwrap();
        assert_eq!(plan.to_copy.len(), 1);
        assert!(plan.already_present.is_empty());
        assert!(plan.already_exists());
    }

    #[test]
    fn unparseable_session_name_dates_today() {
        let root = tempdir().unwrap();
        let source = root.path().join("100SIGMA");
        fs::create_dir(&source).unwrap();

        let plan = plan_blocking(&request(root.path(), source)).unwrap();
        let today = chrono::Local::now().date_naive().format("%Y-%m-%d").to_string();
        assert_eq!(
            plan.photo_dest,
            root.path().join("photos").join(format!("{}_trip", today)).join("BF")
        );
        assert!(plan.to_copy.is_empty());
        assert!(!plan.needs_photo_dir && !plan.needs_video_dir);
    }

    #[test]
    fn missing_source_is_fatal() {
        let root = tempdir().unwrap();
        let err = plan_blocking(&request(root.path(), root.path().join("nope"))).unwrap_err();
        assert!(matches!(err, TransferError::ReadSource { .. }));
    }

    #[test]
    fn file_as_source_is_fatal() {
        let root = tempdir().unwrap();
        let source = root.path().join("250518_1");
        fs::write(&source, b"not a folder").unwrap();
        let err = plan_blocking(&request(root.path(), source)).unwrap_err();
        assert!(matches!(err, TransferError::ReadSource { .. }));
    }

    #[test]
    fn unstatable_entry_lands_in_neither_bucket() {
        let root = tempdir().unwrap();
        let source = root.path().join("250518_1");
        fs::create_dir(&source).unwrap();
        fs::write(source.join("a.jpg"), b"A").unwrap();

        let mut plan = plan_blocking(&request(root.path(), source.clone())).unwrap();
        let before = plan.clone();
        let denied = io::Error::from(io::ErrorKind::PermissionDenied);
        place_entry(&mut plan, &ExistingNames::default(), source.join("b.mov"), Err(denied));
        assert_eq!(plan, before);

        // A readable entry after the failure is still planned
        let file_type = fs::metadata(source.join("a.jpg")).unwrap().file_type();
        place_entry(&mut plan, &ExistingNames::default(), source.join("c.mov"), Ok(file_type));
        assert_eq!(plan.to_copy.len(), 2);
        assert!(plan.needs_video_dir);
        assert!(plan.already_present.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_are_ignored() {
        let root = tempdir().unwrap();
        let source = root.path().join("src");
        fs::create_dir(&source).unwrap();
        fs::write(root.path().join("real.jpg"), b"R").unwrap();
        std::os::unix::fs::symlink(root.path().join("real.jpg"), source.join("link.jpg")).unwrap();

        let plan = plan_blocking(&request(root.path(), source)).unwrap();
        assert_eq!(plan.total_files(), 0);
    }
}
