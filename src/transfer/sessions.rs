/// Capture-session discovery on a mounted camera
///
/// Locating the camera itself is left to the caller; given its mount
/// root, this lists the session folders under `DCIM`.
use super::classify::is_capture_file;
use super::destination::parse_folder_date;
use crate::state::data::CaptureSession;
use std::path::Path;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// List session folders under `<camera_root>/DCIM`, newest name first.
///
/// Unreadable session folders are skipped. A missing `DCIM` yields an
/// empty list.
pub fn list_sessions(camera_root: &Path) -> Vec<CaptureSession> {
    let dcim = camera_root.join("DCIM");
    let mut sessions = Vec::new();

    for entry in WalkDir::new(&dcim).min_depth(1).max_depth(1) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => {
                warn!(path = %dcim.display(), error = %e, "cannot read DCIM folder");
                return Vec::new();
            }
            Err(e) => {
                debug!(error = %e, "skipping unreadable DCIM entry");
                continue;
            }
        };
        if !entry.file_type().is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        let path = entry.into_path();

        match summarize(&path) {
            Ok((files, bytes)) => sessions.push(CaptureSession {
                date: parse_folder_date(&name),
                name,
                path,
                files,
                size: format_file_size(bytes),
            }),
            Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable session"),
        }
    }

    sessions.sort_by(|a, b| b.name.cmp(&a.name));
    debug!(count = sessions.len(), "capture sessions listed");
    sessions
}

/// Count capture files and total bytes of the files in `folder`.
///
/// Fails only when `folder` itself cannot be read; entries that cannot be
/// stat'ed are left out of the totals.
fn summarize(folder: &Path) -> Result<(usize, u64), walkdir::Error> {
    let mut files = 0;
    let mut bytes = 0;
    for entry in WalkDir::new(folder).min_depth(1).max_depth(1).follow_links(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => return Err(e),
            Err(e) => {
                debug!(error = %e, "skipping unreadable session entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        if is_capture_file(&entry.file_name().to_string_lossy()) {
            files += 1;
        }
        // Size failures only affect the display total
        bytes += entry.metadata().map(|m| m.len()).unwrap_or(0);
    }
    Ok((files, bytes))
}

/// Format a byte count as B, KB, MB or GB with one decimal
pub fn format_file_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes < KB {
        format!("{} B", bytes)
    } else if bytes < MB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else if bytes < GB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn formats_sizes() {
        assert_eq!(format_file_size(0), "0 B");
        assert_eq!(format_file_size(1023), "1023 B");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(5 * 1024 * 1024), "5.0 MB");
        assert_eq!(format_file_size(3 * 1024 * 1024 * 1024 / 2), "1.5 GB");
    }

    #[test]
    fn lists_sessions_newest_first() {
        let camera = tempdir().unwrap();
        let dcim = camera.path().join("DCIM");
        let older = dcim.join("250101_1");
        let newer = dcim.join("250518_2");
        let other = dcim.join("100SIGMA");
        for dir in [&older, &newer, &other] {
            fs::create_dir_all(dir).unwrap();
        }
        fs::write(newer.join("a.JPG"), vec![0u8; 1024]).unwrap();
        fs::write(newer.join("b.mov"), vec![0u8; 512]).unwrap();
        fs::write(newer.join("notes.txt"), b"x").unwrap();
        fs::create_dir(newer.join("nested")).unwrap();
        fs::write(dcim.join("stray.jpg"), b"x").unwrap();

        let sessions = list_sessions(camera.path());
        let names: Vec<_> = sessions.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["250518_2", "250101_1", "100SIGMA"]);

        let first = &sessions[0];
        assert_eq!(first.files, 2);
        assert_eq!(first.date, NaiveDate::from_ymd_opt(2025, 5, 18));
        assert_eq!(first.size, "1.5 KB");
        assert_eq!(sessions[2].date, None);
    }

    #[cfg(unix)]
    #[test]
    fn broken_entry_does_not_hide_session() {
        let camera = tempdir().unwrap();
        let session = camera.path().join("DCIM").join("250518_1");
        fs::create_dir_all(&session).unwrap();
        fs::write(session.join("a.jpg"), vec![0u8; 100]).unwrap();
        std::os::unix::fs::symlink(camera.path().join("gone.jpg"), session.join("b.jpg")).unwrap();

        let sessions = list_sessions(camera.path());
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].files, 1);
        assert_eq!(sessions[0].size, "100 B");
    }

    #[test]
    fn missing_dcim_is_empty() {
        let camera = tempdir().unwrap();
        assert!(list_sessions(camera.path()).is_empty());
    }
}
