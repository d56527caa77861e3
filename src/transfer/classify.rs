use crate::state::data::Category;
use std::path::Path;

/// Extensions routed to the photo destination
pub const PHOTO_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "dng", "raw", "tiff", "tif", "heif", "heic",
];

/// Extensions routed to the video destination
pub const VIDEO_EXTENSIONS: &[&str] = &["mov", "mp4", "avi", "mkv", "m4v"];

/// Extensions counted when summarising a capture session
pub const CAPTURE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "dng", "mov", "mp4"];

/// Extensions the preview layer can thumbnail
pub const THUMBNAIL_EXTENSIONS: &[&str] = &["jpg", "jpeg"];

/// Route a file to the photo or video destination by extension.
///
/// Unknown or missing extensions go to `Photo`.
pub fn classify(file_name: &str) -> Category {
    match extension_of(file_name) {
        Some(ext) if VIDEO_EXTENSIONS.contains(&ext.as_str()) => Category::Video,
        _ => Category::Photo,
    }
}

pub fn is_capture_file(file_name: &str) -> bool {
    has_extension(file_name, CAPTURE_EXTENSIONS)
}

pub fn is_thumbnail_source(file_name: &str) -> bool {
    has_extension(file_name, THUMBNAIL_EXTENSIONS)
}

fn has_extension(file_name: &str, set: &[&str]) -> bool {
    extension_of(file_name)
        .map(|ext| set.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// Lowercase extension without the dot. `.hidden` has none.
fn extension_of(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_extensions_any_case() {
        assert_eq!(classify("IMG_0001.DNG"), Category::Photo);
        assert_eq!(classify("a.jpeg"), Category::Photo);
        assert_eq!(classify("scan.TIF"), Category::Photo);
        assert_eq!(classify("clip.MOV"), Category::Video);
        assert_eq!(classify("clip.m4v"), Category::Video);
        assert_eq!(classify("clip.Mkv"), Category::Video);
    }

    #[test]
    fn unknown_extensions_are_photos() {
        assert_eq!(classify("file.xyz"), Category::Photo);
        assert_eq!(classify("README"), Category::Photo);
        assert_eq!(classify(".mp4"), Category::Photo);
        assert_eq!(classify(""), Category::Photo);
    }

    #[test]
    fn classification_is_stable() {
        for name in ["a.mp4", "b.JPG", "c", "d.tar.gz", "e.MOV"] {
            assert_eq!(classify(name), classify(name));
        }
    }

    #[test]
    fn capture_and_thumbnail_filters() {
        assert!(is_capture_file("A.JPG"));
        assert!(is_capture_file("b.mp4"));
        assert!(!is_capture_file("c.heic"));

        assert!(is_thumbnail_source("x.JPEG"));
        assert!(!is_thumbnail_source("x.dng"));
        assert!(!is_thumbnail_source("x.png"));
    }
}
