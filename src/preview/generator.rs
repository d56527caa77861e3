use crate::error::PreviewError;
use base64::{engine::general_purpose::STANDARD, Engine};
use image::{codecs::jpeg::JpegEncoder, imageops::FilterType, DynamicImage, ImageReader};
use std::path::{Path, PathBuf};

/// Listing thumbnails are cropped to exactly this size
pub const THUMBNAIL_WIDTH: u32 = 150;
pub const THUMBNAIL_HEIGHT: u32 = 100;

/// Full-size previews are never wider than this
pub const FULL_PREVIEW_MAX_WIDTH: u32 = 1200;

const THUMBNAIL_QUALITY: u8 = 80;
const FULL_PREVIEW_QUALITY: u8 = 90;

/// How the source image is fitted into the preview
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fit {
    /// Scale to cover the box, then crop the overflow (centered)
    Cover { width: u32, height: u32 },
    /// Keep the aspect ratio and shrink to at most this width. Never upscales.
    MaxWidth(u32),
}

impl Fit {
    pub const THUMBNAIL: Fit = Fit::Cover {
        width: THUMBNAIL_WIDTH,
        height: THUMBNAIL_HEIGHT,
    };
    pub const FULL_SIZE: Fit = Fit::MaxWidth(FULL_PREVIEW_MAX_WIDTH);

    fn quality(&self) -> u8 {
        match self {
            Fit::Cover { .. } => THUMBNAIL_QUALITY,
            Fit::MaxWidth(_) => FULL_PREVIEW_QUALITY,
        }
    }
}

/// Generate a preview on a blocking worker thread
pub async fn make_preview_async(path: PathBuf, fit: Fit) -> Result<String, PreviewError> {
    tokio::task::spawn_blocking(move || make_preview(&path, fit)).await?
}

/// Decode `path`, resize it according to `fit` and return a JPEG data URI.
pub fn make_preview(path: &Path, fit: Fit) -> Result<String, PreviewError> {
    let open_err = |source| PreviewError::Open {
        path: path.to_path_buf(),
        source,
    };
    let img = ImageReader::open(path)
        .map_err(open_err)?
        .with_guessed_format()
        .map_err(open_err)?
        .decode()
        .map_err(|source| PreviewError::Decode {
            path: path.to_path_buf(),
            source,
        })?;

    encode_data_uri(&resize(img, fit), fit.quality())
}

fn resize(img: DynamicImage, fit: Fit) -> DynamicImage {
    match fit {
        Fit::Cover { width, height } => img.resize_to_fill(width, height, FilterType::Lanczos3),
        Fit::MaxWidth(max_width) => {
            if img.width() <= max_width {
                return img;
            }
            let scale = max_width as f64 / img.width() as f64;
            let height = ((img.height() as f64 * scale).round() as u32).max(1);
            img.resize_exact(max_width, height, FilterType::Lanczos3)
        }
    }
}

fn encode_data_uri(img: &DynamicImage, quality: u8) -> Result<String, PreviewError> {
    // JPEG has no alpha channel
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    let mut bytes = Vec::new();
    rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut bytes, quality))
        .map_err(PreviewError::Encode)?;
    Ok(format!("data:image/jpeg;base64,{}", STANDARD.encode(&bytes)))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::{GenericImageView, Rgb, RgbImage};
    use tempfile::tempdir;

    /// Write a solid-color JPEG of the given size
    pub(crate) fn write_jpeg(path: &Path, width: u32, height: u32) {
        RgbImage::from_pixel(width, height, Rgb([200, 40, 90]))
            .save(path)
            .unwrap();
    }

    fn decode(data_uri: &str) -> DynamicImage {
        let payload = data_uri.strip_prefix("data:image/jpeg;base64,").unwrap();
        image::load_from_memory(&STANDARD.decode(payload).unwrap()).unwrap()
    }

    #[test]
    fn thumbnail_is_cropped_to_box() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tall.jpg");
        write_jpeg(&path, 300, 600);

        let uri = make_preview(&path, Fit::THUMBNAIL).unwrap();
        assert_eq!(decode(&uri).dimensions(), (150, 100));
    }

    #[test]
    fn full_size_keeps_aspect_ratio() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wide.jpg");
        write_jpeg(&path, 2400, 1200);

        let uri = make_preview(&path, Fit::FULL_SIZE).unwrap();
        assert_eq!(decode(&uri).dimensions(), (1200, 600));
    }

    #[test]
    fn full_size_never_upscales() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("small.png");
        RgbImage::from_pixel(100, 50, Rgb([1, 2, 3])).save(&path).unwrap();

        let uri = make_preview(&path, Fit::FULL_SIZE).unwrap();
        assert_eq!(decode(&uri).dimensions(), (100, 50));
    }

    #[test]
    fn corrupt_image_is_a_decode_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.jpg");
        std::fs::write(&path, b"\xFF\xD8 definitely not a jpeg").unwrap();

        assert!(matches!(
            make_preview(&path, Fit::THUMBNAIL),
            Err(PreviewError::Decode { .. })
        ));
    }

    #[test]
    fn missing_image_is_an_open_error() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            make_preview(&dir.path().join("none.jpg"), Fit::THUMBNAIL),
            Err(PreviewError::Open { .. })
        ));
    }
}
