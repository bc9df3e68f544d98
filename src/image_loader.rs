//! Image Loader
//!
//! Resolves a [`PhotoRef`] into decoded RGBA pixels:
//! - files via `tokio::fs`, URLs via `ureq`, data URIs via `base64`
//! - decoding on the blocking pool so the composer's task is never stalled
//! - EXIF orientation applied so natural dimensions match what users see
//!
//! Nothing is cached; every composition re-resolves its photos.

use std::borrow::Cow;
use std::io::Cursor;
use std::sync::Arc;

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use exif::{In, Reader, Tag};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat, RgbaImage};
use log::debug;

use crate::collage_types::{ImageLoadError, PhotoRef, SourceLocator};

/// Largest body accepted from a remote photo URL
const MAX_REMOTE_BYTES: u64 = 64 * 1024 * 1024;

/// Decoded, orientation-corrected pixels of one photo.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub natural_width: u32,
    pub natural_height: u32,
    pub pixels: Arc<RgbaImage>,
}

impl DecodedImage {
    pub fn from_rgba(pixels: RgbaImage) -> Result<Self, ImageLoadError> {
        let (natural_width, natural_height) = pixels.dimensions();
        if natural_width == 0 || natural_height == 0 {
            return Err(ImageLoadError::Empty);
        }
        Ok(Self {
            natural_width,
            natural_height,
            pixels: Arc::new(pixels),
        })
    }
}

/// Anything that can turn a photo reference into pixels.
#[async_trait]
pub trait ImageSource: Send + Sync {
    async fn load(&self, photo: &PhotoRef) -> Result<DecodedImage, ImageLoadError>;
}

/// Default loader for files, in-memory bytes, data URIs and http(s) URLs.
#[derive(Debug, Clone, Default)]
pub struct ImageLoader {
    /// Decodes larger than this on either axis are shrunk before drawing
    max_dimension: Option<u32>,
}

impl ImageLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_dimension(max_dimension: u32) -> Self {
        Self {
            max_dimension: Some(max_dimension.max(1)),
        }
    }

    async fn read_source(&self, source: &SourceLocator) -> Result<Vec<u8>, ImageLoadError> {
        match source {
            SourceLocator::File(path) => Ok(tokio::fs::read(path).await?),
            SourceLocator::Bytes(bytes) => Ok(bytes.to_vec()),
            SourceLocator::DataUri(uri) => decode_data_uri(uri),
            SourceLocator::Url(url) => {
                let url = url.clone();
                tokio::task::spawn_blocking(move || fetch_url(&url))
                    .await
                    .map_err(|e| ImageLoadError::Unreachable(format!("fetch task failed: {}", e)))?
            }
        }
    }
}

#[async_trait]
impl ImageSource for ImageLoader {
    async fn load(&self, photo: &PhotoRef) -> Result<DecodedImage, ImageLoadError> {
        let bytes = self.read_source(&photo.source).await?;
        let max_dimension = self.max_dimension;

        let decoded = tokio::task::spawn_blocking(move || decode_bytes(&bytes, max_dimension))
            .await
            .map_err(|e| ImageLoadError::Corrupt(format!("decode task failed: {}", e)))??;

        debug!(
            "Loaded photo {} ({}): {}x{}",
            photo.id, photo.display_name, decoded.natural_width, decoded.natural_height
        );

        Ok(decoded)
    }
}

fn fetch_url(url: &str) -> Result<Vec<u8>, ImageLoadError> {
    let mut response = ureq::get(url)
        .call()
        .map_err(|e| ImageLoadError::Unreachable(format!("{}: {}", url, e)))?;

    response
        .body_mut()
        .with_config()
        .limit(MAX_REMOTE_BYTES)
        .read_to_vec()
        .map_err(|e| ImageLoadError::Unreachable(format!("{}: {}", url, e)))
}

/// Extracts the payload of a base64 `data:` URI.
pub fn decode_data_uri(uri: &str) -> Result<Vec<u8>, ImageLoadError> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| ImageLoadError::Unsupported("not a data URI".to_string()))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| ImageLoadError::Corrupt("data URI has no payload".to_string()))?;

    if !header.ends_with(";base64") {
        return Err(ImageLoadError::Unsupported(format!(
            "only base64 data URIs are supported, got '{}'",
            header
        )));
    }

    general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| ImageLoadError::Corrupt(format!("invalid base64: {}", e)))
}

/// Decodes raw bytes, applies EXIF orientation and the optional size cap.
pub fn decode_bytes(bytes: &[u8], max_dimension: Option<u32>) -> Result<DecodedImage, ImageLoadError> {
    if bytes.is_empty() {
        return Err(ImageLoadError::Empty);
    }

    let format = image::guess_format(bytes)
        .map_err(|e| ImageLoadError::Unsupported(e.to_string()))?;
    let img = image::load_from_memory_with_format(bytes, format).map_err(|e| match e {
        image::ImageError::Unsupported(u) => ImageLoadError::Unsupported(u.to_string()),
        other => ImageLoadError::Corrupt(other.to_string()),
    })?;

    let img = apply_orientation(img, read_orientation(bytes));
    let img = match max_dimension {
        Some(max) if img.width() > max || img.height() > max => {
            img.resize(max, max, FilterType::Lanczos3)
        }
        _ => img,
    };

    DecodedImage::from_rgba(img.to_rgba8())
}

/// EXIF orientation tag of an encoded image, if it has one.
fn read_orientation(bytes: &[u8]) -> Option<u32> {
    let exif = Reader::new()
        .read_from_container(&mut Cursor::new(bytes))
        .ok()?;
    exif.get_field(Tag::Orientation, In::PRIMARY)?
        .value
        .get_uint(0)
}

fn apply_orientation(img: DynamicImage, orientation: Option<u32>) -> DynamicImage {
    match orientation {
        Some(2) => img.fliph(),
        Some(3) => img.rotate180(),
        Some(4) => img.flipv(),
        Some(5) => img.fliph().rotate270(), // Transpose
        Some(6) => img.rotate90(),
        Some(7) => img.fliph().rotate90(), // Transverse
        Some(8) => img.rotate270(),
        _ => img,
    }
}

/// Size bounds applied to photos as they are uploaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadLimits {
    /// Uploads at or below this size are kept untouched
    pub max_bytes: usize,
    pub max_width: u32,
    pub max_height: u32,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_bytes: 5 * 1024 * 1024,
            max_width: 1920,
            max_height: 1080,
        }
    }
}

/// Target size for an oversized upload. Landscape images are bounded by
/// width, portrait and square ones by height.
pub fn upload_dimensions(width: u32, height: u32, limits: &UploadLimits) -> (u32, u32) {
    let (w, h) = (width as f64, height as f64);
    let (w, h) = if width > height {
        if width > limits.max_width {
            (limits.max_width as f64, h * limits.max_width as f64 / w)
        } else {
            (w, h)
        }
    } else if height > limits.max_height {
        (w * limits.max_height as f64 / h, limits.max_height as f64)
    } else {
        (w, h)
    };
    ((w.round() as u32).max(1), (h.round() as u32).max(1))
}

/// Re-encodes uploads above `limits.max_bytes` at a bounded resolution.
///
/// JPEG stays JPEG (quality 90); every other format is re-encoded as PNG.
pub fn shrink_oversized_upload<'a>(
    bytes: &'a [u8],
    limits: &UploadLimits,
) -> Result<Cow<'a, [u8]>, ImageLoadError> {
    if bytes.len() <= limits.max_bytes {
        return Ok(Cow::Borrowed(bytes));
    }

    let format = image::guess_format(bytes)
        .map_err(|e| ImageLoadError::Unsupported(e.to_string()))?;
    let img = image::load_from_memory_with_format(bytes, format)
        .map_err(|e| ImageLoadError::Corrupt(e.to_string()))?;

    let (width, height) = img.dimensions();
    let (new_width, new_height) = upload_dimensions(width, height, limits);
    let resized = if (new_width, new_height) == (width, height) {
        img
    } else {
        img.resize_exact(new_width, new_height, FilterType::Lanczos3)
    };

    let mut buffer = Cursor::new(Vec::new());
    let written = match format {
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(resized.to_rgb8())
            .write_with_encoder(JpegEncoder::new_with_quality(&mut buffer, 90)),
        _ => resized.write_to(&mut buffer, ImageFormat::Png),
    };
    written.map_err(|e| ImageLoadError::Corrupt(format!("failed to re-encode upload: {}", e)))?;

    debug!(
        "Shrunk upload from {} bytes ({}x{}) to {} bytes ({}x{})",
        bytes.len(),
        width,
        height,
        buffer.get_ref().len(),
        new_width,
        new_height
    );

    Ok(Cow::Owned(buffer.into_inner()))
}
