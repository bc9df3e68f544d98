use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

/// Where the pixels of a photo come from. Opaque to everything but the loader.
#[derive(Debug, Clone)]
pub enum SourceLocator {
    File(PathBuf),
    Bytes(Arc<[u8]>),
    DataUri(String),
    Url(String),
}

impl fmt::Display for SourceLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceLocator::File(path) => write!(f, "file:{}", path.display()),
            SourceLocator::Bytes(bytes) => write!(f, "bytes:{}", bytes.len()),
            SourceLocator::DataUri(uri) => {
                // Data URIs can be megabytes long, only show the header
                let header = uri.split(',').next().unwrap_or("data:");
                write!(f, "{},...", header)
            }
            SourceLocator::Url(url) => write!(f, "{}", url),
        }
    }
}

/// A caller-owned photo reference. The compositing engine only reads it.
#[derive(Debug, Clone)]
pub struct PhotoRef {
    pub id: String,
    pub source: SourceLocator,
    pub display_name: String,
}

impl PhotoRef {
    pub fn new(id: impl Into<String>, source: SourceLocator, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source,
            display_name: display_name.into(),
        }
    }

    pub fn from_path(id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let display_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        Self::new(id, SourceLocator::File(path), display_name)
    }

    pub fn from_bytes(id: impl Into<String>, bytes: Vec<u8>, display_name: impl Into<String>) -> Self {
        Self::new(id, SourceLocator::Bytes(bytes.into()), display_name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FitMode {
    /// Fill the cell, cropping the source
    #[default]
    Cover,
    /// Fit inside the cell, letterboxing the rest
    Contain,
}

impl FitMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FitMode::Cover => "cover",
            FitMode::Contain => "contain",
        }
    }
}

impl FromStr for FitMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cover" => Ok(FitMode::Cover),
            "contain" => Ok(FitMode::Contain),
            _ => Err(()),
        }
    }
}

impl fmt::Display for FitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Png,
    Jpeg,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpeg",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            OutputFormat::Png => "image/png",
            OutputFormat::Jpeg => "image/jpeg",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "png" => Ok(OutputFormat::Png),
            "jpeg" | "jpg" => Ok(OutputFormat::Jpeg),
            _ => Err(()),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Axis-aligned rectangle in nominal (unscaled) canvas units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    pub fn aspect(&self) -> f32 {
        self.width / self.height
    }

    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Containment with a small tolerance for float accumulation
    pub fn contains(&self, other: &Rect) -> bool {
        const EPS: f32 = 1e-3;
        other.x >= self.x - EPS
            && other.y >= self.y - EPS
            && other.right() <= self.right() + EPS
            && other.bottom() <= self.bottom() + EPS
    }

    /// True when the interiors overlap; touching edges do not count
    pub fn intersects(&self, other: &Rect) -> bool {
        const EPS: f32 = 1e-3;
        self.x < other.right() - EPS
            && other.x < self.right() - EPS
            && self.y < other.bottom() - EPS
            && other.y < self.bottom() - EPS
    }
}

/// One destination slot of a layout.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LayoutCell {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub rounding: f32,
}

impl LayoutCell {
    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum LayoutKind {
    Empty,
    Single,
    Pair,
    HeroOverPair,
    Quad,
    PairOverTrio,
    SixGrid,
    Grid { rows: usize, cols: usize },
    Template { id: String },
}

/// Ordered cells; the i-th cell receives the i-th photo.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayoutPlan {
    pub kind: LayoutKind,
    pub cells: Vec<LayoutCell>,
}

impl LayoutPlan {
    pub fn empty() -> Self {
        Self {
            kind: LayoutKind::Empty,
            cells: Vec::new(),
        }
    }

    pub fn slot_count(&self) -> usize {
        self.cells.len()
    }

    /// Number of photos that will actually be drawn
    pub fn placed(&self, photo_count: usize) -> usize {
        photo_count.min(self.cells.len())
    }
}

/// Where to read from the source and where to put it on the canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitGeometry {
    /// Crop window in source pixel space
    pub source: Rect,
    /// Placement window in canvas space
    pub dest: Rect,
}

/// Encoded collage plus the nominal size it was requested at.
#[derive(Debug, Clone)]
pub struct CompositionResult {
    pub bytes: Vec<u8>,
    pub format: OutputFormat,
    pub width: u32,
    pub height: u32,
    pub scale: u32,
    pub placed: usize,
    pub failed: Vec<String>,
}

impl CompositionResult {
    pub fn pixel_width(&self) -> u32 {
        self.width * self.scale
    }

    pub fn pixel_height(&self) -> u32 {
        self.height * self.scale
    }

    pub fn to_data_uri(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.format.content_type(),
            general_purpose::STANDARD.encode(&self.bytes)
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ImageLoadError {
    #[error("Source unreachable: {0}")]
    Unreachable(String),
    #[error("Unsupported image format: {0}")]
    Unsupported(String),
    #[error("Corrupt image data: {0}")]
    Corrupt(String),
    #[error("Image has no pixels")]
    Empty,
}

impl From<std::io::Error> for ImageLoadError {
    fn from(e: std::io::Error) -> Self {
        ImageLoadError::Unreachable(e.to_string())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CollageError {
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),
    #[error("Encoding error: {0}")]
    Encoding(String),
    #[error("Drawing surface error: {0}")]
    Surface(String),
    #[error("Unknown layout template: {0}")]
    UnknownTemplate(String),
    #[error("Composition cancelled")]
    Cancelled,
}

impl From<image::ImageError> for CollageError {
    fn from(e: image::ImageError) -> Self {
        CollageError::Encoding(e.to_string())
    }
}

pub type CollageResult<T> = Result<T, CollageError>;
