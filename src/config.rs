use std::env;
use std::path::PathBuf;

use crate::collage_generator::ComposerSettings;
use crate::collage_types::OutputFormat;
use crate::holidays::{DEFAULT_HEBCAL_CONVERTER_URL, DEFAULT_HEBCAL_URL};
use crate::image_loader::UploadLimits;
use crate::placeholder::{load_font, PlaceholderStyle};

#[derive(Debug, Clone)]
pub struct CalendarConfig {
    pub start_year: i32,
    pub start_month: u32,
    pub month_count: usize,
    pub max_photos_per_collage: usize,
}

/// Bounds on client-chosen sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestLimits {
    /// Largest nominal collage width or height
    pub max_canvas_dimension: u32,
    /// Most months one calendar request may render
    pub max_months: usize,
}

impl Default for RequestLimits {
    fn default() -> Self {
        Self {
            max_canvas_dimension: 4000,
            max_months: 24,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub host: String,
    pub output_scale: u32,
    pub padding: f32,
    pub output_format: OutputFormat,
    pub max_concurrent_loads: usize,
    /// Decoded photos are shrunk to this bound before drawing
    pub max_decode_dimension: u32,
    pub upload: UploadLimits,
    /// Largest accepted request body
    pub max_request_bytes: u64,
    pub label_font_path: Option<PathBuf>,
    pub hebcal_url: String,
    pub hebcal_converter_url: String,
    pub holiday_lookup: bool,
    pub calendar: CalendarConfig,
    pub limits: RequestLimits,
}

fn parse_format(value: &str) -> Result<OutputFormat, Box<dyn std::error::Error>> {
    value
        .parse()
        .map_err(|_| format!("Unsupported output format: {}", value).into())
}

impl Config {
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let upload_defaults = UploadLimits::default();
        let limit_defaults = RequestLimits::default();

        Ok(Config {
            port: env::var("PHOTO_CALENDAR_PORT")
                .unwrap_or_else(|_| "18474".to_string())
                .parse()?,
            host: env::var("PHOTO_CALENDAR_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            output_scale: env::var("PHOTO_CALENDAR_OUTPUT_SCALE")
                .unwrap_or_else(|_| "2".to_string())
                .parse()?,
            padding: env::var("PHOTO_CALENDAR_PADDING")
                .unwrap_or_else(|_| "20".to_string())
                .parse()?,
            output_format: parse_format(
                &env::var("PHOTO_CALENDAR_OUTPUT_FORMAT").unwrap_or_else(|_| "png".to_string()),
            )?,
            max_concurrent_loads: match env::var("PHOTO_CALENDAR_MAX_CONCURRENT_LOADS") {
                Ok(value) => value.parse()?,
                Err(_) => num_cpus::get(),
            },
            max_decode_dimension: env::var("PHOTO_CALENDAR_MAX_DECODE_DIMENSION")
                .unwrap_or_else(|_| "4096".to_string())
                .parse()?,
            upload: UploadLimits {
                max_bytes: match env::var("PHOTO_CALENDAR_MAX_UPLOAD_BYTES") {
                    Ok(value) => value.parse()?,
                    Err(_) => upload_defaults.max_bytes,
                },
                max_width: match env::var("PHOTO_CALENDAR_UPLOAD_MAX_WIDTH") {
                    Ok(value) => value.parse()?,
                    Err(_) => upload_defaults.max_width,
                },
                max_height: match env::var("PHOTO_CALENDAR_UPLOAD_MAX_HEIGHT") {
                    Ok(value) => value.parse()?,
                    Err(_) => upload_defaults.max_height,
                },
            },
            max_request_bytes: env::var("PHOTO_CALENDAR_MAX_REQUEST_BYTES")
                .unwrap_or_else(|_| (256 * 1024 * 1024).to_string())
                .parse()?,
            label_font_path: env::var("PHOTO_CALENDAR_LABEL_FONT").ok().map(PathBuf::from),
            hebcal_url: env::var("PHOTO_CALENDAR_HEBCAL_URL")
                .unwrap_or_else(|_| DEFAULT_HEBCAL_URL.to_string()),
            hebcal_converter_url: env::var("PHOTO_CALENDAR_HEBCAL_CONVERTER_URL")
                .unwrap_or_else(|_| DEFAULT_HEBCAL_CONVERTER_URL.to_string()),
            holiday_lookup: env::var("PHOTO_CALENDAR_HOLIDAY_LOOKUP")
                .unwrap_or_else(|_| "true".to_string())
                .parse()?,
            calendar: CalendarConfig {
                start_year: env::var("PHOTO_CALENDAR_START_YEAR")
                    .unwrap_or_else(|_| "2025".to_string())
                    .parse()?,
                start_month: env::var("PHOTO_CALENDAR_START_MONTH")
                    .unwrap_or_else(|_| "9".to_string())
                    .parse()?,
                month_count: env::var("PHOTO_CALENDAR_MONTH_COUNT")
                    .unwrap_or_else(|_| "14".to_string())
                    .parse()?,
                max_photos_per_collage: env::var("PHOTO_CALENDAR_MAX_PHOTOS_PER_COLLAGE")
                    .unwrap_or_else(|_| "6".to_string())
                    .parse()?,
            },
            limits: RequestLimits {
                max_canvas_dimension: match env::var("PHOTO_CALENDAR_MAX_CANVAS_DIMENSION") {
                    Ok(value) => value.parse()?,
                    Err(_) => limit_defaults.max_canvas_dimension,
                },
                max_months: match env::var("PHOTO_CALENDAR_MAX_MONTHS") {
                    Ok(value) => value.parse()?,
                    Err(_) => limit_defaults.max_months,
                },
            },
        })
    }

    /// Composer settings derived from this config, loading the label font if
    /// one is configured.
    pub fn composer_settings(&self) -> Result<ComposerSettings, Box<dyn std::error::Error>> {
        let mut placeholder = PlaceholderStyle::default();
        if let Some(path) = &self.label_font_path {
            placeholder = placeholder.with_font(load_font(path)?);
        }

        Ok(ComposerSettings {
            output_scale: self.output_scale,
            padding: self.padding,
            format: self.output_format,
            max_concurrent_loads: self.max_concurrent_loads,
            placeholder,
            ..ComposerSettings::default()
        })
    }
}
