//! Stand-in cell drawn when a photo cannot be loaded.

use std::fmt;
use std::path::Path;

use image::Rgba;
use log::debug;
use rusttype::{point, Font, Scale};

use crate::collage_types::{CollageError, CollageResult, Rect};
use crate::surface::CellScope;

const GLYPH_WIDTH: usize = 5;
const GLYPH_HEIGHT: usize = 7;

/// 5x7 glyphs, one byte per row, bit 4 is the leftmost column.
const BITMAP_GLYPHS: &[(char, [u8; GLYPH_HEIGHT])] = &[
    ('E', [0x1f, 0x10, 0x10, 0x1e, 0x10, 0x10, 0x1f]),
    ('r', [0x00, 0x00, 0x16, 0x19, 0x10, 0x10, 0x10]),
    ('o', [0x00, 0x00, 0x0e, 0x11, 0x11, 0x11, 0x0e]),
];

const UNKNOWN_GLYPH: [u8; GLYPH_HEIGHT] = [0x1f, 0x11, 0x11, 0x11, 0x11, 0x11, 0x1f];

fn bitmap_glyph(c: char) -> Option<[u8; GLYPH_HEIGHT]> {
    if c == ' ' {
        return None;
    }
    Some(
        BITMAP_GLYPHS
            .iter()
            .find(|(g, _)| *g == c)
            .map(|(_, rows)| *rows)
            .unwrap_or(UNKNOWN_GLYPH),
    )
}

#[derive(Clone)]
pub struct PlaceholderStyle {
    pub fill: Rgba<u8>,
    pub text_color: Rgba<u8>,
    pub label: String,
    /// Label cap height in canvas units
    pub text_size: f32,
    pub font: Option<Font<'static>>,
}

impl Default for PlaceholderStyle {
    fn default() -> Self {
        Self {
            fill: Rgba([0xe2, 0xe8, 0xf0, 255]),
            text_color: Rgba([0x64, 0x74, 0x8b, 255]),
            label: "Error".to_string(),
            text_size: 14.0,
            font: None,
        }
    }
}

impl fmt::Debug for PlaceholderStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaceholderStyle")
            .field("fill", &self.fill)
            .field("text_color", &self.text_color)
            .field("label", &self.label)
            .field("text_size", &self.text_size)
            .field("font", &self.font.is_some())
            .finish()
    }
}

impl PlaceholderStyle {
    pub fn with_font(mut self, font: Font<'static>) -> Self {
        self.font = Some(font);
        self
    }
}

pub fn load_font(path: &Path) -> CollageResult<Font<'static>> {
    let data = std::fs::read(path).map_err(|e| {
        CollageError::Surface(format!("cannot read font {}: {}", path.display(), e))
    })?;
    let font = Font::try_from_vec(data).ok_or_else(|| {
        CollageError::Surface(format!("{} is not a usable TrueType font", path.display()))
    })?;
    debug!("Loaded label font from {}", path.display());
    Ok(font)
}

/// Flat fill plus a centred label.
pub fn draw_placeholder(scope: &mut CellScope<'_>, style: &PlaceholderStyle) -> CollageResult<()> {
    scope.fill(style.fill);

    if style.label.is_empty() {
        return Ok(());
    }

    match &style.font {
        Some(font) => draw_font_label(scope, style, font),
        None => draw_bitmap_label(scope, style),
    }
}

fn draw_bitmap_label(scope: &mut CellScope<'_>, style: &PlaceholderStyle) -> CollageResult<()> {
    let cell = scope.rect();
    let chars: Vec<char> = style.label.chars().collect();
    let columns = (chars.len() * (GLYPH_WIDTH + 1) - 1) as f32;

    // Shrink the dot size until the label fits 80% of the cell
    let unit = (style.text_size / GLYPH_HEIGHT as f32)
        .min(cell.width * 0.8 / columns)
        .min(cell.height * 0.8 / GLYPH_HEIGHT as f32);
    if unit <= 0.0 {
        return Ok(());
    }

    let (cx, cy) = cell.center();
    let left = cx - columns * unit / 2.0;
    let top = cy - GLYPH_HEIGHT as f32 * unit / 2.0;

    for (i, c) in chars.iter().enumerate() {
        let Some(rows) = bitmap_glyph(*c) else {
            continue;
        };
        let glyph_left = left + (i * (GLYPH_WIDTH + 1)) as f32 * unit;
        for (r, bits) in rows.iter().enumerate() {
            for col in 0..GLYPH_WIDTH {
                if bits & (0x10 >> col) != 0 {
                    let dot = Rect::new(
                        glyph_left + col as f32 * unit,
                        top + r as f32 * unit,
                        unit,
                        unit,
                    );
                    scope.fill_rect(dot, style.text_color)?;
                }
            }
        }
    }

    Ok(())
}

fn draw_font_label(
    scope: &mut CellScope<'_>,
    style: &PlaceholderStyle,
    font: &Font<'static>,
) -> CollageResult<()> {
    let s = scope.scale() as f32;
    let scale = Scale::uniform(style.text_size * s);
    let v_metrics = font.v_metrics(scale);

    let glyphs: Vec<_> = font
        .layout(&style.label, scale, point(0.0, v_metrics.ascent))
        .collect();
    let text_width = glyphs
        .last()
        .map(|g| g.position().x + g.unpositioned().h_metrics().advance_width)
        .unwrap_or(0.0);
    let text_height = v_metrics.ascent - v_metrics.descent;

    let (cx, cy) = scope.rect().center();
    let offset_x = (cx * s - text_width / 2.0).round() as i32;
    let offset_y = (cy * s - text_height / 2.0).round() as i32;
    let color = style.text_color;

    for glyph in glyphs {
        if let Some(bb) = glyph.pixel_bounding_box() {
            glyph.draw(|x, y, v| {
                scope.blend_device_pixel(
                    offset_x + bb.min.x + x as i32,
                    offset_y + bb.min.y + y as i32,
                    color,
                    v,
                );
            });
        }
    }

    Ok(())
}
