//! Drawing surface for one composition.
//!
//! Geometry is always passed in nominal canvas units; the surface owns the
//! oversampling factor and maps everything to device pixels itself. Shadow
//! and stroke settings live on the surface but can only be changed through a
//! [`CellScope`], which puts them back to neutral when it goes out of scope.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, ImageFormat, Rgba, RgbaImage};
use tiny_skia::{
    Color, ColorU8, FillRule, GradientStop, LinearGradient, Mask, Paint, Path, PathBuilder,
    Pixmap, PixmapPaint, Point, PremultipliedColorU8, RadialGradient, SpreadMode, Stroke,
    Transform,
};

use crate::collage_types::{CollageError, CollageResult, FitGeometry, OutputFormat, Rect};
use crate::image_loader::DecodedImage;

/// JPEG quality used for print output
const JPEG_QUALITY: u8 = 92;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Shadow {
    pub color: Rgba<u8>,
    pub blur: f32,
    pub offset_x: f32,
    pub offset_y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrokeStyle {
    pub color: Rgba<u8>,
    pub width: f32,
}

/// Mutable drawing state shared by every cell on the surface.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DrawState {
    pub shadow: Option<Shadow>,
    pub stroke: Option<StrokeStyle>,
}

impl DrawState {
    pub fn is_neutral(&self) -> bool {
        *self == DrawState::default()
    }
}

pub struct Surface {
    pixmap: Pixmap,
    width: u32,
    height: u32,
    scale: u32,
    state: DrawState,
}

fn sk_color(color: Rgba<u8>) -> Color {
    Color::from_rgba8(color[0], color[1], color[2], color[3])
}

fn hex(rgb: u32) -> Color {
    Color::from_rgba8((rgb >> 16) as u8, (rgb >> 8) as u8, rgb as u8, 255)
}

fn solid_paint(color: Rgba<u8>) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(sk_color(color));
    paint.anti_alias = true;
    paint
}

fn sk_rect(rect: Rect) -> CollageResult<tiny_skia::Rect> {
    tiny_skia::Rect::from_xywh(rect.x, rect.y, rect.width, rect.height).ok_or_else(|| {
        CollageError::InvalidGeometry(format!(
            "cannot draw {}x{} rectangle",
            rect.width, rect.height
        ))
    })
}

/// Rounded rectangle outline; the radius is clamped to half the short side.
pub fn rounded_rect_path(rect: Rect, radius: f32) -> CollageResult<Path> {
    let r = radius.min(rect.width / 2.0).min(rect.height / 2.0).max(0.0);
    if r == 0.0 {
        return Ok(PathBuilder::from_rect(sk_rect(rect)?));
    }

    // Cubic approximation of a quarter circle
    let k = r * 0.552_284_8;
    let (x, y, w, h) = (rect.x, rect.y, rect.width, rect.height);

    let mut pb = PathBuilder::new();
    pb.move_to(x + r, y);
    pb.line_to(x + w - r, y);
    pb.cubic_to(x + w - r + k, y, x + w, y + r - k, x + w, y + r);
    pb.line_to(x + w, y + h - r);
    pb.cubic_to(x + w, y + h - r + k, x + w - r + k, y + h, x + w - r, y + h);
    pb.line_to(x + r, y + h);
    pb.cubic_to(x + r - k, y + h, x, y + h - r + k, x, y + h - r);
    pb.line_to(x, y + r);
    pb.cubic_to(x, y + r - k, x + r - k, y, x + r, y);
    pb.close();

    pb.finish().ok_or_else(|| {
        CollageError::InvalidGeometry(format!("degenerate rounded rect {:?}", rect))
    })
}

fn pixmap_from_rgba(img: &RgbaImage) -> CollageResult<Pixmap> {
    let mut pixmap = Pixmap::new(img.width(), img.height()).ok_or_else(|| {
        CollageError::Surface(format!("cannot allocate {}x{} tile", img.width(), img.height()))
    })?;
    for (dst, src) in pixmap.pixels_mut().iter_mut().zip(img.pixels()) {
        *dst = ColorU8::from_rgba(src[0], src[1], src[2], src[3]).premultiply();
    }
    Ok(pixmap)
}

impl Surface {
    /// Allocates a transparent `width*scale x height*scale` surface.
    pub fn new(width: u32, height: u32, scale: u32) -> CollageResult<Self> {
        if width == 0 || height == 0 || scale == 0 {
            return Err(CollageError::InvalidGeometry(format!(
                "surface must have positive size, got {}x{} at {}x",
                width, height, scale
            )));
        }

        let pixel_width = width.checked_mul(scale);
        let pixel_height = height.checked_mul(scale);
        let pixmap = pixel_width
            .zip(pixel_height)
            .and_then(|(w, h)| Pixmap::new(w, h))
            .ok_or_else(|| {
                CollageError::Surface(format!(
                    "cannot allocate {}x{} surface at {}x",
                    width, height, scale
                ))
            })?;

        Ok(Self {
            pixmap,
            width,
            height,
            scale,
            state: DrawState::default(),
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn scale(&self) -> u32 {
        self.scale
    }

    pub fn state(&self) -> DrawState {
        self.state
    }

    fn transform(&self) -> Transform {
        Transform::from_scale(self.scale as f32, self.scale as f32)
    }

    fn bounds(&self) -> CollageResult<tiny_skia::Rect> {
        sk_rect(Rect::new(0.0, 0.0, self.width as f32, self.height as f32))
    }

    /// Radial white-to-slate backdrop with a sparse dot texture.
    pub fn paint_backdrop(&mut self) -> CollageResult<()> {
        let (w, h) = (self.width as f32, self.height as f32);
        let shader = RadialGradient::new(
            Point::from_xy(w / 2.0, h / 2.0),
            Point::from_xy(w / 2.0, h / 2.0),
            w / 2.0,
            vec![
                GradientStop::new(0.0, hex(0xffffff)),
                GradientStop::new(0.3, hex(0xf8fafc)),
                GradientStop::new(1.0, hex(0xf1f5f9)),
            ],
            SpreadMode::Pad,
            Transform::identity(),
        )
        .ok_or_else(|| CollageError::Surface("invalid backdrop gradient".to_string()))?;

        let mut paint = Paint::default();
        paint.shader = shader;
        let transform = self.transform();
        self.pixmap
            .fill_rect(self.bounds()?, &paint, transform, None);

        let mut dots = PathBuilder::new();
        for i in (0..self.width).step_by(60) {
            for j in (0..self.height).step_by(60) {
                if (i + j) % 120 == 0 {
                    dots.push_circle(i as f32, j as f32, 1.0);
                }
            }
        }
        if let Some(path) = dots.finish() {
            let paint = solid_paint(Rgba([255, 255, 255, 26]));
            self.pixmap
                .fill_path(&path, &paint, FillRule::Winding, transform, None);
        }

        Ok(())
    }

    /// Diagonal gradient with a checker of faint squares, used when there
    /// are no photos at all.
    pub fn paint_empty_state(&mut self) -> CollageResult<()> {
        let (w, h) = (self.width as f32, self.height as f32);
        let shader = LinearGradient::new(
            Point::from_xy(0.0, 0.0),
            Point::from_xy(w, h),
            vec![
                GradientStop::new(0.0, hex(0xf8fafc)),
                GradientStop::new(0.5, hex(0xf1f5f9)),
                GradientStop::new(1.0, hex(0xe2e8f0)),
            ],
            SpreadMode::Pad,
            Transform::identity(),
        )
        .ok_or_else(|| CollageError::Surface("invalid empty-state gradient".to_string()))?;

        let mut paint = Paint::default();
        paint.shader = shader;
        let transform = self.transform();
        self.pixmap
            .fill_rect(self.bounds()?, &paint, transform, None);

        let mut squares = PathBuilder::new();
        for i in (0..self.width).step_by(40) {
            for j in (0..self.height).step_by(40) {
                if (i + j) % 80 == 0 {
                    if let Some(rect) = tiny_skia::Rect::from_xywh(i as f32, j as f32, 20.0, 20.0) {
                        squares.push_rect(rect);
                    }
                }
            }
        }
        if let Some(path) = squares.finish() {
            let paint = solid_paint(Rgba([255, 255, 255, 26]));
            self.pixmap
                .fill_path(&path, &paint, FillRule::Winding, transform, None);
        }

        Ok(())
    }

    /// Opens a scoped drawing context clipped to a rounded `rect`.
    ///
    /// The clip mask only covers the cell's device bounds.
    pub fn cell(&mut self, rect: Rect, radius: f32) -> CollageResult<CellScope<'_>> {
        let path = rounded_rect_path(rect, radius)?;
        let clip = CellClip::new(&path, rect, self)?;

        Ok(CellScope {
            surface: self,
            rect,
            path,
            clip,
        })
    }

    /// Device pixel, demultiplied.
    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba<u8>> {
        let c = self.pixmap.pixel(x, y)?.demultiply();
        Some(Rgba([c.red(), c.green(), c.blue(), c.alpha()]))
    }

    pub fn to_rgba_image(&self) -> RgbaImage {
        let mut img = RgbaImage::new(self.pixmap.width(), self.pixmap.height());
        for (dst, src) in img.pixels_mut().zip(self.pixmap.pixels()) {
            let c = src.demultiply();
            *dst = Rgba([c.red(), c.green(), c.blue(), c.alpha()]);
        }
        img
    }

    pub fn encode(&self, format: OutputFormat) -> CollageResult<Vec<u8>> {
        let img = DynamicImage::ImageRgba8(self.to_rgba_image());
        let mut buffer = Cursor::new(Vec::new());

        match format {
            OutputFormat::Png => img.write_to(&mut buffer, ImageFormat::Png)?,
            OutputFormat::Jpeg => DynamicImage::ImageRgb8(img.to_rgb8())
                .write_with_encoder(JpegEncoder::new_with_quality(&mut buffer, JPEG_QUALITY))?,
        }

        Ok(buffer.into_inner())
    }

    /// Paints a blurred copy of `outline` (device coordinates) under whatever
    /// is drawn next.
    fn draw_shadow(&mut self, outline: &Path, shadow: Shadow) -> CollageResult<()> {
        let s = self.scale as f32;
        let sigma = shadow.blur * s / 2.0;
        let margin = (sigma * 3.0).ceil() + 1.0;
        let bounds = outline.bounds();
        let left = (bounds.left() - margin).floor();
        let top = (bounds.top() - margin).floor();
        let width = (bounds.width() + margin * 2.0).ceil() as u32 + 1;
        let height = (bounds.height() + margin * 2.0).ceil() as u32 + 1;

        let mut mask = Mask::new(width, height)
            .ok_or_else(|| CollageError::Surface("cannot allocate shadow mask".to_string()))?;
        mask.fill_path(
            outline,
            FillRule::Winding,
            true,
            Transform::from_translate(-left, -top),
        );

        let coverage = GrayImage::from_raw(width, height, mask.data().to_vec())
            .ok_or_else(|| CollageError::Surface("shadow mask size mismatch".to_string()))?;
        let coverage = if sigma > 0.0 {
            imageops::blur(&coverage, sigma)
        } else {
            coverage
        };

        let mut layer = Pixmap::new(width, height)
            .ok_or_else(|| CollageError::Surface("cannot allocate shadow layer".to_string()))?;
        let [r, g, b, a] = shadow.color.0;
        for (dst, cov) in layer.pixels_mut().iter_mut().zip(coverage.pixels()) {
            let alpha = (cov[0] as u32 * a as u32 / 255) as u8;
            *dst = ColorU8::from_rgba(r, g, b, alpha).premultiply();
        }

        self.pixmap.draw_pixmap(
            (left + shadow.offset_x * s).round() as i32,
            (top + shadow.offset_y * s).round() as i32,
            layer.as_ref(),
            &PixmapPaint::default(),
            Transform::identity(),
            None,
        );

        Ok(())
    }
}

/// Device-space bounds of `rect`, grown to whole pixels and kept on the surface.
fn device_bounds(rect: Rect, scale: f32, surface_width: u32, surface_height: u32) -> (i32, i32, u32, u32) {
    let left = (rect.x * scale).floor().clamp(0.0, surface_width as f32);
    let top = (rect.y * scale).floor().clamp(0.0, surface_height as f32);
    let right = (rect.right() * scale).ceil().clamp(left, surface_width as f32);
    let bottom = (rect.bottom() * scale).ceil().clamp(top, surface_height as f32);
    (
        left as i32,
        top as i32,
        ((right - left) as u32).max(1),
        ((bottom - top) as u32).max(1),
    )
}

/// Anti-aliased coverage of one cell outline, positioned in device space.
struct CellClip {
    mask: Mask,
    left: i32,
    top: i32,
}

impl CellClip {
    fn new(path: &Path, rect: Rect, surface: &Surface) -> CollageResult<Self> {
        let s = surface.scale as f32;
        let (left, top, width, height) =
            device_bounds(rect, s, surface.pixmap.width(), surface.pixmap.height());

        let mut mask = Mask::new(width, height)
            .ok_or_else(|| CollageError::Surface("cannot allocate clip mask".to_string()))?;
        mask.fill_path(
            path,
            FillRule::Winding,
            true,
            Transform::from_row(s, 0.0, 0.0, s, -(left as f32), -(top as f32)),
        );

        Ok(Self { mask, left, top })
    }

    fn coverage(&self, x: i32, y: i32) -> u8 {
        let (mx, my) = (x - self.left, y - self.top);
        let (w, h) = (self.mask.width() as i32, self.mask.height() as i32);
        if mx < 0 || my < 0 || mx >= w || my >= h {
            return 0;
        }
        self.mask.data()[(my * w + mx) as usize]
    }

    /// Scales every pixel of `layer`, placed at device `(x0, y0)`, by the
    /// clip coverage underneath it.
    fn apply(&self, layer: &mut Pixmap, x0: i32, y0: i32) {
        let width = layer.width() as usize;
        for (i, px) in layer.pixels_mut().iter_mut().enumerate() {
            let x = x0 + (i % width) as i32;
            let y = y0 + (i / width) as i32;
            let c = self.coverage(x, y) as u32;
            if c == 255 {
                continue;
            }

            let scaled = |v: u8| ((v as u32 * c + 127) / 255) as u8;
            *px = PremultipliedColorU8::from_rgba(
                scaled(px.red()),
                scaled(px.green()),
                scaled(px.blue()),
                scaled(px.alpha()),
            )
            .unwrap_or(PremultipliedColorU8::TRANSPARENT);
        }
    }
}

/// Drawing context for a single cell.
///
/// Created by [`Surface::cell`] with the clip already in place. Dropping it
/// resets the surface's shadow and stroke state.
pub struct CellScope<'a> {
    surface: &'a mut Surface,
    rect: Rect,
    path: Path,
    clip: CellClip,
}

impl CellScope<'_> {
    pub fn rect(&self) -> Rect {
        self.rect
    }

    pub fn scale(&self) -> u32 {
        self.surface.scale
    }

    pub fn state(&self) -> DrawState {
        self.surface.state
    }

    pub fn set_shadow(&mut self, shadow: Shadow) {
        self.surface.state.shadow = Some(shadow);
    }

    pub fn set_stroke(&mut self, stroke: StrokeStyle) {
        self.surface.state.stroke = Some(stroke);
    }

    /// Flat fill of the whole (rounded) cell.
    pub fn fill(&mut self, color: Rgba<u8>) {
        let transform = self.surface.transform();
        self.surface.pixmap.fill_path(
            &self.path,
            &solid_paint(color),
            FillRule::Winding,
            transform,
            None,
        );
    }

    /// Clipped fill of an arbitrary rectangle in canvas units.
    pub fn fill_rect(&mut self, rect: Rect, color: Rgba<u8>) -> CollageResult<()> {
        let s = self.surface.scale as f32;
        let (left, top, width, height) = device_bounds(
            rect,
            s,
            self.surface.pixmap.width(),
            self.surface.pixmap.height(),
        );

        let mut layer = Pixmap::new(width, height)
            .ok_or_else(|| CollageError::Surface("cannot allocate fill layer".to_string()))?;
        layer.fill_rect(
            sk_rect(rect)?,
            &solid_paint(color),
            Transform::from_row(s, 0.0, 0.0, s, -(left as f32), -(top as f32)),
            None,
        );
        self.clip.apply(&mut layer, left, top);

        self.surface.pixmap.draw_pixmap(
            left,
            top,
            layer.as_ref(),
            &PixmapPaint::default(),
            Transform::identity(),
            None,
        );
        Ok(())
    }

    /// Source-over blend of one device pixel with partial coverage.
    pub fn blend_device_pixel(&mut self, x: i32, y: i32, color: Rgba<u8>, coverage: f32) {
        let (pw, ph) = (self.surface.pixmap.width() as i32, self.surface.pixmap.height() as i32);
        if x < 0 || y < 0 || x >= pw || y >= ph {
            return;
        }

        let idx = (y * pw + x) as usize;
        let pixels = self.surface.pixmap.pixels_mut();
        let dst = pixels[idx];
        let a = color[3] as f32 / 255.0 * coverage.clamp(0.0, 1.0);
        let mix = |src: f32, dst: u8| (src * a + dst as f32 * (1.0 - a)).round() as u8;

        if let Some(blended) = PremultipliedColorU8::from_rgba(
            mix(color[0] as f32, dst.red()),
            mix(color[1] as f32, dst.green()),
            mix(color[2] as f32, dst.blue()),
            mix(255.0, dst.alpha()),
        ) {
            pixels[idx] = blended;
        }
    }

    /// Draws the crop window of `image` into the fitted destination,
    /// resampled to device resolution and clipped to the cell.
    pub fn draw_image(&mut self, image: &DecodedImage, fit: &FitGeometry) -> CollageResult<()> {
        let (nw, nh) = (image.natural_width, image.natural_height);
        let src = fit.source;
        let sx = (src.x.round().max(0.0) as u32).min(nw - 1);
        let sy = (src.y.round().max(0.0) as u32).min(nh - 1);
        let sw = (src.width.round() as u32).clamp(1, nw - sx);
        let sh = (src.height.round() as u32).clamp(1, nh - sy);

        let s = self.surface.scale as f32;
        let x0 = (fit.dest.x * s).round();
        let y0 = (fit.dest.y * s).round();
        let dw = ((fit.dest.right() * s).round() - x0).max(1.0) as u32;
        let dh = ((fit.dest.bottom() * s).round() - y0).max(1.0) as u32;

        let window = imageops::crop_imm(&*image.pixels, sx, sy, sw, sh).to_image();
        let tile = imageops::resize(&window, dw, dh, FilterType::Lanczos3);
        let mut tile = pixmap_from_rgba(&tile)?;
        self.clip.apply(&mut tile, x0 as i32, y0 as i32);

        self.surface.pixmap.draw_pixmap(
            x0 as i32,
            y0 as i32,
            tile.as_ref(),
            &PixmapPaint::default(),
            Transform::identity(),
            None,
        );

        Ok(())
    }

    /// Strokes the cell outline with the current stroke, shadowed by the
    /// current shadow. Unclipped, so the border sits over the cell edge.
    pub fn stroke_outline(&mut self) -> CollageResult<()> {
        let Some(style) = self.surface.state.stroke else {
            return Ok(());
        };

        let stroke = Stroke {
            width: style.width,
            ..Stroke::default()
        };
        let transform = self.surface.transform();

        if let Some(shadow) = self.surface.state.shadow {
            let outline = self
                .path
                .stroke(&stroke, self.surface.scale as f32)
                .and_then(|p| p.transform(transform));
            if let Some(outline) = outline {
                self.surface.draw_shadow(&outline, shadow)?;
            }
        }

        self.surface.pixmap.stroke_path(
            &self.path,
            &solid_paint(style.color),
            &stroke,
            transform,
            None,
        );

        Ok(())
    }
}

impl Drop for CellScope<'_> {
    fn drop(&mut self) {
        self.surface.state = DrawState::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_image(width: u32, height: u32, color: Rgba<u8>) -> DecodedImage {
        DecodedImage::from_rgba(RgbaImage::from_pixel(width, height, color)).unwrap()
    }

    #[test]
    fn test_surface_rejects_zero_size() {
        assert!(matches!(
            Surface::new(0, 10, 2),
            Err(CollageError::InvalidGeometry(_))
        ));
    }

    #[test]
    fn test_backdrop_is_opaque() {
        let mut surface = Surface::new(100, 80, 2).unwrap();
        surface.paint_backdrop().unwrap();

        let centre = surface.pixel(100, 80).unwrap();
        let corner = surface.pixel(199, 159).unwrap();
        assert_eq!(centre[3], 255);
        assert_eq!(corner[3], 255);
        assert!(centre[0] >= corner[0], "centre should be lighter than corner");
    }

    #[test]
    fn test_cell_scope_resets_state_on_drop() {
        let mut surface = Surface::new(50, 50, 1).unwrap();
        {
            let mut scope = surface.cell(Rect::new(5.0, 5.0, 40.0, 40.0), 4.0).unwrap();
            scope.set_stroke(StrokeStyle {
                color: Rgba([255, 255, 255, 255]),
                width: 2.0,
            });
            scope.set_shadow(Shadow {
                color: Rgba([0, 0, 0, 40]),
                blur: 4.0,
                offset_x: 0.0,
                offset_y: 2.0,
            });
            assert!(!scope.state().is_neutral());
        }
        assert!(surface.state().is_neutral());
    }

    #[test]
    fn test_draw_image_is_clipped_to_rounded_cell() {
        // GIVEN: a white surface and a red photo
        let mut surface = Surface::new(100, 100, 1).unwrap();
        {
            let mut scope = surface.cell(Rect::new(0.0, 0.0, 100.0, 100.0), 0.0).unwrap();
            scope.fill(Rgba([255, 255, 255, 255]));
        }
        let photo = solid_image(10, 10, Rgba([255, 0, 0, 255]));
        let cell = Rect::new(10.0, 10.0, 80.0, 80.0);
        let fit = FitGeometry {
            source: Rect::new(0.0, 0.0, 10.0, 10.0),
            dest: cell,
        };

        // WHEN: the photo is drawn with a 20 unit corner radius
        {
            let mut scope = surface.cell(cell, 20.0).unwrap();
            scope.draw_image(&photo, &fit).unwrap();
        }

        // THEN: the centre is red and the clipped corner is still white
        assert_eq!(surface.pixel(50, 50).unwrap(), Rgba([255, 0, 0, 255]));
        assert_eq!(surface.pixel(11, 11).unwrap(), Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn test_clip_mask_covers_only_the_cell() {
        let mut surface = Surface::new(400, 300, 2).unwrap();
        let scope = surface.cell(Rect::new(10.0, 20.0, 80.0, 50.5), 6.0).unwrap();

        assert_eq!((scope.clip.left, scope.clip.top), (20, 40));
        assert_eq!((scope.clip.mask.width(), scope.clip.mask.height()), (160, 101));
        assert_eq!(scope.clip.coverage(100, 80), 255);
        assert_eq!(scope.clip.coverage(19, 80), 0);
        assert_eq!(scope.clip.coverage(500, 500), 0);
    }

    #[test]
    fn test_fill_rect_is_clipped_to_cell() {
        // GIVEN: a white surface
        let mut surface = Surface::new(100, 100, 2).unwrap();
        {
            let mut scope = surface.cell(Rect::new(0.0, 0.0, 100.0, 100.0), 0.0).unwrap();
            scope.fill(Rgba([255, 255, 255, 255]));
        }

        // WHEN: a rectangle larger than the cell is filled inside it
        {
            let mut scope = surface.cell(Rect::new(20.0, 20.0, 40.0, 40.0), 0.0).unwrap();
            scope
                .fill_rect(Rect::new(0.0, 0.0, 100.0, 100.0), Rgba([0, 0, 0, 255]))
                .unwrap();
        }

        // THEN: only the cell turns black
        assert_eq!(surface.pixel(80, 80).unwrap(), Rgba([0, 0, 0, 255]));
        assert_eq!(surface.pixel(20, 20).unwrap(), Rgba([255, 255, 255, 255]));
        assert_eq!(surface.pixel(150, 150).unwrap(), Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn test_stroke_with_shadow_darkens_below_cell() {
        let mut surface = Surface::new(60, 60, 1).unwrap();
        {
            let mut scope = surface.cell(Rect::new(0.0, 0.0, 60.0, 60.0), 0.0).unwrap();
            scope.fill(Rgba([255, 255, 255, 255]));
        }
        {
            let mut scope = surface.cell(Rect::new(10.0, 10.0, 30.0, 30.0), 4.0).unwrap();
            scope.set_shadow(Shadow {
                color: Rgba([0, 0, 0, 255]),
                blur: 2.0,
                offset_x: 0.0,
                offset_y: 4.0,
            });
            scope.set_stroke(StrokeStyle {
                color: Rgba([0, 0, 255, 255]),
                width: 2.0,
            });
            scope.stroke_outline().unwrap();
        }

        // Just below the bottom border the offset shadow shows through
        let below = surface.pixel(25, 43).unwrap();
        assert!(below[0] < 255, "expected shadow below the cell, got {:?}", below);
        // The border itself is drawn in the stroke colour
        assert_eq!(surface.pixel(25, 10).unwrap()[2], 255);
    }

    #[test]
    fn test_encode_png_has_device_dimensions() {
        let mut surface = Surface::new(40, 30, 2).unwrap();
        surface.paint_empty_state().unwrap();

        let bytes = surface.encode(OutputFormat::Png).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();

        assert_eq!((decoded.width(), decoded.height()), (80, 60));
    }

    #[test]
    fn test_encode_jpeg() {
        let surface = Surface::new(16, 16, 1).unwrap();
        let bytes = surface.encode(OutputFormat::Jpeg).unwrap();
        assert_eq!(image::guess_format(&bytes).unwrap(), ImageFormat::Jpeg);
    }
}
