//! Aspect-ratio reconciliation between a photo and its destination cell.
//!
//! Every drawing path (fixed arrangements, generic grids, templates) goes
//! through [`resolve`]; nothing else in the crate does aspect math.

use crate::collage_types::{CollageError, CollageResult, FitGeometry, FitMode, Rect};

fn is_positive(value: f32) -> bool {
    value.is_finite() && value > 0.0
}

/// Computes the source crop window and destination placement for one photo.
///
/// * `Cover` - the destination is exactly `dest`; the source is cropped
///   around its centre to the destination's aspect ratio.
/// * `Contain` - the whole source is used; the destination shrinks along one
///   axis and is centred inside `dest`.
pub fn resolve(
    natural_width: u32,
    natural_height: u32,
    dest: Rect,
    mode: FitMode,
) -> CollageResult<FitGeometry> {
    if natural_width == 0 || natural_height == 0 {
        return Err(CollageError::InvalidGeometry(format!(
            "source has no area ({}x{})",
            natural_width, natural_height
        )));
    }
    if !is_positive(dest.width) || !is_positive(dest.height) {
        return Err(CollageError::InvalidGeometry(format!(
            "destination has no area ({}x{})",
            dest.width, dest.height
        )));
    }

    let nw = natural_width as f32;
    let nh = natural_height as f32;
    let img_aspect = nw / nh;
    let rect_aspect = dest.width / dest.height;

    let geometry = match mode {
        FitMode::Cover => {
            let source = if img_aspect > rect_aspect {
                // Relatively wider: trim the sides
                let source_width = nh * rect_aspect;
                Rect::new((nw - source_width) / 2.0, 0.0, source_width, nh)
            } else {
                // Relatively taller: trim top and bottom
                let source_height = nw / rect_aspect;
                Rect::new(0.0, (nh - source_height) / 2.0, nw, source_height)
            };
            FitGeometry { source, dest }
        }
        FitMode::Contain => {
            let (draw_width, draw_height) = if img_aspect > rect_aspect {
                (dest.width, dest.width / img_aspect)
            } else {
                (dest.height * img_aspect, dest.height)
            };
            FitGeometry {
                source: Rect::new(0.0, 0.0, nw, nh),
                dest: Rect::new(
                    dest.x + (dest.width - draw_width) / 2.0,
                    dest.y + (dest.height - draw_height) / 2.0,
                    draw_width,
                    draw_height,
                ),
            }
        }
    };

    Ok(geometry)
}
