//! Per-cell finishing: rounded clip, drop shadow and light border.

use image::Rgba;

use crate::collage_types::{CollageResult, Rect};
use crate::surface::{CellScope, Shadow, StrokeStyle, Surface};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FinishStyle {
    pub shadow: Shadow,
    pub border: StrokeStyle,
}

impl Default for FinishStyle {
    fn default() -> Self {
        Self {
            shadow: Shadow {
                color: Rgba([0, 0, 0, 38]),
                blur: 12.0,
                offset_x: 0.0,
                offset_y: 4.0,
            },
            border: StrokeStyle {
                color: Rgba([255, 255, 255, 230]),
                width: 2.0,
            },
        }
    }
}

/// Sets shadow and border on the scope and strokes the cell outline.
///
/// Runs after the cell's content has been drawn.
pub fn apply_finish(scope: &mut CellScope<'_>, style: &FinishStyle) -> CollageResult<()> {
    scope.set_shadow(style.shadow);
    scope.set_stroke(style.border);
    scope.stroke_outline()
}

/// Clip, draw, finish. The draw state is neutral again when this returns,
/// including when `draw` fails.
pub fn finish_cell<F>(
    surface: &mut Surface,
    rect: Rect,
    radius: f32,
    style: &FinishStyle,
    draw: F,
) -> CollageResult<()>
where
    F: FnOnce(&mut CellScope<'_>) -> CollageResult<()>,
{
    let mut scope = surface.cell(rect, radius)?;
    draw(&mut scope)?;
    apply_finish(&mut scope, style)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collage_types::CollageError;

    #[test]
    fn test_state_is_neutral_after_finish() {
        let mut surface = Surface::new(80, 80, 2).unwrap();
        surface.paint_backdrop().unwrap();

        finish_cell(
            &mut surface,
            Rect::new(10.0, 10.0, 60.0, 60.0),
            8.0,
            &FinishStyle::default(),
            |scope| {
                scope.fill(Rgba([200, 0, 0, 255]));
                Ok(())
            },
        )
        .unwrap();

        assert!(surface.state().is_neutral());
        // Border is near-white over the red fill
        let edge = surface.pixel(80, 20).unwrap();
        assert!(edge[1] > 150, "border should be light, got {:?}", edge);
    }

    #[test]
    fn test_state_is_neutral_after_failed_draw() {
        let mut surface = Surface::new(40, 40, 1).unwrap();

        let result = finish_cell(
            &mut surface,
            Rect::new(0.0, 0.0, 40.0, 40.0),
            4.0,
            &FinishStyle::default(),
            |scope| {
                scope.set_stroke(StrokeStyle {
                    color: Rgba([0, 0, 0, 255]),
                    width: 5.0,
                });
                Err(CollageError::Surface("draw failed".to_string()))
            },
        );

        assert!(result.is_err());
        assert!(surface.state().is_neutral());
    }

    #[test]
    fn test_next_cell_does_not_inherit_effects() {
        let mut surface = Surface::new(40, 40, 1).unwrap();

        finish_cell(
            &mut surface,
            Rect::new(0.0, 0.0, 20.0, 20.0),
            2.0,
            &FinishStyle::default(),
            |_| Ok(()),
        )
        .unwrap();

        let scope = surface.cell(Rect::new(20.0, 20.0, 20.0, 20.0), 2.0).unwrap();
        assert!(scope.state().is_neutral());
    }
}
