//! Partitioning of the collage canvas into photo cells.

mod selector;
pub mod templates;

pub use selector::{grid_columns, select_layout, GRID_GAP};
pub use templates::{find_template, template_layout, templates, LayoutTemplate};

use crate::collage_types::{CollageError, CollageResult, LayoutCell, Rect};

/// Height policy of one row in a declarative arrangement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum RowHeight {
    /// Fixed fraction of the padded height
    Fraction(f32),
    /// Equal split of whatever the fractional rows and gaps leave over
    Share,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct RowSpec {
    pub height: RowHeight,
    pub columns: usize,
    pub radius: Option<f32>,
}

/// Corner radius for cells without a hand-tuned value.
pub(crate) fn scaled_radius(width: f32, height: f32) -> f32 {
    (width.min(height) * 0.04).clamp(2.0, 8.0)
}

/// A radius can never exceed half the short side of its cell.
fn clamp_radius(radius: f32, width: f32, height: f32) -> f32 {
    radius.min(width.min(height) / 2.0).max(0.0)
}

/// The canvas minus padding on all four sides.
pub(crate) fn padded_area(canvas_width: f32, canvas_height: f32, padding: f32) -> CollageResult<Rect> {
    if !(canvas_width.is_finite() && canvas_height.is_finite()) || canvas_width <= 0.0 || canvas_height <= 0.0 {
        return Err(CollageError::InvalidGeometry(format!(
            "canvas must have positive size, got {}x{}",
            canvas_width, canvas_height
        )));
    }
    if !padding.is_finite() || padding < 0.0 {
        return Err(CollageError::InvalidGeometry(format!(
            "padding must be non-negative, got {}",
            padding
        )));
    }

    let inner_width = canvas_width - padding * 2.0;
    let inner_height = canvas_height - padding * 2.0;
    if inner_width <= 0.0 || inner_height <= 0.0 {
        return Err(CollageError::InvalidGeometry(format!(
            "padding {} leaves no drawable area on a {}x{} canvas",
            padding, canvas_width, canvas_height
        )));
    }

    Ok(Rect::new(padding, padding, inner_width, inner_height))
}

/// Lays rows top to bottom inside `area`, columns left to right inside each row.
pub(crate) fn build_rows(area: Rect, gap: f32, rows: &[RowSpec]) -> CollageResult<Vec<LayoutCell>> {
    let fixed_total: f32 = rows
        .iter()
        .map(|row| match row.height {
            RowHeight::Fraction(f) => f * area.height,
            RowHeight::Share => 0.0,
        })
        .sum();
    let shares = rows
        .iter()
        .filter(|row| row.height == RowHeight::Share)
        .count();
    let row_gaps = rows.len().saturating_sub(1) as f32;

    let (vertical_gap, share_height) = if shares > 0 {
        let share = (area.height - fixed_total - gap * row_gaps) / shares as f32;
        (gap, share)
    } else if row_gaps > 0.0 {
        // Fractional rows keep their height; the gap gives way on short canvases
        let leftover = (area.height - fixed_total).max(0.0);
        (gap.min(leftover / row_gaps), 0.0)
    } else {
        (0.0, 0.0)
    };

    let mut cells = Vec::with_capacity(rows.iter().map(|r| r.columns).sum());
    // Summed in f64 so hundreds of rows still end inside the area
    let mut y = area.y as f64;

    for row in rows {
        let height = match row.height {
            RowHeight::Fraction(f) => f * area.height,
            RowHeight::Share => share_height,
        };
        let columns = row.columns.max(1);
        let width = (area.width - gap * (columns - 1) as f32) / columns as f32;

        if height <= 0.0 || width <= 0.0 {
            return Err(CollageError::InvalidGeometry(format!(
                "{}x{} area is too small for {} rows with gap {}",
                area.width,
                area.height,
                rows.len(),
                gap
            )));
        }

        let radius = clamp_radius(
            row.radius.unwrap_or_else(|| scaled_radius(width, height)),
            width,
            height,
        );

        for col in 0..columns {
            cells.push(LayoutCell {
                x: area.x + col as f32 * (width + gap),
                y: y as f32,
                width,
                height,
                rounding: radius,
            });
        }

        y += height as f64 + vertical_gap as f64;
    }

    Ok(cells)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_padded_area() {
        let area = padded_area(800.0, 600.0, 20.0).unwrap();
        assert_eq!(area, Rect::new(20.0, 20.0, 760.0, 560.0));
    }

    #[test]
    fn test_padding_larger_than_canvas() {
        assert!(matches!(
            padded_area(30.0, 30.0, 20.0),
            Err(CollageError::InvalidGeometry(_))
        ));
        assert!(padded_area(0.0, 30.0, 0.0).is_err());
    }

    #[test]
    fn test_scaled_radius_shrinks_with_cell() {
        assert!(scaled_radius(40.0, 40.0) < scaled_radius(150.0, 150.0));
        assert_eq!(scaled_radius(1000.0, 1000.0), 8.0);
        assert_eq!(scaled_radius(10.0, 10.0), 2.0);
    }

    #[test]
    fn test_fraction_rows_shrink_gap_on_short_canvas() {
        // 60% + 35% leaves 5 units on a 100 unit tall area
        let rows = [
            RowSpec {
                height: RowHeight::Fraction(0.6),
                columns: 1,
                radius: None,
            },
            RowSpec {
                height: RowHeight::Fraction(0.35),
                columns: 2,
                radius: None,
            },
        ];
        let cells = build_rows(Rect::new(0.0, 0.0, 100.0, 100.0), 10.0, &rows).unwrap();

        assert_eq!(cells.len(), 3);
        assert!((cells[1].y - 65.0).abs() < 1e-4);
        assert!(cells[2].y + cells[2].height <= 100.0 + 1e-4);
    }
}
