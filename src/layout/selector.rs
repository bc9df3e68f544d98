use log::debug;

use super::{build_rows, padded_area, RowHeight, RowSpec};
use crate::collage_types::{CollageResult, LayoutKind, LayoutPlan};

/// Gap between cells of the generic grid
pub const GRID_GAP: f32 = 6.0;

/// Hand-tuned composition for one exact photo count.
struct Arrangement {
    count: usize,
    kind: LayoutKind,
    gap: f32,
    rows: &'static [RowSpec],
}

const fn row(height: RowHeight, columns: usize, radius: f32) -> RowSpec {
    RowSpec {
        height,
        columns,
        radius: Some(radius),
    }
}

static FIXED_ARRANGEMENTS: [Arrangement; 6] = [
    Arrangement {
        count: 1,
        kind: LayoutKind::Single,
        gap: 0.0,
        rows: &[row(RowHeight::Share, 1, 16.0)],
    },
    Arrangement {
        count: 2,
        kind: LayoutKind::Pair,
        gap: 12.0,
        rows: &[row(RowHeight::Share, 2, 12.0)],
    },
    Arrangement {
        count: 3,
        kind: LayoutKind::HeroOverPair,
        gap: 10.0,
        rows: &[
            row(RowHeight::Fraction(0.6), 1, 14.0),
            row(RowHeight::Fraction(0.35), 2, 10.0),
        ],
    },
    Arrangement {
        count: 4,
        kind: LayoutKind::Quad,
        gap: 8.0,
        rows: &[
            row(RowHeight::Share, 2, 10.0),
            row(RowHeight::Share, 2, 10.0),
        ],
    },
    Arrangement {
        count: 5,
        kind: LayoutKind::PairOverTrio,
        gap: 8.0,
        rows: &[
            row(RowHeight::Fraction(0.4), 2, 12.0),
            row(RowHeight::Fraction(0.55), 3, 10.0),
        ],
    },
    Arrangement {
        count: 6,
        kind: LayoutKind::SixGrid,
        gap: 6.0,
        rows: &[row(RowHeight::Share, 3, 8.0), row(RowHeight::Share, 3, 8.0)],
    },
];

/// Column count of the generic grid used for seven or more photos.
pub fn grid_columns(photo_count: usize) -> usize {
    match photo_count {
        0..=9 => 3,
        10..=16 => 4,
        _ => 5,
    }
}

/// Chooses the cell partition for `photo_count` photos.
///
/// Counts 1 to 6 use fixed arrangements; anything larger falls back to an
/// equal-cell grid whose last row may hold empty slots.
pub fn select_layout(
    photo_count: usize,
    canvas_width: f32,
    canvas_height: f32,
    padding: f32,
) -> CollageResult<LayoutPlan> {
    let area = padded_area(canvas_width, canvas_height, padding)?;

    if photo_count == 0 {
        return Ok(LayoutPlan::empty());
    }

    let plan = match FIXED_ARRANGEMENTS.iter().find(|a| a.count == photo_count) {
        Some(arrangement) => LayoutPlan {
            kind: arrangement.kind.clone(),
            cells: build_rows(area, arrangement.gap, arrangement.rows)?,
        },
        None => {
            let cols = grid_columns(photo_count);
            let rows = photo_count.div_ceil(cols);
            // Large counts give up gap before cell height
            let gap = GRID_GAP
                .min(area.height / rows as f32 / 2.0)
                .min(area.width / cols as f32 / 2.0);
            let specs = vec![
                RowSpec {
                    height: RowHeight::Share,
                    columns: cols,
                    radius: None,
                };
                rows
            ];
            LayoutPlan {
                kind: LayoutKind::Grid { rows, cols },
                cells: build_rows(area, gap, &specs)?,
            }
        }
    };

    debug!(
        "Selected {:?} layout for {} photos ({} slots)",
        plan.kind,
        photo_count,
        plan.slot_count()
    );

    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_photo_spans_padded_area() {
        let plan = select_layout(1, 800.0, 600.0, 20.0).unwrap();

        assert_eq!(plan.kind, LayoutKind::Single);
        assert_eq!(plan.cells.len(), 1);
        let cell = plan.cells[0];
        assert_eq!((cell.x, cell.y), (20.0, 20.0));
        assert_eq!((cell.width, cell.height), (760.0, 560.0));
        assert_eq!(cell.rounding, 16.0);
    }

    #[test]
    fn test_hero_layout_proportions() {
        let plan = select_layout(3, 800.0, 600.0, 20.0).unwrap();

        let hero = plan.cells[0];
        assert!((hero.height - 560.0 * 0.6).abs() < 1e-3);
        assert_eq!(hero.width, 760.0);
        assert!((plan.cells[1].height - 560.0 * 0.35).abs() < 1e-3);
        assert!((plan.cells[1].width - 375.0).abs() < 1e-3);
        assert!((plan.cells[1].y - (20.0 + 336.0 + 10.0)).abs() < 1e-3);
    }

    #[test]
    fn test_two_over_three() {
        let plan = select_layout(5, 800.0, 600.0, 20.0).unwrap();

        assert_eq!(plan.kind, LayoutKind::PairOverTrio);
        assert_eq!(plan.cells.len(), 5);
        assert!((plan.cells[0].height - 224.0).abs() < 1e-3);
        assert!((plan.cells[4].height - 308.0).abs() < 1e-3);
    }

    #[test]
    fn test_grid_columns_by_count() {
        assert_eq!(grid_columns(7), 3);
        assert_eq!(grid_columns(9), 3);
        assert_eq!(grid_columns(10), 4);
        assert_eq!(grid_columns(16), 4);
        assert_eq!(grid_columns(17), 5);
    }

    #[test]
    fn test_generic_grid_leaves_trailing_slots() {
        let plan = select_layout(7, 900.0, 900.0, 20.0).unwrap();

        assert_eq!(plan.kind, LayoutKind::Grid { rows: 3, cols: 3 });
        assert_eq!(plan.slot_count(), 9);
        assert_eq!(plan.placed(7), 7);
    }

    #[test]
    fn test_grid_gap_shrinks_for_hundreds_of_photos() {
        let plan = select_layout(500, 800.0, 600.0, 20.0).unwrap();

        assert_eq!(plan.kind, LayoutKind::Grid { rows: 100, cols: 5 });
        assert_eq!(plan.placed(500), 500);
        assert!(plan.cells.iter().all(|c| c.height > 0.0 && c.width > 0.0));

        let last = plan.cells[plan.cells.len() - 1];
        assert!(last.y + last.height <= 580.0 + 1e-3);
        assert!(plan.cells[5].y > plan.cells[0].y + plan.cells[0].height);
    }

    #[test]
    fn test_empty_plan_still_validates_canvas() {
        assert_eq!(select_layout(0, 100.0, 100.0, 20.0).unwrap().slot_count(), 0);
        assert!(select_layout(0, 0.0, 100.0, 20.0).is_err());
    }
}
