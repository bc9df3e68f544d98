//! Named collage templates selectable by id.
//!
//! Each template is a unit grid plus a list of rectangular areas on it.
//! Areas are listed in fill order and never share a unit cell.

use serde::Serialize;

use super::{clamp_radius, padded_area, scaled_radius};
use crate::collage_types::{CollageError, CollageResult, LayoutCell, LayoutKind, LayoutPlan};

/// Gap between template areas
pub const TEMPLATE_GAP: f32 = 8.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GridArea {
    pub row: usize,
    pub col: usize,
    pub row_span: usize,
    pub col_span: usize,
}

const fn unit(row: usize, col: usize) -> GridArea {
    GridArea {
        row,
        col,
        row_span: 1,
        col_span: 1,
    }
}

const fn span(row: usize, col: usize, row_span: usize, col_span: usize) -> GridArea {
    GridArea {
        row,
        col,
        row_span,
        col_span,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LayoutTemplate {
    pub id: &'static str,
    pub name: &'static str,
    pub rows: usize,
    pub cols: usize,
    pub areas: &'static [GridArea],
}

impl LayoutTemplate {
    pub fn slots(&self) -> usize {
        self.areas.len()
    }
}

static TEMPLATES: [LayoutTemplate; 9] = [
    LayoutTemplate {
        id: "grid-2x2",
        name: "Grid 2x2",
        rows: 2,
        cols: 2,
        areas: &[unit(0, 0), unit(0, 1), unit(1, 0), unit(1, 1)],
    },
    LayoutTemplate {
        id: "grid-3x2",
        name: "Grid 3x2",
        rows: 2,
        cols: 3,
        areas: &[
            unit(0, 0),
            unit(0, 1),
            unit(0, 2),
            unit(1, 0),
            unit(1, 1),
            unit(1, 2),
        ],
    },
    LayoutTemplate {
        id: "grid-4x2",
        name: "Grid 4x2",
        rows: 2,
        cols: 4,
        areas: &[
            unit(0, 0),
            unit(0, 1),
            unit(0, 2),
            unit(0, 3),
            unit(1, 0),
            unit(1, 1),
            unit(1, 2),
            unit(1, 3),
        ],
    },
    LayoutTemplate {
        id: "featured-1",
        name: "Featured photo",
        rows: 3,
        cols: 4,
        areas: &[
            span(0, 0, 2, 2),
            unit(0, 2),
            unit(0, 3),
            unit(1, 2),
            unit(1, 3),
            span(2, 0, 1, 2),
            unit(2, 2),
            unit(2, 3),
        ],
    },
    LayoutTemplate {
        id: "featured-2",
        name: "Large photo",
        rows: 3,
        cols: 3,
        areas: &[
            span(0, 0, 2, 2),
            unit(0, 2),
            unit(1, 2),
            unit(2, 0),
            unit(2, 1),
            unit(2, 2),
        ],
    },
    LayoutTemplate {
        id: "panoramic",
        name: "Panoramic",
        rows: 2,
        cols: 4,
        areas: &[
            span(0, 0, 1, 2),
            unit(0, 2),
            unit(0, 3),
            unit(1, 0),
            unit(1, 1),
            unit(1, 2),
            unit(1, 3),
        ],
    },
    LayoutTemplate {
        id: "diagonal",
        name: "Diagonal",
        rows: 3,
        cols: 4,
        areas: &[
            span(0, 0, 1, 2),
            unit(0, 2),
            unit(0, 3),
            unit(1, 0),
            span(1, 1, 1, 2),
            unit(1, 3),
            unit(2, 0),
            unit(2, 1),
            span(2, 2, 1, 2),
        ],
    },
    LayoutTemplate {
        id: "asymmetric",
        name: "Asymmetric",
        rows: 2,
        cols: 4,
        areas: &[
            span(0, 0, 1, 2),
            unit(0, 2),
            unit(0, 3),
            unit(1, 0),
            unit(1, 1),
            span(1, 2, 1, 2),
        ],
    },
    LayoutTemplate {
        id: "magazine",
        name: "Magazine",
        rows: 3,
        cols: 4,
        areas: &[
            unit(0, 0),
            unit(0, 1),
            unit(0, 2),
            unit(0, 3),
            unit(1, 0),
            span(1, 1, 1, 2),
            unit(1, 3),
            unit(2, 0),
            unit(2, 1),
            unit(2, 2),
            unit(2, 3),
        ],
    },
];

pub fn templates() -> &'static [LayoutTemplate] {
    &TEMPLATES
}

pub fn find_template(id: &str) -> Option<&'static LayoutTemplate> {
    TEMPLATES.iter().find(|t| t.id == id)
}

/// Builds the plan for a named template inside the padded canvas.
pub fn template_layout(
    id: &str,
    canvas_width: f32,
    canvas_height: f32,
    padding: f32,
) -> CollageResult<LayoutPlan> {
    let template = find_template(id).ok_or_else(|| CollageError::UnknownTemplate(id.to_string()))?;
    let area = padded_area(canvas_width, canvas_height, padding)?;

    let unit_width =
        (area.width - TEMPLATE_GAP * (template.cols - 1) as f32) / template.cols as f32;
    let unit_height =
        (area.height - TEMPLATE_GAP * (template.rows - 1) as f32) / template.rows as f32;
    if unit_width <= 0.0 || unit_height <= 0.0 {
        return Err(CollageError::InvalidGeometry(format!(
            "template {} does not fit a {}x{} canvas",
            id, canvas_width, canvas_height
        )));
    }

    let cells = template
        .areas
        .iter()
        .map(|a| {
            let width = unit_width * a.col_span as f32 + TEMPLATE_GAP * (a.col_span - 1) as f32;
            let height = unit_height * a.row_span as f32 + TEMPLATE_GAP * (a.row_span - 1) as f32;
            LayoutCell {
                x: area.x + a.col as f32 * (unit_width + TEMPLATE_GAP),
                y: area.y + a.row as f32 * (unit_height + TEMPLATE_GAP),
                width,
                height,
                rounding: clamp_radius(scaled_radius(width, height), width, height),
            }
        })
        .collect();

    Ok(LayoutPlan {
        kind: LayoutKind::Template { id: id.to_string() },
        cells,
    })
}
