//! Polygon → cell inclusion mask.
//!
//! Two strategies share one boundary rule (see [`crate::geometry`]) and
//! produce identical masks:
//!
//! * `Scanline`: per window row, intersect the row's center line with every
//!   ring edge, sort the crossings, and fill the column spans between
//!   crossing pairs. Cost O(rows × vertices + cells).
//! * `PointInPolygon`: ray-cast every cell center independently.
//!   Cost O(cells × vertices); kept as the reference implementation.

use serde::{Deserialize, Serialize};

use crate::geometry::{crossing_x, edges, Point, PreparedPolygon};
use crate::grid::GeoTransform;
use crate::window::IndexWindow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RasterStrategy {
    #[default]
    Scanline,
    PointInPolygon,
}

/// One flag per window cell, row-major in window-local indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InclusionMask {
    window: IndexWindow,
    bits: Vec<bool>,
}

impl InclusionMask {
    fn empty(window: IndexWindow) -> Self {
        Self { window, bits: vec![false; window.cell_count()] }
    }

    pub fn window(&self) -> &IndexWindow {
        &self.window
    }

    /// Window-local lookup.
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> bool {
        self.bits[row * self.window.cols() + col]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[bool]> {
        self.bits.chunks_exact(self.window.cols())
    }

    pub fn included(&self) -> usize {
        self.bits.iter().filter(|&&b| b).count()
    }

    pub fn is_empty(&self) -> bool {
        !self.bits.iter().any(|&b| b)
    }
}

pub fn rasterize(
    polygon: &PreparedPolygon,
    transform: &GeoTransform,
    window: &IndexWindow,
    strategy: RasterStrategy,
) -> InclusionMask {
    match strategy {
        RasterStrategy::Scanline => scanline(polygon, transform, window),
        RasterStrategy::PointInPolygon => point_in_polygon(polygon, transform, window),
    }
}

fn scanline(polygon: &PreparedPolygon, t: &GeoTransform, window: &IndexWindow) -> InclusionMask {
    let mut mask = InclusionMask::empty(*window);
    let cols = window.cols();
    // Increasing, since cell_width > 0.
    let centers: Vec<f64> = (window.col_min..=window.col_max).map(|c| t.col_center(c)).collect();
    let mut xs = Vec::new();

    for (i, row) in (window.row_min..=window.row_max).enumerate() {
        let y = t.row_center(row);
        let line = &mut mask.bits[i * cols..(i + 1) * cols];
        fill_spans(&polygon.outer, y, &centers, &mut xs, line, true);
        for hole in &polygon.holes {
            fill_spans(hole, y, &centers, &mut xs, line, false);
        }
    }
    mask
}

/// Set `line[c] = value` for every center inside `ring` on the line `y`.
/// A center is inside iff it falls in `[xs[2k], xs[2k+1])` for some k.
fn fill_spans(
    ring: &[Point],
    y: f64,
    centers: &[f64],
    xs: &mut Vec<f64>,
    line: &mut [bool],
    value: bool,
) {
    xs.clear();
    xs.extend(edges(ring).filter_map(|(a, b)| crossing_x(a, b, y)));
    if xs.is_empty() {
        return;
    }
    xs.sort_unstable_by(f64::total_cmp);
    for pair in xs.chunks_exact(2) {
        let start = centers.partition_point(|&cx| cx < pair[0]);
        let end = centers.partition_point(|&cx| cx < pair[1]);
        if start < end {
            line[start..end].fill(value);
        }
    }
}

fn point_in_polygon(polygon: &PreparedPolygon, t: &GeoTransform, window: &IndexWindow) -> InclusionMask {
    let mut mask = InclusionMask::empty(*window);
    let cols = window.cols();
    for (i, row) in (window.row_min..=window.row_max).enumerate() {
        let y = t.row_center(row);
        for (j, col) in (window.col_min..=window.col_max).enumerate() {
            mask.bits[i * cols + j] = polygon.contains(t.col_center(col), y);
        }
    }
    mask
}
