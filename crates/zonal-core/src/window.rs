//! Bounding index window for a polygon.
//!
//! The window holds every cell whose center lies inside the polygon's
//! bounding box, and nothing else. A float estimate is refined with exact
//! center comparisons so rounding in the inverse transform can never drop a
//! boundary cell.

use serde::{Deserialize, Serialize};

use crate::geometry::BBox;
use crate::grid::GridStore;

/// Inclusive row/column index range, always inside the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexWindow {
    pub row_min: usize,
    pub row_max: usize,
    pub col_min: usize,
    pub col_max: usize,
}

impl IndexWindow {
    /// Number of rows covered (bounds are inclusive).
    pub fn rows(&self) -> usize {
        self.row_max - self.row_min + 1
    }

    /// Number of columns covered.
    pub fn cols(&self) -> usize {
        self.col_max - self.col_min + 1
    }

    pub fn cell_count(&self) -> usize {
        self.rows() * self.cols()
    }
}

/// Smallest window whose cell centers fall in `bbox`, or `None` when no cell
/// center of the grid does. `None` alone does not mean the box misses the
/// grid: a box narrower than one cell can sit between centers.
pub fn locate_window(grid: &GridStore, bbox: &BBox) -> Option<IndexWindow> {
    if grid.is_empty() {
        return None;
    }
    let t = grid.transform();
    let (col_min, col_max) = axis_range(
        grid.cols(),
        (bbox.min_x, bbox.max_x),
        (t.origin_x, t.cell_width),
        |c| t.col_center(c),
    )?;
    let (row_min, row_max) = axis_range(
        grid.rows(),
        (bbox.min_y, bbox.max_y),
        (t.origin_y, t.cell_height),
        |r| t.row_center(r),
    )?;
    Some(IndexWindow { row_min, row_max, col_min, col_max })
}

/// Index range `[lo, hi]` of cells along one axis whose center lies in
/// `[min, max]`. `step` may be negative.
fn axis_range(
    n: usize,
    (min, max): (f64, f64),
    (origin, step): (f64, f64),
    center: impl Fn(usize) -> f64,
) -> Option<(usize, usize)> {
    if n == 0 || min.is_nan() || max.is_nan() || min > max {
        return None;
    }
    let inside = |i: usize| {
        let v = center(i);
        v >= min && v <= max
    };
    let a = (min - origin) / step - 0.5;
    let b = (max - origin) / step - 0.5;
    let last = (n - 1) as f64;
    // Clamp the estimate into the grid before converting; out-of-range
    // boxes collapse onto an edge cell and are rejected by `inside`.
    let mut lo = a.min(b).ceil().clamp(0.0, last) as usize;
    let mut hi = a.max(b).floor().clamp(0.0, last) as usize;
    if lo > hi {
        // Box narrower than one cell pitch; probe the cell nearest the estimate.
        hi = lo;
    }

    while lo > 0 && inside(lo - 1) {
        lo -= 1;
    }
    while lo <= hi && !inside(lo) {
        lo += 1;
    }
    while hi + 1 < n && inside(hi + 1) {
        hi += 1;
    }
    while hi >= lo && !inside(hi) {
        if hi == 0 {
            return None;
        }
        hi -= 1;
    }
    (lo <= hi).then_some((lo, hi))
}
