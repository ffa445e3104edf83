//! Categorical raster and its georeferencing.
//!
//! Cell (row, col) maps to a spatial cell through an axis-aligned
//! [`GeoTransform`]. The grid is validated once at construction and is
//! read-only afterwards.

use serde::{Deserialize, Serialize};

use crate::error::{Result, ZonalError};
use crate::geometry::BBox;
use crate::window::IndexWindow;

/// Discrete class value stored in each cell.
pub type ClassLabel = i32;

/// Axis-aligned affine mapping from (row, col) to spatial coordinates.
///
/// `origin_x`/`origin_y` is the outer corner of cell (0, 0). Columns advance
/// by `cell_width` (always positive); rows advance by `cell_height`, which is
/// negative for the usual north-up layout.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub origin_x: f64,
    pub origin_y: f64,
    pub cell_width: f64,
    pub cell_height: f64,
}

impl GeoTransform {
    pub fn new(origin_x: f64, origin_y: f64, cell_width: f64, cell_height: f64) -> Self {
        Self { origin_x, origin_y, cell_width, cell_height }
    }

    /// Unit cells with row 0 at the bottom: cell (r, c) spans [c, c+1) × [r, r+1).
    pub fn unit() -> Self {
        Self::new(0.0, 0.0, 1.0, 1.0)
    }

    #[inline]
    pub fn col_center(&self, col: usize) -> f64 {
        self.origin_x + (col as f64 + 0.5) * self.cell_width
    }

    #[inline]
    pub fn row_center(&self, row: usize) -> f64 {
        self.origin_y + (row as f64 + 0.5) * self.cell_height
    }

    /// Spatial (x, y) of the center of cell (row, col).
    #[inline]
    pub fn cell_center(&self, row: usize, col: usize) -> (f64, f64) {
        (self.col_center(col), self.row_center(row))
    }

    pub fn cell_area(&self) -> f64 {
        (self.cell_width * self.cell_height).abs()
    }

    fn validate(&self) -> Result<()> {
        let finite = [self.origin_x, self.origin_y, self.cell_width, self.cell_height]
            .iter()
            .all(|v| v.is_finite());
        if !finite {
            return Err(ZonalError::InvalidGrid("transform has non-finite terms".into()));
        }
        if self.cell_width <= 0.0 {
            return Err(ZonalError::InvalidGrid(format!(
                "cell_width must be positive, got {}",
                self.cell_width
            )));
        }
        if self.cell_height == 0.0 {
            return Err(ZonalError::InvalidGrid("cell_height must be non-zero".into()));
        }
        Ok(())
    }
}

/// Immutable, georeferenced categorical raster. Row-major.
///
/// Shared by reference across every polygon computation; nothing in the
/// engine mutates it, so no locking is needed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "RawGrid")]
pub struct GridStore {
    data: Vec<ClassLabel>,
    rows: usize,
    cols: usize,
    transform: GeoTransform,
    nodata: Option<ClassLabel>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawGrid {
    data: Vec<ClassLabel>,
    rows: usize,
    cols: usize,
    transform: GeoTransform,
    #[serde(default)]
    nodata: Option<ClassLabel>,
}

impl TryFrom<RawGrid> for GridStore {
    type Error = ZonalError;

    fn try_from(raw: RawGrid) -> Result<Self> {
        GridStore::new(raw.rows, raw.cols, raw.transform, raw.nodata, raw.data)
    }
}

impl GridStore {
    /// Wrap row-major `data`. Fails if its length is not `rows * cols` or
    /// the transform is degenerate.
    pub fn new(
        rows: usize,
        cols: usize,
        transform: GeoTransform,
        nodata: Option<ClassLabel>,
        data: Vec<ClassLabel>,
    ) -> Result<Self> {
        transform.validate()?;
        let expected = rows.checked_mul(cols).ok_or_else(|| {
            ZonalError::InvalidGrid(format!("{rows}x{cols} overflows the address space"))
        })?;
        if data.len() != expected {
            return Err(ZonalError::InvalidGrid(format!(
                "{rows}x{cols} grid needs {expected} cells, got {}",
                data.len()
            )));
        }
        Ok(Self { data, rows, cols, transform, nodata })
    }

    /// Grid with every cell set to `fill`.
    pub fn filled(
        rows: usize,
        cols: usize,
        transform: GeoTransform,
        nodata: Option<ClassLabel>,
        fill: ClassLabel,
    ) -> Result<Self> {
        let len = rows.checked_mul(cols).ok_or_else(|| {
            ZonalError::InvalidGrid(format!("{rows}x{cols} overflows the address space"))
        })?;
        Self::new(rows, cols, transform, nodata, vec![fill; len])
    }

    /// Build a grid by evaluating `f(row, col)` for every cell.
    pub fn from_fn(
        rows: usize,
        cols: usize,
        transform: GeoTransform,
        nodata: Option<ClassLabel>,
        mut f: impl FnMut(usize, usize) -> ClassLabel,
    ) -> Result<Self> {
        let mut data = Vec::with_capacity(rows.saturating_mul(cols));
        for r in 0..rows {
            for c in 0..cols {
                data.push(f(r, c));
            }
        }
        Self::new(rows, cols, transform, nodata, data)
    }

    /// Number of rows.
    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns.
    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    /// Sentinel excluded from every tally, if the grid has one.
    #[inline]
    pub fn nodata(&self) -> Option<ClassLabel> {
        self.nodata
    }

    /// Row-major class labels.
    pub fn data(&self) -> &[ClassLabel] {
        &self.data
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> ClassLabel {
        self.data[row * self.cols + col]
    }

    /// `None` outside the grid.
    pub fn get_checked(&self, row: usize, col: usize) -> Option<ClassLabel> {
        (row < self.rows && col < self.cols).then(|| self.get(row, col))
    }

    #[inline]
    pub fn is_nodata(&self, value: ClassLabel) -> bool {
        self.nodata == Some(value)
    }

    /// Area of one cell in the grid's linear unit squared.
    pub fn cell_area(&self) -> f64 {
        self.transform.cell_area()
    }

    /// True for a grid with zero rows or columns.
    pub fn is_empty(&self) -> bool {
        self.rows == 0 || self.cols == 0
    }

    /// Spatial bounding box of all cell edges.
    pub fn extent(&self) -> BBox {
        let t = &self.transform;
        let x1 = t.origin_x + self.cols as f64 * t.cell_width;
        let y1 = t.origin_y + self.rows as f64 * t.cell_height;
        BBox {
            min_x: t.origin_x.min(x1),
            max_x: t.origin_x.max(x1),
            min_y: t.origin_y.min(y1),
            max_y: t.origin_y.max(y1),
        }
    }

    /// Read-only rows of the cells covered by `window`, top to bottom in
    /// index order. Fails if the window does not fit inside the grid.
    pub fn window_rows<'a>(
        &'a self,
        window: &IndexWindow,
    ) -> Result<impl Iterator<Item = &'a [ClassLabel]> + 'a> {
        if window.row_max >= self.rows
            || window.col_max >= self.cols
            || window.row_min > window.row_max
            || window.col_min > window.col_max
        {
            return Err(ZonalError::GridIndexOutOfRange {
                row_min: window.row_min,
                row_max: window.row_max,
                col_min: window.col_min,
                col_max: window.col_max,
                rows: self.rows,
                cols: self.cols,
            });
        }
        let cols = self.cols;
        let (c0, c1) = (window.col_min, window.col_max + 1);
        Ok((window.row_min..=window.row_max)
            .map(move |r| &self.data[r * cols + c0..r * cols + c1]))
    }
}
