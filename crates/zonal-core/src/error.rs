//! Error taxonomy for the zonal engine.
//!
//! Only conditions that stop a computation are errors. A polygon that misses
//! the grid, or overlaps it without capturing any cell center, is a normal
//! outcome reported through [`crate::table::ZoneStatus`].

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ZonalError>;

#[derive(Debug, Error)]
pub enum ZonalError {
    /// A polygon failed validation. Reported per polygon; siblings continue.
    #[error("invalid geometry for polygon '{id}': {reason}")]
    InvalidGeometry { id: String, reason: String },

    /// The grid's dimensions, data length or transform are unusable.
    #[error("invalid grid: {0}")]
    InvalidGrid(String),

    /// A computed window escaped the grid after clamping. Indicates a bug in
    /// window location, never bad input.
    #[error(
        "window rows {row_min}..={row_max}, cols {col_min}..={col_max} exceeds grid {rows}x{cols}"
    )]
    GridIndexOutOfRange {
        row_min: usize,
        row_max: usize,
        col_min: usize,
        col_max: usize,
        rows: usize,
        cols: usize,
    },

    /// The run was cancelled before this polygon started.
    #[error("polygon '{id}' skipped: run cancelled")]
    Cancelled { id: String },

    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error("worker pool: {0}")]
    ThreadPool(String),
}

impl ZonalError {
    pub fn invalid_geometry(id: &str, reason: impl Into<String>) -> Self {
        Self::InvalidGeometry { id: id.to_string(), reason: reason.into() }
    }

    /// True for errors that belong to a single polygon rather than the run.
    pub fn is_per_polygon(&self) -> bool {
        matches!(self, Self::InvalidGeometry { .. } | Self::Cancelled { .. })
    }
}
