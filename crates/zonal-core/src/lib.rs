//! Zonal class-area statistics: for each polygon, the area of every class
//! of a categorical raster that falls inside it.
//!
//! Pipeline per polygon, all reads against one immutable [`GridStore`]:
//! [`window::locate_window`] → [`rasterize::rasterize`] →
//! [`accumulate::accumulate`] → [`area::to_areas`], with
//! [`table::TableBuilder`] assembling the dense result in input order.
//! [`ZonalEngine`] drives the batch, sequentially or on rayon (`threading`).

pub mod accumulate;
pub mod area;
pub mod config;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod grid;
pub mod rasterize;
pub mod table;
pub mod window;

pub use config::{RasterStrategy, ZonalConfig};
pub use engine::{CancelToken, PolygonFailure, Progress, RunHooks, ZonalEngine, ZonalReport, ZoneCounts};
pub use error::{Result, ZonalError};
pub use geometry::{Point, Polygon, Ring};
pub use grid::{ClassLabel, GeoTransform, GridStore};
pub use table::{ResultRow, ResultTable, ZoneStatus};
