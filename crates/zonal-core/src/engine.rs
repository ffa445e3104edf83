//! Per-polygon pipeline and batch driver.
//!
//! window → mask → counts, once per polygon, reading only the shared grid.
//! Polygons are independent, so the batch is a plain ordered map: rayon's
//! indexed `collect` keeps input order no matter which worker finishes first,
//! and the sequential path produces the same table bit for bit.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::accumulate::{accumulate, total_cells, ClassCountMap};
use crate::config::ZonalConfig;
use crate::error::{Result, ZonalError};
use crate::geometry::Polygon;
use crate::grid::GridStore;
use crate::rasterize::{rasterize, InclusionMask};
use crate::table::{ResultTable, TableBuilder, ZoneStatus};
use crate::window::{locate_window, IndexWindow};

/// Sparse outcome for one polygon.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneCounts {
    pub counts: ClassCountMap,
    /// Included cells that carried a real class (no-data excluded).
    pub included_cells: u64,
    pub status: ZoneStatus,
    pub window: Option<IndexWindow>,
}

#[derive(Debug)]
pub struct PolygonFailure {
    /// Position in the input slice.
    pub index: usize,
    pub id: String,
    pub error: ZonalError,
}

/// Table of valid polygons plus the polygons left out of it.
#[derive(Debug)]
pub struct ZonalReport {
    pub table: ResultTable,
    pub failures: Vec<PolygonFailure>,
}

impl ZonalReport {
    pub fn failed_ids(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.id.as_str()).collect()
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Shared flag to stop a run between polygons.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Emitted after each polygon finishes, in completion order.
#[derive(Debug, Clone, Copy)]
pub struct Progress<'a> {
    pub completed: usize,
    pub total: usize,
    pub id: &'a str,
}

#[derive(Default, Clone)]
pub struct RunHooks<'h> {
    pub progress: Option<&'h (dyn Fn(Progress<'_>) + Sync)>,
    pub cancel: Option<CancelToken>,
}

pub struct ZonalEngine<'g> {
    grid: &'g GridStore,
    config: ZonalConfig,
}

impl<'g> ZonalEngine<'g> {
    pub fn new(grid: &'g GridStore, config: ZonalConfig) -> Self {
        Self { grid, config }
    }

    pub fn grid(&self) -> &GridStore {
        self.grid
    }

    pub fn config(&self) -> &ZonalConfig {
        &self.config
    }

    /// Run the pipeline for a single polygon.
    pub fn zonal_counts(&self, polygon: &Polygon) -> Result<ZoneCounts> {
        let prepared = polygon.prepare(self.config.check_simplicity)?;
        let Some(window) = locate_window(self.grid, &prepared.bbox) else {
            // No cell center in the bbox. It either misses the grid or falls
            // between centers.
            let status = if prepared.bbox.intersects(&self.grid.extent()) {
                ZoneStatus::EmptyAccumulation
            } else {
                ZoneStatus::NoOverlap
            };
            tracing::debug!(id = %polygon.id, status = status.as_str(), "no cell centers in bbox");
            return Ok(ZoneCounts {
                counts: ClassCountMap::new(),
                included_cells: 0,
                status,
                window: None,
            });
        };

        let mask = rasterize(&prepared, self.grid.transform(), &window, self.config.strategy);
        let counts = if mask.is_empty() { ClassCountMap::new() } else { self.accumulate(&mask)? };
        let included_cells = total_cells(&counts);
        let status = if mask.is_empty() { ZoneStatus::EmptyAccumulation } else { ZoneStatus::Counted };

        tracing::debug!(
            id = %polygon.id,
            rows = window.rows(),
            cols = window.cols(),
            included = included_cells,
            classes = counts.len(),
            "zonal counts"
        );
        Ok(ZoneCounts { counts, included_cells, status, window: Some(window) })
    }

    fn accumulate(&self, mask: &InclusionMask) -> Result<ClassCountMap> {
        #[cfg(feature = "threading")]
        if self.config.runs_parallel()
            && mask.window().cell_count() >= crate::accumulate::PARALLEL_MIN_CELLS
        {
            return crate::accumulate::accumulate_parallel(self.grid, mask);
        }
        accumulate(self.grid, mask)
    }

    pub fn run(&self, polygons: &[Polygon]) -> Result<ZonalReport> {
        self.run_with(polygons, RunHooks::default())
    }

    /// Process every polygon and assemble the table in input order.
    ///
    /// Invalid or cancelled polygons are left out of the table and listed in
    /// `failures`. Only an engine fault (`GridIndexOutOfRange`) or a worker
    /// pool that cannot be built aborts the run.
    pub fn run_with(&self, polygons: &[Polygon], hooks: RunHooks<'_>) -> Result<ZonalReport> {
        let started = Instant::now();
        let total = polygons.len();
        let completed = AtomicUsize::new(0);

        let step = |(index, polygon): (usize, &Polygon)| -> Result<ZoneCounts> {
            if hooks.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
                return Err(ZonalError::Cancelled { id: polygon.id.clone() });
            }
            let outcome = self.zonal_counts(polygon);
            if let Err(e) = &outcome {
                tracing::warn!(index, id = %polygon.id, "{e}");
            }
            let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
            if let Some(progress) = hooks.progress {
                progress(Progress { completed: done, total, id: &polygon.id });
            }
            outcome
        };
        let outcomes = self.map_polygons(polygons, step)?;

        let mut builder = TableBuilder::with_capacity(self.grid.cell_area(), total);
        let mut failures = Vec::new();
        for (index, (polygon, outcome)) in polygons.iter().zip(outcomes).enumerate() {
            match outcome {
                Ok(z) => builder.push(polygon.id.clone(), z.status, z.counts),
                Err(error) if error.is_per_polygon() => {
                    failures.push(PolygonFailure { index, id: polygon.id.clone(), error })
                }
                Err(fatal) => return Err(fatal),
            }
        }
        let table = builder.finish();

        tracing::info!(
            polygons = total,
            rows = table.len(),
            failures = failures.len(),
            classes = table.classes().len(),
            parallel = self.config.runs_parallel(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "zonal run finished"
        );
        Ok(ZonalReport { table, failures })
    }

    fn map_polygons<F>(&self, polygons: &[Polygon], step: F) -> Result<Vec<Result<ZoneCounts>>>
    where
        F: Fn((usize, &Polygon)) -> Result<ZoneCounts> + Sync + Send,
    {
        #[cfg(feature = "threading")]
        if self.config.runs_parallel() {
            use rayon::prelude::*;

            let work = || polygons.par_iter().enumerate().map(&step).collect::<Vec<_>>();
            return match self.config.workers {
                Some(n) => {
                    let pool = rayon::ThreadPoolBuilder::new()
                        .num_threads(n)
                        .build()
                        .map_err(|e| ZonalError::ThreadPool(e.to_string()))?;
                    Ok(pool.install(work))
                }
                None => Ok(work()),
            };
        }
        Ok(polygons.iter().enumerate().map(step).collect())
    }
}
