use serde::{Deserialize, Serialize};

use crate::error::Result;
pub use crate::rasterize::RasterStrategy;

/// Engine settings. Defaults suit large grids: scanline fill, simplicity
/// precheck on, worker pool on when built with `threading`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ZonalConfig {
    pub strategy: RasterStrategy,
    /// Process polygons on the rayon pool. Ignored without `threading`.
    pub parallel: bool,
    /// Fixed worker count; `None` uses rayon's global pool.
    pub workers: Option<usize>,
    /// O(n²) per-ring self-intersection check before rasterizing.
    pub check_simplicity: bool,
}

impl Default for ZonalConfig {
    fn default() -> Self {
        Self {
            strategy: RasterStrategy::Scanline,
            parallel: true,
            workers: None,
            check_simplicity: true,
        }
    }
}

impl ZonalConfig {
    pub fn sequential() -> Self {
        Self { parallel: false, ..Self::default() }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// True when this build and this config will run polygons concurrently.
    pub fn runs_parallel(&self) -> bool {
        cfg!(feature = "threading") && self.parallel && self.workers != Some(1)
    }
}
