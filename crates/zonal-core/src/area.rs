//! Cell counts → area in the grid's native squared unit. No unit conversion
//! happens here; see [`crate::table::ResultTable::scaled`].

use std::collections::BTreeMap;

use crate::accumulate::ClassCountMap;
use crate::grid::ClassLabel;

pub type ClassAreaMap = BTreeMap<ClassLabel, f64>;

#[inline]
pub fn cells_to_area(cells: u64, cell_area: f64) -> f64 {
    cells as f64 * cell_area
}

pub fn to_areas(counts: &ClassCountMap, cell_area: f64) -> ClassAreaMap {
    counts.iter().map(|(&class, &n)| (class, cells_to_area(n, cell_area))).collect()
}
