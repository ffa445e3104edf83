//! Per-class cell tallies under an inclusion mask.
//!
//! Classes with zero cells are omitted; densification happens once, in the
//! result table.

use std::collections::BTreeMap;

use crate::error::Result;
use crate::grid::{ClassLabel, GridStore};
use crate::rasterize::InclusionMask;

pub type ClassCountMap = BTreeMap<ClassLabel, u64>;

/// Windows at least this large are split across workers when the
/// `threading` feature is on.
#[cfg(feature = "threading")]
pub const PARALLEL_MIN_CELLS: usize = 1 << 20;

/// Count included, non-no-data cells by class.
pub fn accumulate(grid: &GridStore, mask: &InclusionMask) -> Result<ClassCountMap> {
    let mut counts = ClassCountMap::new();
    let nodata = grid.nodata();
    for (values, flags) in grid.window_rows(mask.window())?.zip(mask.rows()) {
        count_row(values, flags, nodata, &mut counts);
    }
    Ok(counts)
}

/// Same result as [`accumulate`], with mask rows partitioned across the
/// rayon pool. Integer sums make the merge order irrelevant.
#[cfg(feature = "threading")]
pub fn accumulate_parallel(grid: &GridStore, mask: &InclusionMask) -> Result<ClassCountMap> {
    use rayon::prelude::*;

    let nodata = grid.nodata();
    let rows: Vec<(&[ClassLabel], &[bool])> = grid.window_rows(mask.window())?.zip(mask.rows()).collect();
    Ok(rows
        .par_iter()
        .fold(ClassCountMap::new, |mut acc, &(values, flags)| {
            count_row(values, flags, nodata, &mut acc);
            acc
        })
        .reduce(ClassCountMap::new, |mut a, b| {
            merge_counts(&mut a, &b);
            a
        }))
}

#[inline]
fn count_row(values: &[ClassLabel], flags: &[bool], nodata: Option<ClassLabel>, counts: &mut ClassCountMap) {
    for (&v, &inside) in values.iter().zip(flags) {
        if inside && Some(v) != nodata {
            *counts.entry(v).or_insert(0) += 1;
        }
    }
}

/// Add `other` into `into`.
pub fn merge_counts(into: &mut ClassCountMap, other: &ClassCountMap) {
    for (&class, &n) in other {
        *into.entry(class).or_insert(0) += n;
    }
}

pub fn total_cells(counts: &ClassCountMap) -> u64 {
    counts.values().sum()
}
